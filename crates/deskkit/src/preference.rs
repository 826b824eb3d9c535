//! Desktop-independent preferences.

use std::fmt;

/// When the night light turns on.
#[derive(Debug, Clone, PartialEq)]
pub enum NightLightSchedule {
    /// Sunset to sunrise
    Automatic,
    /// Fixed hours, e.g. `from: 20.0, to: 6.0`
    Manual { from: f64, to: f64 },
}

/// Touchpad click behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMethod {
    Default,
    /// Bottom-right area is a right click
    Areas,
    /// Two-finger click is a right click
    Fingers,
}

impl ClickMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Areas => "areas",
            Self::Fingers => "fingers",
        }
    }
}

/// A custom global shortcut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keybinding {
    pub name: String,
    pub command: String,
    /// Accelerator, e.g. `<Super>Return`
    pub binding: String,
}

impl Keybinding {
    /// Stable identifier derived from the name.
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.name.len());
        for c in self.name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        slug.trim_matches('-').to_string()
    }
}

/// Something the user wants their desktop to look or behave like.
#[derive(Debug, Clone, PartialEq)]
pub enum Preference {
    DarkMode(bool),
    NightLightEnabled(bool),
    NightLightSchedule(NightLightSchedule),
    /// Colour temperature in Kelvin
    NightLightTemperature(u32),
    TouchpadClickMethod(ClickMethod),
    /// GNOME layout string, e.g. `appmenu:minimize,maximize,close`
    WindowButtonLayout(String),
    CustomKeybinding(Keybinding),
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DarkMode(true) => write!(f, "dark mode"),
            Self::DarkMode(false) => write!(f, "light mode"),
            Self::NightLightEnabled(on) => {
                write!(f, "night light {}", if *on { "on" } else { "off" })
            }
            Self::NightLightSchedule(NightLightSchedule::Automatic) => {
                write!(f, "night light sunset to sunrise")
            }
            Self::NightLightSchedule(NightLightSchedule::Manual { from, to }) => {
                write!(f, "night light {from:?}h to {to:?}h")
            }
            Self::NightLightTemperature(k) => write!(f, "night light {k}K"),
            Self::TouchpadClickMethod(m) => write!(f, "touchpad click method {}", m.as_str()),
            Self::WindowButtonLayout(layout) => write!(f, "window buttons {layout}"),
            Self::CustomKeybinding(kb) => write!(f, "shortcut {} ({})", kb.binding, kb.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keybinding_slug() {
        let kb = Keybinding {
            name: "Open Terminal!".into(),
            command: "kgx".into(),
            binding: "<Super>Return".into(),
        };
        assert_eq!(kb.slug(), "open-terminal");
    }

    #[test]
    fn test_display() {
        assert_eq!(Preference::DarkMode(true).to_string(), "dark mode");
        assert_eq!(
            Preference::NightLightSchedule(NightLightSchedule::Manual { from: 20.0, to: 6.5 })
                .to_string(),
            "night light 20.0h to 6.5h"
        );
    }
}
