//! KDE Plasma backend using `kwriteconfig` / `kreadconfig`.

use super::{Setting, SettingValue, SettingsBackend, Unmapped};
use crate::preference::{NightLightSchedule, Preference};
use sequencer::CommandSpec;

/// kwriteconfig-based backend for Plasma 5 or 6
#[derive(Debug, Clone, Copy)]
pub struct Kde {
    version: u8,
}

impl Default for Kde {
    fn default() -> Self {
        Self { version: 6 }
    }
}

impl Kde {
    /// Backend for a specific Plasma major version (5 or 6).
    pub fn new(version: u8) -> Self {
        Self { version }
    }

    /// Pick the version from the tools available in `PATH`.
    pub fn detect() -> Self {
        if which::which("kwriteconfig6").is_ok() {
            Self::new(6)
        } else if which::which("kwriteconfig5").is_ok() {
            Self::new(5)
        } else {
            log::debug!("no kwriteconfig found, assuming Plasma 6");
            Self::default()
        }
    }

    fn config(&self, file: &str, group: &str, key: &str, value: impl Into<String>) -> Setting {
        let locator = ["--file", file, "--group", group, "--key", key];
        Setting {
            key: format!("{file} [{group}] {key}"),
            read: CommandSpec::new(&format!("kreadconfig{}", self.version)).args(locator),
            write: CommandSpec::new(&format!("kwriteconfig{}", self.version)).args(locator),
            value: SettingValue::Exact(value.into()),
        }
    }
}

/// `20.5` hours → `2030`
fn hhmm(hours: f64) -> String {
    let total = (hours.rem_euclid(24.0) * 60.0).round() as u32;
    format!("{:02}{:02}", (total / 60) % 24, total % 60)
}

/// GNOME button layout (`appmenu:minimize,maximize,close`) → KWin decoration
/// button codes for the left and right side (`M`, `IAX`). Unknown names are
/// dropped.
fn kwin_buttons(layout: &str) -> (String, String) {
    let codes = |side: &str| -> String {
        side.split(',')
            .filter_map(|name| match name.trim() {
                "appmenu" | "menu" | "icon" => Some('M'),
                "minimize" => Some('I'),
                "maximize" => Some('A'),
                "close" => Some('X'),
                "spacer" => Some('_'),
                _ => None,
            })
            .collect()
    };
    let (left, right) = layout.split_once(':').unwrap_or(("", layout));
    (codes(left), codes(right))
}

impl SettingsBackend for Kde {
    fn desktop(&self) -> &'static str {
        "kde"
    }

    fn settings(&self, preference: &Preference) -> Result<Vec<Setting>, Unmapped> {
        let settings = match preference {
            Preference::DarkMode(dark) => {
                let scheme = if *dark { "BreezeDark" } else { "BreezeLight" };
                // plasma-apply-colorscheme updates kdeglobals and running apps
                let mut setting = self.config("kdeglobals", "General", "ColorScheme", scheme);
                setting.write = CommandSpec::new("plasma-apply-colorscheme");
                vec![setting]
            }
            Preference::NightLightEnabled(on) => {
                vec![self.config("kwinrc", "NightColor", "Active", on.to_string())]
            }
            Preference::NightLightSchedule(NightLightSchedule::Automatic) => {
                vec![self.config("kwinrc", "NightColor", "Mode", "Automatic")]
            }
            Preference::NightLightSchedule(NightLightSchedule::Manual { from, to }) => vec![
                self.config("kwinrc", "NightColor", "Mode", "Times"),
                self.config("kwinrc", "NightColor", "EveningBeginFixed", hhmm(*from)),
                self.config("kwinrc", "NightColor", "MorningBeginFixed", hhmm(*to)),
            ],
            Preference::NightLightTemperature(kelvin) => vec![self.config(
                "kwinrc",
                "NightColor",
                "NightTemperature",
                kelvin.to_string(),
            )],
            Preference::WindowButtonLayout(layout) => {
                let (left, right) = kwin_buttons(layout);
                vec![
                    self.config("kwinrc", "org.kde.kdecoration2", "ButtonsOnLeft", left),
                    self.config("kwinrc", "org.kde.kdecoration2", "ButtonsOnRight", right),
                ]
            }
            Preference::TouchpadClickMethod(_) | Preference::CustomKeybinding(_) => {
                return Err(self.unmapped(preference));
            }
        };
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preference::ClickMethod;

    #[test]
    fn test_hhmm() {
        assert_eq!(hhmm(20.0), "2000");
        assert_eq!(hhmm(6.5), "0630");
        assert_eq!(hhmm(23.99), "2359");
    }

    #[test]
    fn test_dark_mode_uses_colorscheme_tool() {
        let settings = Kde::new(6).settings(&Preference::DarkMode(true)).unwrap();
        assert_eq!(
            settings[0].read.argv(),
            vec![
                "kreadconfig6",
                "--file",
                "kdeglobals",
                "--group",
                "General",
                "--key",
                "ColorScheme"
            ]
        );
        assert_eq!(
            settings[0].write_command("BreezeLight").argv(),
            vec!["plasma-apply-colorscheme", "BreezeDark"]
        );
        assert!(settings[0].is_satisfied("BreezeDark\n"));
    }

    #[test]
    fn test_night_light_plasma5() {
        let settings = Kde::new(5)
            .settings(&Preference::NightLightEnabled(true))
            .unwrap();
        assert_eq!(settings[0].write.program, "kwriteconfig5");
        assert_eq!(
            settings[0].write_command("").args,
            vec!["--file", "kwinrc", "--group", "NightColor", "--key", "Active", "true"]
        );
        assert!(!settings[0].is_satisfied(""));
    }

    #[test]
    fn test_kwin_buttons() {
        assert_eq!(
            kwin_buttons("appmenu:minimize,maximize,close"),
            ("M".to_string(), "IAX".to_string())
        );
        assert_eq!(
            kwin_buttons("close,minimize:"),
            ("XI".to_string(), String::new())
        );
        assert_eq!(kwin_buttons("close"), (String::new(), "X".to_string()));
    }

    #[test]
    fn test_window_buttons_go_to_kdecoration() {
        let settings = Kde::new(6)
            .settings(&Preference::WindowButtonLayout(
                "appmenu:minimize,maximize,close".into(),
            ))
            .unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings[0].key, "kwinrc [org.kde.kdecoration2] ButtonsOnLeft");
        assert_eq!(
            settings[1].write_command("HIAX").args,
            vec![
                "--file",
                "kwinrc",
                "--group",
                "org.kde.kdecoration2",
                "--key",
                "ButtonsOnRight",
                "IAX"
            ]
        );
        assert!(settings[1].is_satisfied("IAX\n"));
    }

    #[test]
    fn test_unmapped() {
        let err = Kde::new(6)
            .settings(&Preference::TouchpadClickMethod(ClickMethod::Areas))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "touchpad click method areas is not supported on kde"
        );
    }
}
