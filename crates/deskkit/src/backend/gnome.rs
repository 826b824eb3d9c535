//! GNOME backend using `gsettings`.

use super::{Setting, SettingValue, SettingsBackend, Unmapped};
use crate::preference::{NightLightSchedule, Preference};
use sequencer::CommandSpec;

const INTERFACE: &str = "org.gnome.desktop.interface";
const COLOR: &str = "org.gnome.settings-daemon.plugins.color";
const TOUCHPAD: &str = "org.gnome.desktop.peripherals.touchpad";
const WM: &str = "org.gnome.desktop.wm.preferences";
const MEDIA_KEYS: &str = "org.gnome.settings-daemon.plugins.media-keys";
const CUSTOM_KEYBINDING: &str = "org.gnome.settings-daemon.plugins.media-keys.custom-keybinding";
const CUSTOM_KEYBINDING_ROOT: &str = "/org/gnome/settings-daemon/plugins/media-keys/custom-keybindings";

/// gsettings-based backend
#[derive(Debug, Clone, Copy, Default)]
pub struct Gnome;

fn gsetting(schema: &str, key: &str, value: SettingValue) -> Setting {
    Setting {
        key: format!("{schema} {key}"),
        read: CommandSpec::new("gsettings").args(["get", schema, key]),
        write: CommandSpec::new("gsettings").args(["set", schema, key]),
        value,
    }
}

fn exact(schema: &str, key: &str, value: impl Into<String>) -> Setting {
    gsetting(schema, key, SettingValue::Exact(value.into()))
}

fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "\\'"))
}

impl SettingsBackend for Gnome {
    fn desktop(&self) -> &'static str {
        "gnome"
    }

    fn settings(&self, preference: &Preference) -> Result<Vec<Setting>, Unmapped> {
        let settings = match preference {
            Preference::DarkMode(dark) => {
                let (scheme, theme) = if *dark {
                    ("prefer-dark", "Adwaita-dark")
                } else {
                    ("default", "Adwaita")
                };
                vec![
                    exact(INTERFACE, "color-scheme", quoted(scheme)),
                    exact(INTERFACE, "gtk-theme", quoted(theme)),
                ]
            }
            Preference::NightLightEnabled(on) => {
                vec![exact(COLOR, "night-light-enabled", on.to_string())]
            }
            Preference::NightLightSchedule(NightLightSchedule::Automatic) => {
                vec![exact(COLOR, "night-light-schedule-automatic", "true")]
            }
            Preference::NightLightSchedule(NightLightSchedule::Manual { from, to }) => vec![
                exact(COLOR, "night-light-schedule-automatic", "false"),
                exact(COLOR, "night-light-schedule-from", format!("{from:?}")),
                exact(COLOR, "night-light-schedule-to", format!("{to:?}")),
            ],
            Preference::NightLightTemperature(kelvin) => {
                vec![exact(COLOR, "night-light-temperature", kelvin.to_string())]
            }
            Preference::TouchpadClickMethod(method) => {
                vec![exact(TOUCHPAD, "click-method", quoted(method.as_str()))]
            }
            Preference::WindowButtonLayout(layout) => {
                vec![exact(WM, "button-layout", quoted(layout))]
            }
            Preference::CustomKeybinding(kb) => {
                let slug = kb.slug();
                if slug.is_empty() {
                    return Err(self.unmapped(preference));
                }
                let path = format!("{CUSTOM_KEYBINDING_ROOT}/{slug}/");
                let schema = format!("{CUSTOM_KEYBINDING}:{path}");
                vec![
                    exact(&schema, "name", quoted(&kb.name)),
                    exact(&schema, "command", quoted(&kb.command)),
                    exact(&schema, "binding", quoted(&kb.binding)),
                    gsetting(
                        MEDIA_KEYS,
                        "custom-keybindings",
                        SettingValue::ListContains(path),
                    ),
                ]
            }
        };
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preference::{ClickMethod, Keybinding};

    #[test]
    fn test_dark_mode() {
        let settings = Gnome.settings(&Preference::DarkMode(true)).unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(
            settings[0].read.argv(),
            vec!["gsettings", "get", "org.gnome.desktop.interface", "color-scheme"]
        );
        assert!(settings[0].is_satisfied("'prefer-dark'\n"));
        assert!(!settings[0].is_satisfied("'default'"));
        assert_eq!(
            settings[0].write_command("'default'").argv(),
            vec![
                "gsettings",
                "set",
                "org.gnome.desktop.interface",
                "color-scheme",
                "'prefer-dark'"
            ]
        );
    }

    #[test]
    fn test_night_light_temperature_reads_uint32() {
        let settings = Gnome.settings(&Preference::NightLightTemperature(4000)).unwrap();
        assert!(settings[0].is_satisfied("uint32 4000"));
        assert!(!settings[0].is_satisfied("uint32 2700"));
    }

    #[test]
    fn test_manual_schedule() {
        let pref = Preference::NightLightSchedule(NightLightSchedule::Manual { from: 20.0, to: 6.0 });
        let settings = Gnome.settings(&pref).unwrap();
        assert_eq!(settings.len(), 3);
        assert!(settings[1].is_satisfied("20.0"));
        assert_eq!(settings[2].target_value(""), "6.0");
    }

    #[test]
    fn test_touchpad() {
        let settings = Gnome
            .settings(&Preference::TouchpadClickMethod(ClickMethod::Fingers))
            .unwrap();
        assert_eq!(settings[0].key, "org.gnome.desktop.peripherals.touchpad click-method");
        assert!(settings[0].is_satisfied("'fingers'"));
    }

    #[test]
    fn test_custom_keybinding_uses_relocatable_schema() {
        let kb = Keybinding {
            name: "Terminal".into(),
            command: "kgx".into(),
            binding: "<Super>Return".into(),
        };
        let settings = Gnome.settings(&Preference::CustomKeybinding(kb)).unwrap();
        assert_eq!(settings.len(), 4);
        assert_eq!(
            settings[0].read.args[1],
            "org.gnome.settings-daemon.plugins.media-keys.custom-keybinding:/org/gnome/settings-daemon/plugins/media-keys/custom-keybindings/terminal/"
        );
        let list = &settings[3];
        assert!(!list.is_satisfied("@as []"));
        assert_eq!(
            list.target_value("@as []"),
            "['/org/gnome/settings-daemon/plugins/media-keys/custom-keybindings/terminal/']"
        );
    }
}
