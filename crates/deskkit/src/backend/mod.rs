//! Preference to settings-daemon mapping.
//!
//! A [`SettingsBackend`] turns one [`Preference`] into concrete
//! [`Setting`]s: a command that reads the current value, a command that
//! writes a new one, and the value wanted. Commands are built without a
//! target user; the caller adds `run_as` before running them.

pub mod gnome;
pub mod kde;

use crate::preference::Preference;
use regex::Regex;
use sequencer::CommandSpec;
use std::fmt;
use std::sync::LazyLock;

static GVARIANT_TYPE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:u?int(?:16|32|64)|byte|double|boolean|@[a-z]+)\s+")
        .expect("Invalid GVariant prefix regex")
});

/// The value a setting should end up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    /// Exactly this value (as written to the tool)
    Exact(String),
    /// A string list that must contain this item
    ListContains(String),
}

/// One concrete key on one desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    /// Human-readable key, e.g. `org.gnome.desktop.interface color-scheme`
    pub key: String,
    /// Prints the current value
    pub read: CommandSpec,
    /// Writes a value passed as the final argument
    pub write: CommandSpec,
    pub value: SettingValue,
}

impl Setting {
    /// Check a raw read-back value against the wanted value.
    pub fn is_satisfied(&self, current: &str) -> bool {
        match &self.value {
            SettingValue::Exact(want) => normalize(current) == normalize(want),
            SettingValue::ListContains(item) => parse_list(current).iter().any(|i| i == item),
        }
    }

    /// Value to write given the current raw value.
    pub fn target_value(&self, current: &str) -> String {
        match &self.value {
            SettingValue::Exact(want) => want.clone(),
            SettingValue::ListContains(item) => {
                let mut items = parse_list(current);
                if !items.iter().any(|i| i == item) {
                    items.push(item.clone());
                }
                render_list(&items)
            }
        }
    }

    /// Write command for the current raw value.
    pub fn write_command(&self, current: &str) -> CommandSpec {
        self.write.clone().arg(self.target_value(current))
    }
}

/// Why a preference was not turned into settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unmapped {
    pub desktop: &'static str,
    pub preference: String,
}

impl fmt::Display for Unmapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not supported on {}", self.preference, self.desktop)
    }
}

/// Maps preferences onto one desktop's settings tools.
pub trait SettingsBackend: Send + Sync + fmt::Debug {
    /// Desktop name for messages.
    fn desktop(&self) -> &'static str;

    /// Settings for a preference, in the order they must be written.
    fn settings(&self, preference: &Preference) -> Result<Vec<Setting>, Unmapped>;

    /// Build an [`Unmapped`] for this backend.
    fn unmapped(&self, preference: &Preference) -> Unmapped {
        Unmapped {
            desktop: self.desktop(),
            preference: preference.to_string(),
        }
    }
}

/// Strip GVariant type annotations and string quotes.
///
/// `uint32 4000` → `4000`, `'prefer-dark'` → `prefer-dark`.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let untyped = GVARIANT_TYPE_PREFIX.replace(trimmed, "");
    unquote(&untyped).to_string()
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
        .unwrap_or(s)
}

/// Parse a GVariant string array (`['a', 'b']`, `@as []`).
pub fn parse_list(raw: &str) -> Vec<String> {
    let untyped = GVARIANT_TYPE_PREFIX.replace(raw.trim(), "");
    let inner = untyped
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or("");
    inner
        .split(',')
        .map(|item| unquote(item.trim()).to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Render a GVariant string array.
pub fn render_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("'{i}'")).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("'prefer-dark'\n"), "prefer-dark");
        assert_eq!(normalize("uint32 4000"), "4000");
        assert_eq!(normalize("true"), "true");
        assert_eq!(normalize("20.0"), "20.0");
        assert_eq!(normalize("BreezeDark"), "BreezeDark");
    }

    #[test]
    fn test_parse_and_render_list() {
        assert!(parse_list("@as []").is_empty());
        assert_eq!(
            parse_list("['/a/', '/b/']\n"),
            vec!["/a/".to_string(), "/b/".to_string()]
        );
        assert_eq!(render_list(&["/a/".to_string()]), "['/a/']");
    }

    #[test]
    fn test_list_contains_appends_once() {
        let setting = Setting {
            key: "k".into(),
            read: CommandSpec::new("gsettings"),
            write: CommandSpec::new("gsettings"),
            value: SettingValue::ListContains("/b/".into()),
        };
        assert!(!setting.is_satisfied("['/a/']"));
        assert_eq!(setting.target_value("['/a/']"), "['/a/', '/b/']");
        assert!(setting.is_satisfied("['/a/', '/b/']"));
        assert_eq!(setting.write_command("@as []").args, vec!["['/b/']"]);
    }
}
