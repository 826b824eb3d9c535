//! Desktop environment detection.

use crate::procfs;
use std::fmt;
use std::path::Path;

/// Which desktop the preferences are applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopKind {
    Gnome,
    Kde,
    /// Anything else; `"none"` when nothing was found
    Other(String),
}

impl DesktopKind {
    /// Classify a desktop name (`GNOME`, `ubuntu:GNOME`, `KDE`, `plasma`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let mut first = None;
        for token in name.split(':').map(|t| t.trim().to_lowercase()) {
            if token.is_empty() {
                continue;
            }
            if token.contains("gnome") {
                return Some(Self::Gnome);
            }
            if token == "kde" || token.contains("plasma") {
                return Some(Self::Kde);
            }
            if first.is_none() {
                first = Some(token);
            }
        }
        first.map(Self::Other)
    }

    /// Short name used in config keys and logs.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Gnome => "gnome",
            Self::Kde => "kde",
            Self::Other(name) => name,
        }
    }

    /// Check if preferences can be applied to this desktop.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Gnome | Self::Kde)
    }
}

impl fmt::Display for DesktopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Session variables consulted in order.
const SESSION_VARS: [&str; 3] = ["XDG_CURRENT_DESKTOP", "XDG_SESSION_DESKTOP", "DESKTOP_SESSION"];

/// Detect the desktop environment.
///
/// Session variables are checked first. Under `sudo` they are usually
/// stripped, so the fallback looks for `gnome-shell` / `plasmashell`
/// processes owned by `uid` (any owner when `uid` is None).
pub fn detect(env: &dyn Fn(&str) -> Option<String>, proc_root: &Path, uid: Option<u32>) -> DesktopKind {
    for var in SESSION_VARS {
        if let Some(value) = env(var)
            && let Some(kind) = DesktopKind::from_name(&value)
        {
            log::debug!("desktop from {var}={value}: {kind}");
            return kind;
        }
    }

    for process in procfs::processes(proc_root) {
        if uid.is_some_and(|uid| uid != process.uid) {
            continue;
        }
        match process.comm.as_str() {
            "gnome-shell" => return DesktopKind::Gnome,
            "plasmashell" | "kwin_wayland" | "kwin_x11" => return DesktopKind::Kde,
            _ => {}
        }
    }

    DesktopKind::Other("none".to_string())
}
