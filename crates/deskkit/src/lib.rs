//! # deskkit
//!
//! Desktop environment support for provisioning:
//!
//! - detect the running desktop ([`detect`])
//! - find the desktop user and their session bus ([`session`])
//! - map abstract [`Preference`]s onto GNOME `gsettings` or KDE
//!   `kwriteconfig` calls ([`backend`])
//!
//! Nothing here runs commands except the optional `dbus-launch` fallback;
//! callers run the generated [`Setting`] commands as the target user.

pub mod backend;
pub mod detect;
pub mod error;
pub mod preference;
mod procfs;
pub mod session;

pub use backend::{Setting, SettingValue, SettingsBackend, Unmapped};
pub use detect::DesktopKind;
pub use error::{Error, Result};
pub use preference::{ClickMethod, Keybinding, NightLightSchedule, Preference};
pub use session::{
    BusDiscovery, BusSource, PasswdFile, SessionBus, SystemUsers, TargetUser, UserDatabase,
};

/// The detected desktop and how to configure it.
#[derive(Debug)]
pub struct DesktopProfile {
    pub kind: DesktopKind,
    backend: Option<Box<dyn SettingsBackend>>,
}

impl DesktopProfile {
    /// Profile for a detected desktop, picking the KDE tool version from `PATH`.
    pub fn new(kind: DesktopKind) -> Self {
        let backend: Option<Box<dyn SettingsBackend>> = match kind {
            DesktopKind::Gnome => Some(Box::new(backend::gnome::Gnome)),
            DesktopKind::Kde => Some(Box::new(backend::kde::Kde::detect())),
            DesktopKind::Other(_) => None,
        };
        Self { kind, backend }
    }

    /// Profile with an explicit backend (useful for testing).
    pub fn with_backend(kind: DesktopKind, backend: Box<dyn SettingsBackend>) -> Self {
        Self {
            kind,
            backend: Some(backend),
        }
    }

    /// Settings backend, if this desktop is supported.
    pub fn backend(&self) -> Option<&dyn SettingsBackend> {
        self.backend.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_backends() {
        assert_eq!(
            DesktopProfile::new(DesktopKind::Gnome)
                .backend()
                .map(|b| b.desktop()),
            Some("gnome")
        );
        assert!(
            DesktopProfile::new(DesktopKind::Other("xfce".into()))
                .backend()
                .is_none()
        );
        let kde = DesktopProfile::with_backend(
            DesktopKind::Kde,
            Box::new(backend::kde::Kde::new(5)),
        );
        assert_eq!(kde.backend().map(|b| b.desktop()), Some("kde"));
    }
}
