use anyhow::{Context, Result, bail};
use deskkit::{ClickMethod, Keybinding, NightLightSchedule, Preference};
use kernelkit::BuildConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths;

// ============================================================================
// Main Config Schema
// ============================================================================

/// The postinstall configuration (`config.toml`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PostinstallConfig {
    /// Package manager tuning, essentials and debloat lists
    #[serde(default)]
    pub packages: PackagesConfig,

    /// Extra repositories installed from release package URLs
    #[serde(default = "default_repositories")]
    pub repositories: Vec<RepositoryConfig>,

    /// Flatpak remote and applications
    #[serde(default)]
    pub flatpak: FlatpakConfig,

    /// Git identity and defaults
    #[serde(default)]
    pub git: GitConfig,

    /// Desktop preferences
    #[serde(default)]
    pub desktop: DesktopConfig,

    /// GNOME Shell extensions built from source
    #[serde(default)]
    pub extensions: ExtensionsConfig,

    /// Firewall setup
    #[serde(default)]
    pub firewall: FirewallConfig,

    /// Optional system tweaks
    #[serde(default)]
    pub tweaks: TweaksConfig,

    /// Run log file
    #[serde(default)]
    pub log: LogConfig,

    /// Defaults for `postinstall kernel`
    #[serde(default)]
    pub kernel: BuildConfig,
}

impl PostinstallConfig {
    /// Load from `path`; a missing file yields the built-in defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::with_defaults());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the resolved config directory
    pub fn load() -> Result<(Self, PathBuf)> {
        let path = paths::config_file()?;
        Ok((Self::load_from(&path)?, path))
    }

    /// Defaults as written by `config init`
    pub fn with_defaults() -> Self {
        Self {
            repositories: default_repositories(),
            ..Self::default()
        }
    }

    /// Write the config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Could not create {}", dir.display()))?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content)
            .with_context(|| format!("Could not write {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for repo in &self.repositories {
            if repo.url.trim().is_empty() || repo.provides.trim().is_empty() {
                bail!("Repository '{}' needs both url and provides", repo.name);
            }
        }
        for ext in &self.extensions.sources {
            if ext.uuid.trim().is_empty() || ext.repo.trim().is_empty() {
                bail!("Every extension needs both uuid and repo");
            }
            if ext.build.is_empty() {
                bail!("Extension '{}' has an empty build command", ext.uuid);
            }
        }
        if let Some(method) = &self.desktop.touchpad_click_method {
            parse_click_method(method)?;
        }
        if let (Some(from), Some(to)) = (
            self.desktop.night_light.schedule_from,
            self.desktop.night_light.schedule_to,
        ) && !((0.0..24.0).contains(&from) && (0.0..24.0).contains(&to))
        {
            bail!("Night light schedule hours must be within 0..24");
        }
        Ok(())
    }
}

// ============================================================================
// Packages
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesConfig {
    /// Tune the package manager config (parallel downloads etc.)
    #[serde(default = "default_true")]
    pub optimize: bool,

    /// Upgrade the whole system
    #[serde(default = "default_true")]
    pub upgrade: bool,

    /// Packages that must be installed; failure aborts the run
    #[serde(default = "default_essentials")]
    pub essentials: Vec<String>,

    /// Packages to remove
    #[serde(default)]
    pub remove: RemoveConfig,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            optimize: true,
            upgrade: true,
            essentials: default_essentials(),
            remove: RemoveConfig::default(),
        }
    }
}

/// Removal lists, applied on top of each other for the detected desktop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveConfig {
    #[serde(default = "default_remove_common")]
    pub common: Vec<String>,
    #[serde(default = "default_remove_gnome")]
    pub gnome: Vec<String>,
    #[serde(default = "default_remove_kde")]
    pub kde: Vec<String>,
}

impl Default for RemoveConfig {
    fn default() -> Self {
        Self {
            common: default_remove_common(),
            gnome: default_remove_gnome(),
            kde: default_remove_kde(),
        }
    }
}

impl RemoveConfig {
    /// Packages to remove on a desktop (`gnome`, `kde`, anything else)
    pub fn for_desktop(&self, desktop: &str) -> Vec<String> {
        let extra = match desktop {
            "gnome" => self.gnome.as_slice(),
            "kde" => self.kde.as_slice(),
            _ => &[],
        };
        let mut names: Vec<String> = Vec::new();
        for name in self.common.iter().chain(extra) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

fn default_true() -> bool {
    true
}

fn default_essentials() -> Vec<String> {
    ["git", "curl", "wget", "vim", "htop", "flatpak"]
        .map(String::from)
        .to_vec()
}

fn default_remove_common() -> Vec<String> {
    vec!["firefox".to_string()]
}

fn default_remove_gnome() -> Vec<String> {
    ["gnome-tour", "totem", "rhythmbox", "gnome-maps", "gnome-weather"]
        .map(String::from)
        .to_vec()
}

fn default_remove_kde() -> Vec<String> {
    ["kmahjongg", "kmines", "kpat", "dragon", "elisa-player"]
        .map(String::from)
        .to_vec()
}

// ============================================================================
// Repositories
// ============================================================================

/// A repository enabled by installing its release package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    /// Distro ID this applies to (`fedora`, `opensuse`, ...)
    pub distro: String,
    /// Release package URL; `{version}` becomes the distro's `VERSION_ID`
    pub url: String,
    /// Package name the release package installs
    pub provides: String,
}

impl RepositoryConfig {
    pub fn resolved_url(&self, version: &str) -> String {
        self.url.replace("{version}", version)
    }
}

fn default_repositories() -> Vec<RepositoryConfig> {
    ["free", "nonfree"]
        .iter()
        .map(|kind| RepositoryConfig {
            name: format!("rpmfusion-{kind}"),
            distro: "fedora".to_string(),
            url: format!(
                "https://mirrors.rpmfusion.org/{kind}/fedora/rpmfusion-{kind}-release-{{version}}.noarch.rpm"
            ),
            provides: format!("rpmfusion-{kind}-release"),
        })
        .collect()
}

// ============================================================================
// Flatpak
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatpakConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_remote_name")]
    pub remote_name: String,
    #[serde(default = "default_remote_url")]
    pub remote_url: String,
    #[serde(default = "default_flatpak_apps")]
    pub apps: Vec<String>,
}

impl Default for FlatpakConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remote_name: default_remote_name(),
            remote_url: default_remote_url(),
            apps: default_flatpak_apps(),
        }
    }
}

fn default_remote_name() -> String {
    "flathub".to_string()
}

fn default_remote_url() -> String {
    "https://dl.flathub.org/repo/flathub.flatpakrepo".to_string()
}

fn default_flatpak_apps() -> Vec<String> {
    ["org.mozilla.firefox", "com.github.tchx84.Flatseal"]
        .map(String::from)
        .to_vec()
}

// ============================================================================
// Git
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Used instead of prompting when the identity is not configured yet
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Optional code review username
    #[serde(default)]
    pub gerrit_username: Option<String>,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: None,
            email: None,
            gerrit_username: None,
            default_branch: default_branch(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

// ============================================================================
// Desktop
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesktopConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Start a throwaway session bus when no running session is found
    #[serde(default)]
    pub allow_dbus_launch: bool,

    #[serde(default = "default_some_true")]
    pub dark_mode: Option<bool>,

    #[serde(default)]
    pub night_light: NightLightConfig,

    /// `default`, `areas` or `fingers`
    #[serde(default = "default_click_method")]
    pub touchpad_click_method: Option<String>,

    /// GNOME layout string, e.g. `appmenu:minimize,maximize,close`
    #[serde(default = "default_button_layout")]
    pub button_layout: Option<String>,

    #[serde(default)]
    pub keybindings: Vec<KeybindingConfig>,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_dbus_launch: false,
            dark_mode: Some(true),
            night_light: NightLightConfig::default(),
            touchpad_click_method: default_click_method(),
            button_layout: default_button_layout(),
            keybindings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NightLightConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Fixed start hour; unset means sunset to sunrise
    #[serde(default)]
    pub schedule_from: Option<f64>,
    #[serde(default)]
    pub schedule_to: Option<f64>,
    /// Kelvin
    #[serde(default = "default_temperature")]
    pub temperature: Option<u32>,
}

impl Default for NightLightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule_from: None,
            schedule_to: None,
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeybindingConfig {
    pub name: String,
    pub command: String,
    pub binding: String,
}

fn default_some_true() -> Option<bool> {
    Some(true)
}

fn default_click_method() -> Option<String> {
    Some("fingers".to_string())
}

fn default_button_layout() -> Option<String> {
    Some("appmenu:minimize,maximize,close".to_string())
}

fn default_temperature() -> Option<u32> {
    Some(4000)
}

fn parse_click_method(value: &str) -> Result<ClickMethod> {
    match value {
        "default" => Ok(ClickMethod::Default),
        "areas" => Ok(ClickMethod::Areas),
        "fingers" => Ok(ClickMethod::Fingers),
        other => bail!("Unknown touchpad click method '{other}' (default, areas, fingers)"),
    }
}

impl DesktopConfig {
    /// Preferences to apply, in order
    pub fn preferences(&self) -> Result<Vec<Preference>> {
        let mut prefs = Vec::new();
        if let Some(dark) = self.dark_mode {
            prefs.push(Preference::DarkMode(dark));
        }

        let night = &self.night_light;
        prefs.push(Preference::NightLightEnabled(night.enabled));
        if night.enabled {
            let schedule = match (night.schedule_from, night.schedule_to) {
                (Some(from), Some(to)) => NightLightSchedule::Manual { from, to },
                _ => NightLightSchedule::Automatic,
            };
            prefs.push(Preference::NightLightSchedule(schedule));
            if let Some(kelvin) = night.temperature {
                prefs.push(Preference::NightLightTemperature(kelvin));
            }
        }

        if let Some(method) = &self.touchpad_click_method {
            prefs.push(Preference::TouchpadClickMethod(parse_click_method(method)?));
        }
        if let Some(layout) = &self.button_layout {
            prefs.push(Preference::WindowButtonLayout(layout.clone()));
        }
        for kb in &self.keybindings {
            prefs.push(Preference::CustomKeybinding(Keybinding {
                name: kb.name.clone(),
                command: kb.command.clone(),
                binding: kb.binding.clone(),
            }));
        }
        Ok(prefs)
    }
}

// ============================================================================
// GNOME extensions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_extensions")]
    pub sources: Vec<ExtensionSource>,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sources: default_extensions(),
        }
    }
}

/// An extension cloned from git and installed with its own build command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSource {
    /// UUID as listed by `gnome-extensions list`
    pub uuid: String,
    pub repo: String,
    #[serde(default)]
    pub branch: Option<String>,
    /// Run inside the clone as the desktop user
    #[serde(default = "default_extension_build")]
    pub build: Vec<String>,
}

fn default_extension_build() -> Vec<String> {
    vec!["make".to_string(), "install".to_string()]
}

fn default_extensions() -> Vec<ExtensionSource> {
    [
        (
            "dash-to-dock@micxgx.gmail.com",
            "https://github.com/micheleg/dash-to-dock.git",
        ),
        ("blur-my-shell@aunetx", "https://github.com/aunetx/blur-my-shell.git"),
    ]
    .into_iter()
    .map(|(uuid, repo)| ExtensionSource {
        uuid: uuid.to_string(),
        repo: repo.to_string(),
        branch: None,
        build: default_extension_build(),
    })
    .collect()
}

// ============================================================================
// Firewall, tweaks, log
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// firewalld default zone
    #[serde(default = "default_zone")]
    pub zone: String,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            zone: default_zone(),
        }
    }
}

fn default_zone() -> String {
    "public".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweaksConfig {
    /// Write a zram-generator config
    #[serde(default)]
    pub zram: bool,
    #[serde(default = "default_zram_size")]
    pub zram_size: String,
    #[serde(default = "default_zram_algorithm")]
    pub zram_algorithm: String,
    /// System crypto policy (Fedora), e.g. `DEFAULT:NO-SHA1`
    #[serde(default)]
    pub crypto_policy: Option<String>,
}

impl Default for TweaksConfig {
    fn default() -> Self {
        Self {
            zram: false,
            zram_size: default_zram_size(),
            zram_algorithm: default_zram_algorithm(),
            crypto_policy: None,
        }
    }
}

fn default_zram_size() -> String {
    "ram / 2".to_string()
}

fn default_zram_algorithm() -> String {
    "zstd".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Directory for run logs; defaults to the current directory
    #[serde(default)]
    pub dir: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

impl LogConfig {
    pub fn resolved_dir(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(paths::expand(dir)),
            None => std::env::current_dir().context("Could not determine current directory"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
