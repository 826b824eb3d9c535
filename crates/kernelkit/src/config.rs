//! Build configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Directory the AnyKernel3 template is cloned into.
pub const ANYKERNEL_DIR: &str = "AnyKernel3";

/// Where the cross toolchain archive comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ToolchainSpec {
    /// A direct `.tar.gz` / `.tar.zst` URL
    Url {
        #[serde(default)]
        url: String,
    },
    /// Latest release asset of a GitHub repository whose name contains `asset`
    Github { repo: String, asset: String },
}

impl Default for ToolchainSpec {
    fn default() -> Self {
        Self::Url { url: String::new() }
    }
}

impl ToolchainSpec {
    fn is_set(&self) -> bool {
        match self {
            Self::Url { url } => !url.trim().is_empty(),
            Self::Github { repo, asset } => !repo.trim().is_empty() && !asset.trim().is_empty(),
        }
    }
}

/// An additional repository cloned next to the kernel source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraRepo {
    pub url: String,
    pub branch: String,
    /// Directory name under the work directory
    pub dir: String,
}

/// Everything the pipeline needs. Empty strings and `jobs = 0` mean "ask".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub repo: String,
    pub branch: String,
    /// Kernel source directory name under the work directory
    pub dir: String,
    pub defconfig: String,
    pub jobs: usize,
    pub arch: String,
    pub toolchain: ToolchainSpec,
    /// Directory name the toolchain is extracted into
    pub toolchain_dir: String,
    pub cross_compile: String,
    pub cross_compile_arm32: String,
    /// Binaries that must exist in `<toolchain>/bin`
    pub required_tools: Vec<String>,
    pub anykernel_repo: String,
    pub anykernel_branch: String,
    pub extra_repos: Vec<ExtraRepo>,
    /// Images to look for under `out/arch/<arch>/boot`, first match wins
    pub image_names: Vec<String>,
    /// Zip file prefix
    pub zip_name: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            repo: String::new(),
            branch: String::new(),
            dir: String::new(),
            defconfig: String::new(),
            jobs: 0,
            arch: "arm64".to_string(),
            toolchain: ToolchainSpec::default(),
            toolchain_dir: "toolchain".to_string(),
            cross_compile: "aarch64-linux-gnu-".to_string(),
            cross_compile_arm32: "arm-linux-gnueabi-".to_string(),
            required_tools: vec!["clang".to_string(), "ld.lld".to_string()],
            anykernel_repo: "https://github.com/osm0sis/AnyKernel3".to_string(),
            anykernel_branch: "master".to_string(),
            extra_repos: Vec::new(),
            image_names: vec![
                "Image.gz-dtb".to_string(),
                "Image.gz".to_string(),
                "Image".to_string(),
            ],
            zip_name: "kernel".to_string(),
        }
    }
}

impl BuildConfig {
    /// Names of required fields that are still empty.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("repo", &self.repo),
            ("branch", &self.branch),
            ("dir", &self.dir),
            ("defconfig", &self.defconfig),
        ] {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }
        if !self.toolchain.is_set() {
            missing.push("toolchain");
        }
        if self.jobs == 0 {
            missing.push("jobs");
        }
        missing
    }

    /// Check the configuration is complete and normalise the defconfig.
    pub fn validate(mut self) -> Result<Self> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(Error::Config(format!("missing {}", missing.join(", "))));
        }
        if self.image_names.is_empty() {
            return Err(Error::Config("image_names is empty".to_string()));
        }
        self.check_dirs()?;
        self.defconfig = normalize_defconfig(&self.defconfig);
        Ok(self)
    }

    /// Every directory the pipeline removes and recreates must be a single,
    /// distinct name under the work directory.
    pub fn check_dirs(&self) -> Result<()> {
        let mut seen = vec![ANYKERNEL_DIR];
        let dirs = [("dir", self.dir.as_str()), ("toolchain_dir", self.toolchain_dir.as_str())]
            .into_iter()
            .chain(self.extra_repos.iter().map(|r| ("extra_repos.dir", r.dir.as_str())));
        for (field, name) in dirs {
            if !is_plain_dir_name(name) {
                return Err(Error::Config(format!(
                    "{field} '{name}' must be a plain directory name"
                )));
            }
            let name = name.trim_end_matches('/');
            if seen.contains(&name) {
                return Err(Error::Config(format!(
                    "{field} '{name}' is already used by another build directory"
                )));
            }
            seen.push(name);
        }
        Ok(())
    }
}

/// Exactly one normal path component: no `.`, `..`, root or separators.
fn is_plain_dir_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// `stone` → `stone_defconfig`; names already ending in `_defconfig` are kept.
pub fn normalize_defconfig(name: &str) -> String {
    let name = name.trim();
    if name.ends_with("_defconfig") {
        name.to_string()
    } else {
        format!("{name}_defconfig")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> BuildConfig {
        BuildConfig {
            repo: "https://github.com/example/kernel".into(),
            branch: "main".into(),
            dir: "kernel".into(),
            defconfig: "stone".into(),
            jobs: 8,
            toolchain: ToolchainSpec::Url {
                url: "https://example.com/clang.tar.gz".into(),
            },
            ..BuildConfig::default()
        }
    }

    #[test]
    fn test_normalize_defconfig() {
        assert_eq!(normalize_defconfig("stone"), "stone_defconfig");
        assert_eq!(normalize_defconfig("x_defconfig"), "x_defconfig");
        assert_eq!(normalize_defconfig(" vendor/x "), "vendor/x_defconfig");
    }

    #[test]
    fn test_missing_fields() {
        let missing = BuildConfig::default().missing();
        assert_eq!(
            missing,
            vec!["repo", "branch", "dir", "defconfig", "toolchain", "jobs"]
        );
        assert!(complete().missing().is_empty());
    }

    #[test]
    fn test_validate_normalizes_defconfig() {
        let config = complete().validate().unwrap();
        assert_eq!(config.defconfig, "stone_defconfig");
    }

    #[test]
    fn test_validate_rejects_nested_dir() {
        let config = BuildConfig {
            dir: "../elsewhere".into(),
            ..complete()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_current_and_absolute_dirs() {
        for bad in [".", "./", "/abs", "", "a/b", "../x"] {
            let config = BuildConfig {
                dir: bad.into(),
                ..complete()
            };
            assert!(config.check_dirs().is_err(), "dir {bad:?}");

            let config = BuildConfig {
                toolchain_dir: bad.into(),
                ..complete()
            };
            assert!(config.validate().is_err(), "toolchain_dir {bad:?}");
        }
    }

    #[test]
    fn test_validate_checks_extra_repo_dirs() {
        for bad in ["", ".", "/abs", "../x"] {
            let config = BuildConfig {
                extra_repos: vec![ExtraRepo {
                    url: "https://github.com/example/modules".into(),
                    branch: "main".into(),
                    dir: bad.into(),
                }],
                ..complete()
            };
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{bad:?}");
        }
    }

    #[test]
    fn test_validate_rejects_shared_dirs() {
        let extra = |dir: &str| ExtraRepo {
            url: "https://github.com/example/modules".into(),
            branch: "main".into(),
            dir: dir.into(),
        };
        let cases = [
            BuildConfig {
                dir: ANYKERNEL_DIR.into(),
                ..complete()
            },
            BuildConfig {
                toolchain_dir: "kernel".into(),
                ..complete()
            },
            BuildConfig {
                extra_repos: vec![extra("toolchain")],
                ..complete()
            },
            BuildConfig {
                extra_repos: vec![extra("kernel/")],
                ..complete()
            },
            BuildConfig {
                extra_repos: vec![extra("modules"), extra("modules")],
                ..complete()
            },
        ];
        for config in cases {
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("already used"), "{err}");
        }

        let ok = BuildConfig {
            extra_repos: vec![extra("modules")],
            ..complete()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_toolchain_spec_toml_shape() {
        let spec: ToolchainSpec =
            serde_json::from_str(r#"{"source":"github","repo":"a/b","asset":"linux"}"#).unwrap();
        assert_eq!(
            spec,
            ToolchainSpec::Github {
                repo: "a/b".into(),
                asset: "linux".into()
            }
        );
    }
}
