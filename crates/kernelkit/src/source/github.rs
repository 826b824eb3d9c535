//! Latest GitHub release asset.
//!
//! Unauthenticated requests are limited to 60 per hour; one build uses two.

use super::url::download;
use super::{FetchedArchive, ToolchainSource, USER_AGENT};
use crate::archive::ArchiveFormat;
use crate::error::{Error, Result};
use serde::Deserialize;

/// Fetches the newest release asset whose name contains a pattern.
pub struct GitHubSource {
    agent: ureq::Agent,
    api_base: String,
    repo: String,
    pattern: String,
}

impl GitHubSource {
    #[must_use]
    pub fn new(repo: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::with_api_base("https://api.github.com", repo, pattern)
    }

    /// Create a source with a custom API base (for mirrors).
    #[must_use]
    pub fn with_api_base(
        api_base: impl Into<String>,
        repo: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_base: api_base.into(),
            repo: repo.into(),
            pattern: pattern.into(),
        }
    }

    fn latest_url(&self) -> String {
        format!("{}/repos/{}/releases/latest", self.api_base, self.repo)
    }
}

/// First asset containing `pattern` that is an archive we can unpack.
fn pick_asset<'a>(assets: &'a [GitHubAsset], pattern: &str) -> Option<&'a GitHubAsset> {
    assets
        .iter()
        .find(|a| a.name.contains(pattern) && ArchiveFormat::from_name(&a.name).is_some())
}

impl ToolchainSource for GitHubSource {
    fn describe(&self) -> String {
        format!("github:{} (asset matching '{}')", self.repo, self.pattern)
    }

    fn fetch(&self) -> Result<FetchedArchive> {
        let release: GitHubRelease = self
            .agent
            .get(&self.latest_url())
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .call()?
            .body_mut()
            .read_json()?;

        log::debug!(
            "latest release of {} is {} with {} assets",
            self.repo,
            release.tag_name,
            release.assets.len()
        );

        let asset =
            pick_asset(&release.assets, &self.pattern).ok_or_else(|| Error::NoMatchingAsset {
                repo: self.repo.clone(),
                pattern: self.pattern.clone(),
            })?;

        let bytes = download(&self.agent, &asset.browser_download_url)?;
        Ok(FetchedArchive {
            name: asset.name.clone(),
            bytes,
        })
    }
}

// GitHub API response types

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
}
