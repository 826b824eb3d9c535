//! Toolchain archive sources.
//!
//! A [`ToolchainSource`] hands back the raw bytes of a toolchain archive and
//! the file name they came from; the name decides how it is unpacked.
//!
//! Use [`MockSource`] in tests to avoid network access.

pub mod github;
pub mod url;

use crate::config::ToolchainSpec;
use crate::error::Result;

/// Maximum download size; prebuilt clang toolchains are large.
pub(crate) const MAX_BODY_SIZE: u64 = 2 * 1024 * 1024 * 1024;

pub(crate) const USER_AGENT: &str = "postinstall-kernelkit";

/// A downloaded archive.
#[derive(Debug, Clone)]
pub struct FetchedArchive {
    /// File name, e.g. `clang-r450784.tar.zst`
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Something that can fetch a toolchain archive.
pub trait ToolchainSource: Send + Sync {
    /// Where the archive comes from, for messages.
    fn describe(&self) -> String;

    /// Download the archive.
    fn fetch(&self) -> Result<FetchedArchive>;
}

/// Build the source for a configured toolchain.
pub fn for_spec(spec: &ToolchainSpec) -> Box<dyn ToolchainSource> {
    match spec {
        ToolchainSpec::Url { url } => Box::new(url::UrlSource::new(url)),
        ToolchainSpec::Github { repo, asset } => Box::new(github::GitHubSource::new(repo, asset)),
    }
}

/// In-memory source for tests.
#[derive(Debug, Clone)]
pub struct MockSource {
    archive: FetchedArchive,
}

impl MockSource {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            archive: FetchedArchive {
                name: name.into(),
                bytes,
            },
        }
    }
}

impl ToolchainSource for MockSource {
    fn describe(&self) -> String {
        format!("mock:{}", self.archive.name)
    }

    fn fetch(&self) -> Result<FetchedArchive> {
        Ok(self.archive.clone())
    }
}
