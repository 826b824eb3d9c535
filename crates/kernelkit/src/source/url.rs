//! Direct URL download.

use super::{FetchedArchive, MAX_BODY_SIZE, ToolchainSource, USER_AGENT};
use crate::error::{Error, Result};

/// Downloads a toolchain archive from a fixed URL.
pub struct UrlSource {
    agent: ureq::Agent,
    url: String,
}

impl UrlSource {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            url: url.into(),
        }
    }
}

/// Last path segment of a URL, without query or fragment.
pub(crate) fn file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .to_string()
}

pub(crate) fn download(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>> {
    log::info!("downloading {url}");
    let mut response = agent
        .get(url)
        .header("Accept", "application/octet-stream")
        .header("User-Agent", USER_AGENT)
        .call()?;

    response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_SIZE)
        .read_to_vec()
        .map_err(|e| Error::DownloadFailed {
            url: url.to_string(),
            message: e.to_string(),
        })
}

impl ToolchainSource for UrlSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> Result<FetchedArchive> {
        let bytes = download(&self.agent, &self.url)?;
        Ok(FetchedArchive {
            name: file_name(&self.url),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name("https://example.com/dl/clang-r450784.tar.zst"),
            "clang-r450784.tar.zst"
        );
        assert_eq!(
            file_name("https://example.com/clang.tar.gz?raw=true"),
            "clang.tar.gz"
        );
    }
}
