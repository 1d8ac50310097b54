use percent_encoding::percent_decode_str;
use reqwest::{blocking::Client, StatusCode, Url};
use tracing::{debug, trace};

use crate::error::{Result, UpdateError};

/// The last path segment the host uses for "whatever the newest release is".
const LATEST: &str = "latest";

/// Read-only view of a repository's releases on the release host. Every call
/// is idempotent and bounded by the client's timeout.
#[derive(Debug, Clone)]
pub struct ReleaseDirectory {
    client: Client,
    base_url: Url,
    account: String,
    repo: String,
}

impl ReleaseDirectory {
    /// `client` should carry the check timeout.
    pub fn new(client: Client, base_url: Url, account: &str, repo: &str) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(UpdateError::ConfigInvalid(format!(
                "base url {} cannot have path segments",
                base_url
            )));
        }
        Ok(Self { client, base_url, account: account.to_owned(), repo: repo.to_owned() })
    }

    fn repo_url(&self, tail: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejected cannot-be-a-base urls, so this always succeeds
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&self.account).push(&self.repo).extend(tail);
        }
        url
    }

    /// `<host>/<account>/<repo>/releases/latest`
    pub fn latest_url(&self) -> Url {
        self.repo_url(&["releases", LATEST])
    }

    /// `<host>/<account>/<repo>/releases/download/<tag>/<filename>`
    pub fn download_url(&self, tag: &str, filename: &str) -> Url {
        self.repo_url(&["releases", "download", tag, filename])
    }

    /// Follows the latest-release redirect and reads the tag off the final
    /// location.
    pub fn latest_tag(&self) -> Result<String> {
        let url = self.latest_url();
        trace!("resolving latest tag via {}", url);
        let fail = |reason: String, source: Option<reqwest::Error>| {
            UpdateError::TagResolutionFailed { url: url.to_string(), reason, source }
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| fail("request failed".to_owned(), Some(e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(
                format!("{} answered with status code {}", response.url(), status),
                None,
            ));
        }

        let tag = tag_from_url(response.url()).map_err(|reason| fail(reason, None))?;
        debug!("latest release tag is {}", tag);
        Ok(tag)
    }

    /// HEAD-probes the asset's download url. Only a 200 counts as present.
    pub fn probe_asset(&self, tag: &str, filename: &str) -> Result<Url> {
        let url = self.download_url(tag, filename);
        trace!("probing {}", url);
        let response = self.client.head(url.clone()).send().map_err(|e| {
            UpdateError::AssetNotFound {
                url: url.to_string(),
                reason: "request failed".to_owned(),
                source: Some(e),
            }
        })?;
        match response.status() {
            StatusCode::OK => Ok(url),
            status => Err(UpdateError::AssetNotFound {
                url: url.to_string(),
                reason: format!("probe answered with status code {}", status),
                source: None,
            }),
        }
    }
}

/// The tag is the last path segment of the location the latest-release
/// endpoint redirected to, percent-decoded. No redirect leaves us on
/// `.../latest`, which is not a tag.
fn tag_from_url(url: &Url) -> std::result::Result<String, String> {
    let Some(last) = url.path_segments().and_then(|mut segments| segments.next_back()) else {
        return Err(format!("no path in redirected location {}", url));
    };
    let tag = percent_decode_str(last)
        .decode_utf8()
        .map_err(|e| format!("tag in redirected location {} is not valid UTF-8: {}", url, e))?;
    if tag.is_empty() || tag == LATEST {
        return Err(format!("no tag in redirected location {}", url));
    }
    Ok(tag.into_owned())
}
