use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = UpdateError> = std::result::Result<T, E>;

/// Everything that can go wrong while checking for or installing an update.
/// None of these are retried internally.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("invalid updater configuration: {0}")]
    ConfigInvalid(String),

    #[error("unsupported platform: no asset template for {os} ({arch})")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("failed to resolve the latest release tag from {url}: {reason}")]
    TagResolutionFailed {
        url: String,
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("release asset not found at {url}: {reason}")]
    AssetNotFound {
        url: String,
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("failed to download {url}: {reason}")]
    DownloadFailed {
        url: String,
        /// Present when the server answered with a non-OK status.
        status: Option<u16>,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("downloaded update is missing from the staging path {}", path.display())]
    StagingFailed { path: PathBuf },

    #[error("failed to install update over {}: {reason}", path.display())]
    InstallFailed {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("failed to build the HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

impl UpdateError {
    pub(crate) fn install_failed(
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        UpdateError::InstallFailed {
            path: path.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// The HTTP status attached to a failed download, if the server sent one.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpdateError::DownloadFailed { status, .. } => *status,
            _ => None,
        }
    }
}
