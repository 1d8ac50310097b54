use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, UpdateError};
use crate::platform::{AssetTemplates, Platform};

pub const DEFAULT_BASE_URL: &str = "https://github.com";
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

const DEFAULT_USER_AGENT: &str = concat!("binup/", env!("CARGO_PKG_VERSION"));

/// Everything the engine needs to know, fixed at construction. The engine only
/// ever reads it.
#[derive(Clone, Debug)]
pub struct UpdaterConfig {
    pub account: String,
    pub repo: String,
    /// The tag of the running binary. Must not be empty.
    pub current_tag: String,
    pub templates: AssetTemplates,
    /// Bounds the whole asset transfer.
    pub download_timeout: Duration,
    /// Bounds the latest-tag lookup and the asset probe, each.
    pub check_timeout: Duration,
    pub base_url: String,
    pub user_agent: String,
    pub platform: Platform,
    /// The binary to replace. `None` means the running executable.
    pub executable: Option<PathBuf>,
    /// Where downloads are staged. `None` means the process temp directory.
    pub staging_dir: Option<PathBuf>,
}

impl UpdaterConfig {
    pub fn new(
        account: impl Into<String>,
        repo: impl Into<String>,
        current_tag: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            repo: repo.into(),
            current_tag: current_tag.into(),
            templates: AssetTemplates::default(),
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
            base_url: DEFAULT_BASE_URL.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            platform: Platform::current(),
            executable: None,
            staging_dir: None,
        }
    }

    pub fn with_templates(mut self, templates: AssetTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn with_staging_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(path.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.current_tag.is_empty() {
            return Err(UpdateError::ConfigInvalid("current tag cannot be empty".to_owned()));
        }
        if let Err(e) = reqwest::Url::parse(&self.base_url) {
            return Err(UpdateError::ConfigInvalid(format!(
                "base url {:?} is not a valid URL: {}",
                self.base_url, e
            )));
        }
        Ok(())
    }

    pub(crate) fn staging_root(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
