use reqwest::{blocking::Client, Url};
use tracing::debug;

use crate::checker::{UpdateCandidate, UpdateChecker};
use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};
use crate::installer::{FileSystem, Installer, SwapStrategy};
use crate::release::ReleaseDirectory;

/// The update engine: one checker and one installer built from a single
/// configuration. Meant to be driven by one caller, one operation at a time.
pub struct Updater {
    checker: UpdateChecker,
    installer: Installer,
}

impl Updater {
    /// Validates `config`, builds the HTTP clients and sweeps leftovers of an
    /// interrupted earlier update from beside the executable.
    pub fn new(config: &UpdaterConfig) -> Result<Self> {
        config.validate()?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| UpdateError::ConfigInvalid(format!("invalid base url: {}", e)))?;

        let check_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.check_timeout)
            .build()
            .map_err(UpdateError::HttpClient)?;
        let download_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.download_timeout)
            .build()
            .map_err(UpdateError::HttpClient)?;

        let directory =
            ReleaseDirectory::new(check_client, base_url, &config.account, &config.repo)?;
        let checker = UpdateChecker::new(
            directory,
            config.templates.clone(),
            config.platform.clone(),
            config.current_tag.clone(),
        );

        let strategy = SwapStrategy::for_os(&config.platform.os);
        debug!("using {:?} swap strategy for {}", strategy, config.platform.os);
        let installer = Installer::new(
            download_client,
            config.download_timeout,
            config.staging_root(),
            config.executable.clone(),
            strategy,
        );
        installer.sweep_stale();

        Ok(Self { checker, installer })
    }

    /// Routes the installer's file operations through `fs`.
    pub fn with_file_system(mut self, fs: impl FileSystem + 'static) -> Self {
        self.installer = self.installer.with_file_system(fs);
        self
    }

    pub fn checker(&self) -> &UpdateChecker {
        &self.checker
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    pub fn check_for_update(&self) -> Result<Option<UpdateCandidate>> {
        self.checker.check_for_update()
    }

    pub fn download_and_install<F>(&self, candidate: UpdateCandidate, on_progress: F) -> Result<()>
    where
        F: FnMut(u64, Option<u64>),
    {
        self.installer.download_and_install(candidate, on_progress)
    }
}
