use reqwest::Url;
use tracing::{debug, info};

use crate::error::Result;
use crate::platform::{self, AssetTemplates, Platform};
use crate::release::ReleaseDirectory;

/// A newer release whose asset for this platform is known to exist. Handed to
/// the installer, which consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct UpdateCandidate {
    url: Url,
    filename: String,
    version: String,
}
impl UpdateCandidate {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The release tag this candidate installs.
    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Decides whether the release directory has something newer than what is
/// running. Never touches the filesystem.
#[derive(Debug, Clone)]
pub struct UpdateChecker {
    directory: ReleaseDirectory,
    templates: AssetTemplates,
    platform: Platform,
    current_tag: String,
}

impl UpdateChecker {
    pub fn new(
        directory: ReleaseDirectory,
        templates: AssetTemplates,
        platform: Platform,
        current_tag: String,
    ) -> Self {
        Self { directory, templates, platform, current_tag }
    }

    pub fn current_tag(&self) -> &str {
        &self.current_tag
    }

    /// Returns `Ok(None)` exactly when the latest tag equals the current tag.
    /// A newer tag without an asset for this platform is an error, not "no
    /// update".
    pub fn check_for_update(&self) -> Result<Option<UpdateCandidate>> {
        // fail on unsupported platforms before going to the network
        let template = self.templates.select(&self.platform)?;

        let latest = self.directory.latest_tag()?;
        if latest == self.current_tag {
            debug!("already on the latest tag {}", latest);
            return Ok(None);
        }
        info!("latest tag {} current {}", latest, self.current_tag);

        let filename = platform::expand(template, &self.platform, &latest);
        let url = self.directory.probe_asset(&latest, &filename)?;
        Ok(Some(UpdateCandidate { url, filename, version: latest }))
    }
}
