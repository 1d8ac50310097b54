//! Self-update engine for single-binary tools that publish tagged,
//! platform-named release assets.
//!
//! ```no_run
//! use binup::{AssetTemplates, Updater, UpdaterConfig};
//!
//! # fn main() -> Result<(), binup::UpdateError> {
//! let config = UpdaterConfig::new("acct", "tool", "v1.0.0").with_templates(AssetTemplates {
//!     windows: Some("tool_windows_$arch$ext".to_owned()),
//!     linux: Some("tool_linux_$arch".to_owned()),
//!     macos: Some("tool_darwin_$arch".to_owned()),
//! });
//! let updater = Updater::new(&config)?;
//! if let Some(candidate) = updater.check_for_update()? {
//!     updater.download_and_install(candidate, |done, total| {
//!         eprintln!("{} of {:?} bytes", done, total);
//!     })?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod checker;
pub mod config;
pub mod error;
pub mod installer;
pub mod platform;
pub mod progress;
pub mod release;
mod updater;

pub use checker::{UpdateCandidate, UpdateChecker};
pub use config::UpdaterConfig;
pub use error::{Result, UpdateError};
pub use installer::{InstallState, Installer};
pub use platform::{AssetTemplates, Platform};
pub use updater::Updater;
