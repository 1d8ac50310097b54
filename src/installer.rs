mod swap;

use std::cell::Cell;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::{blocking::Client, StatusCode, Url};
use tracing::{debug, info, trace, warn};

pub use swap::{
    hidden_dir_for, FileSystem, StdFileSystem, SwapOutcome, SwapStrategy, DISPLACED_PREFIX,
    HIDDEN_DIR_NAME,
};

use crate::checker::UpdateCandidate;
use crate::error::{Result, UpdateError};
use crate::progress::ProgressWriter;

const CHUNK_SIZE: usize = 64 * 1024;
const STAGING_PREFIX: &str = "binup-";

/// Where an install attempt is. `Downloading` and `Swapping` are the only
/// states that lead to `Failed`; nothing is retried.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    Downloading,
    Staged,
    Swapping,
    Installed,
    Failed,
}
impl Display for InstallState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InstallState::Idle => write!(f, "idle"),
            InstallState::Downloading => write!(f, "downloading"),
            InstallState::Staged => write!(f, "staged"),
            InstallState::Swapping => write!(f, "swapping"),
            InstallState::Installed => write!(f, "installed"),
            InstallState::Failed => write!(f, "failed"),
        }
    }
}

/// Downloads a candidate and puts it in place of the executable.
pub struct Installer {
    /// Carries the download timeout.
    client: Client,
    download_timeout: Duration,
    staging_root: PathBuf,
    executable: Option<PathBuf>,
    strategy: SwapStrategy,
    fs: Box<dyn FileSystem>,
    state: Cell<InstallState>,
    failed_during: Cell<Option<InstallState>>,
}

impl Installer {
    pub fn new(
        client: Client,
        download_timeout: Duration,
        staging_root: PathBuf,
        executable: Option<PathBuf>,
        strategy: SwapStrategy,
    ) -> Self {
        Self {
            client,
            download_timeout,
            staging_root,
            executable,
            strategy,
            fs: Box::new(StdFileSystem),
            state: Cell::new(InstallState::Idle),
            failed_during: Cell::new(None),
        }
    }

    /// Routes the swap's file operations through `fs`.
    pub fn with_file_system(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Box::new(fs);
        self
    }

    pub fn strategy(&self) -> SwapStrategy {
        self.strategy
    }

    /// The state the last (or current) install attempt reached.
    pub fn state(&self) -> InstallState {
        self.state.get()
    }

    /// The state the last attempt was in when it failed, if it failed.
    pub fn failed_during(&self) -> Option<InstallState> {
        self.failed_during.get()
    }

    fn enter(&self, next: InstallState) {
        debug!("install {} -> {}", self.state.get(), next);
        self.state.set(next);
    }

    /// The canonical, symlink-free path of the binary being replaced.
    pub fn executable_path(&self) -> Result<PathBuf> {
        let path = match &self.executable {
            Some(path) => path.clone(),
            None => std::env::current_exe().map_err(|e| UpdateError::InstallFailed {
                path: PathBuf::new(),
                reason: "could not locate the running executable".to_owned(),
                source: Some(e),
            })?,
        };
        fs::canonicalize(&path).map_err(|e| {
            UpdateError::install_failed(&path, "could not resolve the executable path", e)
        })
    }

    /// Removes binaries displaced by an earlier update: the hidden directory
    /// next to the executable and `old_<name>` in the staging root. Failures
    /// are only logged.
    pub fn sweep_stale(&self) {
        let target = match self.executable_path() {
            Ok(target) => target,
            Err(e) => {
                debug!("skipping stale file sweep: {}", e);
                return;
            }
        };
        let hidden = hidden_dir_for(&target);
        if hidden.is_dir() {
            match fs::remove_dir_all(&hidden) {
                Ok(()) => debug!("removed stale update directory {}", hidden.display()),
                Err(e) => {
                    warn!("could not remove stale update directory {}: {}", hidden.display(), e)
                }
            }
        }

        let Some(file_name) = target.file_name() else {
            return;
        };
        let mut displaced_name = std::ffi::OsString::from(DISPLACED_PREFIX);
        displaced_name.push(file_name);
        let displaced = self.staging_root.join(displaced_name);
        if displaced.is_file() {
            match fs::remove_file(&displaced) {
                Ok(()) => debug!("removed stale binary {}", displaced.display()),
                Err(e) => warn!("could not remove stale binary {}: {}", displaced.display(), e),
            }
        }
    }

    /// Downloads `candidate` and swaps it in. `on_progress` is called after
    /// every chunk with the bytes written so far and the total, if known.
    pub fn download_and_install<F>(&self, candidate: UpdateCandidate, on_progress: F) -> Result<()>
    where
        F: FnMut(u64, Option<u64>),
    {
        self.state.set(InstallState::Idle);
        self.failed_during.set(None);
        let result = self.install(&candidate, on_progress);
        if let Err(e) = &result {
            let during = self.state.get();
            warn!("install of {} failed while {}: {}", candidate.version(), during, e);
            self.failed_during.set(Some(during));
            self.enter(InstallState::Failed);
        }
        result
    }

    fn install<F>(&self, candidate: &UpdateCandidate, on_progress: F) -> Result<()>
    where
        F: FnMut(u64, Option<u64>),
    {
        self.enter(InstallState::Downloading);
        let target = self.executable_path()?;

        let staging = self.create_staging(candidate)?;
        let staged = staging.path().join(staged_name(candidate.filename()));
        let bytes = self.download(candidate.url(), &staged, on_progress)?;

        if !staged.is_file() {
            return Err(UpdateError::StagingFailed { path: staged });
        }
        self.enter(InstallState::Staged);

        match fs::metadata(&target).and_then(|m| fs::set_permissions(&staged, m.permissions())) {
            Ok(()) => (),
            Err(e) => warn!("could not carry permissions over to {}: {}", staged.display(), e),
        }

        self.enter(InstallState::Swapping);
        let outcome = self.strategy.swap(&*self.fs, &staged, &target, &self.staging_root)?;
        if let Some(leftover) = &outcome.leftover {
            info!(
                "previous binary left at {}; the next update attempt removes it",
                leftover.display()
            );
        }
        self.enter(InstallState::Installed);

        if let Err(e) = staging.close() {
            warn!("could not remove staging directory: {}", e);
        }
        info!(
            "installed {} ({} bytes) to {}{}",
            candidate.version(),
            bytes,
            target.display(),
            if outcome.copied { " by copying" } else { "" }
        );
        Ok(())
    }

    fn create_staging(&self, candidate: &UpdateCandidate) -> Result<tempfile::TempDir> {
        let fail = |e: io::Error| {
            download_failed(
                candidate.url(),
                None,
                "could not create a staging directory",
                Some(e.into()),
            )
        };
        fs::create_dir_all(&self.staging_root).map_err(fail)?;
        tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.staging_root)
            .map_err(fail)
    }

    /// Streams `url` into `dest`. The whole transfer must finish within the
    /// download timeout.
    fn download<F>(&self, url: &Url, dest: &Path, on_progress: F) -> Result<u64>
    where
        F: FnMut(u64, Option<u64>),
    {
        let started = Instant::now();
        trace!("downloading {} to {}", url, dest.display());
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| download_failed(url, None, "request failed", Some(e.into())))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(download_failed(
                url,
                Some(status.as_u16()),
                format!("received status code {}", status),
                None,
            ));
        }
        let total = response.content_length();

        let file = File::create(dest).map_err(|e| {
            download_failed(url, None, "could not create the staging file", Some(e.into()))
        })?;
        let mut writer = ProgressWriter::new(file, total, on_progress);
        let mut buf = vec![0; CHUNK_SIZE];
        loop {
            if started.elapsed() > self.download_timeout {
                return Err(download_failed(
                    url,
                    None,
                    format!("transfer did not finish within {:?}", self.download_timeout),
                    None,
                ));
            }
            let n = match response.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(download_failed(
                        url,
                        None,
                        "reading the response failed",
                        Some(e.into()),
                    ))
                }
            };
            writer.write_all(&buf[..n]).map_err(|e| {
                download_failed(url, None, "writing the staging file failed", Some(e.into()))
            })?;
        }

        let written = writer.written();
        if let Some(total) = total {
            if written != total {
                return Err(download_failed(
                    url,
                    None,
                    format!("expected {} bytes but received {}", total, written),
                    None,
                ));
            }
        }
        writer.into_inner().sync_all().map_err(|e| {
            download_failed(url, None, "flushing the staging file failed", Some(e.into()))
        })?;
        debug!("downloaded {} bytes from {}", written, url);
        Ok(written)
    }
}

fn download_failed(
    url: &Url,
    status: Option<u16>,
    reason: impl Into<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
) -> UpdateError {
    UpdateError::DownloadFailed { url: url.to_string(), status, reason: reason.into(), source }
}

/// Asset names never carry directories; keep only the final component.
fn staged_name(filename: &str) -> &str {
    Path::new(filename).file_name().and_then(|n| n.to_str()).unwrap_or("update")
}
