use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, UpdateError};
use crate::platform::Os;

/// Hidden directory next to the executable that holds displaced binaries when
/// they cannot be moved to the staging root. Swept on engine construction.
pub const HIDDEN_DIR_NAME: &str = ".binup-old";

/// Prefix of a displaced original executable.
pub const DISPLACED_PREFIX: &str = "old_";

/// The file operations a swap needs.
pub trait FileSystem: Send + Sync {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

/// How the staged binary takes the place of the executable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SwapStrategy {
    /// The executable's file can be replaced while it runs: rename straight
    /// over it.
    InPlaceOverwrite,
    /// A running executable's file cannot be overwritten, but it can be
    /// renamed. Move it aside first, then move the staged file in.
    DisplaceThenRename,
}

/// What a swap ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    /// The rename failed and the content was copied instead.
    pub copied: bool,
    /// Where the previous binary still lives, if its removal failed.
    pub leftover: Option<PathBuf>,
}

impl SwapStrategy {
    pub fn for_os(os: &str) -> Self {
        match Os::from_target(os) {
            Some(Os::Windows) => SwapStrategy::DisplaceThenRename,
            _ => SwapStrategy::InPlaceOverwrite,
        }
    }

    /// Makes `staged` become `target`. `scratch` is where a displaced original
    /// is moved first.
    pub fn swap(
        self,
        fs: &dyn FileSystem,
        staged: &Path,
        target: &Path,
        scratch: &Path,
    ) -> Result<SwapOutcome> {
        match self {
            SwapStrategy::InPlaceOverwrite => {
                let copied = replace(fs, staged, target, None)?;
                Ok(SwapOutcome { copied, leftover: None })
            }
            SwapStrategy::DisplaceThenRename => {
                let displaced = displace(fs, target, scratch)?;
                let copied = replace(fs, staged, target, Some(&displaced))?;
                // usually fails on the platforms that need this strategy, since
                // the displaced file is still executing
                let leftover = match fs.remove_file(&displaced) {
                    Ok(()) => None,
                    Err(e) => {
                        debug!("could not remove displaced binary {}: {}", displaced.display(), e);
                        Some(displaced)
                    }
                };
                Ok(SwapOutcome { copied, leftover })
            }
        }
    }
}

/// Moves the executable out of the way, into `scratch` if possible and into
/// the hidden directory beside it otherwise. Returns where it went.
fn displace(fs: &dyn FileSystem, target: &Path, scratch: &Path) -> Result<PathBuf> {
    let file_name = target.file_name().ok_or_else(|| UpdateError::InstallFailed {
        path: target.to_path_buf(),
        reason: "executable path has no file name".to_owned(),
        source: None,
    })?;
    let mut displaced_name = std::ffi::OsString::from(DISPLACED_PREFIX);
    displaced_name.push(file_name);

    let primary = scratch.join(&displaced_name);
    // a leftover from an earlier update would make the rename fail
    let _ = fs.remove_file(&primary);
    debug!("moving {} aside to {}", target.display(), primary.display());
    let primary_err = match fs.rename(target, &primary) {
        Ok(()) => return Ok(primary),
        Err(e) => e,
    };

    let hidden_dir = hidden_dir_for(target);
    let fallback = hidden_dir.join(&displaced_name);
    warn!(
        "could not move {} to {} ({}); trying {}",
        target.display(),
        primary.display(),
        primary_err,
        fallback.display()
    );
    let moved = fs.create_dir_all(&hidden_dir).and_then(|()| {
        let _ = fs.remove_file(&fallback);
        fs.rename(target, &fallback)
    });
    match moved {
        Ok(()) => Ok(fallback),
        Err(e) => Err(UpdateError::install_failed(
            target,
            format!("could not move the current executable aside (first attempt: {})", primary_err),
            e,
        )),
    }
}

/// Renames `staged` onto `target`, copying the content if the rename fails.
/// Returns whether the copy fallback was used.
fn replace(
    fs: &dyn FileSystem,
    staged: &Path,
    target: &Path,
    displaced: Option<&Path>,
) -> Result<bool> {
    debug!("renaming {} to {}", staged.display(), target.display());
    let rename_err = match fs.rename(staged, target) {
        Ok(()) => return Ok(false),
        Err(e) => e,
    };

    warn!("rename failed: {}. attempting to copy the file instead", rename_err);
    if let Err(e) = fs.copy(staged, target) {
        let mut reason = format!("rename failed ({}) and so did the copy fallback", rename_err);
        if let Some(displaced) = displaced {
            reason.push_str(&format!("; the previous binary is at {}", displaced.display()));
        }
        return Err(UpdateError::install_failed(target, reason, e));
    }
    if let Err(e) = fs.remove_file(staged) {
        warn!("could not discard staged file {}: {}", staged.display(), e);
    }
    Ok(true)
}

/// `<dir of target>/.binup-old`
pub fn hidden_dir_for(target: &Path) -> PathBuf {
    target.parent().unwrap_or_else(|| Path::new(".")).join(HIDDEN_DIR_NAME)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    /// Delegates to the real filesystem, but fails renames whose destination
    /// is in `fail_rename_to`.
    struct FlakyFs {
        fail_rename_to: Vec<PathBuf>,
        fail_copy: bool,
        renames: Mutex<Vec<(PathBuf, PathBuf)>>,
    }

    impl FlakyFs {
        fn new(fail_rename_to: Vec<PathBuf>) -> Self {
            Self { fail_rename_to, fail_copy: false, renames: Mutex::new(Vec::new()) }
        }
    }

    impl FileSystem for FlakyFs {
        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            if self.fail_rename_to.iter().any(|p| p == to) {
                return Err(io::Error::other("invalid cross-device link"));
            }
            self.renames.lock().unwrap().push((from.to_path_buf(), to.to_path_buf()));
            fs::rename(from, to)
        }
        fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
            if self.fail_copy {
                return Err(io::Error::other("permission denied"));
            }
            fs::copy(from, to)
        }
        fn remove_file(&self, path: &Path) -> io::Result<()> {
            fs::remove_file(path)
        }
        fn create_dir_all(&self, path: &Path) -> io::Result<()> {
            fs::create_dir_all(path)
        }
    }

    struct Fixture {
        _root: tempfile::TempDir,
        staged: PathBuf,
        target: PathBuf,
        scratch: PathBuf,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("tmp");
        let bin = root.path().join("bin");
        fs::create_dir_all(&scratch).unwrap();
        fs::create_dir_all(&bin).unwrap();
        let staged = scratch.join("tool_linux_x86_64");
        let target = bin.join("tool");
        fs::write(&staged, b"new").unwrap();
        fs::write(&target, b"old").unwrap();
        Fixture { _root: root, staged, target, scratch }
    }

    #[test]
    fn strategy_follows_os() {
        assert_eq!(SwapStrategy::for_os("windows"), SwapStrategy::DisplaceThenRename);
        assert_eq!(SwapStrategy::for_os("linux"), SwapStrategy::InPlaceOverwrite);
        assert_eq!(SwapStrategy::for_os("macos"), SwapStrategy::InPlaceOverwrite);
    }

    #[test]
    fn in_place_overwrite_renames() {
        let f = fixture();
        let outcome = SwapStrategy::InPlaceOverwrite
            .swap(&StdFileSystem, &f.staged, &f.target, &f.scratch)
            .unwrap();
        assert_eq!(outcome, SwapOutcome { copied: false, leftover: None });
        assert_eq!(fs::read(&f.target).unwrap(), b"new");
        assert!(!f.staged.exists());
    }

    #[test]
    fn displace_then_rename_cleans_up_original() {
        let f = fixture();
        let outcome = SwapStrategy::DisplaceThenRename
            .swap(&StdFileSystem, &f.staged, &f.target, &f.scratch)
            .unwrap();
        assert_eq!(outcome, SwapOutcome { copied: false, leftover: None });
        assert_eq!(fs::read(&f.target).unwrap(), b"new");
        assert!(!f.staged.exists());
        assert!(!f.scratch.join("old_tool").exists());
    }

    #[test]
    fn displace_falls_back_to_hidden_dir() {
        let f = fixture();
        let flaky = FlakyFs::new(vec![f.scratch.join("old_tool")]);
        SwapStrategy::DisplaceThenRename.swap(&flaky, &f.staged, &f.target, &f.scratch).unwrap();
        let hidden = hidden_dir_for(&f.target);
        let renames = flaky.renames.lock().unwrap();
        assert_eq!(renames[0], (f.target.clone(), hidden.join("old_tool")));
        assert_eq!(fs::read(&f.target).unwrap(), b"new");
        assert!(!hidden.join("old_tool").exists());
    }

    #[test]
    fn cross_device_rename_falls_back_to_copy() {
        let f = fixture();
        let flaky = FlakyFs::new(vec![f.target.clone()]);
        let outcome =
            SwapStrategy::InPlaceOverwrite.swap(&flaky, &f.staged, &f.target, &f.scratch).unwrap();
        assert!(outcome.copied);
        assert_eq!(fs::read(&f.target).unwrap(), b"new");
        assert!(!f.staged.exists());
    }

    #[test]
    fn copy_fallback_after_displacement() {
        let f = fixture();
        let flaky = FlakyFs::new(vec![f.target.clone()]);
        let outcome = SwapStrategy::DisplaceThenRename
            .swap(&flaky, &f.staged, &f.target, &f.scratch)
            .unwrap();
        assert!(outcome.copied);
        assert_eq!(fs::read(&f.target).unwrap(), b"new");
        assert!(!f.staged.exists());
        assert!(!f.scratch.join("old_tool").exists());
    }

    #[test]
    fn failed_copy_keeps_displaced_original() {
        let f = fixture();
        let mut flaky = FlakyFs::new(vec![f.target.clone()]);
        flaky.fail_copy = true;
        let err = SwapStrategy::DisplaceThenRename
            .swap(&flaky, &f.staged, &f.target, &f.scratch)
            .unwrap_err();
        assert!(matches!(err, UpdateError::InstallFailed { .. }));
        assert_eq!(fs::read(f.scratch.join("old_tool")).unwrap(), b"old");
    }

    #[test]
    fn stale_displaced_file_is_replaced() {
        let f = fixture();
        fs::write(f.scratch.join("old_tool"), b"older").unwrap();
        SwapStrategy::DisplaceThenRename
            .swap(&StdFileSystem, &f.staged, &f.target, &f.scratch)
            .unwrap();
        assert_eq!(fs::read(&f.target).unwrap(), b"new");
        assert!(!f.scratch.join("old_tool").exists());
    }
}
