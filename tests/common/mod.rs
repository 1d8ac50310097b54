//! Shared fixtures for the updater tests: a mock release host and a fake
//! installed executable.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use binup::{AssetTemplates, Platform, UpdaterConfig};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ACCOUNT: &str = "acct";
pub const REPO: &str = "tool";
pub const ASSET_LINUX: &str = "tool_linux_x86_64";
pub const OLD_BINARY: &[u8] = b"#!old binary";

pub fn templates() -> AssetTemplates {
    AssetTemplates {
        windows: Some("tool_windows_$arch$ext".to_owned()),
        linux: Some("tool_linux_$arch".to_owned()),
        macos: Some("tool_darwin_$arch".to_owned()),
    }
}

/// A directory holding a fake installed binary and a private staging root.
pub struct Install {
    pub dir: TempDir,
    pub executable: PathBuf,
    pub staging: PathBuf,
}

impl Install {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        let staging = dir.path().join("tmp");
        fs::create_dir_all(&bin).unwrap();
        fs::create_dir_all(&staging).unwrap();
        let executable = bin.join("tool");
        fs::write(&executable, OLD_BINARY).unwrap();
        Self { dir, executable, staging }
    }

    /// Everything left in the staging root.
    pub fn staging_entries(&self) -> Vec<PathBuf> {
        fs::read_dir(&self.staging).unwrap().map(|e| e.unwrap().path()).collect()
    }
}

pub fn config(server: &MockServer, current_tag: &str, install: &Install) -> UpdaterConfig {
    UpdaterConfig::new(ACCOUNT, REPO, current_tag)
        .with_templates(templates())
        .with_base_url(server.uri())
        .with_platform(Platform::new("linux", "amd64"))
        .with_executable(&install.executable)
        .with_staging_dir(&install.staging)
        .with_check_timeout(Duration::from_secs(2))
        .with_download_timeout(Duration::from_secs(5))
}

pub fn latest_path() -> String {
    format!("/{}/{}/releases/latest", ACCOUNT, REPO)
}

pub fn download_path(tag: &str, asset: &str) -> String {
    format!("/{}/{}/releases/download/{}/{}", ACCOUNT, REPO, tag, asset)
}

/// `GET .../releases/latest` redirects to `.../releases/tag/<tag>`.
pub async fn mock_latest(server: &MockServer, tag: &str) {
    let tag_path = format!("/{}/{}/releases/tag/{}", ACCOUNT, REPO, tag);
    Mock::given(method("GET"))
        .and(path(latest_path()))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}{}", server.uri(), tag_path).as_str()),
        )
        .expect(1..)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(tag_path))
        .respond_with(ResponseTemplate::new(200).set_body_string("release page"))
        .mount(server)
        .await;
}

pub async fn mock_probe(server: &MockServer, tag: &str, asset: &str, status: u16) {
    Mock::given(method("HEAD"))
        .and(path(download_path(tag, asset)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub async fn mock_download(server: &MockServer, tag: &str, asset: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(download_path(tag, asset)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content))
        .mount(server)
        .await;
}

/// Runs blocking engine code off the async test runtime.
pub async fn blocking<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.expect("blocking task panicked")
}
