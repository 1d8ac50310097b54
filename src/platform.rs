use crate::error::{Result, UpdateError};

const PLACEHOLDER_ARCH: &str = "$arch";
const PLACEHOLDER_EXT: &str = "$ext";
const PLACEHOLDER_VERSION: &str = "$version";

/// The operating systems an asset template can be written for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Os {
    Windows,
    Linux,
    MacOs,
}
impl Os {
    /// Maps a target os name (as in `std::env::consts::OS`) to a supported os.
    pub fn from_target(name: &str) -> Option<Self> {
        match name {
            "windows" => Some(Os::Windows),
            "linux" => Some(Os::Linux),
            "macos" | "darwin" => Some(Os::MacOs),
            _ => None,
        }
    }

    pub fn exe_extension(self) -> &'static str {
        match self {
            Os::Windows => ".exe",
            Os::Linux | Os::MacOs => "",
        }
    }
}

/// The os/architecture pair an update is resolved for. Holds the raw names
/// reported by the platform; normalization happens during resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}
impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self { os: os.into(), arch: arch.into() }
    }

    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn canonical_arch(&self) -> String {
        canonical_arch(&self.arch)
    }
}

/// Maps the many names platforms report for an architecture onto one stable
/// token per architecture.
pub fn canonical_arch(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    match lower.as_str() {
        "x86_64" | "amd64" | "x64" => "x86_64".to_owned(),
        "aarch64" | "arm64" => "aarch64".to_owned(),
        "x86" | "i386" | "i586" | "i686" | "386" => "x86".to_owned(),
        _ => lower,
    }
}

/// One asset filename pattern per operating system. An unset (or empty)
/// entry means that os is not supported.
///
/// Patterns may contain `$arch`, `$ext` and `$version`, e.g.
/// `"mytool_windows_$arch$ext"`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssetTemplates {
    pub windows: Option<String>,
    pub linux: Option<String>,
    pub macos: Option<String>,
}
impl AssetTemplates {
    /// Picks the pattern for the platform's os.
    pub fn select(&self, platform: &Platform) -> Result<&str> {
        let template = match Os::from_target(&platform.os) {
            Some(Os::Windows) => self.windows.as_deref(),
            Some(Os::Linux) => self.linux.as_deref(),
            Some(Os::MacOs) => self.macos.as_deref(),
            None => None,
        };
        template.filter(|t| !t.is_empty()).ok_or_else(|| UpdateError::UnsupportedPlatform {
            os: platform.os.clone(),
            arch: platform.arch.clone(),
        })
    }

    /// Selects and expands the pattern for `platform` in one step.
    pub fn resolve(&self, platform: &Platform, version: &str) -> Result<String> {
        let template = self.select(platform)?;
        Ok(expand(template, platform, version))
    }
}

/// Fills in the placeholders of an already selected pattern.
pub fn expand(template: &str, platform: &Platform, version: &str) -> String {
    let ext = Os::from_target(&platform.os).map(Os::exe_extension).unwrap_or("");
    template
        .replace(PLACEHOLDER_ARCH, &platform.canonical_arch())
        .replace(PLACEHOLDER_EXT, ext)
        .replace(PLACEHOLDER_VERSION, version)
}
