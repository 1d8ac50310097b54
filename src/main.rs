use std::time::Duration;

use anyhow::{Context, Result};
use binup::{AssetTemplates, Updater, UpdaterConfig};
use clap::Parser;
use subcommands::Subcommand;
use tracing::Level;

mod subcommands;

/// The tag this binary was released as. Stamped at build time through
/// BINUP_BUILD_TAG, falling back to the crate version.
const BUILD_TAG: &str = match option_env!("BINUP_BUILD_TAG") {
    Some(tag) => tag,
    None => concat!("v", env!("CARGO_PKG_VERSION")),
};

#[derive(Parser, Debug)]
#[command(version, about = "Keep a single-binary tool up to date from its release page")]
struct CliArgs {
    /// The command to perform.
    #[command(subcommand)]
    command: Subcommand,

    /// The account that owns the release repository.
    #[arg(long, env = "BINUP_ACCOUNT", global = true, default_value = "binup")]
    account: String,

    /// The release repository.
    #[arg(long, env = "BINUP_REPO", global = true, default_value = "binup")]
    repo: String,

    /// The tag of the binary being updated.
    #[arg(long, env = "BINUP_CURRENT_TAG", global = true, default_value = BUILD_TAG)]
    current_tag: String,

    /// Asset name pattern on Windows. `$arch`, `$ext` and `$version` are
    /// filled in.
    #[arg(
        long,
        env = "BINUP_WINDOWS_ASSET",
        global = true,
        default_value = "binup_windows_$arch$ext"
    )]
    windows_asset: String,

    /// Asset name pattern on Linux.
    #[arg(long, env = "BINUP_LINUX_ASSET", global = true, default_value = "binup_linux_$arch")]
    linux_asset: String,

    /// Asset name pattern on macOS.
    #[arg(long, env = "BINUP_MACOS_ASSET", global = true, default_value = "binup_darwin_$arch")]
    macos_asset: String,

    /// The release host.
    #[arg(
        long,
        env = "BINUP_BASE_URL",
        global = true,
        default_value = binup::config::DEFAULT_BASE_URL
    )]
    base_url: String,

    /// Seconds allowed for the latest-tag lookup and the asset probe.
    #[arg(long, global = true, default_value_t = 2)]
    check_timeout: u64,

    /// Seconds allowed for the whole download.
    #[arg(long, global = true, default_value_t = 30)]
    download_timeout: u64,

    /// More output. Repeat for even more.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl CliArgs {
    fn config(&self) -> UpdaterConfig {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_owned());
        UpdaterConfig::new(&self.account, &self.repo, &self.current_tag)
            .with_templates(AssetTemplates {
                windows: non_empty(&self.windows_asset),
                linux: non_empty(&self.linux_asset),
                macos: non_empty(&self.macos_asset),
            })
            .with_base_url(&self.base_url)
            .with_check_timeout(Duration::from_secs(self.check_timeout))
            .with_download_timeout(Duration::from_secs(self.download_timeout))
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();

    let updater = Updater::new(&args.config()).context("could not set up the updater")?;

    match args.command {
        Subcommand::Check(check_args) => subcommands::check::main(&updater, check_args)?,
        Subcommand::Update(update_args) => subcommands::update::main(&updater, update_args)?,
    }

    Ok(())
}
