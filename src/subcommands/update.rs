use anyhow::Context;
use binup::Updater;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

#[derive(clap::Args, Debug)]
pub struct Args {
    /// Only report what would be installed.
    #[arg(long)]
    dry_run: bool,
}

pub fn main(updater: &Updater, args: Args) -> anyhow::Result<()> {
    let Some(candidate) = updater.check_for_update()? else {
        println!("no update available");
        return Ok(());
    };

    if args.dry_run {
        println!("would install {} from {}", candidate.version(), candidate.url());
        return Ok(());
    }

    info!("Installing update: {}", candidate.url());
    let version = candidate.version().to_owned();

    let bar = ProgressBar::new_spinner();
    let mut sized = false;
    updater
        .download_and_install(candidate, |done, total| {
            match total {
                Some(total) if !sized => {
                    bar.set_length(total);
                    bar.set_style(bar_style());
                    sized = true;
                }
                _ => (),
            }
            bar.set_position(done);
        })
        .context("failed to install the update")?;
    bar.finish_and_clear();

    println!("updated to {}", version);
    Ok(())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
