use anyhow::Result;
use binup::Updater;

#[derive(clap::Args, Debug)]
pub struct Args {}

pub fn main(updater: &Updater, _args: Args) -> Result<()> {
    match updater.check_for_update()? {
        Some(candidate) => {
            println!("update available: {}", candidate.version());
            println!("  asset: {}", candidate.filename());
            println!("  url:   {}", candidate.url());
        }
        None => println!("no update available ({} is the latest)", updater.checker().current_tag()),
    }
    Ok(())
}
