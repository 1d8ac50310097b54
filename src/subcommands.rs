pub mod check;
pub mod update;

#[derive(clap::Subcommand, Debug)]
pub enum Subcommand {
    /// Report whether a newer release is available.
    Check(check::Args),
    /// Update the executable to the latest version.
    Update(update::Args),
}
