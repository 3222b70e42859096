//! CLI struct definitions for the datastow command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "datastow",
    version = env!("CARGO_PKG_VERSION"),
    about = "Content-addressed function-result store: inspect, audit, and clear portable dashboard snapshots."
)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// List the content-addressed artifacts in a storage folder
    List(ListCli),
    /// Show details for one artifact file
    Inspect(InspectCli),
    /// Remove every file in a storage folder (the only invalidation path)
    Clear(ClearCli),
    /// Render the build event log of a storage folder
    Events(EventsCli),
    /// Print version
    Version,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ListCli {
    /// Storage folder populated by a build
    pub folder: PathBuf,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct InspectCli {
    /// Path to one artifact file
    pub path: PathBuf,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ClearCli {
    /// Storage folder to wipe
    pub folder: PathBuf,
    /// Skip the confirmation prompt
    #[clap(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub(crate) struct EventsCli {
    /// Storage folder containing build.events.jsonl
    pub folder: PathBuf,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}
