//! Datastow: a content-addressed function-result store for
//! configuration-driven data dashboards.
//!
//! A dashboard configuration declares which data-producing functions it
//! needs and with which literal arguments. The build phase discovers every
//! distinct `(function, argument set)` pair, executes each exactly once,
//! and persists the result under a name derived only from the function
//! identity and a deterministic hash of its completed arguments. A portable
//! deployment then resolves the same calls straight from disk — no source
//! data required.
//!
//! # Core Guarantees
//!
//! - **Deterministic**: equal argument values produce equal storage keys in
//!   every process, on every machine. Tables hash by their raw column
//!   buffers, never by a rendered form.
//! - **Fail-fast**: unsupported return types fail at registration, missing
//!   required arguments fail at discovery, and a missing artifact in
//!   portable mode is a hard error — never a silent recomputation.
//! - **Idempotent builds**: keys are content-derived, so re-running an
//!   unchanged build rewrites the same paths. Clearing the folder is the
//!   only invalidation path.
//!
//! # Crate Structure
//!
//! - [`core::repr`] / [`core::frame`]: deterministic argument encoding
//! - [`core::registry`]: storable-function registration and validation
//! - [`core::discover`]: argument-set completion and de-duplication
//! - [`core::store`]: build-phase persistence and portable lookup
//! - [`core::memo`]: in-process memoization over store-backed calls
//!
//! # Example
//!
//! ```no_run
//! use datastow::core::discover::{self, CallSite};
//! use datastow::core::registry::{Artifact, FnSpec, ParamSpec, Registry};
//! use datastow::core::store::{Store, StoreMode};
//! use std::collections::BTreeMap;
//!
//! let mut registry = Registry::new();
//! registry.register(FnSpec {
//!     module: "demo_data".to_string(),
//!     name: "greeting".to_string(),
//!     params: vec![ParamSpec {
//!         name: "name".to_string(),
//!         default: None,
//!     }],
//!     declared_return: "blob".to_string(),
//!     body: Box::new(|args| {
//!         Ok(Artifact::Blob(format!("hello {:?}", args["name"]).into_bytes()))
//!     }),
//! })?;
//!
//! let sites = discover::load_declarations("dashboard.stow.toml".as_ref())?;
//! let plan = discover::discover(&registry, &sites)?;
//! let store = Store::open("stow_output", StoreMode::PassThrough)?;
//! store.build(&plan)?;
//! # Ok::<(), datastow::core::error::DatastowError>(())
//! ```

pub mod core;

mod cli;

use crate::cli::{Cli, ClearCli, Command, EventsCli, InspectCli, ListCli};
use crate::core::error::DatastowError;
use crate::core::store::Store;
use crate::core::{events, report};
use clap::Parser;
use colored::Colorize;
use std::io::Write;

pub fn run() -> Result<(), DatastowError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::List(args) => list_artifacts(&args),
        Command::Inspect(args) => inspect_artifact(&args),
        Command::Clear(args) => clear_folder(&args),
        Command::Events(args) => show_events(&args),
    }
}

fn list_artifacts(args: &ListCli) -> Result<(), DatastowError> {
    let store = Store::open(&args.folder, crate::core::store::StoreMode::Portable)?;
    let artifacts = store.artifacts()?;

    if args.format == "json" {
        let rows: Vec<serde_json::Value> = artifacts
            .iter()
            .map(|a| {
                serde_json::json!({
                    "file": a.file_name,
                    "function": a.function,
                    "key": a.storage_key,
                    "kind": a.kind.as_str(),
                    "size": a.size,
                })
            })
            .collect();
        println!("{}", serde_json::json!({ "artifacts": rows }));
        return Ok(());
    }

    if artifacts.is_empty() {
        println!("No artifacts in {}", args.folder.display());
        return Ok(());
    }
    for artifact in &artifacts {
        println!(
            "{:5}  {:>9}  {}  {}",
            artifact.kind.as_str().cyan(),
            artifact.size,
            artifact.function.bold(),
            &artifact.storage_key[..12]
        );
    }
    println!("{} artifact(s)", artifacts.len());
    Ok(())
}

fn inspect_artifact(args: &InspectCli) -> Result<(), DatastowError> {
    let folder = args.path.parent().ok_or_else(|| {
        DatastowError::ValidationError(format!("{} has no parent folder", args.path.display()))
    })?;
    let file_name = args
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            DatastowError::ValidationError(format!("{} has no file name", args.path.display()))
        })?;

    let store = Store::open(folder, crate::core::store::StoreMode::Portable)?;
    let artifact = store
        .artifacts()?
        .into_iter()
        .find(|a| a.file_name == file_name)
        .ok_or_else(|| {
            DatastowError::NotFound(format!(
                "{} is not a content-addressed artifact",
                args.path.display()
            ))
        })?;

    println!("file:     {}", artifact.file_name);
    println!("function: {}", artifact.function);
    println!("kind:     {}", artifact.kind);
    println!("key:      {}", artifact.storage_key);
    println!("size:     {} bytes", artifact.size);
    Ok(())
}

fn clear_folder(args: &ClearCli) -> Result<(), DatastowError> {
    if !args.yes {
        print!(
            "Remove every file in {}? [y/N] ",
            args.folder.display()
        );
        std::io::stdout().flush().map_err(DatastowError::IoError)?;
        let mut answer = String::new();
        std::io::stdin()
            .read_line(&mut answer)
            .map_err(DatastowError::IoError)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }
    let removed = Store::clear(&args.folder)?;
    println!("{} Removed {} file(s)", "cleared".green().bold(), removed);
    Ok(())
}

fn show_events(args: &EventsCli) -> Result<(), DatastowError> {
    let log = events::read_build_events(&args.folder)?;

    if args.format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&log).map_err(|e| DatastowError::ValidationError(
                e.to_string()
            ))?
        );
        return Ok(());
    }

    if log.is_empty() {
        println!("No build events in {}", args.folder.display());
        return Ok(());
    }
    for event in &log {
        println!(
            "{}  run={}  {}  {}  {}ms  {}",
            event.ts,
            &event.run_id[..8.min(event.run_id.len())],
            event.kind.cyan(),
            event.function.bold(),
            event.duration_ms,
            report::compact_line(&event.artifact, 72)
        );
    }
    println!("{} event(s)", log.len());
    Ok(())
}
