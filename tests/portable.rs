//! Portable-mode resolution: pre-built artifacts answer calls; the original
//! data sources are not required and a missing artifact is a hard error.

use datastow::core::discover::{self, CallSite};
use datastow::core::error::DatastowError;
use datastow::core::frame::DataFrame;
use datastow::core::registry::{Artifact, FnSpec, ParamSpec, Registry};
use datastow::core::repr::ArgValue;
use datastow::core::store::{Store, StoreMode};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

/// Registry with a CSV-reading table function rooted at `data_dir`,
/// counting executions.
fn csv_registry(data_dir: PathBuf, calls: Arc<AtomicUsize>) -> Registry {
    let mut reg = Registry::new();
    reg.register(FnSpec {
        module: "demo_data".to_string(),
        name: "get_rows".to_string(),
        params: vec![ParamSpec { name: "path".to_string(), default: None }],
        declared_return: "table".to_string(),
        body: Box::new(move |args| {
            calls.fetch_add(1, Ordering::SeqCst);
            let ArgValue::Str(rel) = &args["path"] else {
                return Err(DatastowError::ValidationError("path must be a string".to_string()));
            };
            let text = fs::read_to_string(data_dir.join(rel)).map_err(DatastowError::IoError)?;
            Ok(Artifact::Table(DataFrame::from_csv_str(&text)?))
        }),
    })
    .unwrap();
    reg
}

fn path_args(path: &str) -> BTreeMap<String, ArgValue> {
    BTreeMap::from([("path".to_string(), ArgValue::Str(path.to_string()))])
}

fn write_csv(dir: &Path) -> PathBuf {
    let csv = dir.join("a.csv");
    fs::write(&csv, "x,y\n1,10.5\n2,20.5\n3,30.5\n").unwrap();
    csv
}

#[test]
fn test_end_to_end_build_then_portable_without_sources() {
    let data_dir = tempdir().unwrap();
    let stow_dir = tempdir().unwrap();
    let csv = write_csv(data_dir.path());

    let calls = Arc::new(AtomicUsize::new(0));
    let reg = csv_registry(data_dir.path().to_path_buf(), calls.clone());

    // Two plugin instances declare the same dependency.
    let sites = vec![
        CallSite { function: "demo_data::get_rows".to_string(), args: path_args("a.csv") },
        CallSite { function: "demo_data::get_rows".to_string(), args: path_args("a.csv") },
    ];
    let plan = discover::discover(&reg, &sites).unwrap();
    let store = Store::open(stow_dir.path(), StoreMode::PassThrough).unwrap();
    store.build(&plan).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Remove the source; portable mode must still answer from the store.
    fs::remove_file(&csv).unwrap();
    let portable = Store::open(stow_dir.path(), StoreMode::Portable).unwrap();
    let f = reg.get("demo_data::get_rows").unwrap();
    let artifact = portable.call(f, &path_args("a.csv")).unwrap();

    match artifact {
        Artifact::Table(df) => {
            assert_eq!(df.n_rows(), 3);
            assert_eq!(df.labels, vec!["x".to_string(), "y".to_string()]);
        }
        other => panic!("expected table, got {:?}", other.kind()),
    }
    // The function body never ran again.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_artifact_is_a_hard_error_not_recomputation() {
    let data_dir = tempdir().unwrap();
    let stow_dir = tempdir().unwrap();
    write_csv(data_dir.path());

    let calls = Arc::new(AtomicUsize::new(0));
    let reg = csv_registry(data_dir.path().to_path_buf(), calls.clone());

    let sites = vec![CallSite {
        function: "demo_data::get_rows".to_string(),
        args: path_args("a.csv"),
    }];
    let plan = discover::discover(&reg, &sites).unwrap();
    let store = Store::open(stow_dir.path(), StoreMode::PassThrough).unwrap();
    let summary = store.build(&plan).unwrap();

    // Delete the stored artifact, then look up that exact call.
    fs::remove_file(&summary.written[0]).unwrap();
    let portable = Store::open(stow_dir.path(), StoreMode::Portable).unwrap();
    let f = reg.get("demo_data::get_rows").unwrap();
    let err = portable.call(f, &path_args("a.csv")).unwrap_err();

    match err {
        DatastowError::StoreLookup { function, args } => {
            assert_eq!(function, "demo_data::get_rows");
            assert!(args.contains("a.csv"));
        }
        other => panic!("expected StoreLookup, got {:?}", other),
    }
    // The source was available, but portable mode must never fall back.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_pass_through_mode_executes_directly() {
    let data_dir = tempdir().unwrap();
    let stow_dir = tempdir().unwrap();
    write_csv(data_dir.path());

    let calls = Arc::new(AtomicUsize::new(0));
    let reg = csv_registry(data_dir.path().to_path_buf(), calls.clone());
    let f = reg.get("demo_data::get_rows").unwrap();

    // No build has happened; interactive mode computes on demand.
    let store = Store::open(stow_dir.path(), StoreMode::PassThrough).unwrap();
    let first = store.call(f, &path_args("a.csv")).unwrap();
    let second = store.call(f, &path_args("a.csv")).unwrap();
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(store.artifacts().unwrap().is_empty());
}

#[test]
fn test_portable_lookup_completes_defaults_before_keying() {
    let stow_dir = tempdir().unwrap();
    let mut reg = Registry::new();
    reg.register(FnSpec {
        module: "demo_data".to_string(),
        name: "slice".to_string(),
        params: vec![
            ParamSpec { name: "path".to_string(), default: None },
            ParamSpec { name: "limit".to_string(), default: Some(ArgValue::Int(10)) },
        ],
        declared_return: "blob".to_string(),
        body: Box::new(|_| Ok(Artifact::Blob(vec![7]))),
    })
    .unwrap();

    // Build with the default filled explicitly.
    let mut explicit = path_args("a.csv");
    explicit.insert("limit".to_string(), ArgValue::Int(10));
    let sites = vec![CallSite {
        function: "demo_data::slice".to_string(),
        args: explicit,
    }];
    let plan = discover::discover(&reg, &sites).unwrap();
    let store = Store::open(stow_dir.path(), StoreMode::PassThrough).unwrap();
    store.build(&plan).unwrap();

    // Look up with the default omitted — same key, same artifact.
    let portable = Store::open(stow_dir.path(), StoreMode::Portable).unwrap();
    let f = reg.get("demo_data::slice").unwrap();
    let artifact = portable.call(f, &path_args("a.csv")).unwrap();
    assert_eq!(artifact, Artifact::Blob(vec![7]));
}
