//! Content-addressed result store: build-phase population and portable-mode
//! lookup.
//!
//! Artifacts land at `<folder>/<module>-<function>-<hex key>[.<ext>]` where
//! the key derives only from the function identity and its completed
//! arguments. Rebuilding an unchanged configuration rewrites the same paths,
//! so an aborted build is repaired by running it again.

use crate::core::discover::BuildPlan;
use crate::core::error::DatastowError;
use crate::core::events::{self, BuildEvent};
use crate::core::frame::DataFrame;
use crate::core::registry::{ArgumentSet, Artifact, ReturnKind, StorableFn};
use crate::core::report;
use crate::core::{discover, repr};
use colored::Colorize;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;

const TABLE_SUFFIX: &str = ".table.json";
const BLOB_SUFFIX: &str = ".bin";

/// How storable-function calls resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Interactive use: every call executes the function body directly.
    /// The store folder is untouched.
    PassThrough,
    /// Portable use: every call resolves to a pre-built artifact. A missing
    /// artifact is a hard error — the original data sources may not exist
    /// in a portable deployment, so silent recomputation is never an option.
    Portable,
}

/// Handle on one storage folder. Written only during [`Store::build`];
/// read-only afterwards.
pub struct Store {
    folder: PathBuf,
    mode: StoreMode,
}

/// One on-disk artifact, as enumerated by [`Store::artifacts`].
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub file_name: String,
    pub function: String,
    pub storage_key: String,
    pub kind: ReturnKind,
    pub size: u64,
}

/// Outcome of one build run.
#[derive(Debug)]
pub struct BuildSummary {
    pub run_id: String,
    pub invocations: usize,
    pub duration_ms: u64,
    pub written: Vec<PathBuf>,
}

static ARTIFACT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<module>[A-Za-z_][A-Za-z0-9_.]*)-(?P<name>[A-Za-z_][A-Za-z0-9_]*)-(?P<key>[0-9a-f]{64})(?P<suffix>\..+)?$").unwrap()
});

impl Store {
    /// Open (creating if needed) a storage folder.
    pub fn open(folder: impl Into<PathBuf>, mode: StoreMode) -> Result<Self, DatastowError> {
        let folder = folder.into();
        fs::create_dir_all(&folder).map_err(DatastowError::IoError)?;
        Ok(Store { folder, mode })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    /// Base filename for one invocation: `<module>-<name>-<key>`, with
    /// `::` in the module flattened to `.` for the filesystem.
    pub fn artifact_base(function: &StorableFn, storage_key: &str) -> String {
        format!(
            "{}-{}-{}",
            function.module.replace("::", "."),
            function.name,
            storage_key
        )
    }

    /// Execute every invocation in the plan exactly once and persist each
    /// result. Single-threaded and synchronous; the first failure aborts
    /// the build, leaving earlier artifacts in place.
    pub fn build(&self, plan: &BuildPlan<'_>) -> Result<BuildSummary, DatastowError> {
        let run_id = events::new_run_id();
        let started = Instant::now();
        let total = plan.total_invocations();
        let mut written = Vec::with_capacity(total);
        let mut done = 0usize;

        for entry in &plan.entries {
            for (storage_key, args) in &entry.argument_sets {
                done += 1;
                println!(
                    "{} [{}/{}] {} ({})",
                    "build".cyan().bold(),
                    done,
                    total,
                    entry.function.identity().bold(),
                    report::render_args(args, 96)
                );

                let call_started = Instant::now();
                let artifact = invoke(entry.function, args)?;
                let path = self.write_artifact(entry.function, storage_key, &artifact)?;
                let duration_ms = call_started.elapsed().as_millis() as u64;

                events::append_build_event(
                    &self.folder,
                    &BuildEvent {
                        ts: events::now_epoch_z(),
                        event_id: events::new_event_id(),
                        run_id: run_id.clone(),
                        function: entry.function.identity(),
                        storage_key: storage_key.clone(),
                        kind: entry.function.kind.as_str().to_string(),
                        duration_ms,
                        artifact: path
                            .file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .unwrap_or_default(),
                    },
                )?;
                written.push(path);
            }
        }

        println!(
            "{} {} invocation(s) persisted to {}",
            "done".green().bold(),
            total,
            self.folder.display()
        );
        Ok(BuildSummary {
            run_id,
            invocations: total,
            duration_ms: started.elapsed().as_millis() as u64,
            written,
        })
    }

    fn write_artifact(
        &self,
        function: &StorableFn,
        storage_key: &str,
        artifact: &Artifact,
    ) -> Result<PathBuf, DatastowError> {
        let base = Store::artifact_base(function, storage_key);
        match artifact {
            Artifact::Table(df) => {
                let path = self.folder.join(format!("{}{}", base, TABLE_SUFFIX));
                let json = serde_json::to_vec(df).map_err(|e| {
                    DatastowError::ValidationError(format!(
                        "failed to serialize table from '{}': {}",
                        function.identity(),
                        e
                    ))
                })?;
                fs::write(&path, json).map_err(DatastowError::IoError)?;
                Ok(path)
            }
            Artifact::File(source) => {
                let suffix = source
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default();
                let path = self.folder.join(format!("{}{}", base, suffix));
                fs::copy(source, &path).map_err(DatastowError::IoError)?;
                Ok(path)
            }
            Artifact::Blob(data) => {
                let path = self.folder.join(format!("{}{}", base, BLOB_SUFFIX));
                fs::write(&path, data).map_err(DatastowError::IoError)?;
                Ok(path)
            }
        }
    }

    /// Resolve one call. Portable mode reads the pre-built artifact;
    /// pass-through executes the function body directly.
    pub fn call(
        &self,
        function: &StorableFn,
        supplied: &ArgumentSet,
    ) -> Result<Artifact, DatastowError> {
        let completed = discover::complete(function, supplied)?;
        match self.mode {
            StoreMode::PassThrough => invoke(function, &completed),
            StoreMode::Portable => self.retrieve(function, &completed),
        }
    }

    /// Read back the artifact for one completed argument set.
    pub fn retrieve(
        &self,
        function: &StorableFn,
        completed: &ArgumentSet,
    ) -> Result<Artifact, DatastowError> {
        let storage_key = repr::storage_key(completed);
        let base = Store::artifact_base(function, &storage_key);
        let path = self.find_artifact_path(&base).ok_or_else(|| {
            DatastowError::StoreLookup {
                function: function.identity(),
                args: report::render_args(completed, 160),
            }
        })?;

        match function.kind {
            ReturnKind::Table => {
                let content = fs::read(&path).map_err(DatastowError::IoError)?;
                let df: DataFrame = serde_json::from_slice(&content).map_err(|e| {
                    DatastowError::ValidationError(format!(
                        "corrupt table artifact {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(Artifact::Table(df))
            }
            ReturnKind::File => Ok(Artifact::File(path)),
            ReturnKind::Blob => {
                let data = fs::read(&path).map_err(DatastowError::IoError)?;
                Ok(Artifact::Blob(data))
            }
        }
    }

    /// Locate the on-disk artifact for a base name. The suffix varies by
    /// kind (file artifacts keep their source suffix), so we scan for a
    /// `<base>` or `<base>.<ext>` match. The 64-hex key makes prefix
    /// collisions between distinct invocations impossible.
    fn find_artifact_path(&self, base: &str) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.folder).ok()?;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == base || (name.starts_with(base) && name[base.len()..].starts_with('.')) {
                return Some(entry.path());
            }
        }
        None
    }

    /// Enumerate artifacts in the folder by their content-addressed names.
    /// The build event log and unrecognized files are skipped.
    pub fn artifacts(&self) -> Result<Vec<ArtifactInfo>, DatastowError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.folder).map_err(DatastowError::IoError)? {
            let entry = entry.map_err(DatastowError::IoError)?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(caps) = ARTIFACT_NAME_RE.captures(&name) else {
                continue;
            };
            let suffix = caps.name("suffix").map(|m| m.as_str()).unwrap_or("");
            let kind = if suffix == TABLE_SUFFIX {
                ReturnKind::Table
            } else if suffix == BLOB_SUFFIX {
                ReturnKind::Blob
            } else {
                ReturnKind::File
            };
            let metadata = entry.metadata().map_err(DatastowError::IoError)?;
            out.push(ArtifactInfo {
                file_name: name.clone(),
                function: format!("{}::{}", &caps["module"].replace('.', "::"), &caps["name"]),
                storage_key: caps["key"].to_string(),
                kind,
                size: metadata.len(),
            });
        }
        out.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(out)
    }

    /// Remove every file in the storage folder. This is the only
    /// invalidation path the store has.
    pub fn clear(folder: &Path) -> Result<usize, DatastowError> {
        if !folder.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(folder).map_err(DatastowError::IoError)? {
            let entry = entry.map_err(DatastowError::IoError)?;
            if entry.path().is_file() {
                fs::remove_file(entry.path()).map_err(DatastowError::IoError)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Run the function body and check the produced artifact against the
/// declared kind. Any body failure aborts the build.
fn invoke(function: &StorableFn, args: &ArgumentSet) -> Result<Artifact, DatastowError> {
    let artifact = (function.body)(args).map_err(|e| DatastowError::Invocation {
        function: function.identity(),
        message: e.to_string(),
    })?;
    if artifact.kind() != function.kind {
        return Err(DatastowError::Invocation {
            function: function.identity(),
            message: format!(
                "produced a {} artifact but declares '{}'",
                artifact.kind(),
                function.kind
            ),
        });
    }
    Ok(artifact)
}
