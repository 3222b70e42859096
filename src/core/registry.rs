//! Registry of storable functions.
//!
//! Registration is the fail-fast gate: a function whose declared return type
//! falls outside the closed supported set is rejected here, at startup, not
//! discovered later as a serialization failure mid-build.

use crate::core::error::DatastowError;
use crate::core::frame::DataFrame;
use crate::core::repr::ArgValue;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Completed parameter-name → value mapping for one concrete call.
pub type ArgumentSet = BTreeMap<String, ArgValue>;

/// The closed set of storable return kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Table,
    File,
    Blob,
}

impl ReturnKind {
    /// Parse the author's declared return type. Unknown names fail at
    /// registration time.
    pub fn parse(function: &str, declared: &str) -> Result<Self, DatastowError> {
        match declared {
            "table" => Ok(ReturnKind::Table),
            "file" => Ok(ReturnKind::File),
            "blob" => Ok(ReturnKind::Blob),
            _ => Err(DatastowError::UnsupportedReturnType {
                function: function.to_string(),
                declared: declared.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnKind::Table => "table",
            ReturnKind::File => "file",
            ReturnKind::Blob => "blob",
        }
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A produced result, one variant per [`ReturnKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Table(DataFrame),
    /// A filesystem resource the function produced or points at; persisted
    /// as a byte copy with the original suffix preserved.
    File(PathBuf),
    Blob(Vec<u8>),
}

impl Artifact {
    pub fn kind(&self) -> ReturnKind {
        match self {
            Artifact::Table(_) => ReturnKind::Table,
            Artifact::File(_) => ReturnKind::File,
            Artifact::Blob(_) => ReturnKind::Blob,
        }
    }
}

/// One declared parameter. `default: None` means the parameter is required
/// at every call site.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<ArgValue>,
}

/// Boxed callable for a registered function body.
pub type StorableBody =
    Box<dyn Fn(&ArgumentSet) -> Result<Artifact, DatastowError> + Send + Sync>;

/// A registered storable function: identity, signature, declared kind, body.
///
/// The body must be referentially transparent — equal arguments, equivalent
/// result. The store has no invalidation path other than a full rebuild.
pub struct StorableFn {
    pub module: String,
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub kind: ReturnKind,
    pub body: StorableBody,
}

impl std::fmt::Debug for StorableFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorableFn")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl StorableFn {
    /// `module::name`, used in diagnostics and artifact filenames.
    pub fn identity(&self) -> String {
        format!("{}::{}", self.module, self.name)
    }
}

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Author-facing registration input: the declared return type is carried as
/// written so the registry can reject it with the author's own words.
pub struct FnSpec {
    pub module: String,
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub declared_return: String,
    pub body: StorableBody,
}

/// Explicitly constructed registry — built during a controlled startup
/// phase, then read-only.
#[derive(Default)]
pub struct Registry {
    functions: Vec<StorableFn>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register a function. Fails immediately on an unsupported return type
    /// or a malformed identity. Re-registering the same `module::name` is
    /// idempotent: the new entry replaces the previous one.
    pub fn register(&mut self, spec: FnSpec) -> Result<(), DatastowError> {
        let identity = format!("{}::{}", spec.module, spec.name);
        if !spec.module.split("::").all(|seg| IDENT_RE.is_match(seg))
            || !IDENT_RE.is_match(&spec.name)
        {
            return Err(DatastowError::ValidationError(format!(
                "'{}' is not a valid function identity",
                identity
            )));
        }
        let mut seen = std::collections::BTreeSet::new();
        for param in &spec.params {
            if !seen.insert(param.name.as_str()) {
                return Err(DatastowError::ValidationError(format!(
                    "'{}' declares parameter '{}' twice",
                    identity, param.name
                )));
            }
        }
        let kind = ReturnKind::parse(&identity, &spec.declared_return)?;

        let entry = StorableFn {
            module: spec.module,
            name: spec.name,
            params: spec.params,
            kind,
            body: spec.body,
        };
        if let Some(existing) = self
            .functions
            .iter_mut()
            .find(|f| f.identity() == entry.identity())
        {
            *existing = entry;
        } else {
            self.functions.push(entry);
        }
        Ok(())
    }

    pub fn get(&self, identity: &str) -> Result<&StorableFn, DatastowError> {
        self.functions
            .iter()
            .find(|f| f.identity() == identity)
            .ok_or_else(|| {
                DatastowError::NotFound(format!("no storable function '{}'", identity))
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &StorableFn> {
        self.functions.iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_spec(module: &str, name: &str, declared: &str) -> FnSpec {
        FnSpec {
            module: module.to_string(),
            name: name.to_string(),
            params: vec![],
            declared_return: declared.to_string(),
            body: Box::new(|_| Ok(Artifact::Blob(vec![1]))),
        }
    }

    #[test]
    fn test_unknown_return_type_rejected_at_registration() {
        let mut reg = Registry::new();
        let err = reg.register(blob_spec("demo", "f", "dataframe")).unwrap_err();
        assert!(matches!(err, DatastowError::UnsupportedReturnType { .. }));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_reregistration_is_idempotent() {
        let mut reg = Registry::new();
        reg.register(blob_spec("demo", "f", "blob")).unwrap();
        reg.register(blob_spec("demo", "f", "blob")).unwrap();
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_malformed_identity_rejected() {
        let mut reg = Registry::new();
        let err = reg.register(blob_spec("demo pkg", "f", "blob")).unwrap_err();
        assert!(matches!(err, DatastowError::ValidationError(_)));
    }

    #[test]
    fn test_duplicate_param_rejected() {
        let mut reg = Registry::new();
        let mut spec = blob_spec("demo", "f", "blob");
        spec.params = vec![
            ParamSpec { name: "x".to_string(), default: None },
            ParamSpec { name: "x".to_string(), default: None },
        ];
        assert!(reg.register(spec).is_err());
    }
}
