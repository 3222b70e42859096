//! Argument-set discovery: completion, validation, and de-duplication of
//! every call site the active configuration declares.
//!
//! Discovery runs before any function executes, so a call site missing a
//! required argument fails the build before the build starts.

use crate::core::error::DatastowError;
use crate::core::registry::{ArgumentSet, Registry, StorableFn};
use crate::core::repr::{self, ArgValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One declared call site: a function identity plus the literal argument
/// values the plugin instance was configured with.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub function: String,
    pub args: BTreeMap<String, ArgValue>,
}

/// Distinct work discovered for one function.
#[derive(Debug)]
pub struct PlanEntry<'r> {
    pub function: &'r StorableFn,
    /// Keyed by storage key — two call sites with the same effective
    /// arguments collapse to one scheduled invocation.
    pub argument_sets: BTreeMap<String, ArgumentSet>,
}

/// Function identity → distinct argument sets to execute.
#[derive(Debug)]
pub struct BuildPlan<'r> {
    pub entries: Vec<PlanEntry<'r>>,
}

impl BuildPlan<'_> {
    pub fn total_invocations(&self) -> usize {
        self.entries.iter().map(|e| e.argument_sets.len()).sum()
    }
}

/// Fill omitted parameters from declared defaults. A supplied name the
/// function does not declare, or an omitted parameter with no default, is
/// an error here.
pub fn complete(
    function: &StorableFn,
    supplied: &BTreeMap<String, ArgValue>,
) -> Result<ArgumentSet, DatastowError> {
    let identity = function.identity();
    for name in supplied.keys() {
        if !function.params.iter().any(|p| &p.name == name) {
            return Err(DatastowError::ValidationError(format!(
                "'{}' has no parameter '{}'",
                identity, name
            )));
        }
    }
    let mut completed = ArgumentSet::new();
    for param in &function.params {
        match supplied.get(&param.name) {
            Some(value) => {
                completed.insert(param.name.clone(), value.clone());
            }
            None => match &param.default {
                Some(default) => {
                    completed.insert(param.name.clone(), default.clone());
                }
                None => {
                    return Err(DatastowError::MissingRequiredArgument {
                        function: identity,
                        name: param.name.clone(),
                    });
                }
            },
        }
    }
    Ok(completed)
}

/// Resolve every declared call site against the registry, completing and
/// de-duplicating. Output order follows registry order, so rebuilds walk
/// the plan the same way every time.
pub fn discover<'r>(
    registry: &'r Registry,
    call_sites: &[CallSite],
) -> Result<BuildPlan<'r>, DatastowError> {
    let mut per_function: BTreeMap<String, BTreeMap<String, ArgumentSet>> = BTreeMap::new();
    for site in call_sites {
        let function = registry.get(&site.function)?;
        let completed = complete(function, &site.args)?;
        let key = repr::storage_key(&completed);
        per_function
            .entry(function.identity())
            .or_default()
            .insert(key, completed);
    }

    let mut entries = Vec::new();
    for function in registry.iter() {
        if let Some(argument_sets) = per_function.remove(&function.identity()) {
            entries.push(PlanEntry {
                function,
                argument_sets,
            });
        }
    }
    Ok(BuildPlan { entries })
}

#[derive(Debug, Deserialize)]
struct DeclarationsFile {
    #[serde(default, rename = "call")]
    calls: Vec<DeclaredCall>,
}

#[derive(Debug, Deserialize)]
struct DeclaredCall {
    function: String,
    #[serde(default)]
    args: toml::Table,
}

/// Load call-site declarations from a TOML file:
///
/// ```toml
/// [[call]]
/// function = "demo_data::get_rows"
/// args = { path = "a.csv" }
/// ```
pub fn load_declarations(path: &Path) -> Result<Vec<CallSite>, DatastowError> {
    let content = fs::read_to_string(path).map_err(DatastowError::IoError)?;
    let parsed: DeclarationsFile =
        toml::from_str(&content).map_err(|e| DatastowError::ValidationError(e.to_string()))?;

    let mut sites = Vec::with_capacity(parsed.calls.len());
    for call in parsed.calls {
        let mut args = BTreeMap::new();
        for (name, value) in call.args {
            let json = serde_json::to_value(&value).map_err(|e| {
                DatastowError::ValidationError(format!("argument '{}': {}", name, e))
            })?;
            args.insert(name.clone(), ArgValue::from_json(&name, &json)?);
        }
        sites.push(CallSite {
            function: call.function,
            args,
        });
    }
    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::{Artifact, FnSpec, ParamSpec};

    fn registry_with_defaults() -> Registry {
        let mut reg = Registry::new();
        reg.register(FnSpec {
            module: "demo".to_string(),
            name: "f".to_string(),
            params: vec![
                ParamSpec { name: "x".to_string(), default: None },
                ParamSpec { name: "y".to_string(), default: Some(ArgValue::Int(5)) },
            ],
            declared_return: "blob".to_string(),
            body: Box::new(|_| Ok(Artifact::Blob(vec![0]))),
        })
        .unwrap();
        reg
    }

    #[test]
    fn test_default_completion_matches_explicit() {
        let reg = registry_with_defaults();
        let f = reg.get("demo::f").unwrap();

        let mut partial = BTreeMap::new();
        partial.insert("x".to_string(), ArgValue::Int(1));
        let completed = complete(f, &partial).unwrap();

        let mut explicit = BTreeMap::new();
        explicit.insert("x".to_string(), ArgValue::Int(1));
        explicit.insert("y".to_string(), ArgValue::Int(5));
        let completed_explicit = complete(f, &explicit).unwrap();

        assert_eq!(
            repr::storage_key(&completed),
            repr::storage_key(&completed_explicit)
        );
    }

    #[test]
    fn test_missing_required_argument_fails_at_discovery() {
        let reg = registry_with_defaults();
        let sites = vec![CallSite {
            function: "demo::f".to_string(),
            args: BTreeMap::new(),
        }];
        let err = discover(&reg, &sites).unwrap_err();
        assert!(matches!(
            err,
            DatastowError::MissingRequiredArgument { ref name, .. } if name == "x"
        ));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let reg = registry_with_defaults();
        let f = reg.get("demo::f").unwrap();
        let mut args = BTreeMap::new();
        args.insert("x".to_string(), ArgValue::Int(1));
        args.insert("z".to_string(), ArgValue::Int(9));
        assert!(complete(f, &args).is_err());
    }

    #[test]
    fn test_duplicate_call_sites_collapse() {
        let reg = registry_with_defaults();
        let mut a = BTreeMap::new();
        a.insert("x".to_string(), ArgValue::Int(1));
        let mut b = BTreeMap::new();
        b.insert("x".to_string(), ArgValue::Int(1));
        b.insert("y".to_string(), ArgValue::Int(5));

        let sites = vec![
            CallSite { function: "demo::f".to_string(), args: a },
            CallSite { function: "demo::f".to_string(), args: b },
        ];
        let plan = discover(&reg, &sites).unwrap();
        assert_eq!(plan.total_invocations(), 1);
    }
}
