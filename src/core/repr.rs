//! Deterministic argument representation and storage-key derivation.
//!
//! Every value that can appear as a storable-function argument encodes to a
//! canonical byte string: equal values encode identically in every process,
//! regardless of locale, display precision, or map insertion order. Tables
//! contribute their content hash, computed from raw buffers (see
//! [`crate::core::frame`]), never from a rendered form.

use crate::core::error::DatastowError;
use crate::core::frame::DataFrame;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Closed set of argument value kinds. Anything outside this set has no
/// deterministic representation and is rejected at intake, never defaulted.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Encoded by exact bit pattern; `1.0_f64` and an equal-valued `Int`
    /// are different argument values.
    Float(f64),
    Str(String),
    Path(PathBuf),
    List(Vec<ArgValue>),
    /// String-keyed; encoding sorts by key, so insertion order never leaks
    /// into the storage key.
    Map(BTreeMap<String, ArgValue>),
    Table(DataFrame),
    Bytes(Vec<u8>),
}

impl ArgValue {
    /// Canonical byte encoding. Tag byte per variant, length prefixes for
    /// variable-size payloads, recursion for containers.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            ArgValue::Null => out.push(b'n'),
            ArgValue::Bool(b) => {
                out.push(b'b');
                out.push(u8::from(*b));
            }
            ArgValue::Int(v) => {
                out.push(b'i');
                out.extend_from_slice(&v.to_le_bytes());
            }
            ArgValue::Float(v) => {
                out.push(b'f');
                out.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            ArgValue::Str(s) => {
                out.push(b's');
                encode_len_prefixed(out, s.as_bytes());
            }
            ArgValue::Path(p) => {
                // Paths hash by their textual form; the same declared path
                // string must key identically on every platform.
                out.push(b'p');
                encode_len_prefixed(out, p.to_string_lossy().as_bytes());
            }
            ArgValue::List(items) => {
                out.push(b'l');
                out.extend_from_slice(&(items.len() as u64).to_le_bytes());
                for item in items {
                    item.encode_into(out);
                }
            }
            ArgValue::Map(entries) => {
                // BTreeMap iteration is already key-sorted.
                out.push(b'm');
                out.extend_from_slice(&(entries.len() as u64).to_le_bytes());
                for (key, value) in entries {
                    encode_len_prefixed(out, key.as_bytes());
                    value.encode_into(out);
                }
            }
            ArgValue::Table(df) => {
                out.push(b't');
                encode_len_prefixed(out, df.content_hash().as_bytes());
            }
            ArgValue::Bytes(data) => {
                out.push(b'y');
                encode_len_prefixed(out, data);
            }
        }
    }

    /// Convert a JSON value (as parsed from a declarations file) into an
    /// argument value. Numbers outside i64/f64 range fail fast rather than
    /// silently rounding.
    pub fn from_json(name: &str, value: &JsonValue) -> Result<Self, DatastowError> {
        match value {
            JsonValue::Null => Ok(ArgValue::Null),
            JsonValue::Bool(b) => Ok(ArgValue::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(ArgValue::Int(i))
                } else if n.is_u64() {
                    // An integer too wide for i64 must not be squeezed into
                    // f64 silently.
                    Err(DatastowError::UnrepresentableArgument {
                        name: name.to_string(),
                        reason: format!("integer {} exceeds i64 range", n),
                    })
                } else if let Some(f) = n.as_f64() {
                    Ok(ArgValue::Float(f))
                } else {
                    Err(DatastowError::UnrepresentableArgument {
                        name: name.to_string(),
                        reason: format!("number {} fits neither i64 nor f64", n),
                    })
                }
            }
            JsonValue::String(s) => Ok(ArgValue::Str(s.clone())),
            JsonValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(ArgValue::from_json(name, item)?);
                }
                Ok(ArgValue::List(out))
            }
            JsonValue::Object(entries) => {
                let mut out = BTreeMap::new();
                for (key, item) in entries {
                    out.insert(key.clone(), ArgValue::from_json(name, item)?);
                }
                Ok(ArgValue::Map(out))
            }
        }
    }

    /// Compact human-readable rendering for progress lines and errors.
    pub fn preview(&self) -> String {
        match self {
            ArgValue::Null => "null".to_string(),
            ArgValue::Bool(b) => b.to_string(),
            ArgValue::Int(v) => v.to_string(),
            ArgValue::Float(v) => format!("{:?}", v),
            ArgValue::Str(s) => format!("{:?}", s),
            ArgValue::Path(p) => format!("{:?}", p),
            ArgValue::List(items) => format!("[{} items]", items.len()),
            ArgValue::Map(entries) => format!("{{{} keys}}", entries.len()),
            ArgValue::Table(df) => format!("<table {}x{}>", df.n_rows(), df.n_cols()),
            ArgValue::Bytes(data) => format!("<{} bytes>", data.len()),
        }
    }
}

fn encode_len_prefixed(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());
    out.extend_from_slice(data);
}

/// Derive the storage key for one completed argument set: SHA-256 over the
/// (name, canonical value) pairs in name order. Only values matter — never
/// declaration order, never object identity.
pub fn storage_key(args: &BTreeMap<String, ArgValue>) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in args {
        hasher.update((name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        hasher.update(value.canonical_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_encodes_by_bits_not_text() {
        let a = ArgValue::Float(0.1);
        let b = ArgValue::Float(0.1f32 as f64);
        assert_ne!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn test_int_and_float_encode_differently() {
        assert_ne!(
            ArgValue::Int(1).canonical_bytes(),
            ArgValue::Float(1.0).canonical_bytes()
        );
    }

    #[test]
    fn test_map_insertion_order_does_not_matter() {
        let mut a = BTreeMap::new();
        a.insert("x".to_string(), ArgValue::Int(1));
        a.insert("y".to_string(), ArgValue::Int(2));
        let mut b = BTreeMap::new();
        b.insert("y".to_string(), ArgValue::Int(2));
        b.insert("x".to_string(), ArgValue::Int(1));
        assert_eq!(
            ArgValue::Map(a).canonical_bytes(),
            ArgValue::Map(b).canonical_bytes()
        );
    }

    #[test]
    fn test_nested_list_boundaries_are_unambiguous() {
        let a = ArgValue::List(vec![
            ArgValue::Str("ab".to_string()),
            ArgValue::Str("c".to_string()),
        ]);
        let b = ArgValue::List(vec![
            ArgValue::Str("a".to_string()),
            ArgValue::Str("bc".to_string()),
        ]);
        assert_ne!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn test_from_json_rejects_u64_overflow() {
        let value: JsonValue = serde_json::from_str("18446744073709551615").unwrap();
        let result = ArgValue::from_json("n", &value);
        assert!(matches!(
            result,
            Err(DatastowError::UnrepresentableArgument { .. })
        ));
    }

    #[test]
    fn test_storage_key_is_hex_sha256() {
        let mut args = BTreeMap::new();
        args.insert("a".to_string(), ArgValue::Int(1));
        let key = storage_key(&args);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
