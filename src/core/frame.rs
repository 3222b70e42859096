//! Minimal columnar table used as the tabular argument/result type.
//!
//! Hashing reads the raw column buffers directly — never a rendered form —
//! so the hash is stable across processes and display settings.

use crate::core::error::DatastowError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One column of a [`DataFrame`]. The set of column types is closed:
/// hashing and serialization dispatch on this enum exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values")]
pub enum Column {
    #[serde(rename = "int64")]
    Int64(Vec<i64>),
    /// Stored and hashed by exact bit pattern. An `Int64` column holding the
    /// same numeric values hashes differently — content addressing here is
    /// type-strict.
    #[serde(rename = "float64", with = "float_bits")]
    Float64(Vec<f64>),
    #[serde(rename = "utf8")]
    Utf8(Vec<String>),
    #[serde(rename = "bool")]
    Bool(Vec<bool>),
}

/// Float columns round-trip through their u64 bit patterns so that
/// serialization is exact for every value, NaN payloads included.
mod float_bits {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], ser: S) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|v| v.to_bits())
            .collect::<Vec<u64>>()
            .serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<f64>, D::Error> {
        let bits = Vec::<u64>::deserialize(de)?;
        Ok(bits.into_iter().map(f64::from_bits).collect())
    }
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Int64(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::Utf8(v) => v.len(),
            Column::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dtype_tag(&self) -> &'static str {
        match self {
            Column::Int64(_) => "int64",
            Column::Float64(_) => "float64",
            Column::Utf8(_) => "utf8",
            Column::Bool(_) => "bool",
        }
    }

    /// Feed the raw value buffer into the hasher, little-endian, prefixed by
    /// the dtype tag so equal byte sequences of different types stay distinct.
    fn hash_into(&self, hasher: &mut Sha256) {
        hasher.update(self.dtype_tag().as_bytes());
        hasher.update([0u8]);
        match self {
            Column::Int64(values) => {
                for v in values {
                    hasher.update(v.to_le_bytes());
                }
            }
            Column::Float64(values) => {
                for v in values {
                    hasher.update(v.to_bits().to_le_bytes());
                }
            }
            Column::Utf8(values) => {
                for v in values {
                    hasher.update((v.len() as u64).to_le_bytes());
                    hasher.update(v.as_bytes());
                }
            }
            Column::Bool(values) => {
                for v in values {
                    hasher.update([u8::from(*v)]);
                }
            }
        }
    }
}

/// Columnar table: ordered labels, a row index, one column buffer per label.
///
/// Equality is exact — every element, every index entry, every label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    pub labels: Vec<String>,
    pub index: Vec<String>,
    pub columns: Vec<Column>,
}

impl DataFrame {
    pub fn new(
        labels: Vec<String>,
        index: Vec<String>,
        columns: Vec<Column>,
    ) -> Result<Self, DatastowError> {
        if labels.len() != columns.len() {
            return Err(DatastowError::ValidationError(format!(
                "{} column labels for {} columns",
                labels.len(),
                columns.len()
            )));
        }
        for (label, column) in labels.iter().zip(&columns) {
            if column.len() != index.len() {
                return Err(DatastowError::ValidationError(format!(
                    "column '{}' has {} rows, index has {}",
                    label,
                    column.len(),
                    index.len()
                )));
            }
        }
        Ok(DataFrame {
            labels,
            index,
            columns,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Content hash over index, labels, and every column buffer.
    ///
    /// Column order is part of the content: a reordered table is a different
    /// table. Labels and index entries are length-prefixed to keep the
    /// encoding unambiguous.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"index");
        hasher.update([0u8]);
        for entry in &self.index {
            hasher.update((entry.len() as u64).to_le_bytes());
            hasher.update(entry.as_bytes());
        }
        for (label, column) in self.labels.iter().zip(&self.columns) {
            hasher.update(b"column");
            hasher.update([0u8]);
            hasher.update((label.len() as u64).to_le_bytes());
            hasher.update(label.as_bytes());
            column.hash_into(&mut hasher);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Parse a small CSV string: first line is the header, rows are indexed
    /// by position. Every cell parses as int64 if the whole column does,
    /// else float64, else utf8. No quoting support — intake for simple
    /// dashboard source files, not a general CSV reader.
    pub fn from_csv_str(text: &str) -> Result<Self, DatastowError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| DatastowError::ValidationError("empty CSV input".to_string()))?;
        let labels: Vec<String> = header.split(',').map(|s| s.trim().to_string()).collect();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); labels.len()];
        let mut index = Vec::new();
        for (row_no, line) in lines.enumerate() {
            let row: Vec<&str> = line.split(',').map(str::trim).collect();
            if row.len() != labels.len() {
                return Err(DatastowError::ValidationError(format!(
                    "CSV row {} has {} fields, header has {}",
                    row_no + 1,
                    row.len(),
                    labels.len()
                )));
            }
            for (col, cell) in cells.iter_mut().zip(&row) {
                col.push((*cell).to_string());
            }
            index.push(row_no.to_string());
        }

        let columns = cells.into_iter().map(narrow_column).collect();
        DataFrame::new(labels, index, columns)
    }
}

fn narrow_column(cells: Vec<String>) -> Column {
    if cells.iter().all(|c| c.parse::<i64>().is_ok()) {
        return Column::Int64(cells.iter().map(|c| c.parse().unwrap()).collect());
    }
    if cells.iter().all(|c| c.parse::<f64>().is_ok()) {
        return Column::Float64(cells.iter().map(|c| c.parse().unwrap()).collect());
    }
    Column::Utf8(cells)
}
