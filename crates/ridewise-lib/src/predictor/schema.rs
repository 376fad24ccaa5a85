//! Schema alignment between built feature rows and a model's expectations
//!
//! Alignment is lossy but never fails: schema columns missing from the input
//! are zero-filled and reported, columns unknown to the schema are dropped,
//! and the output order is exactly the schema order.

use crate::models::{FeatureFrame, FeatureRow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ordered feature names a trained model expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelSchema {
    names: Vec<String>,
}

impl ModelSchema {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Output of [`SchemaAligner::align`]
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub frame: FeatureFrame,
    /// Schema names that were absent from at least one input row, in schema order
    pub imputed: Vec<String>,
}

/// Reconciles feature rows against a model schema
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaAligner;

impl SchemaAligner {
    /// Align a batch of rows
    ///
    /// Without a schema the rows pass through unchanged: columns are the
    /// union of row names in first-seen order and nothing is reported as
    /// imputed.
    pub fn align(rows: &[FeatureRow], schema: Option<&ModelSchema>) -> Alignment {
        let Some(schema) = schema else {
            return Self::passthrough(rows);
        };

        let imputed: Vec<String> = schema
            .names()
            .iter()
            .filter(|name| rows.iter().any(|row| !row.contains(name)))
            .cloned()
            .collect();

        let values = rows
            .iter()
            .map(|row| {
                schema
                    .names()
                    .iter()
                    .map(|name| row.get(name).unwrap_or(0.0))
                    .collect()
            })
            .collect();

        if !imputed.is_empty() {
            debug!(imputed = ?imputed, "Zero-filled schema columns missing from input");
        }

        Alignment {
            frame: FeatureFrame::from_parts(schema.names().to_vec(), values),
            imputed,
        }
    }

    /// Align a single row
    pub fn align_row(row: &FeatureRow, schema: Option<&ModelSchema>) -> Alignment {
        Self::align(std::slice::from_ref(row), schema)
    }

    fn passthrough(rows: &[FeatureRow]) -> Alignment {
        let mut columns: Vec<String> = Vec::new();
        for row in rows {
            for name in row.names() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }
        let values = rows
            .iter()
            .map(|row| columns.iter().map(|c| row.get(c).unwrap_or(0.0)).collect())
            .collect();
        Alignment {
            frame: FeatureFrame::from_parts(columns, values),
            imputed: Vec::new(),
        }
    }
}
