use std::collections::BTreeSet;

use log::info;

use crate::error::CellError;

/// Tracks the column set every ingested table must share.
///
/// The first table observed sets the baseline. Later tables must have the
/// same number of columns and the same column names; order does not matter.
#[derive(Debug, Default, Clone)]
pub struct SchemaAccumulator {
    baseline: Option<Vec<String>>,
}

impl SchemaAccumulator {
    /// Create an accumulator with no baseline yet.
    pub fn new() -> Self {
        Self { baseline: None }
    }

    /// Baseline column names, once a table has been observed.
    pub fn baseline(&self) -> Option<&[String]> {
        self.baseline.as_deref()
    }

    /// Check `columns` against the baseline, setting it on first use.
    pub fn observe(&mut self, source_name: &str, columns: &[String]) -> Result<(), CellError> {
        let Some(expected) = &self.baseline else {
            info!("Meta schema acquired from {source_name}. Columns are: {columns:?}");
            self.baseline = Some(columns.to_vec());
            return Ok(());
        };

        let same_names = || {
            let lhs: BTreeSet<&String> = expected.iter().collect();
            let rhs: BTreeSet<&String> = columns.iter().collect();
            lhs == rhs
        };

        if expected.len() != columns.len() || !same_names() {
            return Err(CellError::SchemaMismatch {
                source_name: source_name.to_string(),
                expected: expected.clone(),
                found: columns.to_vec(),
            });
        }

        Ok(())
    }
}
