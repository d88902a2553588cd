//! Derive a new annotation column from an existing one.
//!
//! ```
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Int64Array};
//! use cellscape::mapping::append_observation;
//! use cellscape::table::Table;
//!
//! let table = Table::from_columns(vec![
//!     ("cluster", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
//! ])?;
//! let mapped = append_observation(&table, "cluster", "cell_type", &["1:T cell", "2:B cell"])?;
//! assert_eq!(
//!     mapped.labels("cell_type")?,
//!     vec![Some("T cell".into()), Some("B cell".into()), Some("Not_Mapped".into())]
//! );
//! # Ok::<(), cellscape::CellError>(())
//! ```

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};

use crate::error::CellError;
use crate::table::Table;

/// Value written where no rule matches.
pub const NOT_MAPPED: &str = "Not_Mapped";

/// Rewrites one source value to a target value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    /// Value to look for in the source column
    pub source: String,
    /// Value written to the new column
    pub target: String,
}

impl FromStr for MappingRule {
    type Err = CellError;

    /// Parse `"<value in source column>:<value in new column>"`.
    fn from_str(rule: &str) -> Result<Self, Self::Err> {
        let mut parts = rule.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(source), Some(target), None) => Ok(Self {
                source: source.to_string(),
                target: target.to_string(),
            }),
            _ => Err(CellError::invalid(format!(
                "Invalid mapping rule format: '{rule}'. It should have the format \
                 <value in source column>:<value in new column>"
            ))),
        }
    }
}

/// Copy of `table` with `new_column` filled by rule lookup on `source_column`.
///
/// Source values are compared by their string rendering; the source column
/// itself keeps its type. A later rule for the same source value overrides
/// an earlier one. Unmatched and null rows get [`NOT_MAPPED`].
pub fn append_observation<S: AsRef<str>>(
    table: &Table,
    source_column: &str,
    new_column: &str,
    mapping_rules: &[S],
) -> Result<Table, CellError> {
    if !table.has_column(source_column) {
        return Err(CellError::ColumnNotFound(source_column.to_string()));
    }
    if table.has_column(new_column) {
        return Err(CellError::AlreadyExists(new_column.to_string()));
    }

    let rules = mapping_rules
        .iter()
        .map(|rule| rule.as_ref().parse::<MappingRule>())
        .collect::<Result<Vec<_>, _>>()?;

    let lookup: HashMap<&str, &str> = rules
        .iter()
        .map(|rule| (rule.source.as_str(), rule.target.as_str()))
        .collect();

    let source_values = table.labels(source_column)?;
    let mapped: Vec<&str> = source_values
        .iter()
        .map(|value| {
            value
                .as_deref()
                .and_then(|v| lookup.get(v).copied())
                .unwrap_or(NOT_MAPPED)
        })
        .collect();

    let column: ArrayRef = Arc::new(StringArray::from(mapped));
    table.with_column(new_column, column)
}
