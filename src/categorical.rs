//! Collapse one-hot encoded columns into a single categorical column.

use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};

use crate::error::CellError;
use crate::pattern::regex_search_list;
use crate::table::{array_values_f64, is_numeric_type, Table};

/// Add `new_annotation` naming, per row, the one-hot column that holds `1`.
///
/// Columns are selected with [`regex_search_list`]. A row with no set column
/// gets a null; a row with more than one fails the whole call. Non-numeric
/// matched columns never count as set.
///
/// ```
/// use std::sync::Arc;
/// use arrow::array::{ArrayRef, Int64Array};
/// use cellscape::categorical::bin2cat;
/// use cellscape::table::Table;
///
/// let mut table = Table::from_columns(vec![
///     ("A", Arc::new(Int64Array::from(vec![1, 1, 0, 0])) as ArrayRef),
///     ("B", Arc::new(Int64Array::from(vec![0, 0, 1, 0])) as ArrayRef),
/// ])?;
/// bin2cat(&mut table, &["^A$", "^B$"], "new_category")?;
/// assert_eq!(
///     table.labels("new_category")?,
///     vec![Some("A".into()), Some("A".into()), Some("B".into()), None]
/// );
/// # Ok::<(), cellscape::CellError>(())
/// ```
pub fn bin2cat<'t, S: AsRef<str>>(
    table: &'t mut Table,
    one_hot_annotations: &[S],
    new_annotation: &str,
) -> Result<&'t mut Table, CellError> {
    if table.has_column(new_annotation) {
        return Err(CellError::AlreadyExists(new_annotation.to_string()));
    }
    if one_hot_annotations.is_empty() {
        return Err(CellError::invalid("no one-hot column patterns were given"));
    }

    let labels = regex_search_list(one_hot_annotations, &table.column_names())?;
    if labels.is_empty() {
        return Err(CellError::invalid(
            "No column was found in the table with current regex pattern(s).",
        ));
    }

    let mut indicator: Vec<Vec<bool>> = Vec::with_capacity(labels.len());
    for name in &labels {
        let column = table.column(name)?;
        let set = if is_numeric_type(column.data_type()) {
            array_values_f64(name, column)?.iter().map(|&v| v == 1.0).collect()
        } else {
            vec![false; table.num_rows()]
        };
        indicator.push(set);
    }

    let mut categories: Vec<Option<&str>> = Vec::with_capacity(table.num_rows());
    for row in 0..table.num_rows() {
        let hits: Vec<&str> = labels
            .iter()
            .zip(&indicator)
            .filter(|(_, set)| set[row])
            .map(|(name, _)| name.as_str())
            .collect();

        match hits.as_slice() {
            [] => categories.push(None),
            [single] => categories.push(Some(*single)),
            many => {
                return Err(CellError::invalid(format!(
                    "Multiple instance found in row {}: {many:?}",
                    table.index()[row]
                )))
            }
        }
    }

    let column: ArrayRef = Arc::new(StringArray::from(categories));
    table.set_column(new_annotation, column)?;
    Ok(table)
}
