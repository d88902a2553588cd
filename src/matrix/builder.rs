use arrow::array::{ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type, UInt64Type};
use log::debug;

use super::{AnnotatedMatrix, Annotation, FeatureMatrix};
use crate::error::CellError;
use crate::pattern::matching_columns;
use crate::table::{array_values_f64, is_numeric_type, Table};

/// Builder for an [`AnnotatedMatrix`] over the columns of a [`Table`]
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
/// use cellscape::matrix::MatrixBuilder;
/// use cellscape::table::Table;
///
/// let table = Table::from_columns(vec![
///     ("CD4", Arc::new(Int64Array::from(vec![1, 5])) as ArrayRef),
///     ("CD8", Arc::new(Int64Array::from(vec![2, 0])) as ArrayRef),
///     ("X", Arc::new(Float64Array::from(vec![10.0, 20.0])) as ArrayRef),
///     ("Y", Arc::new(Float64Array::from(vec![3.0, 4.0])) as ArrayRef),
///     ("region", Arc::new(StringArray::from(vec!["tumor", "stroma"])) as ArrayRef),
/// ])?;
///
/// let adata = MatrixBuilder::new(&table)
///     .feature("^CD")
///     .spatial("X", "Y")
///     .annotation("region")
///     .build()?;
///
/// assert_eq!(adata.var_names(), &["CD4", "CD8"]);
/// assert_eq!(adata.spatial().unwrap()[1], [20.0, 4.0]);
/// # Ok::<(), cellscape::CellError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MatrixBuilder<'a> {
    table: &'a Table,
    patterns: Vec<String>,
    spatial: Option<(String, String)>,
    annotations: Vec<String>,
}

impl<'a> MatrixBuilder<'a> {
    /// Start a builder over `table`.
    pub fn new(table: &'a Table) -> Self {
        Self {
            table,
            patterns: Vec::new(),
            spatial: None,
            annotations: Vec::new(),
        }
    }

    /// Add a feature-name regex.
    pub fn feature(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Add several feature-name regexes.
    pub fn features<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Use two columns as the spatial coordinates.
    pub fn spatial(mut self, x_col: impl Into<String>, y_col: impl Into<String>) -> Self {
        self.spatial = Some((x_col.into(), y_col.into()));
        self
    }

    /// Copy a column as a categorical annotation.
    pub fn annotation(mut self, column: impl Into<String>) -> Self {
        self.annotations.push(column.into());
        self
    }

    /// Copy several columns as categorical annotations.
    pub fn annotations<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.annotations.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Select the features and assemble the matrix.
    ///
    /// Every pattern must match at least one column. Features take the type
    /// of the first matched column. 64-bit integer features must stay within
    /// `±2^53` so the matrix holds them exactly.
    pub fn build(self) -> Result<AnnotatedMatrix, CellError> {
        let table = self.table;
        if self.patterns.is_empty() {
            return Err(CellError::invalid("at least one feature pattern is required"));
        }

        let all_columns = table.column_names();
        let mut features: Vec<String> = Vec::new();
        for pattern in &self.patterns {
            let current = matching_columns(pattern, &all_columns)?;
            if current.is_empty() {
                return Err(CellError::invalid(format!(
                    "Provided regex pattern(s) or feature(s):\n\"{pattern}\"\n\
                     does not match any in the dataset, please review the input."
                )));
            }
            for name in current {
                if !features.contains(&name) {
                    features.push(name);
                }
            }
        }
        debug!("Selected {} features: {features:?}", features.len());

        let dtype = table.column(&features[0])?.data_type().clone();
        if !is_numeric_type(&dtype) {
            return Err(CellError::invalid(format!(
                "feature '{}' has non-numeric type {dtype}",
                features[0]
            )));
        }

        let mut columns = Vec::with_capacity(features.len());
        for name in &features {
            let column = table.column(name)?;
            if !is_numeric_type(column.data_type()) {
                return Err(CellError::invalid(format!(
                    "feature '{name}' has non-numeric type {}",
                    column.data_type()
                )));
            }
            let converted = if column.data_type() == &dtype {
                column.clone()
            } else {
                cast(column, &dtype)?
            };
            check_exact_integers(name, &converted)?;
            columns.push(array_values_f64(name, &converted)?);
        }

        let x = FeatureMatrix::from_columns(table.num_rows(), columns)?;
        let obs_names = table.index().iter().map(u64::to_string).collect();
        let mut adata = AnnotatedMatrix::new(x, dtype, obs_names, features)?;

        for name in &self.annotations {
            let labels = table.labels(name)?;
            adata.add_obs(name, Annotation::Categorical(labels))?;
        }

        if let Some((x_col, y_col)) = &self.spatial {
            let xs = table.column(x_col).and_then(|c| coordinate_values(x_col, c))?;
            let ys = table.column(y_col).and_then(|c| coordinate_values(y_col, c))?;
            adata.set_spatial(xs.into_iter().zip(ys).map(|(x, y)| [x, y]).collect())?;
        }

        Ok(adata)
    }
}

/// Largest integer magnitude an `f64` represents exactly.
const MAX_EXACT_INTEGER: u64 = 1 << 53;

fn check_exact_integers(name: &str, column: &ArrayRef) -> Result<(), CellError> {
    let out_of_range = match column.data_type() {
        DataType::Int64 => column
            .as_primitive::<Int64Type>()
            .iter()
            .flatten()
            .any(|v| v.unsigned_abs() > MAX_EXACT_INTEGER),
        DataType::UInt64 => column
            .as_primitive::<UInt64Type>()
            .iter()
            .flatten()
            .any(|v| v > MAX_EXACT_INTEGER),
        _ => false,
    };
    if out_of_range {
        return Err(CellError::invalid(format!(
            "feature '{name}' holds integers beyond ±2^53 that cannot be stored without precision loss"
        )));
    }
    Ok(())
}

fn coordinate_values(name: &str, column: &ArrayRef) -> Result<Vec<f32>, CellError> {
    let as_f32 = cast(column, &DataType::Float32)?;
    Ok(array_values_f64(name, &as_f32)?
        .into_iter()
        .map(|v| v as f32)
        .collect())
}
