//! # In-memory cell tables
//!
//! A [`Table`] is an Arrow [`RecordBatch`] plus a row index. The index holds
//! one label per row; it starts as `0..n` when a file is read and is carried
//! through row filters, so a filtered table still tells which source rows it
//! kept. Operations that build a fresh row order (merging, non-stratified
//! downsampling) reset it.

use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, StringArray, UInt64Array};
use arrow::compute::{cast, filter, take};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::CellError;


/// Column-typed rows with an index label per row
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
    index: Vec<u64>,
}

impl Table {
    /// Wrap a record batch with a dense `0..n` index.
    pub fn new(batch: RecordBatch) -> Self {
        let index = (0..batch.num_rows() as u64).collect();
        Self { batch, index }
    }

    /// Wrap a record batch with explicit index labels.
    pub fn with_index(batch: RecordBatch, index: Vec<u64>) -> Result<Self, CellError> {
        if index.len() != batch.num_rows() {
            return Err(CellError::invalid(format!(
                "index length {} does not match row count {}",
                index.len(),
                batch.num_rows()
            )));
        }
        Ok(Self { batch, index })
    }

    /// Build a table from named columns of equal length.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use arrow::array::{ArrayRef, Int64Array, StringArray};
    /// use cellscape::table::Table;
    ///
    /// let table = Table::from_columns(vec![
    ///     ("region", Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef),
    ///     ("CD4", Arc::new(Int64Array::from(vec![3, 7])) as ArrayRef),
    /// ])?;
    /// assert_eq!(table.num_rows(), 2);
    /// # Ok::<(), cellscape::CellError>(())
    /// ```
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, ArrayRef)>) -> Result<Self, CellError> {
        let num_rows = columns.first().map_or(0, |(_, array)| array.len());
        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());
        for (name, array) in columns {
            fields.push(Field::new(name.into(), array.data_type().clone(), true));
            arrays.push(array);
        }
        let batch = build_batch(Arc::new(Schema::new(fields)), arrays, num_rows)?;
        Ok(Self::new(batch))
    }

    /// Underlying record batch.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Consume the table, returning the record batch.
    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    /// Arrow schema of the table.
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of columns.
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// True when the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Row index labels.
    pub fn index(&self) -> &[u64] {
        &self.index
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Whether a column with this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&ArrayRef, CellError> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| CellError::ColumnNotFound(name.to_string()))
    }

    /// Column values rendered as strings; nulls stay `None`.
    pub fn labels(&self, name: &str) -> Result<Vec<Option<String>>, CellError> {
        array_labels(self.column(name)?)
    }

    /// Column values as `f64`; nulls become NaN.
    pub fn numeric(&self, name: &str) -> Result<Vec<f64>, CellError> {
        array_values_f64(name, self.column(name)?)
    }

    /// Replace a column in place, or append it when the name is new.
    pub fn set_column(&mut self, name: &str, array: ArrayRef) -> Result<(), CellError> {
        if array.len() != self.num_rows() {
            return Err(CellError::invalid(format!(
                "column '{name}' has {} values, table has {} rows",
                array.len(),
                self.num_rows()
            )));
        }

        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut columns = self.batch.columns().to_vec();
        let field = Field::new(name, array.data_type().clone(), true);

        match schema.index_of(name) {
            Ok(position) => {
                fields[position] = field;
                columns[position] = array;
            }
            Err(_) => {
                fields.push(field);
                columns.push(array);
            }
        }

        self.batch = build_batch(Arc::new(Schema::new(fields)), columns, self.num_rows())?;
        Ok(())
    }

    /// Copy of this table with one new column appended.
    pub fn with_column(&self, name: &str, array: ArrayRef) -> Result<Table, CellError> {
        if self.has_column(name) {
            return Err(CellError::AlreadyExists(name.to_string()));
        }
        let mut table = self.clone();
        table.set_column(name, array)?;
        Ok(table)
    }

    /// Rows at the given positions, in that order, with their index labels.
    pub fn take(&self, rows: &[usize]) -> Result<Table, CellError> {
        let indices = UInt64Array::from(rows.iter().map(|&r| r as u64).collect::<Vec<_>>());
        let columns = self
            .batch
            .columns()
            .iter()
            .map(|column| take(column.as_ref(), &indices, None))
            .collect::<Result<Vec<_>, _>>()?;
        let batch = build_batch(self.batch.schema(), columns, rows.len())?;
        let index = rows.iter().map(|&r| self.index[r]).collect();
        Ok(Table { batch, index })
    }

    /// Rows where `mask` is true.
    pub fn filter(&self, mask: &BooleanArray) -> Result<Table, CellError> {
        let columns = self
            .batch
            .columns()
            .iter()
            .map(|column| filter(column.as_ref(), mask))
            .collect::<Result<Vec<_>, _>>()?;
        let index: Vec<u64> = self
            .index
            .iter()
            .zip(mask.iter())
            .filter(|(_, keep)| keep.unwrap_or(false))
            .map(|(label, _)| *label)
            .collect();
        let batch = build_batch(self.batch.schema(), columns, index.len())?;
        Ok(Table { batch, index })
    }

    /// Replace the index with a dense `0..n` sequence.
    pub fn reset_index(mut self) -> Self {
        self.index = (0..self.num_rows() as u64).collect();
        self
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match arrow::util::pretty::pretty_format_batches(&[self.batch.clone()]) {
            Ok(rendered) => write!(f, "{rendered}"),
            Err(_) => Err(fmt::Error),
        }
    }
}

pub(crate) fn build_batch(
    schema: SchemaRef,
    columns: Vec<ArrayRef>,
    num_rows: usize,
) -> Result<RecordBatch, CellError> {
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

/// True for types that carry a meaningful numeric value per cell.
pub(crate) fn is_numeric_type(data_type: &DataType) -> bool {
    data_type.is_numeric() || matches!(data_type, DataType::Boolean | DataType::Null)
}

pub(crate) fn array_labels(array: &ArrayRef) -> Result<Vec<Option<String>>, CellError> {
    let rendered = cast(array, &DataType::Utf8)?;
    let strings = rendered
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| CellError::invalid("string cast produced a non-string array"))?;
    Ok(strings.iter().map(|v| v.map(str::to_string)).collect())
}

pub(crate) fn array_values_f64(name: &str, array: &ArrayRef) -> Result<Vec<f64>, CellError> {
    if !is_numeric_type(array.data_type()) {
        return Err(CellError::invalid(format!(
            "column '{name}' has non-numeric type {}",
            array.data_type()
        )));
    }
    let converted = cast(array, &DataType::Float64)?;
    let values = converted
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| CellError::invalid("float cast produced a non-float array"))?;
    Ok(values.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}
