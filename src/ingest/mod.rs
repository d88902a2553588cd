//! # Tabular ingestion
//!
//! Loads delimited cell-measurement files into [`Table`]s and merges them
//! into one table with per-file annotations.
//!
//! All files of a batch must share one column set. The first file read sets
//! the baseline; any file that disagrees aborts the whole batch, so callers
//! never see a partially loaded result.
//!
//! ```rust,no_run
//! use cellscape::ingest::{combine_tables, load_csv_files, FileAnnotations};
//!
//! let loaded = load_csv_files(["region_a.csv", "region_b.csv"])?;
//!
//! let mut annotations = FileAnnotations::new(["slide"]);
//! annotations.insert("region_a.csv", ["slide_1"])?;
//! annotations.insert("region_b.csv", ["slide_2"])?;
//!
//! let merged = combine_tables(&loaded, &annotations)?;
//! println!("{} cells", merged.num_rows());
//! # Ok::<(), cellscape::CellError>(())
//! ```

mod annotations;
mod schema;


use std::fs::File;
use std::io::{BufReader, ErrorKind, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef, StringArray};
use arrow::compute::{cast, concat};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::{debug, info};
use regex::Regex;

use crate::error::CellError;
use crate::table::{build_batch, Table};

pub use annotations::FileAnnotations;
pub use schema::SchemaAccumulator;

/// Cells that read as missing values.
const NULL_TOKENS: &str = r"^(|NA|N/A|NaN|nan|null|NULL)$";

/// Rows decoded per Arrow batch while reading.
const READ_BATCH_SIZE: usize = 8192;

/// A parsed file paired with the path it came from
#[derive(Debug, Clone)]
pub struct LoadedTable {
    /// Source file path, as given by the caller
    pub path: PathBuf,
    /// Parsed contents
    pub table: Table,
}

/// Read one comma-delimited file with a header row.
///
/// Column types are inferred from every record. Empty cells and common
/// missing-value tokens (`NA`, `NaN`, `null`) become nulls.
pub fn load_csv_file<P: AsRef<Path>>(path: P) -> Result<Table, CellError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CellError::FileNotFound(path.to_path_buf()));
    }

    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => CellError::PermissionDenied(path.to_path_buf()),
        _ => CellError::Io(e),
    })?;
    let mut reader = BufReader::new(file);

    let malformed = |reason: String| CellError::EmptyOrMalformed {
        path: path.to_path_buf(),
        reason,
    };

    let format = Format::default()
        .with_header(true)
        .with_null_regex(Regex::new(NULL_TOKENS)?);

    let (schema, records) = format
        .infer_schema(&mut reader, None)
        .map_err(|e| malformed(e.to_string()))?;
    if schema.fields().is_empty() {
        return Err(malformed("the file is empty or does not contain any data".to_string()));
    }
    debug!("Inferred {} columns from {records} records in {}", schema.fields().len(), path.display());

    reader.rewind()?;
    let schema = Arc::new(schema);
    let csv_reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .with_batch_size(READ_BATCH_SIZE)
        .build(reader)
        .map_err(|e| malformed(e.to_string()))?;

    let batches = csv_reader
        .collect::<Result<Vec<RecordBatch>, _>>()
        .map_err(|e| malformed(e.to_string()))?;
    let batch = arrow::compute::concat_batches(&schema, &batches)?;

    Ok(Table::new(batch))
}

/// Read several files that must share one column set.
///
/// Returns one [`LoadedTable`] per path, in input order. Fails without a
/// partial result on the first missing, unreadable, unparseable or
/// mismatched file.
pub fn load_csv_files<I, P>(paths: I) -> Result<Vec<LoadedTable>, CellError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut schema = SchemaAccumulator::new();
    let mut loaded = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let table = load_csv_file(path)?;
        schema.observe(&path.display().to_string(), &table.column_names())?;
        loaded.push(LoadedTable {
            path: path.to_path_buf(),
            table,
        });
    }

    info!("CSVs are converted into {} tables", loaded.len());
    for entry in &loaded {
        log_table_summary(&entry.path, &entry.table);
    }

    Ok(loaded)
}

/// Merge loaded files into one table, broadcasting per-file annotations.
///
/// Every file must have an entry in `annotations`. Columns are aligned by
/// name to the first file's order; a column whose type differs between files
/// is widened (`Float64` for mixed numeric types, `Utf8` otherwise). The
/// merged table's index is reset to `0..n`.
pub fn combine_tables(
    loaded: &[LoadedTable],
    annotations: &FileAnnotations,
) -> Result<Table, CellError> {
    let mut schema = SchemaAccumulator::new();
    let mut annotated = Vec::with_capacity(loaded.len());

    for entry in loaded {
        schema.observe(&entry.path.display().to_string(), &entry.table.column_names())?;

        let values = annotations
            .get(&entry.path)
            .ok_or_else(|| CellError::MissingFileAnnotations(entry.path.clone()))?;

        let mut table = entry.table.clone();
        let num_rows = table.num_rows();
        for (name, value) in annotations.columns().iter().zip(values) {
            let column: ArrayRef = Arc::new(StringArray::from(vec![value.as_str(); num_rows]));
            table.set_column(name, column)?;
        }
        annotated.push(table);
    }

    let combined = concat_tables(&annotated)?;
    info!(
        "CSVs are combined into a single table with {} rows and {} columns",
        combined.num_rows(),
        combined.num_columns()
    );
    Ok(combined)
}

/// Stack tables with the same column names, aligning columns by name.
pub(crate) fn concat_tables(tables: &[Table]) -> Result<Table, CellError> {
    let Some(first) = tables.first() else {
        return Table::from_columns(Vec::<(String, ArrayRef)>::new());
    };

    let names = first.column_names();
    let mut fields = Vec::with_capacity(names.len());
    let mut columns = Vec::with_capacity(names.len());
    let num_rows: usize = tables.iter().map(Table::num_rows).sum();

    for name in &names {
        let parts = tables
            .iter()
            .map(|t| t.column(name).map(Arc::clone))
            .collect::<Result<Vec<_>, _>>()?;

        let data_type = parts
            .iter()
            .map(|p| p.data_type().clone())
            .reduce(|acc, next| common_type(&acc, &next))
            .unwrap_or(DataType::Null);

        let cast_parts = parts
            .iter()
            .map(|p| {
                if p.data_type() == &data_type {
                    Ok(Arc::clone(p))
                } else if p.data_type() == &DataType::Null {
                    Ok(new_null_array(&data_type, p.len()))
                } else {
                    cast(p, &data_type)
                }
            })
            .collect::<Result<Vec<ArrayRef>, _>>()?;
        let refs: Vec<&dyn Array> = cast_parts.iter().map(|a| a.as_ref()).collect();

        fields.push(Field::new(name, data_type, true));
        columns.push(concat(&refs)?);
    }

    let batch = build_batch(Arc::new(Schema::new(fields)), columns, num_rows)?;
    Ok(Table::new(batch))
}

/// Narrowest type both sides convert to without losing values.
fn common_type(lhs: &DataType, rhs: &DataType) -> DataType {
    match (lhs, rhs) {
        (a, b) if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (a, b) if a.is_numeric() && b.is_numeric() => DataType::Float64,
        _ => DataType::Utf8,
    }
}

fn log_table_summary(path: &Path, table: &Table) {
    info!(
        "File name: {} ({} rows, {} columns)",
        path.display(),
        table.num_rows(),
        table.num_columns()
    );
    for field in table.schema().fields() {
        let nulls = table
            .batch()
            .column_by_name(field.name())
            .map_or(0, |c| c.null_count());
        debug!("  {}: {} ({} missing)", field.name(), field.data_type(), nulls);
    }
}
