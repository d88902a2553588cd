//! # Table export
//!
//! Writes record batches and annotated matrices to disk. The format is
//! chosen from the file extension: `.parquet` writes Parquet, anything else
//! writes comma-delimited text with a header row.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float32Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

use crate::error::CellError;
use crate::matrix::AnnotatedMatrix;
use crate::table::build_batch;

/// Column holding observation names in [`matrix_batch`] output.
pub const OBS_NAMES_COLUMN: &str = "obs_names";

/// Compression options for Parquet output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// ZSTD compression at the given level
    Zstd(i32),
    /// Snappy compression
    Snappy,
    /// No compression
    Uncompressed,
}

impl Default for CompressionType {
    fn default() -> Self {
        Self::Zstd(3)
    }
}

/// Parquet writer settings
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Compression type to use
    pub compression: CompressionType,
    /// Maximum rows per row group
    pub row_group_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compression: CompressionType::default(),
            row_group_size: 100_000,
        }
    }
}

impl ExportConfig {
    fn to_writer_properties(&self) -> WriterProperties {
        let compression = match self.compression {
            CompressionType::Zstd(level) => {
                Compression::ZSTD(ZstdLevel::try_new(level).unwrap_or_default())
            }
            CompressionType::Snappy => Compression::SNAPPY,
            CompressionType::Uncompressed => Compression::UNCOMPRESSED,
        };
        WriterProperties::builder()
            .set_compression(compression)
            .set_max_row_group_size(self.row_group_size)
            .build()
    }
}

/// Output format picked from a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Apache Parquet
    Parquet,
    /// Comma-delimited text with a header row
    Csv,
}

impl ExportFormat {
    /// `Parquet` for a `.parquet` extension (any case), `Csv` otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => Self::Parquet,
            _ => Self::Csv,
        }
    }
}

/// Write a batch with default settings.
pub fn write_table(batch: &RecordBatch, path: impl AsRef<Path>) -> Result<(), CellError> {
    write_table_with(batch, path, &ExportConfig::default())
}

/// Write a batch, choosing the format from the extension.
pub fn write_table_with(
    batch: &RecordBatch,
    path: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<(), CellError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let format = ExportFormat::from_path(path);

    match format {
        ExportFormat::Parquet => {
            let props = config.to_writer_properties();
            let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
            writer.write(batch)?;
            writer.close()?;
        }
        ExportFormat::Csv => {
            let mut writer = arrow::csv::WriterBuilder::new()
                .with_header(true)
                .build(file);
            writer.write(batch)?;
        }
    }

    info!(
        "Wrote {} rows x {} columns to {} ({format:?})",
        batch.num_rows(),
        batch.num_columns(),
        path.display()
    );
    Ok(())
}

/// Flatten a matrix into one batch: observation names, feature values from
/// `layer` (or the primary matrix), annotations, then `spatial_x` and
/// `spatial_y` when coordinates are present.
///
/// A name used by more than one block fails with `AlreadyExists`.
pub fn matrix_batch(adata: &AnnotatedMatrix, layer: Option<&str>) -> Result<RecordBatch, CellError> {
    let features = adata.to_table(layer)?;
    let annotations = adata.obs_table()?;

    let mut fields: Vec<Field> = vec![Field::new(OBS_NAMES_COLUMN, arrow::datatypes::DataType::Utf8, false)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(adata.obs_names().to_vec()))];

    for block in [&features, &annotations] {
        for (field, column) in block.schema().fields().iter().zip(block.columns()) {
            fields.push(field.as_ref().clone());
            columns.push(column.clone());
        }
    }

    if let Some(spatial) = adata.spatial() {
        for (axis, name) in ["spatial_x", "spatial_y"].into_iter().enumerate() {
            let values: Float32Array = spatial.iter().map(|p| Some(p[axis])).collect();
            fields.push(Field::new(name, arrow::datatypes::DataType::Float32, true));
            columns.push(Arc::new(values));
        }
    }

    for (i, field) in fields.iter().enumerate() {
        if fields[..i].iter().any(|f| f.name() == field.name()) {
            return Err(CellError::AlreadyExists(format!("column {}", field.name())));
        }
    }

    build_batch(Arc::new(Schema::new(fields)), columns, adata.n_obs())
}

/// Write a matrix layer with its annotations. See [`matrix_batch`].
pub fn write_matrix(
    adata: &AnnotatedMatrix,
    layer: Option<&str>,
    path: impl AsRef<Path>,
) -> Result<(), CellError> {
    write_table(&matrix_batch(adata, layer)?, path)
}
