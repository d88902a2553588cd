use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::CellError;

/// Per-file annotation values, keyed by source file path.
///
/// Every row of a file merged with [`combine_tables`](super::combine_tables)
/// receives that file's value for each annotation column, e.g. the slide or
/// patient a region was imaged from.
#[derive(Debug, Clone, Default)]
pub struct FileAnnotations {
    columns: Vec<String>,
    entries: HashMap<PathBuf, Vec<String>>,
}

impl FileAnnotations {
    /// Create an empty table with the given annotation column names.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            entries: HashMap::new(),
        }
    }

    /// Annotation column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of files with annotations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no file has annotations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set the annotation values for one file.
    pub fn insert<S: Into<String>>(
        &mut self,
        path: impl Into<PathBuf>,
        values: impl IntoIterator<Item = S>,
    ) -> Result<(), CellError> {
        let path = path.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.len() != self.columns.len() {
            return Err(CellError::invalid(format!(
                "annotations for '{}' have {} values, expected {}",
                path.display(),
                values.len(),
                self.columns.len()
            )));
        }
        self.entries.insert(path, values);
        Ok(())
    }

    /// Annotation values for a file, in column order.
    pub fn get(&self, path: &Path) -> Option<&[String]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    /// Parse an annotation table from a CSV file.
    ///
    /// The first column holds the file path; the remaining columns are
    /// annotations.
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> Result<Self, CellError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CellError::FileNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse an annotation table from a reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, CellError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        if headers.len() < 2 {
            return Err(CellError::invalid(
                "annotation table needs a path column and at least one annotation column",
            ));
        }

        let mut annotations = Self::new(headers[1..].iter().cloned());
        for record in csv_reader.records() {
            let record = record?;
            let Some(file_name) = record.get(0) else {
                continue;
            };
            if file_name.is_empty() {
                continue;
            }
            annotations.insert(file_name, record.iter().skip(1))?;
        }

        Ok(annotations)
    }
}
