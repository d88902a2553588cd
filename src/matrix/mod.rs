//! # Annotated feature matrices
//!
//! An [`AnnotatedMatrix`] holds per-cell feature measurements together with
//! everything that must stay row-aligned with them:
//!
//! - `x`: the primary matrix (cells x features)
//! - `obs`: per-cell annotations, categorical or numeric
//! - `layers`: alternative matrices of the same shape (rescaled values,
//!   intensity bins, ...)
//! - `spatial`: optional 2-D coordinates per cell
//! - `uns`: unstructured JSON metadata
//!
//! Matrices grow by gaining layers, annotations and metadata; rows are never
//! removed or reordered in place.

mod builder;
mod concat;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::error::CellError;
use crate::table::build_batch;

pub use builder::MatrixBuilder;
pub use concat::{concatenate, make_unique};

/// Dense column-major matrix of `f64` values
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    n_obs: usize,
    n_vars: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// Build from feature columns of equal length `n_obs`.
    pub fn from_columns(n_obs: usize, columns: Vec<Vec<f64>>) -> Result<Self, CellError> {
        let n_vars = columns.len();
        let mut values = Vec::with_capacity(n_obs * n_vars);
        for (j, column) in columns.into_iter().enumerate() {
            if column.len() != n_obs {
                return Err(CellError::invalid(format!(
                    "feature column {j} has {} values, expected {n_obs}",
                    column.len()
                )));
            }
            values.extend(column);
        }
        Ok(Self {
            n_obs,
            n_vars,
            values,
        })
    }

    /// Build from row-major rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, CellError> {
        let n_vars = rows.first().map_or(0, Vec::len);
        let mut columns = vec![Vec::with_capacity(rows.len()); n_vars];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_vars {
                return Err(CellError::invalid(format!(
                    "row {i} has {} values, expected {n_vars}",
                    row.len()
                )));
            }
            for (column, &value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }
        Self::from_columns(rows.len(), columns)
    }

    /// (n_obs, n_vars).
    pub fn shape(&self) -> (usize, usize) {
        (self.n_obs, self.n_vars)
    }

    /// Values of feature `j`, one per observation.
    pub fn column(&self, j: usize) -> &[f64] {
        &self.values[j * self.n_obs..(j + 1) * self.n_obs]
    }

    /// Iterate over feature columns.
    pub fn columns(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.n_vars).map(move |j| self.column(j))
    }

    /// Value at (observation, feature).
    pub fn get(&self, obs: usize, var: usize) -> f64 {
        self.values[var * self.n_obs + obs]
    }

    /// Values of observation `i`, one per feature.
    pub fn row(&self, i: usize) -> Vec<f64> {
        (0..self.n_vars).map(|j| self.get(i, j)).collect()
    }

    /// Matrix restricted to the given observations, in that order.
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        let columns = self
            .columns()
            .map(|column| rows.iter().map(|&i| column[i]).collect())
            .collect::<Vec<Vec<f64>>>();
        Self {
            n_obs: rows.len(),
            n_vars: self.n_vars,
            values: columns.into_iter().flatten().collect(),
        }
    }

    /// Matrix restricted to the given features, in that order.
    pub fn take_columns(&self, vars: &[usize]) -> Self {
        let mut values = Vec::with_capacity(self.n_obs * vars.len());
        for &j in vars {
            values.extend_from_slice(self.column(j));
        }
        Self {
            n_obs: self.n_obs,
            n_vars: vars.len(),
            values,
        }
    }

    /// Apply `f` to each feature column, producing a matrix of the same shape.
    pub fn map_columns<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        let values = self.columns().flat_map(&mut f).collect();
        Self {
            n_obs: self.n_obs,
            n_vars: self.n_vars,
            values,
        }
    }
}

/// Per-observation annotation values
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// String labels; `None` marks a missing value
    Categorical(Vec<Option<String>>),
    /// Continuous values; NaN marks a missing value
    Numeric(Vec<f64>),
}

impl Annotation {
    /// Number of observations covered.
    pub fn len(&self) -> usize {
        match self {
            Annotation::Categorical(v) => v.len(),
            Annotation::Numeric(v) => v.len(),
        }
    }

    /// True when the annotation covers no observations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values rendered as labels; numeric NaN becomes `None`.
    pub fn labels(&self) -> Vec<Option<String>> {
        match self {
            Annotation::Categorical(v) => v.clone(),
            Annotation::Numeric(v) => v
                .iter()
                .map(|x| (!x.is_nan()).then(|| x.to_string()))
                .collect(),
        }
    }

    fn take(&self, rows: &[usize]) -> Self {
        match self {
            Annotation::Categorical(v) => {
                Annotation::Categorical(rows.iter().map(|&i| v[i].clone()).collect())
            }
            Annotation::Numeric(v) => Annotation::Numeric(rows.iter().map(|&i| v[i]).collect()),
        }
    }

    fn to_array(&self) -> ArrayRef {
        match self {
            Annotation::Categorical(v) => Arc::new(arrow::array::StringArray::from(
                v.iter().map(Option::as_deref).collect::<Vec<_>>(),
            )),
            Annotation::Numeric(v) => Arc::new(Float64Array::from(v.clone())),
        }
    }
}

/// Feature matrix with row-aligned annotations, layers and coordinates
#[derive(Debug, Clone)]
pub struct AnnotatedMatrix {
    x: FeatureMatrix,
    dtype: DataType,
    obs_names: Vec<String>,
    var_names: Vec<String>,
    obs: Vec<(String, Annotation)>,
    layers: BTreeMap<String, FeatureMatrix>,
    spatial: Option<Vec<[f32; 2]>>,
    uns: BTreeMap<String, serde_json::Value>,
}

impl AnnotatedMatrix {
    /// Create a matrix with the given observation and feature names.
    ///
    /// `dtype` is the Arrow type the primary values read back as through
    /// [`to_table`](Self::to_table).
    pub fn new(
        x: FeatureMatrix,
        dtype: DataType,
        obs_names: Vec<String>,
        var_names: Vec<String>,
    ) -> Result<Self, CellError> {
        let (n_obs, n_vars) = x.shape();
        if obs_names.len() != n_obs {
            return Err(CellError::invalid(format!(
                "obs_names length ({}) does not match n_obs ({n_obs})",
                obs_names.len()
            )));
        }
        if var_names.len() != n_vars {
            return Err(CellError::invalid(format!(
                "var_names length ({}) does not match n_vars ({n_vars})",
                var_names.len()
            )));
        }
        Ok(Self {
            x,
            dtype,
            obs_names,
            var_names,
            obs: Vec::new(),
            layers: BTreeMap::new(),
            spatial: None,
            uns: BTreeMap::new(),
        })
    }

    /// Number of observations (cells).
    pub fn n_obs(&self) -> usize {
        self.obs_names.len()
    }

    /// Number of features.
    pub fn n_vars(&self) -> usize {
        self.var_names.len()
    }

    /// Primary matrix.
    pub fn x(&self) -> &FeatureMatrix {
        &self.x
    }

    /// Arrow type of the primary values.
    pub fn dtype(&self) -> &DataType {
        &self.dtype
    }

    /// Observation names.
    pub fn obs_names(&self) -> &[String] {
        &self.obs_names
    }

    /// Feature names.
    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    /// Position of a feature by name.
    pub fn var_index(&self, name: &str) -> Result<usize, CellError> {
        self.var_names
            .iter()
            .position(|v| v == name)
            .ok_or_else(|| CellError::FeatureNotFound(name.to_string()))
    }

    /// Attach an annotation, replacing one with the same name.
    pub fn add_obs(&mut self, key: &str, annotation: Annotation) -> Result<(), CellError> {
        if annotation.len() != self.n_obs() {
            return Err(CellError::invalid(format!(
                "obs '{key}' length ({}) does not match n_obs ({})",
                annotation.len(),
                self.n_obs()
            )));
        }
        match self.obs.iter_mut().find(|(name, _)| name == key) {
            Some((_, existing)) => *existing = annotation,
            None => self.obs.push((key.to_string(), annotation)),
        }
        Ok(())
    }

    /// Look up an annotation by name.
    pub fn obs(&self, key: &str) -> Result<&Annotation, CellError> {
        self.obs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, annotation)| annotation)
            .ok_or_else(|| CellError::AnnotationNotFound(key.to_string()))
    }

    /// Annotation names, in the order they were added.
    pub fn obs_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.obs.iter().map(|(name, _)| name.as_str())
    }

    /// Add a new layer. Existing layers are never overwritten.
    pub fn add_layer(&mut self, key: &str, layer: FeatureMatrix) -> Result<(), CellError> {
        if self.layers.contains_key(key) {
            return Err(CellError::AlreadyExists(format!("layer {key}")));
        }
        if layer.shape() != self.x.shape() {
            let (n_obs, n_vars) = layer.shape();
            return Err(CellError::invalid(format!(
                "layer '{key}' shape ({n_obs}, {n_vars}) does not match ({}, {})",
                self.n_obs(),
                self.n_vars()
            )));
        }
        self.layers.insert(key.to_string(), layer);
        Ok(())
    }

    /// Look up a layer by name.
    pub fn layer(&self, key: &str) -> Result<&FeatureMatrix, CellError> {
        self.layers
            .get(key)
            .ok_or_else(|| CellError::LayerNotFound(key.to_string()))
    }

    /// Primary matrix when `layer` is `None`, otherwise the named layer.
    pub fn values(&self, layer: Option<&str>) -> Result<&FeatureMatrix, CellError> {
        match layer {
            Some(key) => self.layer(key),
            None => Ok(&self.x),
        }
    }

    /// Layer names, sorted.
    pub fn layer_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.layers.keys().map(String::as_str)
    }

    /// Set the per-observation spatial coordinates.
    pub fn set_spatial(&mut self, coordinates: Vec<[f32; 2]>) -> Result<(), CellError> {
        if coordinates.len() != self.n_obs() {
            return Err(CellError::invalid(format!(
                "spatial length ({}) does not match n_obs ({})",
                coordinates.len(),
                self.n_obs()
            )));
        }
        self.spatial = Some(coordinates);
        Ok(())
    }

    /// Spatial coordinates, if any.
    pub fn spatial(&self) -> Option<&[[f32; 2]]> {
        self.spatial.as_deref()
    }

    /// Store an unstructured metadata value.
    pub fn insert_uns(&mut self, key: &str, value: serde_json::Value) {
        self.uns.insert(key.to_string(), value);
    }

    /// Unstructured metadata value by key.
    pub fn uns(&self, key: &str) -> Option<&serde_json::Value> {
        self.uns.get(key)
    }

    /// Feature values as a record batch, one column per feature.
    ///
    /// The primary matrix is cast back to [`dtype`](Self::dtype), so values
    /// built from a table read back exactly. Layers are returned as `Float64`.
    pub fn to_table(&self, layer: Option<&str>) -> Result<RecordBatch, CellError> {
        let matrix = self.values(layer)?;
        let data_type = match layer {
            Some(_) => DataType::Float64,
            None => self.dtype.clone(),
        };

        let mut fields = Vec::with_capacity(self.n_vars());
        let mut columns = Vec::with_capacity(self.n_vars());
        for (name, values) in self.var_names.iter().zip(matrix.columns()) {
            let floats: ArrayRef = Arc::new(Float64Array::from(
                values
                    .iter()
                    .map(|v| (!v.is_nan()).then_some(*v))
                    .collect::<Vec<_>>(),
            ));
            let column = if data_type == DataType::Float64 {
                floats
            } else {
                cast(&floats, &data_type)?
            };
            fields.push(Field::new(name, data_type.clone(), true));
            columns.push(column);
        }

        build_batch(Arc::new(Schema::new(fields)), columns, self.n_obs())
    }

    /// Annotations as a record batch, one column per annotation.
    pub fn obs_table(&self) -> Result<RecordBatch, CellError> {
        let mut fields = Vec::with_capacity(self.obs.len());
        let mut columns = Vec::with_capacity(self.obs.len());
        for (name, annotation) in &self.obs {
            let array = annotation.to_array();
            fields.push(Field::new(name, array.data_type().clone(), true));
            columns.push(array);
        }
        build_batch(Arc::new(Schema::new(fields)), columns, self.n_obs())
    }

    /// Observations restricted to `rows`, in that order, across every block.
    pub fn take_obs(&self, rows: &[usize]) -> Result<Self, CellError> {
        if let Some(&bad) = rows.iter().find(|&&i| i >= self.n_obs()) {
            return Err(CellError::invalid(format!(
                "observation index {bad} out of bounds (n_obs={})",
                self.n_obs()
            )));
        }
        Ok(Self {
            x: self.x.take_rows(rows),
            dtype: self.dtype.clone(),
            obs_names: rows.iter().map(|&i| self.obs_names[i].clone()).collect(),
            var_names: self.var_names.clone(),
            obs: self
                .obs
                .iter()
                .map(|(name, a)| (name.clone(), a.take(rows)))
                .collect(),
            layers: self
                .layers
                .iter()
                .map(|(name, l)| (name.clone(), l.take_rows(rows)))
                .collect(),
            spatial: self
                .spatial
                .as_ref()
                .map(|s| rows.iter().map(|&i| s[i]).collect()),
            uns: self.uns.clone(),
        })
    }

    pub(crate) fn set_obs_names(&mut self, names: Vec<String>) {
        debug_assert_eq!(names.len(), self.n_obs());
        self.obs_names = names;
    }
}
