//! # Feature normalization
//!
//! Quantile-based rescaling and background subtraction of feature matrices.
//! Results are always written to new layers; the primary matrix and existing
//! layers are never modified.

use log::{debug, info};

use crate::error::CellError;
use crate::group::group_rows;
use crate::matrix::{AnnotatedMatrix, FeatureMatrix};

/// Quantile of `values`, ignoring NaN.
///
/// Uses linear interpolation between the two closest ranks at position
/// `(n - 1) * q`. Returns NaN when there is no finite value.
///
/// ```
/// use cellscape::normalize::quantile;
///
/// assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.5), 3.0);
/// assert_eq!(quantile(&[0.0, 10.0], 0.25), 2.5);
/// assert!(quantile(&[f64::NAN], 0.5).is_nan());
/// ```
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);

    let position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Lower and upper quantiles used to clip before rescaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileRange {
    /// Lower quantile, in `[0, 1]`
    pub min: f64,
    /// Upper quantile, in `[min, 1]`
    pub max: f64,
}

impl Default for QuantileRange {
    fn default() -> Self {
        Self {
            min: 0.01,
            max: 0.99,
        }
    }
}

impl QuantileRange {
    /// Create a validated range.
    pub fn new(min: f64, max: f64) -> Result<Self, CellError> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    /// Check that both bounds are in `[0, 1]` and `min <= max`.
    pub fn validate(&self) -> Result<(), CellError> {
        check_quantile("min_quantile", self.min)?;
        check_quantile("max_quantile", self.max)?;
        if self.min > self.max {
            return Err(CellError::invalid(format!(
                "min_quantile ({}) must not exceed max_quantile ({})",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

fn check_quantile(name: &str, q: f64) -> Result<(), CellError> {
    if !(0.0..=1.0).contains(&q) {
        return Err(CellError::invalid(format!(
            "{name} must be between 0 and 1, got {q}"
        )));
    }
    Ok(())
}

/// Clip every column to its quantile range, then scale it to `[0, 1]`.
///
/// A column that is constant after clipping maps every value to `0.0`.
/// NaN values stay NaN.
pub fn rescale_features(matrix: &FeatureMatrix, range: QuantileRange) -> Result<FeatureMatrix, CellError> {
    range.validate()?;
    Ok(matrix.map_columns(|column| rescale_column(column, range)))
}

fn rescale_column(column: &[f64], range: QuantileRange) -> Vec<f64> {
    let low = quantile(column, range.min);
    let high = quantile(column, range.max);
    let span = high - low;

    column
        .iter()
        .map(|&v| {
            if v.is_nan() {
                v
            } else if span > 0.0 {
                (v.clamp(low, high) - low) / span
            } else {
                0.0
            }
        })
        .collect()
}

/// Rescale the primary matrix into a new layer.
pub fn add_rescaled_features(
    adata: &mut AnnotatedMatrix,
    range: QuantileRange,
    layer: &str,
) -> Result<(), CellError> {
    if adata.layer(layer).is_ok() {
        return Err(CellError::AlreadyExists(format!("layer {layer}")));
    }
    let rescaled = rescale_features(adata.x(), range)?;
    adata.add_layer(layer, rescaled)?;
    info!(
        "Rescaled {} features into layer '{layer}' (quantiles {}..{})",
        adata.n_vars(),
        range.min,
        range.max
    );
    Ok(())
}

/// Subtract each column's `min_quantile` value and clip negatives to zero.
pub fn subtract_min_quantile(matrix: &FeatureMatrix, min_quantile: f64) -> Result<FeatureMatrix, CellError> {
    check_quantile("min_quantile", min_quantile)?;
    Ok(matrix.map_columns(|column| {
        let floor = quantile(column, min_quantile);
        column
            .iter()
            .map(|&v| if v.is_nan() { v } else { (v - floor).max(0.0) })
            .collect()
    }))
}

/// Background-subtract the primary matrix separately within each annotation
/// group and store the result in a new layer.
///
/// Rows with a missing label form a group of their own. The layer stays
/// row-aligned with the primary matrix.
pub fn subtract_min_per_region(
    adata: &mut AnnotatedMatrix,
    annotation: &str,
    layer: &str,
    min_quantile: f64,
) -> Result<(), CellError> {
    let labels = adata.obs(annotation)?.labels();
    if adata.layer(layer).is_ok() {
        return Err(CellError::AlreadyExists(format!("layer {layer}")));
    }
    check_quantile("min_quantile", min_quantile)?;

    let (n_obs, n_vars) = adata.x().shape();
    let mut columns = vec![vec![f64::NAN; n_obs]; n_vars];
    let groups = group_rows(&labels, true);
    for group in &groups {
        let subtracted = subtract_min_quantile(&adata.x().take_rows(&group.rows), min_quantile)?;
        for (target, values) in columns.iter_mut().zip(subtracted.columns()) {
            for (&row, &value) in group.rows.iter().zip(values) {
                target[row] = value;
            }
        }
        debug!(
            "Subtracted quantile {min_quantile} within '{}' ({} cells)",
            group.label.as_deref().unwrap_or("<missing>"),
            group.rows.len()
        );
    }

    adata.add_layer(layer, FeatureMatrix::from_columns(n_obs, columns)?)?;
    info!(
        "Wrote layer '{layer}' from {} '{annotation}' groups",
        groups.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Annotation;
    use arrow::datatypes::DataType;
    use proptest::prelude::*;

    fn adata(columns: Vec<Vec<f64>>) -> AnnotatedMatrix {
        let n_obs = columns[0].len();
        let n_vars = columns.len();
        let x = FeatureMatrix::from_columns(n_obs, columns).unwrap();
        AnnotatedMatrix::new(
            x,
            DataType::Float64,
            (0..n_obs).map(|i| i.to_string()).collect(),
            (0..n_vars).map(|j| format!("f{j}")).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
        assert!((quantile(&values, 0.5) - 2.5).abs() < 1e-12);
        assert_eq!(quantile(&[f64::NAN, 7.0], 0.3), 7.0);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_quantile_range_validation() {
        assert!(QuantileRange::new(0.1, 0.9).is_ok());
        assert!(QuantileRange::new(-0.1, 0.9).is_err());
        assert!(QuantileRange::new(0.1, 1.5).is_err());
        let err = QuantileRange::new(0.8, 0.2).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_rescale_full_range() {
        let m = FeatureMatrix::from_columns(3, vec![vec![0.0, 5.0, 10.0]]).unwrap();
        let out = rescale_features(&m, QuantileRange::new(0.0, 1.0).unwrap()).unwrap();
        assert_eq!(out.column(0), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_rescale_clips_outliers() {
        let mut values: Vec<f64> = (0..100).map(f64::from).collect();
        values.push(10_000.0);
        let m = FeatureMatrix::from_columns(values.len(), vec![values]).unwrap();
        let out = rescale_features(&m, QuantileRange::default()).unwrap();
        let column = out.column(0);
        assert_eq!(column[100], 1.0);
        assert_eq!(column[0], 0.0);
        assert!(column.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_rescale_constant_column_is_zero() {
        let m = FeatureMatrix::from_columns(3, vec![vec![4.0, 4.0, f64::NAN]]).unwrap();
        let out = rescale_features(&m, QuantileRange::default()).unwrap();
        assert_eq!(&out.column(0)[..2], &[0.0, 0.0]);
        assert!(out.column(0)[2].is_nan());
    }

    #[test]
    fn test_add_rescaled_features_writes_layer() {
        let mut a = adata(vec![vec![1.0, 2.0, 3.0], vec![9.0, 9.0, 9.0]]);
        let before = a.x().clone();
        add_rescaled_features(&mut a, QuantileRange::new(0.0, 1.0).unwrap(), "scaled").unwrap();

        assert_eq!(a.x(), &before);
        assert_eq!(a.layer("scaled").unwrap().column(0), &[0.0, 0.5, 1.0]);

        let err = add_rescaled_features(&mut a, QuantileRange::default(), "scaled").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_subtract_min_quantile_clips_at_zero() {
        let m = FeatureMatrix::from_columns(4, vec![vec![2.0, 3.0, 5.0, 10.0]]).unwrap();
        let out = subtract_min_quantile(&m, 0.0).unwrap();
        assert_eq!(out.column(0), &[0.0, 1.0, 3.0, 8.0]);

        let out = subtract_min_quantile(&m, 0.5).unwrap();
        assert_eq!(out.column(0), &[0.0, 0.0, 1.0, 6.0]);
    }

    #[test]
    fn test_subtract_min_per_region_scatters_back() {
        let mut a = adata(vec![vec![10.0, 1.0, 12.0, 3.0, 7.0]]);
        let regions = ["r1", "r2", "r1", "r2"]
            .iter()
            .map(|s| Some(s.to_string()))
            .chain(std::iter::once(None))
            .collect();
        a.add_obs("region", Annotation::Categorical(regions)).unwrap();

        subtract_min_per_region(&mut a, "region", "bg", 0.0).unwrap();
        assert_eq!(a.layer("bg").unwrap().column(0), &[0.0, 0.0, 2.0, 2.0, 0.0]);
        assert_eq!(a.x().column(0), &[10.0, 1.0, 12.0, 3.0, 7.0]);
    }

    #[test]
    fn test_subtract_min_per_region_errors() {
        let mut a = adata(vec![vec![1.0, 2.0]]);
        let err = subtract_min_per_region(&mut a, "missing", "bg", 0.0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);

        a.add_obs("region", Annotation::Categorical(vec![None, None])).unwrap();
        a.add_layer("bg", a.x().clone()).unwrap();
        let err = subtract_min_per_region(&mut a, "region", "bg", 0.0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::AlreadyExists);
    }

    proptest! {
        #[test]
        fn prop_rescaled_values_in_unit_interval(
            values in prop::collection::vec(-1.0e6f64..1.0e6, 1..64),
            low in 0.0f64..0.5,
            high in 0.5f64..=1.0,
        ) {
            let m = FeatureMatrix::from_columns(values.len(), vec![values]).unwrap();
            let out = rescale_features(&m, QuantileRange::new(low, high).unwrap()).unwrap();
            for v in out.column(0) {
                prop_assert!((0.0..=1.0).contains(v));
            }
        }

        #[test]
        fn prop_subtracted_values_non_negative(
            values in prop::collection::vec(-1.0e6f64..1.0e6, 1..64),
            q in 0.0f64..=1.0,
        ) {
            let m = FeatureMatrix::from_columns(values.len(), vec![values]).unwrap();
            let out = subtract_min_quantile(&m, q).unwrap();
            prop_assert!(out.column(0).iter().all(|v| *v >= 0.0));
        }
    }
}
