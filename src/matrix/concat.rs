use std::collections::{BTreeMap, HashSet};

use arrow::datatypes::DataType;
use log::{debug, info};

use super::{AnnotatedMatrix, Annotation, FeatureMatrix};
use crate::error::CellError;

/// Stack matrices along the observation axis and make names unique.
///
/// Inputs keep their order. Only what every input shares survives: features
/// common to all (in the first input's order), layers present in all,
/// annotations present in all, and spatial coordinates when all have them.
/// Observation names are then passed through [`make_unique`].
pub fn concatenate(regions: &[AnnotatedMatrix]) -> Result<AnnotatedMatrix, CellError> {
    let Some(first) = regions.first() else {
        return Err(CellError::invalid("no matrices to concatenate"));
    };

    let var_names: Vec<String> = first
        .var_names()
        .iter()
        .filter(|name| regions.iter().all(|r| r.var_names().contains(*name)))
        .cloned()
        .collect();
    if var_names.len() < first.n_vars() {
        debug!(
            "Dropping {} features not shared by every matrix",
            first.n_vars() - var_names.len()
        );
    }

    // Per input, the positions of the shared features.
    let positions = regions
        .iter()
        .map(|r| {
            var_names
                .iter()
                .map(|name| r.var_index(name))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let n_obs: usize = regions.iter().map(AnnotatedMatrix::n_obs).sum();
    let primaries: Vec<&FeatureMatrix> = regions.iter().map(AnnotatedMatrix::x).collect();
    let x = stack_features(&primaries, &positions, n_obs)?;
    let dtype = if regions.iter().all(|r| r.dtype() == first.dtype()) {
        first.dtype().clone()
    } else {
        DataType::Float64
    };
    let obs_names: Vec<String> = regions
        .iter()
        .flat_map(|r| r.obs_names().iter().cloned())
        .collect();

    let mut merged = AnnotatedMatrix::new(x, dtype, obs_names, var_names.clone())?;

    for key in first.layer_keys() {
        if regions.iter().all(|r| r.layer(key).is_ok()) {
            let parts = regions
                .iter()
                .map(|r| r.layer(key))
                .collect::<Result<Vec<_>, _>>()?;
            merged.add_layer(key, stack_features(&parts, &positions, n_obs)?)?;
        }
    }

    for key in first.obs_keys() {
        let parts = regions
            .iter()
            .map(|r| r.obs(key).ok())
            .collect::<Option<Vec<&Annotation>>>();
        if let Some(parts) = parts {
            merged.add_obs(key, concat_annotations(&parts))?;
        }
    }

    if regions.iter().all(|r| r.spatial().is_some()) {
        let coordinates = regions
            .iter()
            .filter_map(AnnotatedMatrix::spatial)
            .flat_map(|s| s.iter().copied())
            .collect();
        merged.set_spatial(coordinates)?;
    }

    let mut uns: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    for region in regions.iter().rev() {
        uns.extend(region.uns.clone());
    }
    merged.uns = uns;

    let unique = make_unique(merged.obs_names());
    merged.set_obs_names(unique);

    info!(
        "Concatenated {} matrices into {} observations x {} features",
        regions.len(),
        merged.n_obs(),
        merged.n_vars()
    );
    Ok(merged)
}

fn stack_features(
    parts: &[&FeatureMatrix],
    positions: &[Vec<usize>],
    n_obs: usize,
) -> Result<FeatureMatrix, CellError> {
    let n_vars = positions.first().map_or(0, Vec::len);
    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(n_obs); n_vars];
    for (matrix, vars) in parts.iter().zip(positions) {
        for (column, &j) in columns.iter_mut().zip(vars) {
            column.extend_from_slice(matrix.column(j));
        }
    }
    FeatureMatrix::from_columns(n_obs, columns)
}

fn concat_annotations(parts: &[&Annotation]) -> Annotation {
    if parts.iter().all(|p| matches!(p, Annotation::Numeric(_))) {
        let mut values = Vec::new();
        for part in parts {
            if let Annotation::Numeric(v) = part {
                values.extend_from_slice(v);
            }
        }
        Annotation::Numeric(values)
    } else {
        Annotation::Categorical(parts.iter().flat_map(|p| p.labels()).collect())
    }
}

/// Make names unique by suffixing repeats.
///
/// The first occurrence keeps its name; later ones become `name-1`,
/// `name-2`, ... skipping any candidate that is already taken.
///
/// ```
/// use cellscape::matrix::make_unique;
///
/// let names: Vec<String> = ["0", "1", "0", "0-1", "0"].iter().map(|s| s.to_string()).collect();
/// assert_eq!(make_unique(&names), vec!["0", "1", "0-2", "0-1", "0-3"]);
/// ```
pub fn make_unique(names: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut counters: BTreeMap<&str, usize> = BTreeMap::new();
    let mut unique = Vec::with_capacity(names.len());

    for name in names {
        if seen.insert(name.as_str()) {
            unique.push(name.clone());
            continue;
        }
        let counter = counters.entry(name.as_str()).or_insert(0);
        let candidate = loop {
            *counter += 1;
            let candidate = format!("{name}-{counter}");
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(candidate.clone());
        unique.push(candidate);
    }

    unique
}
