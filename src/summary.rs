//! # Per-group summaries
//!
//! Table-shaped summaries of an [`AnnotatedMatrix`] that plots are usually
//! drawn from: mean feature values per annotation label, intensity levels
//! derived from per-feature cutoffs, and label-to-label flow counts between
//! two annotations.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::CellError;
use crate::group::group_rows;
use crate::matrix::{AnnotatedMatrix, FeatureMatrix};

/// Mean feature values per annotation label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMeans {
    /// Annotation labels, sorted
    pub labels: Vec<String>,
    /// Feature names, in matrix order
    pub features: Vec<String>,
    /// `means[i][j]`: mean of feature `j` over cells labeled `labels[i]`
    pub means: Vec<Vec<f64>>,
}

impl GroupMeans {
    /// Mean for one label and feature, if both are present.
    pub fn get(&self, label: &str, feature: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == label)?;
        let j = self.features.iter().position(|f| f == feature)?;
        Some(self.means[i][j])
    }
}

/// Mean of every feature per `annotation` label.
///
/// Cells with a missing label are skipped, as are NaN values.
pub fn group_means(
    adata: &AnnotatedMatrix,
    annotation: &str,
    layer: Option<&str>,
) -> Result<GroupMeans, CellError> {
    let labels = adata.obs(annotation)?.labels();
    let matrix = adata.values(layer)?;
    Ok(means_by_label(&labels, matrix, adata.var_names().to_vec()))
}

fn means_by_label(labels: &[Option<String>], matrix: &FeatureMatrix, features: Vec<String>) -> GroupMeans {
    let mut groups = group_rows(labels, false);
    groups.sort_by(|a, b| a.label.cmp(&b.label));

    let means = groups
        .iter()
        .map(|group| {
            matrix
                .columns()
                .map(|column| nan_mean(group.rows.iter().map(|&i| column[i])))
                .collect()
        })
        .collect();

    GroupMeans {
        labels: groups.into_iter().filter_map(|g| g.label).collect(),
        features,
        means,
    }
}

fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Low and high intensity cutoffs for one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cutoff {
    /// Values at or below are level 0
    pub low: f64,
    /// Values above `low` and at or below are level 1; above are level 2
    pub high: f64,
}

impl Cutoff {
    /// Intensity level of `value`; NaN stays NaN.
    pub fn level(&self, value: f64) -> f64 {
        if value.is_nan() {
            f64::NAN
        } else if value <= self.low {
            0.0
        } else if value <= self.high {
            1.0
        } else {
            2.0
        }
    }
}

/// Per-feature intensity cutoffs, keyed by feature name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureCutoffs {
    cutoffs: BTreeMap<String, Cutoff>,
}

impl FeatureCutoffs {
    /// Empty set of cutoffs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the cutoffs for `feature`. NaN cutoffs are rejected.
    pub fn insert(&mut self, feature: &str, low: f64, high: f64) -> Result<&mut Self, CellError> {
        if low.is_nan() {
            return Err(CellError::invalid(format!(
                "Low cutoff for {feature} should not be NaN."
            )));
        }
        if high.is_nan() {
            return Err(CellError::invalid(format!(
                "High cutoff for {feature} should not be NaN."
            )));
        }
        self.cutoffs.insert(feature.to_string(), Cutoff { low, high });
        Ok(self)
    }

    /// Cutoffs for one feature.
    pub fn get(&self, feature: &str) -> Option<&Cutoff> {
        self.cutoffs.get(feature)
    }

    /// Features and their cutoffs, sorted by feature name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cutoff)> + '_ {
        self.cutoffs.iter().map(|(name, cutoff)| (name.as_str(), cutoff))
    }

    /// Number of features with cutoffs.
    pub fn len(&self) -> usize {
        self.cutoffs.len()
    }

    /// True when no feature has cutoffs.
    pub fn is_empty(&self) -> bool {
        self.cutoffs.is_empty()
    }

    fn check_features(&self, adata: &AnnotatedMatrix) -> Result<(), CellError> {
        for feature in self.cutoffs.keys() {
            adata.var_index(feature)?;
        }
        Ok(())
    }
}

/// Bin the primary matrix into intensity levels 0, 1 and 2 and store them
/// as a new layer.
///
/// Features without cutoffs are NaN in the layer. The cutoffs are recorded
/// under `uns["feature_cutoffs"]`.
pub fn threshold_intensity(
    adata: &mut AnnotatedMatrix,
    cutoffs: &FeatureCutoffs,
    layer: &str,
) -> Result<(), CellError> {
    cutoffs.check_features(adata)?;
    if adata.layer(layer).is_ok() {
        return Err(CellError::AlreadyExists(format!("layer {layer}")));
    }

    let levels = intensity_levels(adata.x(), adata.var_names(), cutoffs);
    adata.add_layer(layer, levels)?;
    adata.insert_uns("feature_cutoffs", serde_json::to_value(cutoffs)?);
    info!(
        "Wrote intensity layer '{layer}' for {} of {} features",
        cutoffs.len(),
        adata.n_vars()
    );
    Ok(())
}

fn intensity_levels(matrix: &FeatureMatrix, var_names: &[String], cutoffs: &FeatureCutoffs) -> FeatureMatrix {
    let mut names = var_names.iter();
    matrix.map_columns(|column| {
        let cutoff = names.next().and_then(|name| cutoffs.get(name));
        match cutoff {
            Some(cutoff) => column.iter().map(|&v| cutoff.level(v)).collect(),
            None => vec![f64::NAN; column.len()],
        }
    })
}

/// Mean intensity level per `annotation` label for every feature with
/// cutoffs.
///
/// Features appear in cutoff order (sorted by name). The matrix is not
/// modified.
pub fn threshold_heatmap_table(
    adata: &AnnotatedMatrix,
    cutoffs: &FeatureCutoffs,
    annotation: &str,
) -> Result<GroupMeans, CellError> {
    let labels = adata.obs(annotation)?.labels();
    cutoffs.check_features(adata)?;

    let mut positions = Vec::with_capacity(cutoffs.len());
    let mut features = Vec::with_capacity(cutoffs.len());
    for (feature, _) in cutoffs.iter() {
        positions.push(adata.var_index(feature)?);
        features.push(feature.to_string());
    }
    let selected = adata.x().take_columns(&positions);
    let levels = intensity_levels(&selected, &features, cutoffs);

    debug!(
        "Computing threshold levels for {} features over '{annotation}'",
        features.len()
    );
    Ok(means_by_label(&labels, &levels, features))
}

/// One flow between a source and a target node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SankeyLink {
    /// Position of the source node in [`SankeyFlows::labels`]
    pub source: usize,
    /// Position of the target node in [`SankeyFlows::labels`]
    pub target: usize,
    /// Number of cells with this label pair
    pub value: usize,
}

/// Nodes and weighted links between the labels of two annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SankeyFlows {
    /// `Source_<label>` nodes, then `Target_<label>` nodes, each sorted
    pub labels: Vec<String>,
    /// One link per observed label pair
    pub links: Vec<SankeyLink>,
}

/// Count cells for every (source label, target label) pair.
///
/// Cells missing either label are skipped.
pub fn sankey_flows(adata: &AnnotatedMatrix, source: &str, target: &str) -> Result<SankeyFlows, CellError> {
    let source_labels = adata.obs(source)?.labels();
    let target_labels = adata.obs(target)?.labels();

    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for (s, t) in source_labels.iter().zip(&target_labels) {
        if let (Some(s), Some(t)) = (s, t) {
            *counts.entry((s.as_str(), t.as_str())).or_insert(0) += 1;
        }
    }

    let sources: Vec<&str> = sorted_unique(counts.keys().map(|(s, _)| *s));
    let targets: Vec<&str> = sorted_unique(counts.keys().map(|(_, t)| *t));

    let mut labels: Vec<String> = sources.iter().map(|s| format!("Source_{s}")).collect();
    labels.extend(targets.iter().map(|t| format!("Target_{t}")));

    let links = counts
        .iter()
        .filter_map(|(&(s, t), &value)| {
            let source = sources.binary_search(&s).ok()?;
            let target = sources.len() + targets.binary_search(&t).ok()?;
            Some(SankeyLink {
                source,
                target,
                value,
            })
        })
        .collect();

    Ok(SankeyFlows { labels, links })
}

fn sorted_unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut values: Vec<&str> = values.collect();
    values.sort_unstable();
    values.dedup();
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Annotation;
    use arrow::datatypes::DataType;

    fn labels(values: &[&str]) -> Annotation {
        Annotation::Categorical(values.iter().map(|s| Some(s.to_string())).collect())
    }

    fn sample() -> AnnotatedMatrix {
        let x = FeatureMatrix::from_columns(
            4,
            vec![vec![1.0, 3.0, 10.0, 20.0], vec![0.5, 5.0, 9.0, f64::NAN]],
        )
        .unwrap();
        let mut adata = AnnotatedMatrix::new(
            x,
            DataType::Float64,
            (0..4).map(|i| i.to_string()).collect(),
            vec!["CD4".into(), "CD8".into()],
        )
        .unwrap();
        adata.add_obs("region", labels(&["b", "b", "a", "a"])).unwrap();
        adata.add_obs("type", labels(&["t1", "t2", "t1", "t1"])).unwrap();
        adata
    }

    #[test]
    fn test_group_means_sorted_and_nan_skipped() {
        let means = group_means(&sample(), "region", None).unwrap();
        assert_eq!(means.labels, vec!["a", "b"]);
        assert_eq!(means.get("a", "CD4"), Some(15.0));
        assert_eq!(means.get("a", "CD8"), Some(9.0));
        assert_eq!(means.get("b", "CD4"), Some(2.0));
    }

    #[test]
    fn test_group_means_missing_inputs() {
        let adata = sample();
        let err = group_means(&adata, "nope", None).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
        let err = group_means(&adata, "region", Some("nope")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }

    #[test]
    fn test_cutoffs_reject_nan() {
        let mut cutoffs = FeatureCutoffs::new();
        let err = cutoffs.insert("CD4", f64::NAN, 1.0).unwrap_err();
        assert!(err.to_string().contains("Low cutoff for CD4"));
        let err = cutoffs.insert("CD4", 0.0, f64::NAN).unwrap_err();
        assert!(err.to_string().contains("High cutoff for CD4"));
        assert!(cutoffs.is_empty());
    }

    #[test]
    fn test_threshold_intensity_layer() {
        let mut adata = sample();
        let mut cutoffs = FeatureCutoffs::new();
        cutoffs.insert("CD4", 2.0, 10.0).unwrap();
        threshold_intensity(&mut adata, &cutoffs, "intensity").unwrap();

        let layer = adata.layer("intensity").unwrap();
        assert_eq!(layer.column(0), &[0.0, 1.0, 1.0, 2.0]);
        assert!(layer.column(1).iter().all(|v| v.is_nan()));
        assert_eq!(
            adata.uns("feature_cutoffs"),
            Some(&serde_json::json!({"CD4": {"low": 2.0, "high": 10.0}}))
        );
    }

    #[test]
    fn test_threshold_unknown_feature() {
        let mut adata = sample();
        let mut cutoffs = FeatureCutoffs::new();
        cutoffs.insert("CD99", 0.0, 1.0).unwrap();
        let err = threshold_intensity(&mut adata, &cutoffs, "intensity").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
        assert!(adata.layer("intensity").is_err());
    }

    #[test]
    fn test_threshold_heatmap_table() {
        let adata = sample();
        let mut cutoffs = FeatureCutoffs::new();
        cutoffs.insert("CD8", 1.0, 6.0).unwrap();

        let table = threshold_heatmap_table(&adata, &cutoffs, "region").unwrap();
        assert_eq!(table.features, vec!["CD8"]);
        assert_eq!(table.get("a", "CD8"), Some(2.0));
        assert_eq!(table.get("b", "CD8"), Some(0.5));

        let err = threshold_heatmap_table(&adata, &cutoffs, "missing").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }

    #[test]
    fn test_sankey_flows() {
        let x = FeatureMatrix::from_columns(10, vec![vec![0.0; 10]]).unwrap();
        let mut adata = AnnotatedMatrix::new(
            x,
            DataType::Float64,
            (0..10).map(|i| format!("cell_{i}")).collect(),
            vec!["f".into()],
        )
        .unwrap();
        let sources: Vec<&str> = ["source1", "source2"].repeat(5);
        let targets: Vec<&str> = ["target1", "target2"].repeat(5);
        adata.add_obs("source_annotation", labels(&sources)).unwrap();
        adata.add_obs("target_annotation", labels(&targets)).unwrap();

        let flows = sankey_flows(&adata, "source_annotation", "target_annotation").unwrap();
        assert_eq!(
            flows.labels,
            vec!["Source_source1", "Source_source2", "Target_target1", "Target_target2"]
        );
        assert_eq!(
            flows.links,
            vec![
                SankeyLink { source: 0, target: 2, value: 5 },
                SankeyLink { source: 1, target: 3, value: 5 },
            ]
        );

        let err = sankey_flows(&adata, "invalid", "target_annotation").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }
}
