//! # Row selection and downsampling
//!
//! Filters cells by annotation value and reduces large tables to a
//! manageable number of cells per annotation group.
//!
//! Groups are formed in the order their label first appears; rows with a
//! missing label belong to no group and are never sampled.

use std::collections::HashSet;

use arrow::array::BooleanArray;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::CellError;
use crate::group::group_rows;
use crate::table::Table;

/// Keep rows whose `annotation` value is one of `values`.
///
/// Values are compared by string rendering. Row order and index labels are
/// preserved. An empty table is returned as-is without checking
/// `annotation`; `values == None` returns the table unchanged. A filter that
/// keeps nothing logs a warning and returns the empty table.
pub fn select_values<S: AsRef<str>>(
    data: &Table,
    annotation: &str,
    values: Option<&[S]>,
) -> Result<Table, CellError> {
    if data.is_empty() {
        return Ok(data.clone());
    }
    if !data.has_column(annotation) {
        return Err(CellError::ColumnNotFound(annotation.to_string()));
    }
    let Some(values) = values else {
        return Ok(data.clone());
    };

    let wanted: HashSet<&str> = values.iter().map(AsRef::as_ref).collect();
    let mask: BooleanArray = data
        .labels(annotation)?
        .iter()
        .map(|label| Some(label.as_deref().is_some_and(|l| wanted.contains(l))))
        .collect();

    let filtered = data.filter(&mask)?;
    if filtered.is_empty() {
        warn!("No matching values found in the data.");
    }
    Ok(filtered)
}

/// How [`downsample_cells`] picks rows
#[derive(Debug, Clone, Default)]
pub struct DownsampleOptions {
    /// Cells per group (unstratified) or in total (stratified); `None` keeps all
    pub n_samples: Option<usize>,
    /// Split `n_samples` across groups in proportion to their size
    pub stratify: bool,
    /// With `stratify`, pick rows uniformly at random instead of the first ones
    pub random: bool,
    /// Seed for the random pick; fresh entropy when `None`
    pub seed: Option<u64>,
}

impl DownsampleOptions {
    /// At most `n_samples` rows from every group.
    pub fn per_group(n_samples: usize) -> Self {
        Self {
            n_samples: Some(n_samples),
            ..Default::default()
        }
    }

    /// About `n_samples` rows in total, split by group frequency.
    pub fn stratified(n_samples: usize) -> Self {
        Self {
            n_samples: Some(n_samples),
            stratify: true,
            ..Default::default()
        }
    }

    /// Pick stratified rows at random.
    pub fn random(mut self, seed: Option<u64>) -> Self {
        self.random = true;
        self.seed = seed;
        self
    }
}

/// Reduce the number of cells per `annotation` group.
///
/// Unstratified: the first `min(n_samples, group size)` rows of every group,
/// with the index reset to `0..n`.
///
/// Stratified: each group gets `floor(group size * n_samples / total)` rows,
/// where `total` counts rows with a non-missing label. Each share is
/// truncated on its own, so the result can fall short of `n_samples`.
/// Original index labels are kept.
pub fn downsample_cells(
    data: &Table,
    annotation: &str,
    options: &DownsampleOptions,
) -> Result<Table, CellError> {
    if !data.has_column(annotation) {
        return Err(CellError::ColumnNotFound(annotation.to_string()));
    }

    let Some(n_samples) = options.n_samples else {
        info!("Number of rows in the returned data: {}", data.num_rows());
        return Ok(data.clone());
    };

    let labels = data.labels(annotation)?;
    let groups = group_rows(&labels, false);

    let result = if options.stratify {
        let total: usize = groups.iter().map(|g| g.rows.len()).sum();
        let mut rng = options
            .random
            .then(|| options.seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64));

        // Shares at or above a group's size are capped anyway.
        let n = n_samples.min(total);
        let mut rows = Vec::new();
        for group in &groups {
            let share = group.rows.len() * n / total;
            let take = share.min(group.rows.len());
            match rng.as_mut() {
                Some(rng) => {
                    let mut picked: Vec<usize> =
                        rand::seq::index::sample(rng, group.rows.len(), take)
                            .into_iter()
                            .collect();
                    picked.sort_unstable();
                    rows.extend(picked.into_iter().map(|i| group.rows[i]));
                }
                None => rows.extend_from_slice(&group.rows[..take]),
            }
        }
        data.take(&rows)?
    } else {
        let rows: Vec<usize> = groups
            .iter()
            .flat_map(|g| g.rows.iter().copied().take(n_samples))
            .collect();
        data.take(&rows)?.reset_index()
    };

    info!("Number of rows in the returned data: {}", result.num_rows());
    Ok(result)
}
