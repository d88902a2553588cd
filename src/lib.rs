//! # cellscape - Spatial Single-Cell Table Ingestion
//!
//! `cellscape` turns the per-cell measurement tables exported by spatial
//! imaging pipelines (one row per cell, one column per marker intensity,
//! coordinate or label) into annotated feature matrices ready for analysis.
//!
//! ## Key Features
//!
//! - **Schema-checked ingestion**: many CSV exports read into Arrow tables,
//!   with every file required to carry the same column set as the first.
//!
//! - **Per-file annotations**: slide, patient or region labels attached to
//!   every row of a file from an annotation index table.
//!
//! - **Annotated matrices**: regex feature selection, categorical
//!   annotations, spatial coordinates and named layers kept row-aligned.
//!
//! - **Normalization**: quantile clipping with min-max rescaling, and
//!   background subtraction globally or per region.
//!
//! - **Table utilities**: label remapping, value filters, per-group and
//!   stratified downsampling, centroids and one-hot collapsing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cellscape::ingest::{combine_tables, load_csv_files, FileAnnotations};
//! use cellscape::matrix::MatrixBuilder;
//! use cellscape::normalize::{add_rescaled_features, QuantileRange};
//!
//! let loaded = load_csv_files(["slide1.csv", "slide2.csv"])?;
//!
//! let mut annotations = FileAnnotations::new(vec!["slide".to_string()]);
//! annotations.insert("slide1.csv", vec!["S1".to_string()])?;
//! annotations.insert("slide2.csv", vec!["S2".to_string()])?;
//! let table = combine_tables(&loaded, &annotations)?;
//!
//! let mut adata = MatrixBuilder::new(&table)
//!     .feature("^CD")
//!     .spatial("X_centroid", "Y_centroid")
//!     .annotation("slide")
//!     .build()?;
//!
//! add_rescaled_features(&mut adata, QuantileRange::default(), "rescaled")?;
//! # Ok::<(), cellscape::CellError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`table`]: Arrow-backed tables with a row index
//! - [`ingest`]: CSV loading, schema checks and per-file annotations
//! - [`matrix`]: annotated feature matrices, builder and concatenation
//! - [`normalize`]: quantile rescaling and background subtraction
//! - [`selection`]: value filters and downsampling
//! - [`mapping`], [`geometry`], [`categorical`]: column derivations
//! - [`summary`]: per-group means, intensity thresholds and flow counts
//! - [`export`]: CSV and Parquet output

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod categorical;
pub mod error;
pub mod export;
pub mod geometry;
pub mod ingest;
pub mod mapping;
pub mod matrix;
pub mod normalize;
pub mod pattern;
pub mod selection;
pub mod summary;
pub mod table;

mod group;

pub use error::{CellError, ErrorKind};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::categorical::bin2cat;
    pub use crate::error::{CellError, ErrorKind};
    pub use crate::export::{write_matrix, write_table, ExportConfig};
    pub use crate::geometry::{calculate_centroid, BoundingBox};
    pub use crate::ingest::{combine_tables, load_csv_file, load_csv_files, FileAnnotations, LoadedTable};
    pub use crate::mapping::{append_observation, MappingRule, NOT_MAPPED};
    pub use crate::matrix::{concatenate, AnnotatedMatrix, Annotation, FeatureMatrix, MatrixBuilder};
    pub use crate::normalize::{
        add_rescaled_features, rescale_features, subtract_min_per_region, subtract_min_quantile,
        QuantileRange,
    };
    pub use crate::pattern::regex_search_list;
    pub use crate::selection::{downsample_cells, select_values, DownsampleOptions};
    pub use crate::summary::{
        group_means, sankey_flows, threshold_heatmap_table, threshold_intensity, FeatureCutoffs,
        GroupMeans, SankeyFlows,
    };
    pub use crate::table::Table;
}
