//! # cellscape
//!
//! A command-line tool for turning spatial single-cell CSV exports into
//! normalized, annotated feature matrices.
//!
//! ## Usage
//!
//! ```bash
//! # Inspect the inferred column types
//! cellscape info region_a.csv region_b.csv
//!
//! # Merge two regions, tag them by slide, rescale markers and export
//! cellscape -v ingest region_a.csv region_b.csv \
//!     --features '^CD' --annotation cell_type --spatial X_centroid Y_centroid \
//!     --annotations-file slides.csv --rescale rescaled --output cells.parquet
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
