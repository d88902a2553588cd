use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod info;
mod ingest;

/// cellscape - Spatial single-cell table ingestion and normalization
#[derive(Parser)]
#[command(name = "cellscape")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load CSV exports, build an annotated matrix and normalize it
    Ingest(IngestArgs),

    /// Show the column schema of CSV exports
    Info {
        /// Input CSV files (must share one column set)
        #[arg(value_name = "CSV", required = true)]
        files: Vec<PathBuf>,
    },
}

/// Arguments of the `ingest` command
#[derive(Args, Debug, Default)]
pub struct IngestArgs {
    /// Input CSV files (must share one column set)
    #[arg(value_name = "CSV", required = true)]
    pub files: Vec<PathBuf>,

    /// Feature-name regexes (repeatable)
    #[arg(short = 'f', long = "features", value_name = "REGEX", num_args = 1..)]
    pub features: Vec<String>,

    /// Columns copied as categorical annotations (repeatable)
    #[arg(short = 'a', long = "annotation", value_name = "COL")]
    pub annotations: Vec<String>,

    /// Columns holding the x and y coordinates
    #[arg(long, value_names = ["X", "Y"], num_args = 2)]
    pub spatial: Option<Vec<String>>,

    /// CSV with one row per input file: path, then annotation values
    #[arg(long, value_name = "FILE")]
    pub annotations_file: Option<PathBuf>,

    /// Rescale features into this layer
    #[arg(long, value_name = "LAYER")]
    pub rescale: Option<String>,

    /// Subtract the per-group minimum quantile within each value of this annotation
    #[arg(long, value_name = "COL")]
    pub subtract_min_by: Option<String>,

    /// Lower clipping quantile (default 0.01)
    #[arg(long)]
    pub min_quantile: Option<f64>,

    /// Upper clipping quantile (default 0.99)
    #[arg(long)]
    pub max_quantile: Option<f64>,

    /// Write the resulting matrix (.csv or .parquet)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Number of `-v` flags given.
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

/// Initialize `env_logger` at warn, info or debug level; `RUST_LOG` overrides.
pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

/// Run the selected command.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest(args) => ingest::run(args),
        Commands::Info { files } => info::run(files),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::try_parse_from([
            "cellscape",
            "-vv",
            "ingest",
            "a.csv",
            "b.csv",
            "--features",
            "^CD",
            "DAPI",
            "--annotation",
            "cell_type",
            "--spatial",
            "X",
            "Y",
            "--rescale",
            "scaled",
        ])
        .unwrap();

        assert_eq!(cli.verbosity(), 2);
        let Commands::Ingest(args) = cli.command else {
            panic!("expected ingest");
        };
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.features, vec!["^CD", "DAPI"]);
        assert_eq!(args.annotations, vec!["cell_type"]);
        assert_eq!(args.spatial, Some(vec!["X".to_string(), "Y".to_string()]));
        assert_eq!(args.rescale.as_deref(), Some("scaled"));
        assert!(!args.json);
    }

    #[test]
    fn test_parse_info_requires_files() {
        assert!(Cli::try_parse_from(["cellscape", "info"]).is_err());
        let cli = Cli::try_parse_from(["cellscape", "info", "a.csv"]).unwrap();
        assert!(matches!(cli.command, Commands::Info { ref files } if files.len() == 1));
    }
}
