use anyhow::{bail, Context, Result};
use log::info;
use serde::Serialize;

use cellscape::export::write_matrix;
use cellscape::ingest::{combine_tables, load_csv_files, FileAnnotations};
use cellscape::matrix::{AnnotatedMatrix, MatrixBuilder};
use cellscape::normalize::{add_rescaled_features, subtract_min_per_region, QuantileRange};

use super::config::Config;
use super::IngestArgs;

/// Layer written by `--subtract-min-by`.
const SUBTRACTED_LAYER: &str = "min_subtracted";

/// Flags merged with the config file; flags win.
#[derive(Debug)]
struct Settings {
    features: Vec<String>,
    annotations: Vec<String>,
    spatial: Option<(String, String)>,
    range: QuantileRange,
    layer: Option<String>,
}

impl Settings {
    fn resolve(args: &IngestArgs, config: Config) -> Result<Self> {
        let file = config.ingest;

        let features = if args.features.is_empty() {
            file.features
        } else {
            args.features.clone()
        };
        if features.is_empty() {
            bail!("No features given: pass --features or set [ingest].features in the config file");
        }

        let annotations = if args.annotations.is_empty() {
            file.annotations
        } else {
            args.annotations.clone()
        };

        let spatial = match (&args.spatial, file.spatial_x, file.spatial_y) {
            (Some(pair), _, _) => match pair.as_slice() {
                [x, y] => Some((x.clone(), y.clone())),
                _ => bail!("--spatial takes exactly two column names"),
            },
            (None, Some(x), Some(y)) => Some((x, y)),
            (None, None, None) => None,
            (None, _, _) => bail!("Config file must set both spatial_x and spatial_y"),
        };

        let defaults = QuantileRange::default();
        let range = QuantileRange::new(
            args.min_quantile.or(file.min_quantile).unwrap_or(defaults.min),
            args.max_quantile.or(file.max_quantile).unwrap_or(defaults.max),
        )?;

        Ok(Self {
            features,
            annotations,
            spatial,
            range,
            layer: args.rescale.clone().or(file.layer),
        })
    }
}

/// What an ingest run produced
#[derive(Debug, Serialize)]
struct IngestReport {
    files: usize,
    n_obs: usize,
    n_vars: usize,
    features: Vec<String>,
    annotations: Vec<String>,
    layers: Vec<String>,
    spatial: bool,
}

impl IngestReport {
    fn new(files: usize, adata: &AnnotatedMatrix) -> Self {
        Self {
            files,
            n_obs: adata.n_obs(),
            n_vars: adata.n_vars(),
            features: adata.var_names().to_vec(),
            annotations: adata.obs_keys().map(str::to_string).collect(),
            layers: adata.layer_keys().map(str::to_string).collect(),
            spatial: adata.spatial().is_some(),
        }
    }

    fn format_plain(&self) -> String {
        let mut output = String::new();
        output.push_str("Ingest Summary\n");
        output.push_str("==============\n");
        output.push_str(&format!("Files: {}\n", self.files));
        output.push_str(&format!("Cells: {}\n", self.n_obs));
        output.push_str(&format!("Features ({}): {}\n", self.n_vars, self.features.join(", ")));
        output.push_str(&format!("Annotations: {}\n", list_or_none(&self.annotations)));
        output.push_str(&format!("Layers: {}\n", list_or_none(&self.layers)));
        output.push_str(&format!("Spatial: {}\n", if self.spatial { "yes" } else { "no" }));
        output
    }

    fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        {
            use console::style;

            let mut output = String::new();
            output.push_str(&format!("{}\n", style("Ingest Summary").bold().cyan()));
            output.push_str(&format!("{}\n", style("==============").cyan()));
            output.push_str(&format!("{}: {}\n", style("Files").bold(), self.files));
            output.push_str(&format!("{}: {}\n", style("Cells").bold(), style(self.n_obs).green()));
            output.push_str(&format!(
                "{} ({}): {}\n",
                style("Features").bold(),
                style(self.n_vars).green(),
                self.features.join(", ")
            ));
            output.push_str(&format!(
                "{}: {}\n",
                style("Annotations").bold(),
                list_or_none(&self.annotations)
            ));
            output.push_str(&format!("{}: {}\n", style("Layers").bold(), list_or_none(&self.layers)));
            output.push_str(&format!(
                "{}: {}\n",
                style("Spatial").bold(),
                if self.spatial { "yes" } else { "no" }
            ));
            output
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            self.format_plain()
        }
    }
}

fn list_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "none".to_string()
    } else {
        values.join(", ")
    }
}

/// Load, merge, build and normalize; optionally export the result.
pub fn run(args: IngestArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let settings = Settings::resolve(&args, config)?;
    let adata = build(&args, &settings)?;

    let report = IngestReport::new(args.files.len(), &adata);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if console_enabled() {
        print!("{}", report.format_colored());
    } else {
        print!("{}", report.format_plain());
    }

    if let Some(output) = &args.output {
        let layer = settings
            .layer
            .as_deref()
            .or(args.subtract_min_by.as_ref().map(|_| SUBTRACTED_LAYER));
        write_matrix(&adata, layer, output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Exported {} layer to {}", layer.unwrap_or("primary"), output.display());
    }

    Ok(())
}

fn build(args: &IngestArgs, settings: &Settings) -> Result<AnnotatedMatrix> {
    let loaded = load_csv_files(&args.files).context("Failed to load input files")?;

    let annotations = match &args.annotations_file {
        Some(path) => FileAnnotations::from_csv_file(path)
            .with_context(|| format!("Failed to read annotations file {}", path.display()))?,
        None => {
            let mut empty = FileAnnotations::new(Vec::<String>::new());
            for entry in &loaded {
                empty.insert(entry.path.clone(), Vec::<String>::new())?;
            }
            empty
        }
    };
    let table = combine_tables(&loaded, &annotations).context("Failed to combine input files")?;

    let mut builder = MatrixBuilder::new(&table)
        .features(settings.features.iter().cloned())
        .annotations(settings.annotations.iter().cloned());
    if let Some((x, y)) = &settings.spatial {
        builder = builder.spatial(x.as_str(), y.as_str());
    }
    let mut adata = builder.build().context("Failed to build the feature matrix")?;

    if let Some(layer) = &settings.layer {
        add_rescaled_features(&mut adata, settings.range, layer)?;
    }
    if let Some(annotation) = &args.subtract_min_by {
        subtract_min_per_region(&mut adata, annotation, SUBTRACTED_LAYER, settings.range.min)?;
    }

    Ok(adata)
}

fn console_enabled() -> bool {
    #[cfg(feature = "colorized_output")]
    {
        console::Term::stdout().features().colors_supported()
    }
    #[cfg(not(feature = "colorized_output"))]
    {
        false
    }
}
