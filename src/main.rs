//! Vasculature analysis from the command line.
//!
//! Usage :
//!   vesselvio analyze vessels.nii --resolution 0.5 0.5 2
//!   vesselvio analyze brain.nii --annotation-type id --annotation atlas.nii \
//!       --atlas tree.json --region Isocortex --region Hippocampus
//!   vesselvio graph network.graphml --graph-type branches
//!   vesselvio stack slices/ --output volumes/
//!   vesselvio roi-volume masks/ --resolution 2
//!
//! Results are appended to `VesselVio 3D Dataset Analysis Results.csv` (or
//! the 2D variant) in the results folder.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vesselvio::annotation::AnnotationType;
use vesselvio::config::{AnalysisConfig, GraphFormat, ResolutionSetting};
use vesselvio::export::write_roi_volumes;
use vesselvio::features::GraphType;
use vesselvio::pipeline::{analyze_graphs, analyze_volumes, AnnotationInput, BatchSummary, PipelineOptions};
use vesselvio::volume_io::{roi_volumes, sequence_directories};

// ==========================================================================
// CLI (clap)
// ==========================================================================

#[derive(Parser, Debug)]
#[command(
    name = "vesselvio",
    version,
    about = "Vasculature analysis of binary volumes and vessel graphs",
    after_help = "Log verbosity follows RUST_LOG (default: info)."
)]
struct Cli {
    /// TOML configuration file; flags override its values
    #[arg(long, global = true, env = "VESSELVIO_CONFIG", value_name = "config.toml")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse binary vessel volumes
    Analyze {
        /// Volume files (.nii, .nii.gz, .tif, .png, ...)
        #[arg(value_name = "VOLUME", num_args = 1.., required = true)]
        volumes: Vec<PathBuf>,

        #[command(flatten)]
        analysis: AnalysisArgs,

        #[command(flatten)]
        annotation: AnnotationArgs,
    },
    /// Analyse pre-built vessel graphs
    Graph {
        /// GraphML files, or CSV vertex files
        #[arg(value_name = "GRAPH", num_args = 1.., required = true)]
        graphs: Vec<PathBuf>,

        /// CSV edge files, one per vertex file
        #[arg(long, num_args = 1..)]
        edges: Vec<PathBuf>,

        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        #[arg(long, value_enum)]
        graph_type: Option<GraphTypeArg>,

        /// Skip collapsing branch point clusters
        #[arg(long)]
        no_clique_filter: bool,

        /// CSV delimiter: a single character, `Space` or `Tab`
        #[arg(long)]
        delimiter: Option<String>,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Stack each subfolder of image slices into a NIfTI volume
    Stack {
        input: PathBuf,

        #[arg(long, short, default_value = "stacked")]
        output: PathBuf,

        /// Folder inside each subfolder that holds the slices
        #[arg(long)]
        sub_dir: Option<String>,

        /// Slice extension; defaults to that of the first file
        #[arg(long)]
        ext: Option<String>,
    },
    /// Measure the volume of every ROI mask in a folder
    RoiVolume {
        input: PathBuf,

        #[arg(long, default_value = "nii")]
        ext: String,

        /// X Y Z voxel spacing, or a single isotropic value
        #[arg(long, num_args = 1..=3)]
        resolution: Option<Vec<f64>>,

        #[arg(long, short, default_value = "ROI Volumes.csv")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct AnalysisArgs {
    /// X Y Z voxel spacing, or a single isotropic value
    #[arg(long, num_args = 1..=3)]
    resolution: Option<Vec<f64>>,

    /// 2 or 3
    #[arg(long)]
    image_dim: Option<u8>,

    /// Remove end segments shorter than this (0 disables)
    #[arg(long)]
    prune: Option<f64>,

    /// Remove isolated segments shorter than this (0 disables)
    #[arg(long)]
    filter: Option<f64>,

    /// Measure raw centerlines instead of smoothed ones
    #[arg(long)]
    no_smoothing: bool,

    /// Results folder
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Write a table of per-segment features for each dataset
    #[arg(long)]
    save_segments: bool,

    /// Export each analysed graph as GraphML
    #[arg(long)]
    save_graph: bool,
}

#[derive(Args, Debug)]
struct AnnotationArgs {
    #[arg(long, value_enum)]
    annotation_type: Option<AnnotationTypeArg>,

    /// ID volumes or RGB slice folders; one shared, or one per volume
    #[arg(long, num_args = 1..)]
    annotation: Vec<PathBuf>,

    /// Annotation tree (JSON) or saved annotation file
    #[arg(long)]
    atlas: Option<PathBuf>,

    /// Region to analyse; repeat for several
    #[arg(long = "region")]
    regions: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AnnotationTypeArg {
    Id,
    Rgb,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GraphTypeArg {
    Centerlines,
    Branches,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Graphml,
    Csv,
}

impl AnalysisArgs {
    fn apply(&self, config: &mut AnalysisConfig) {
        let a = &mut config.analysis;
        if let Some(r) = &self.resolution {
            a.resolution = resolution_setting(r);
        }
        if let Some(d) = self.image_dim {
            a.image_dimensions = d;
        }
        if let Some(p) = self.prune {
            a.prune_length = p;
        }
        if let Some(f) = self.filter {
            a.filter_length = f;
        }
        if let Some(o) = &self.output {
            a.results_folder = o.clone();
        }
        a.save_segment_results |= self.save_segments;
        a.save_graph |= self.save_graph;
        if self.no_smoothing {
            config.graph.smoothing = false;
        }
    }
}

impl AnnotationArgs {
    fn apply(&self, config: &mut AnalysisConfig) {
        let a = &mut config.annotation;
        if let Some(t) = self.annotation_type {
            a.annotation_type = match t {
                AnnotationTypeArg::Id => AnnotationType::Id,
                AnnotationTypeArg::Rgb => AnnotationType::Rgb,
            };
        }
        if !self.annotation.is_empty() {
            a.annotation_files = self.annotation.clone();
        }
        if self.atlas.is_some() {
            a.atlas = self.atlas.clone();
        }
        if !self.regions.is_empty() {
            a.regions = self.regions.clone();
        }
    }
}

fn resolution_setting(values: &[f64]) -> ResolutionSetting {
    match values {
        [r] => ResolutionSetting::Isotropic(*r),
        v => ResolutionSetting::Axes(v.to_vec()),
    }
}

// ==========================================================================
// Main
// ==========================================================================

fn report(summary: &BatchSummary, config: &AnalysisConfig) -> Result<()> {
    println!("\n══════════════════════════════════════════════════════════");
    println!(
        "  ✓ {} dataset(s) analysed → '{}'",
        summary.processed,
        config.analysis.results_folder.display()
    );
    for path in &summary.failed {
        println!("  ✗ {}", path.display());
    }
    println!("══════════════════════════════════════════════════════════");
    if summary.processed == 0 && !summary.failed.is_empty() {
        bail!("every dataset failed");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = AnalysisConfig::load(cli.config.as_deref()).context("loading configuration")?;

    println!("══════════════════════════════════════════════════════════");
    println!("  vesselvio — vasculature analysis");
    println!("══════════════════════════════════════════════════════════\n");

    match cli.command {
        Command::Analyze {
            volumes,
            analysis,
            annotation,
        } => {
            analysis.apply(&mut config);
            annotation.apply(&mut config);
            let opts = PipelineOptions::from_config(&config).context("invalid analysis options")?;
            let input = AnnotationInput::from_options(&config.annotation).context("loading annotation")?;
            if let Some(input) = &input {
                if input.files.len() > 1 && input.files.len() != volumes.len() {
                    bail!(
                        "{} annotation files given for {} volumes",
                        input.files.len(),
                        volumes.len()
                    );
                }
            }
            info!("Analysing {} volume(s)", volumes.len());
            let summary = analyze_volumes(&volumes, input.as_ref(), &opts);
            report(&summary, &config)
        }
        Command::Graph {
            graphs,
            edges,
            format,
            graph_type,
            no_clique_filter,
            delimiter,
            analysis,
        } => {
            analysis.apply(&mut config);
            let g = &mut config.graph;
            if let Some(f) = format {
                g.format = match f {
                    FormatArg::Graphml => GraphFormat::GraphMl,
                    FormatArg::Csv => GraphFormat::Csv,
                };
            }
            if let Some(t) = graph_type {
                g.graph_type = match t {
                    GraphTypeArg::Centerlines => GraphType::Centerlines,
                    GraphTypeArg::Branches => GraphType::Branches,
                };
            }
            if no_clique_filter {
                g.clique_filtering = false;
            }
            if let Some(d) = delimiter {
                g.delimiter = d;
            }
            if config.graph.format == GraphFormat::Csv && edges.len() != graphs.len() {
                bail!("CSV graphs need one --edges file per vertex file");
            }
            let opts = PipelineOptions::from_config(&config).context("invalid analysis options")?;
            info!("Analysing {} graph(s)", graphs.len());
            let summary = analyze_graphs(&graphs, &edges, &opts, &config.graph);
            report(&summary, &config)
        }
        Command::Stack {
            input,
            output,
            sub_dir,
            ext,
        } => {
            let written = sequence_directories(&input, &output, sub_dir.as_deref(), ext.as_deref())
                .with_context(|| format!("stacking series in '{}'", input.display()))?;
            println!("  ✓ {} volume(s) written to '{}'", written.len(), output.display());
            Ok(())
        }
        Command::RoiVolume {
            input,
            ext,
            resolution,
            output,
        } => {
            if let Some(r) = &resolution {
                config.analysis.resolution = resolution_setting(r);
            }
            let res = config.resolution().context("invalid resolution")?;
            let rows = roi_volumes(&input, &ext, &res)
                .with_context(|| format!("measuring ROI volumes in '{}'", input.display()))?;
            write_roi_volumes(&output, &rows)?;
            println!("  ✓ {} ROI volume(s) written to '{}'", rows.len(), output.display());
            Ok(())
        }
    }
}
