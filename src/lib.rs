//! # vesselvio — vasculature analysis from binary volumes and vessel graphs
//!
//! Turns segmented vessel volumes (NIfTI, TIFF stacks, 2D images) into
//! centerline graphs and measures the network: length, volume, surface area,
//! tortuosity, radii and branching, per dataset or per annotated region.
//!
//! This crate provides:
//! - **Volume pipeline**: `load_volume`, `volume_prep`, `skeletonize`,
//!   `calculate_radii`, `create_graph`, `prune`, `filter`, `feature_extraction`
//! - **Annotations**: region trees, ID/RGB labeling and ROI segmentation
//! - **Graph input/output**: GraphML and CSV graphs
//! - **Export**: results tables appended across runs, per-segment tables
//!
//! Skeletonization follows Lee, Kashyap & Chu 1994, *Building skeleton
//! models via 3-D medial surface/axis thinning algorithms*.

pub mod annotation;
pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod graph;
pub mod graph_io;
pub mod graph_processing;
pub mod pipeline;
pub mod radii;
pub mod skeleton;
pub mod volume;
pub mod volume_io;
pub mod volume_processing;

pub use config::{AnalysisConfig, ConfigError};
pub use error::{Error, Result};
pub use features::{feature_extraction, FeatureOptions, GraphType, NetworkResult, NetworkSummary, SegmentFeatures};
pub use graph::{EdgeAttrs, Vertex, VesselGraph};
pub use graph_processing::{clique_filter, create_graph, filter, prune};
pub use pipeline::{analyze_graphs, analyze_volumes, process_graph, process_volume, PipelineOptions};
pub use radii::calculate_radii;
pub use skeleton::skeletonize;
pub use volume::{Grid, Resolution, Volume};
pub use volume_io::load_volume;
pub use volume_processing::volume_prep;
