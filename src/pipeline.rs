//! Batch analysis of vessel volumes and pre-built graphs.
//!
//! Each dataset is processed on its own and its result rows are appended to
//! the results file as soon as it finishes. A failing dataset is logged and
//! skipped.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{error, info, warn};

use crate::annotation::labeling::label_annotation_file;
use crate::annotation::prep::{build_roi_array, AnnotationType};
use crate::annotation::segmentation::{segment_roi, segmentation_check};
use crate::annotation::tree::{
    convert_annotation_data, is_vesselvio_annotation_file, load_vesselvio_annotation_file,
    rgb_duplicates_check, AnnotationData,
};
use crate::config::{AnalysisConfig, AnnotationOptions, ConfigError, GraphFormat, GraphOptions};
use crate::error::{Error, Result};
use crate::export::{write_results, write_segment_results};
use crate::features::{feature_extraction, FeatureOptions, GraphType, NetworkResult};
use crate::graph::VesselGraph;
use crate::graph_io::{load_csv_graph, load_graphml, save_graphml};
use crate::graph_processing::{clique_filter, create_graph, filter, prune, SkeletonPoints};
use crate::radii::{calculate_radii, calculate_vis_radii};
use crate::skeleton::skeletonize;
use crate::volume::{Resolution, Volume};
use crate::volume_io::{file_stem, load_volume};
use crate::volume_processing::{pad_volume, padding_of, volume_prep};

pub const GRAPHS_DIR: &str = "Graphs";

/// Settings shared by every dataset of a batch.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub results_dir: PathBuf,
    pub resolution: Resolution,
    pub image_dim: u8,
    pub prune_length: f64,
    pub filter_length: f64,
    pub smoothing: bool,
    pub save_segment_results: bool,
    pub save_graph: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &AnalysisConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let a = &config.analysis;
        Ok(Self {
            results_dir: a.results_folder.clone(),
            resolution: config.resolution()?,
            image_dim: a.image_dimensions,
            prune_length: a.prune_length,
            filter_length: a.filter_length,
            smoothing: config.graph.smoothing,
            save_segment_results: a.save_segment_results,
            save_graph: a.save_graph,
        })
    }

    fn feature_options(&self, graph_type: GraphType, image_shape: Option<Vec<usize>>) -> FeatureOptions {
        FeatureOptions {
            resolution: self.resolution,
            image_dim: self.image_dim,
            image_shape,
            graph_type,
            smoothing: self.smoothing,
            reduce_graph: self.save_graph,
        }
    }
}

/// Selected regions and the annotation files to label datasets with.
#[derive(Debug, Clone)]
pub struct AnnotationInput {
    pub annotation_type: AnnotationType,
    pub data: AnnotationData,
    pub roi_array: Vec<Vec<u32>>,
    pub files: Vec<PathBuf>,
}

impl AnnotationInput {
    /// Resolve the configured regions. Returns `None` when no annotation
    /// type is selected.
    pub fn from_options(opts: &AnnotationOptions) -> Result<Option<Self>> {
        if opts.annotation_type == AnnotationType::None {
            return Ok(None);
        }
        let atlas = opts
            .atlas
            .as_deref()
            .ok_or_else(|| Error::Config("annotation atlas is missing".into()))?;
        let data = if is_vesselvio_annotation_file(atlas) {
            load_vesselvio_annotation_file(atlas)?
        } else {
            convert_annotation_data(&opts.regions, atlas, &opts.tree_keys)?
        };
        if data.is_empty() {
            return Err(Error::Annotation("no regions selected".into()));
        }
        if opts.annotation_type == AnnotationType::Rgb {
            for name in rgb_duplicates_check(&data) {
                warn!("Region '{}' shares a colour with another selected region", name);
            }
        }
        let roi_array = build_roi_array(&data, opts.annotation_type)?;
        info!("Loaded {} annotation regions", data.len());
        Ok(Some(Self {
            annotation_type: opts.annotation_type,
            data,
            roi_array,
            files: opts.annotation_files.clone(),
        }))
    }

    /// A single annotation file is shared by all datasets.
    pub fn file_for(&self, index: usize) -> Option<&Path> {
        match self.files.as_slice() {
            [only] => Some(only.as_path()),
            files => files.get(index).map(PathBuf::as_path),
        }
    }
}

/// Identifies the ROI a graph was segmented from.
struct RoiTag<'a> {
    name: &'a str,
    id: usize,
    hex: Option<String>,
}

fn graph_path(results_dir: &Path, file_name: &str, roi: Option<&str>) -> PathBuf {
    let stem = match roi {
        Some(r) => format!("{}_{}", file_name, r),
        None => file_name.to_string(),
    };
    results_dir.join(GRAPHS_DIR).join(format!("{}.graphml", stem))
}

/// Prune, filter and measure a graph, then write its optional exports.
fn finish_graph(
    g: &mut VesselGraph,
    file_name: &str,
    roi: Option<&RoiTag>,
    roi_volume: Option<f64>,
    graph_type: GraphType,
    image_shape: Option<Vec<usize>>,
    opts: &PipelineOptions,
) -> Result<NetworkResult> {
    let res = &opts.resolution;
    if opts.prune_length > 0.0 {
        prune(g, opts.prune_length, res, opts.smoothing, graph_type);
    }
    filter(g, opts.filter_length, res, opts.smoothing, graph_type);

    let t0 = Instant::now();
    let roi_name = roi.map_or("None", |r| r.name);
    let fopts = opts.feature_options(graph_type, image_shape);
    let (result, segments) = feature_extraction(g, file_name, roi_name, roi_volume, &fopts);
    info!(
        "Feature extraction: {} segments in {:.2}s",
        segments.len(),
        t0.elapsed().as_secs_f64()
    );

    if opts.save_segment_results && !segments.is_empty() {
        write_segment_results(&opts.results_dir, file_name, roi.map(|r| r.name), &segments, opts.image_dim)?;
    }
    if opts.save_graph && !g.is_empty() {
        if let Some(tag) = roi {
            for (_, attrs) in g.edges_mut() {
                attrs.hex = tag.hex.clone();
                attrs.roi_id = Some(tag.id);
            }
        }
        save_graphml(g, &graph_path(&opts.results_dir, file_name, roi.map(|r| r.name)))?;
    }
    Ok(result)
}

/// Skeletonize a bounded volume and analyse its network.
fn analyze_network(
    volume: &Volume,
    minima: [usize; 3],
    file_name: &str,
    roi: Option<&RoiTag>,
    roi_volume: Option<f64>,
    image_shape: &[usize],
    opts: &PipelineOptions,
) -> Result<NetworkResult> {
    let padded = pad_volume(volume);

    let t0 = Instant::now();
    let points = skeletonize(&padded);
    info!(
        "Skeletonization: {} points in {:.2}s",
        points.len(),
        t0.elapsed().as_secs_f64()
    );

    let t0 = Instant::now();
    let radii = calculate_radii(&padded, &points, &opts.resolution);
    let vis_radii = opts.save_graph.then(|| calculate_vis_radii(&padded, &points));
    info!("Radius calculation: {:.2}s", t0.elapsed().as_secs_f64());

    let t0 = Instant::now();
    let skeleton = SkeletonPoints {
        points: &points,
        radii: &radii,
        vis_radii: vis_radii.as_deref(),
        shape: padded.shape(),
        minima,
        padding: padding_of(volume),
    };
    let mut g = create_graph(&skeleton);
    info!(
        "Graph construction: {} vertices, {} edges in {:.2}s",
        g.vcount(),
        g.ecount(),
        t0.elapsed().as_secs_f64()
    );

    finish_graph(
        &mut g,
        file_name,
        roi,
        roi_volume,
        GraphType::Centerlines,
        Some(image_shape.to_vec()),
        opts,
    )
}

/// Analyse one volume file, whole or per annotated ROI.
pub fn process_volume(
    path: &Path,
    annotation: Option<(&AnnotationInput, &Path)>,
    opts: &PipelineOptions,
) -> Result<Vec<NetworkResult>> {
    let t0 = Instant::now();
    let file_name = file_stem(path);
    let mut volume = load_volume(path)?;
    if opts.image_dim == 2 {
        if volume.depth != 1 {
            return Err(Error::DimensionMismatch {
                expected: vec![1, volume.height, volume.width],
                found: volume.shape().to_vec(),
            });
        }
        volume.planar = true;
    }
    let image_shape = volume.image_shape();
    info!("Loaded '{}' with shape {:?}", file_name, image_shape);

    let mut results = Vec::new();
    match annotation {
        None => match volume_prep(&volume) {
            Ok((bounded, minima)) => {
                results.push(analyze_network(&bounded, minima, &file_name, None, None, &image_shape, opts)?);
            }
            Err(Error::EmptyVolume) => {
                warn!("'{}' holds no vessels", file_name);
                results.push(NetworkResult::Empty {
                    file_name: file_name.clone(),
                    roi_name: "None".to_string(),
                });
            }
            Err(e) => return Err(e),
        },
        Some((input, annotation_file)) => {
            let labeling =
                label_annotation_file(&volume, annotation_file, input.annotation_type, &input.roi_array)?;
            drop(volume);
            let cell = opts.resolution.cell_size(opts.image_dim == 2);

            for (row, (roi_name, family)) in input.data.regions.iter().enumerate() {
                let roi_volume = labeling.roi_volumes[row] as f64 * cell;
                let segmented = labeling
                    .bounds(row)
                    .filter(|_| roi_volume > 0.0)
                    .map(|(min, max)| (segment_roi(&labeling.labeled, min, max, row as u32 + 1), min))
                    .filter(|(roi, _)| segmentation_check(roi));

                let Some((roi_vessels, minima)) = segmented else {
                    warn!("ROI '{}' is not in '{}'", roi_name, file_name);
                    results.push(NetworkResult::RoiMissing {
                        file_name: file_name.clone(),
                        roi_name: roi_name.clone(),
                    });
                    continue;
                };

                info!("Analyzing ROI '{}' ({}/{})", roi_name, row + 1, input.data.len());
                let tag = RoiTag {
                    name: roi_name,
                    id: row,
                    hex: family.colors.first().map(|c| c.trim_start_matches('#').to_string()),
                };
                results.push(analyze_network(
                    &roi_vessels,
                    minima,
                    &file_name,
                    Some(&tag),
                    Some(roi_volume),
                    &image_shape,
                    opts,
                )?);
            }
        }
    }

    info!(
        "Finished '{}' in {:.2}s",
        file_name,
        t0.elapsed().as_secs_f64()
    );
    Ok(results)
}

/// Analyse one pre-built graph. CSV graphs need their edge file.
pub fn process_graph(
    path: &Path,
    edges: Option<&Path>,
    opts: &PipelineOptions,
    graph_opts: &GraphOptions,
) -> Result<NetworkResult> {
    let t0 = Instant::now();
    let file_name = file_stem(path);
    let key = &graph_opts.attribute_key;
    let graph_type = graph_opts.graph_type;

    let mut g = match graph_opts.format {
        GraphFormat::GraphMl => load_graphml(path, graph_type, key, &opts.resolution)?,
        GraphFormat::Csv => {
            let edges = edges.ok_or_else(|| {
                Error::GraphLoad(format!("no edge file given for '{}'", path.display()))
            })?;
            let delimiter = graph_opts.delimiter_byte()?;
            load_csv_graph(path, edges, delimiter, graph_type, key, &opts.resolution)?
        }
    };
    info!(
        "Loaded graph '{}': {} vertices, {} edges",
        file_name,
        g.vcount(),
        g.ecount()
    );

    if graph_type == GraphType::Centerlines && graph_opts.clique_filtering {
        clique_filter(&mut g);
    }
    let result = finish_graph(&mut g, &file_name, None, None, graph_type, None, opts)?;
    info!(
        "Finished '{}' in {:.2}s",
        file_name,
        t0.elapsed().as_secs_f64()
    );
    Ok(result)
}

/// Outcome of a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: Vec<PathBuf>,
}

impl BatchSummary {
    fn record(&mut self, path: &Path, outcome: Result<Vec<NetworkResult>>, opts: &PipelineOptions) {
        let written = outcome.and_then(|rows| write_results(&opts.results_dir, &rows, opts.image_dim));
        match written {
            Ok(_) => self.processed += 1,
            Err(e) => {
                error!("Analysis of '{}' failed: {}", path.display(), e);
                self.failed.push(path.to_path_buf());
            }
        }
    }
}

/// Analyse every volume in `files`. Annotation files pair up with the
/// volumes by position.
pub fn analyze_volumes(files: &[PathBuf], annotation: Option<&AnnotationInput>, opts: &PipelineOptions) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for (i, path) in files.iter().enumerate() {
        info!("Dataset {}/{}: '{}'", i + 1, files.len(), path.display());
        let outcome = match annotation {
            None => process_volume(path, None, opts),
            Some(input) => match input.file_for(i) {
                Some(annotation_file) => process_volume(path, Some((input, annotation_file)), opts),
                None => Err(Error::Annotation(format!("no annotation file for dataset {}", i + 1))),
            },
        };
        summary.record(path, outcome, opts);
    }
    summary
}

/// Analyse every graph in `files`. For CSV graphs `edges` lists the edge
/// file of each vertex file.
pub fn analyze_graphs(
    files: &[PathBuf],
    edges: &[PathBuf],
    opts: &PipelineOptions,
    graph_opts: &GraphOptions,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for (i, path) in files.iter().enumerate() {
        info!("Graph {}/{}: '{}'", i + 1, files.len(), path.display());
        let outcome = process_graph(path, edges.get(i).map(PathBuf::as_path), opts, graph_opts).map(|r| vec![r]);
        summary.record(path, outcome, opts);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::tree::RoiFamily;
    use crate::volume::Grid;
    use crate::volume_io::save_nifti;

    fn options(dir: &Path) -> PipelineOptions {
        PipelineOptions {
            results_dir: dir.join("results"),
            resolution: Resolution::isotropic(1.0),
            image_dim: 3,
            prune_length: 0.0,
            filter_length: 0.0,
            smoothing: false,
            save_segment_results: false,
            save_graph: false,
        }
    }

    /// A straight 1-voxel-wide vessel along x on `z = 2, y = 2`.
    fn bar_volume(length: usize) -> Volume {
        let mut v: Volume = Grid::new(5, 5, length + 4);
        for x in 2..length + 2 {
            v[(2, 2, x)] = 1;
        }
        v
    }

    #[test]
    fn test_process_volume_single_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bar.nii");
        save_nifti(&path, &bar_volume(8)).unwrap();

        let results = process_volume(&path, None, &options(dir.path())).unwrap();
        assert_eq!(results.len(), 1);
        match &results[0] {
            NetworkResult::Complete(s) => {
                assert_eq!(s.file_name, "bar");
                assert_eq!(s.roi_name, "None");
                assert_eq!(s.segment_count, 1);
                assert_eq!(s.endpoints, 2);
                assert!((s.network_length - 7.0).abs() < 1e-9);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_empty_volume_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.nii");
        save_nifti(&path, &Grid::new(3, 3, 3)).unwrap();

        let results = process_volume(&path, None, &options(dir.path())).unwrap();
        assert!(matches!(results[0], NetworkResult::Empty { .. }));
    }

    #[test]
    fn test_missing_roi_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bar.nii");
        save_nifti(&path, &bar_volume(6)).unwrap();

        // Region 5 covers the vessel, region 9 is absent from the annotation.
        let mut annotation: Volume = Grid::new(5, 5, 10);
        annotation.data.iter_mut().for_each(|v| *v = 5);
        let annotation_path = dir.path().join("atlas.nii");
        save_nifti(&annotation_path, &annotation).unwrap();

        let input = AnnotationInput {
            annotation_type: AnnotationType::Id,
            data: AnnotationData {
                regions: vec![
                    ("Cortex".into(), RoiFamily { colors: vec!["#FF0000".into()], ids: vec![5] }),
                    ("Bulb".into(), RoiFamily { colors: vec![], ids: vec![9] }),
                ],
            },
            roi_array: vec![vec![5], vec![9]],
            files: vec![annotation_path.clone()],
        };

        let mut opts = options(dir.path());
        opts.save_graph = true;
        let results = process_volume(&path, Some((&input, &annotation_path)), &opts).unwrap();
        assert_eq!(results.len(), 2);
        match &results[0] {
            NetworkResult::Complete(s) => {
                assert_eq!(s.roi_name, "Cortex");
                assert_eq!(s.roi_volume, Some(250.0));
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(
            results[1],
            NetworkResult::RoiMissing {
                file_name: "bar".into(),
                roi_name: "Bulb".into()
            }
        );
        assert!(dir.path().join("results/Graphs/bar_Cortex.graphml").exists());
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("bar.nii");
        save_nifti(&good, &bar_volume(5)).unwrap();
        let bad = dir.path().join("missing.nii");

        let opts = options(dir.path());
        let summary = analyze_volumes(&[bad.clone(), good], None, &opts);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, vec![bad]);
        assert!(opts.results_dir.join("VesselVio 3D Dataset Analysis Results.csv").exists());
    }

    #[test]
    fn test_shared_annotation_file() {
        let input = AnnotationInput {
            annotation_type: AnnotationType::Id,
            data: AnnotationData::default(),
            roi_array: Vec::new(),
            files: vec![PathBuf::from("atlas.nii")],
        };
        assert_eq!(input.file_for(3), Some(Path::new("atlas.nii")));
    }
}
