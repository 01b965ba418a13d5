use std::fs;
use std::path::Path;

use vesselvio::config::{AnalysisConfig, GraphOptions};
use vesselvio::features::{GraphType, NetworkResult};
use vesselvio::pipeline::{analyze_graphs, analyze_volumes, process_volume, PipelineOptions};
use vesselvio::volume::{Grid, Resolution, Volume};
use vesselvio::volume_io::save_nifti;

/// A 12-voxel vessel and a 4-voxel fragment, both along x.
fn two_bars() -> Volume {
    let mut v: Volume = Grid::new(5, 7, 18);
    for x in 2..14 {
        v[(2, 2, x)] = 1;
    }
    for x in 2..6 {
        v[(2, 5, x)] = 1;
    }
    v
}

fn options(results: &Path) -> PipelineOptions {
    PipelineOptions {
        results_dir: results.to_path_buf(),
        resolution: Resolution::isotropic(1.0),
        image_dim: 3,
        prune_length: 0.0,
        filter_length: 10.0,
        smoothing: false,
        save_segment_results: true,
        save_graph: true,
    }
}

#[test]
fn test_short_fragment_is_filtered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("twobars.nii");
    save_nifti(&path, &two_bars()).unwrap();

    let results = process_volume(&path, None, &options(&dir.path().join("out"))).unwrap();
    let NetworkResult::Complete(summary) = &results[0] else {
        panic!("expected a complete result, got {:?}", results[0]);
    };
    assert_eq!(summary.segment_count, 1);
    assert_eq!(summary.endpoints, 2);
    assert_eq!(summary.branchpoints, 0);
    assert!((summary.network_length - 11.0).abs() < 1e-9);
    assert!((summary.mean_tortuosity - 1.0).abs() < 1e-9);
}

#[test]
fn test_volume_then_exported_graph() {
    let dir = tempfile::tempdir().unwrap();
    let results_dir = dir.path().join("out");
    let volume_path = dir.path().join("twobars.nii");
    save_nifti(&volume_path, &two_bars()).unwrap();

    let opts = options(&results_dir);
    let summary = analyze_volumes(&[volume_path], None, &opts);
    assert_eq!(summary.processed, 1);
    assert!(results_dir.join("Segment Results/twobars.csv").exists());

    // The exported graph holds one feature-carrying edge per segment.
    let graph_path = results_dir.join("Graphs/twobars.graphml");
    assert!(graph_path.exists());
    let graph_opts = GraphOptions {
        graph_type: GraphType::Branches,
        ..Default::default()
    };
    let graph_run = PipelineOptions {
        filter_length: 0.0,
        save_segment_results: false,
        save_graph: false,
        ..opts
    };
    let summary = analyze_graphs(&[graph_path], &[], &graph_run, &graph_opts);
    assert_eq!(summary.processed, 1);
    assert!(summary.failed.is_empty());

    let text = fs::read_to_string(results_dir.join("VesselVio 3D Dataset Analysis Results.csv")).unwrap();
    let rows: Vec<Vec<&str>> = text.lines().map(|l| l.split(',').collect()).collect();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1][0], "File Name");
    for row in &rows[2..] {
        assert_eq!(row[0], "twobars");
        assert_eq!(row[1], "None");
        assert_eq!(row[4], "11.000000");
        assert_eq!(row[8], "1");
    }
}

#[test]
fn test_options_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vesselvio.toml");
    fs::write(
        &path,
        r#"
        [analysis]
        resolution = 2.0
        prune_length = 0.0
        save_graph = true

        [graph]
        smoothing = false
        "#,
    )
    .unwrap();

    let config = AnalysisConfig::load(Some(&path)).unwrap();
    let opts = PipelineOptions::from_config(&config).unwrap();
    assert_eq!(opts.resolution, Resolution::isotropic(2.0));
    assert_eq!(opts.prune_length, 0.0);
    assert_eq!(opts.filter_length, 10.0);
    assert!(opts.save_graph);
    assert!(!opts.smoothing);
}

#[test]
fn test_planar_image_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capillary.png");
    let mut img = image::GrayImage::new(12, 5);
    for x in 2..10 {
        img.put_pixel(x, 2, image::Luma([255]));
    }
    img.save(&path).unwrap();

    let results_dir = dir.path().join("out");
    let opts = PipelineOptions {
        image_dim: 2,
        filter_length: 0.0,
        save_segment_results: false,
        save_graph: false,
        ..options(&results_dir)
    };
    let results = process_volume(&path, None, &opts).unwrap();
    let NetworkResult::Complete(summary) = &results[0] else {
        panic!("expected a complete result, got {:?}", results[0]);
    };
    assert_eq!(summary.segment_count, 1);
    assert!((summary.network_length - 7.0).abs() < 1e-9);
    // Planar runs report an area fraction of the 12x5 image.
    let paf = summary.volume.unwrap();
    assert!(paf > 0.0 && paf < 100.0);

    let summary = analyze_volumes(&[path], None, &opts);
    assert_eq!(summary.processed, 1);
    let text = fs::read_to_string(results_dir.join("VesselVio 2D Dataset Analysis Results.csv")).unwrap();
    assert!(text.lines().nth(1).unwrap().contains("Percent Area Fraction (PAF) %"));
}
