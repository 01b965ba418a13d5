//! CSV export of network and segment results.
//!
//! The main results file is shared across runs: it is created with its two
//! header rows on first use and appended to afterwards.

use std::fs::{self, File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use tracing::{debug, info};

use crate::error::Result;
use crate::features::{NetworkResult, NetworkSummary, SegmentFeatures, RADIUS_BINS};

pub const SEGMENT_RESULTS_DIR: &str = "Segment Results";

const MAIN_COLUMNS: [&str; 15] = [
    "File Name",
    "ROI Name",
    "ROI_Volume",
    "Volume",
    "Network Length",
    "Surface Area",
    "Branchpoints",
    "Endpoints",
    "Number of Segments",
    "Segment Partitioning",
    "Mean Segment Radius",
    "Mean Segment Length",
    "Mean Segment Tortuosity",
    "Mean Segment Volume",
    "Mean Segment Surface Area",
];

const SEGMENT_COLUMNS: [&str; 9] = [
    "Segment ID",
    "Volume",
    "Length",
    "Surface Area",
    "Tortuosity",
    "Mean Radius",
    "Max Radius",
    "Min Radius",
    "Radius Std. Dev.",
];

/// Labels of the four radius-binned column groups, in column order.
const BIN_GROUPS: [&str; 4] = [
    "Number of Segments per Radius Bin",
    "Mean Length of Segments per Radius Bin",
    "Mean Segment Tortuosity per Radius Bin",
    "Mean Segment Surface Area per Radius Bin",
];

/// Total columns of a complete results row.
pub const RESULT_COLUMNS: usize = MAIN_COLUMNS.len() + BIN_GROUPS.len() * RADIUS_BINS;

pub fn results_file_name(image_dim: u8) -> String {
    format!("VesselVio {}D Dataset Analysis Results.csv", if image_dim == 2 { 2 } else { 3 })
}

/// The topper row (group labels) and the column-name row.
pub fn headers(image_dim: u8) -> [Vec<String>; 2] {
    let mut topper = vec![String::new(); RESULT_COLUMNS];
    topper[2] = "Main Results".to_string();
    for (k, label) in BIN_GROUPS.iter().enumerate() {
        topper[MAIN_COLUMNS.len() + k * RADIUS_BINS] = label.to_string();
    }

    let mut columns: Vec<String> = MAIN_COLUMNS.iter().map(|s| s.to_string()).collect();
    for _ in 0..BIN_GROUPS.len() {
        columns.extend((0..RADIUS_BINS - 1).map(|i| format!("{} - {}", i, i + 1)));
        columns.push(format!("{}+", RADIUS_BINS - 1));
    }
    if image_dim == 2 {
        columns[3] = "Percent Area Fraction (PAF) %".to_string();
        columns[13] = "Mean Segment PAF %".to_string();
    }
    [topper, columns]
}

pub fn segment_header(image_dim: u8) -> Vec<String> {
    let mut columns: Vec<String> = SEGMENT_COLUMNS.iter().map(|s| s.to_string()).collect();
    if image_dim == 2 {
        columns[1] = "Segment Percent Area Fraction %".to_string();
    }
    columns
}

fn fmt(v: f64) -> String {
    format!("{:.6}", v)
}

fn fmt_or(v: Option<f64>, missing: &str) -> String {
    v.map(fmt).unwrap_or_else(|| missing.to_string())
}

fn summary_record(s: &NetworkSummary) -> Vec<String> {
    let mut row = vec![
        s.file_name.clone(),
        s.roi_name.clone(),
        fmt_or(s.roi_volume, "NA"),
        fmt_or(s.volume, "NA"),
        fmt(s.network_length),
        fmt(s.surface_area),
        s.branchpoints.to_string(),
        s.endpoints.to_string(),
        s.segment_count.to_string(),
        fmt(s.segment_partitioning),
        fmt(s.mean_radius),
        fmt(s.mean_length),
        fmt(s.mean_tortuosity),
        fmt_or(s.mean_volume, "NA"),
        fmt(s.mean_surface_area),
    ];
    row.extend(s.radius_bins.iter().map(|c| c.to_string()));
    for bins in [&s.length_bins, &s.tortuosity_bins, &s.surface_area_bins] {
        row.extend(bins.iter().map(|b| fmt_or(*b, "")));
    }
    row
}

/// One row of the results table.
pub fn result_record(result: &NetworkResult) -> Vec<String> {
    match result {
        NetworkResult::Complete(summary) => summary_record(summary),
        NetworkResult::Empty { file_name, roi_name } => {
            vec![file_name.clone(), roi_name.clone(), "Empty dataset".to_string()]
        }
        NetworkResult::RoiMissing { file_name, roi_name } => {
            vec![file_name.clone(), roi_name.clone(), "ROI not in dataset.".to_string()]
        }
    }
}

/// One row per segment, ids counting from 0.
pub fn segment_records(segments: &[SegmentFeatures]) -> Vec<Vec<String>> {
    segments
        .iter()
        .enumerate()
        .map(|(id, s)| {
            vec![
                id.to_string(),
                fmt_or(s.volume, "NA"),
                fmt(s.length),
                fmt(s.surface_area),
                fmt(s.tortuosity),
                fmt(s.radius_avg),
                fmt(s.radius_max),
                fmt(s.radius_min),
                fmt(s.radius_sd),
            ]
        })
        .collect()
}

/// Rows have different lengths: incomplete results stop after the ROI name.
fn csv_writer(file: File) -> csv::Writer<BufWriter<File>> {
    WriterBuilder::new().flexible(true).from_writer(BufWriter::new(file))
}

/// Append `results` to the results file in `results_dir`, creating the
/// directory and the file (with headers) when needed.
pub fn write_results(results_dir: &Path, results: &[NetworkResult], image_dim: u8) -> Result<PathBuf> {
    fs::create_dir_all(results_dir)?;
    let path = results_dir.join(results_file_name(image_dim));
    let exists = path.exists();

    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let mut wtr = csv_writer(file);
    if !exists {
        for row in headers(image_dim) {
            wtr.write_record(&row)?;
        }
    }
    for result in results {
        wtr.write_record(result_record(result))?;
    }
    wtr.flush()?;

    info!("Wrote {} result rows to '{}'", results.len(), path.display());
    Ok(path)
}

/// Write the segment table of one dataset (or ROI) to
/// `Segment Results/<file>[_<roi>].csv`, replacing any previous table.
pub fn write_segment_results(
    results_dir: &Path,
    file_name: &str,
    roi_name: Option<&str>,
    segments: &[SegmentFeatures],
    image_dim: u8,
) -> Result<PathBuf> {
    let dir = results_dir.join(SEGMENT_RESULTS_DIR);
    fs::create_dir_all(&dir)?;
    let stem = match roi_name {
        Some(roi) => format!("{}_{}", file_name, roi),
        None => file_name.to_string(),
    };
    let path = dir.join(format!("{}.csv", stem));

    let mut wtr = csv_writer(File::create(&path)?);
    wtr.write_record(["Filename:", file_name, "ROI Name:", roi_name.unwrap_or("None")])?;
    wtr.write_record(segment_header(image_dim))?;
    for row in segment_records(segments) {
        wtr.write_record(&row)?;
    }
    wtr.flush()?;

    debug!("Wrote {} segments to '{}'", segments.len(), path.display());
    Ok(path)
}

/// Write `(file name, ROI volume)` pairs.
pub fn write_roi_volumes(path: &Path, rows: &[(String, f64)]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut wtr = csv_writer(File::create(path)?);
    wtr.write_record(["File Name", "ROI Volume"])?;
    for (name, volume) in rows {
        wtr.write_record([name.as_str(), fmt(*volume).as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> NetworkSummary {
        let mut length_bins = [None; RADIUS_BINS];
        length_bins[1] = Some(4.0);
        let mut radius_bins = [0; RADIUS_BINS];
        radius_bins[1] = 2;
        NetworkSummary {
            file_name: "vessels".into(),
            roi_name: "None".into(),
            roi_volume: None,
            volume: Some(12.5),
            network_length: 8.0,
            surface_area: 30.0,
            branchpoints: 1,
            endpoints: 3,
            segment_count: 2,
            segment_partitioning: 0.25,
            mean_radius: 1.5,
            mean_length: 4.0,
            mean_tortuosity: 1.0,
            mean_volume: Some(6.25),
            mean_surface_area: 15.0,
            radius_bins,
            length_bins,
            tortuosity_bins: [None; RADIUS_BINS],
            surface_area_bins: [None; RADIUS_BINS],
        }
    }

    #[test]
    fn test_headers_layout() {
        let [topper, columns] = headers(3);
        assert_eq!(topper.len(), 99);
        assert_eq!(columns.len(), 99);
        assert_eq!(topper[2], "Main Results");
        assert_eq!(topper[15], "Number of Segments per Radius Bin");
        assert_eq!(topper[78], "Mean Segment Surface Area per Radius Bin");
        assert_eq!(columns[15], "0 - 1");
        assert_eq!(columns[35], "20+");
        assert_eq!(columns[36], "0 - 1");

        let [_, planar] = headers(2);
        assert_eq!(planar[3], "Percent Area Fraction (PAF) %");
        assert_eq!(planar[13], "Mean Segment PAF %");
        assert_eq!(segment_header(2)[1], "Segment Percent Area Fraction %");
    }

    #[test]
    fn test_result_record() {
        let row = result_record(&NetworkResult::Complete(Box::new(summary())));
        assert_eq!(row.len(), RESULT_COLUMNS);
        assert_eq!(row[2], "NA");
        assert_eq!(row[3], "12.500000");
        assert_eq!(row[6], "1");
        assert_eq!(row[16], "2");
        assert_eq!(row[15 + RADIUS_BINS + 1], "4.000000");
        assert_eq!(row[15 + RADIUS_BINS], "");

        let missing = result_record(&NetworkResult::RoiMissing {
            file_name: "a".into(),
            roi_name: "Cortex".into(),
        });
        assert_eq!(missing, vec!["a", "Cortex", "ROI not in dataset."]);
    }

    #[test]
    fn test_results_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let rows = [NetworkResult::Empty {
            file_name: "a".into(),
            roi_name: "None".into(),
        }];
        let path = write_results(dir.path(), &rows, 3).unwrap();
        write_results(dir.path(), &rows, 3).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("File Name,ROI Name"));
        assert_eq!(lines[2], "a,None,Empty dataset");
        assert_eq!(lines[3], lines[2]);
    }

    #[test]
    fn test_segment_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let seg = SegmentFeatures {
            volume: Some(3.0),
            length: 2.0,
            tortuosity: 1.0,
            ..Default::default()
        };
        let path = write_segment_results(dir.path(), "vessels", Some("Cortex"), &[seg], 3).unwrap();
        assert!(path.ends_with("Segment Results/vessels_Cortex.csv"));

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Filename:,vessels,ROI Name:,Cortex");
        assert!(lines[1].starts_with("Segment ID,Volume"));
        assert!(lines[2].starts_with("0,3.000000,2.000000"));
    }

    #[test]
    fn test_roi_volumes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volumes").join("ROI Volumes.csv");
        write_roi_volumes(&path, &[("cortex".into(), 2.5), ("bulb".into(), 0.0)]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "File Name,ROI Volume\ncortex,2.500000\nbulb,0.000000\n");
    }
}
