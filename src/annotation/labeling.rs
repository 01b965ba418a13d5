//! Labeling a vessel volume with ROI rows from an annotation.

use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::annotation::prep::{build_id_map, id_dim_check, rgb_dim_check, AnnotationType};
use crate::error::{Error, Result};
use crate::volume::{Grid, Volume};
use crate::volume_io::{dir_files, load_raw, read_series};

/// Annotation images of an RGB series.
const RGB_EXTENSION: &str = "png";

/// A labeled volume and per-ROI statistics.
#[derive(Debug, Clone)]
pub struct Labeling {
    /// Foreground voxels inside ROI row `k` hold `k + 1`; all others hold 0.
    pub labeled: Grid<u32>,
    /// Annotation voxels per ROI, vessel or not.
    pub roi_volumes: Vec<u64>,
    /// Inclusive bounds of each ROI's vessel voxels.
    pub minima: Vec<[usize; 3]>,
    pub maxima: Vec<[usize; 3]>,
}

impl Labeling {
    /// Bounds of ROI `row`, or `None` when it holds no vessel voxels.
    pub fn bounds(&self, row: usize) -> Option<([usize; 3], [usize; 3])> {
        let (min, max) = (self.minima[row], self.maxima[row]);
        (0..3).all(|k| min[k] <= max[k]).then_some((min, max))
    }
}

struct SliceStats {
    counts: Vec<u64>,
    minima: Vec<[usize; 3]>,
    maxima: Vec<[usize; 3]>,
}

impl SliceStats {
    fn new(n: usize) -> Self {
        Self {
            counts: vec![0; n],
            minima: vec![[usize::MAX; 3]; n],
            maxima: vec![[0; 3]; n],
        }
    }

    fn update(&mut self, row: usize, p: [usize; 3]) {
        for k in 0..3 {
            self.minima[row][k] = self.minima[row][k].min(p[k]);
            self.maxima[row][k] = self.maxima[row][k].max(p[k]);
        }
    }

    fn merge(mut self, other: SliceStats) -> SliceStats {
        for row in 0..self.counts.len() {
            self.counts[row] += other.counts[row];
            for k in 0..3 {
                self.minima[row][k] = self.minima[row][k].min(other.minima[row][k]);
                self.maxima[row][k] = self.maxima[row][k].max(other.maxima[row][k]);
            }
        }
        self
    }
}

/// Label `volume` with the ROI rows of `roi_array` found in `annotation`.
///
/// All ROIs are labeled in one pass; slices are processed in parallel and
/// their statistics reduced afterwards.
pub fn volume_labeling(volume: &Volume, annotation: &Grid<u32>, roi_array: &[Vec<u32>]) -> Result<Labeling> {
    id_dim_check(annotation.shape(), volume.shape())?;
    let ids = build_id_map(roi_array);
    let n = roi_array.len();
    let plane = volume.height * volume.width;
    let width = volume.width.max(1);

    let mut labeled = volume.map(u32::from);
    let stats = labeled
        .data
        .par_chunks_mut(plane.max(1))
        .zip(annotation.data.par_chunks(plane.max(1)))
        .enumerate()
        .map(|(z, (labels, values))| {
            let mut stats = SliceStats::new(n);
            for (i, (label, value)) in labels.iter_mut().zip(values).enumerate() {
                match ids.get(value) {
                    Some(&row) => {
                        stats.counts[row] += 1;
                        if *label != 0 {
                            *label = row as u32 + 1;
                            stats.update(row, [z, i / width, i % width]);
                        }
                    }
                    None => *label = 0,
                }
            }
            stats
        })
        .reduce(|| SliceStats::new(n), SliceStats::merge);

    debug!("Labeled volume: ROI voxel counts {:?}", stats.counts);
    Ok(Labeling {
        labeled,
        roi_volumes: stats.counts,
        minima: stats.minima,
        maxima: stats.maxima,
    })
}

/// Load an annotation (an ID volume file or an RGB image folder) and label
/// `volume` with it.
pub fn label_annotation_file(
    volume: &Volume,
    annotation_path: &Path,
    annotation_type: AnnotationType,
    roi_array: &[Vec<u32>],
) -> Result<Labeling> {
    let annotation = match annotation_type {
        AnnotationType::Id => load_raw(annotation_path)?,
        AnnotationType::Rgb => {
            let files = dir_files(annotation_path, Some(RGB_EXTENSION))?;
            rgb_dim_check(&files, volume.shape())?;
            read_series(annotation_path, Some(RGB_EXTENSION), true)?.with_planar(volume.planar)
        }
        AnnotationType::None => return Err(Error::Annotation("no annotation type selected".into())),
    };
    let labeling = volume_labeling(volume, &annotation, roi_array)?;
    info!("Labeled {} ROIs from '{}'", roi_array.len(), annotation_path.display());
    Ok(labeling)
}
