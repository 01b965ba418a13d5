//! Extracting a single ROI from a labeled volume.

use crate::volume::{Grid, Volume};

/// Crop `labeled` to the inclusive box `[minima, maxima]` and keep only the
/// voxels carrying `label`.
pub fn segment_roi(labeled: &Grid<u32>, minima: [usize; 3], maxima: [usize; 3], label: u32) -> Volume {
    labeled.crop(minima, maxima).map(|v| u8::from(v == label))
}

/// A segmented ROI must still hold vessel voxels.
pub fn segmentation_check(volume: &Volume) -> bool {
    volume.any()
}
