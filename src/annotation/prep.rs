//! Lookup tables that map annotation values onto ROI rows.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::annotation::tree::AnnotationData;
use crate::volume_io::read_rgb_plane;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AnnotationType {
    #[default]
    None,
    /// Voxel values are region ids.
    Id,
    /// Pixel colours are region hex colours.
    Rgb,
}

/// Parse a hex colour (`"#7ED04B"` or `"7ED04B"`) into `r << 16 | g << 8 | b`.
pub fn hex_to_int(hex: &str) -> Result<u32> {
    let digits = hex.trim().trim_start_matches('#');
    u32::from_str_radix(digits, 16).map_err(|_| Error::Annotation(format!("invalid hex colour '{}'", hex)))
}

/// One row per ROI holding the annotation values that belong to it.
pub fn build_roi_array(data: &AnnotationData, annotation_type: AnnotationType) -> Result<Vec<Vec<u32>>> {
    data.regions
        .iter()
        .map(|(name, family)| match annotation_type {
            AnnotationType::Id => family
                .ids
                .iter()
                .map(|&id| {
                    u32::try_from(id).map_err(|_| Error::Annotation(format!("region '{}' has invalid id {}", name, id)))
                })
                .collect(),
            AnnotationType::Rgb => family.colors.iter().map(|c| hex_to_int(c)).collect(),
            AnnotationType::None => Err(Error::Annotation("no annotation type selected".into())),
        })
        .collect()
}

/// Map each annotation value to its ROI row. Zero is background and never
/// mapped. A value listed by several ROIs belongs to the last of them.
pub fn build_id_map(roi_array: &[Vec<u32>]) -> HashMap<u32, usize> {
    let mut map = HashMap::new();
    for (row, values) in roi_array.iter().enumerate() {
        for &v in values.iter().filter(|&&v| v != 0) {
            map.insert(v, row);
        }
    }
    map
}

/// The annotation volume must have the dataset's shape.
pub fn id_dim_check(annotation_shape: [usize; 3], volume_shape: [usize; 3]) -> Result<()> {
    if annotation_shape != volume_shape {
        return Err(Error::DimensionMismatch {
            expected: volume_shape.to_vec(),
            found: annotation_shape.to_vec(),
        });
    }
    Ok(())
}

/// An RGB series needs one image per z-slice, each of the dataset's
/// in-plane size.
pub fn rgb_dim_check(files: &[PathBuf], volume_shape: [usize; 3]) -> Result<()> {
    let first = files
        .first()
        .ok_or_else(|| Error::Annotation("RGB annotation folder holds no images".into()))?;
    let (h, w, _) = read_rgb_plane(first)?;
    let found = [files.len(), h, w];
    if found != volume_shape {
        return Err(Error::DimensionMismatch {
            expected: volume_shape.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}
