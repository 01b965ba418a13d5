//! Annotation-driven ROI analysis.
//!
//! An annotation is either an ID volume (each voxel holds a region id, e.g.
//! an atlas) or an RGB image series (each pixel's colour names a region).
//! Selected regions are resolved against an annotation tree, the vessel
//! volume is labeled with one label per ROI, and each ROI is then segmented
//! out and analysed on its own.

pub mod labeling;
pub mod prep;
pub mod segmentation;
pub mod tree;

pub use labeling::{label_annotation_file, volume_labeling, Labeling};
pub use prep::{build_id_map, build_roi_array, AnnotationType};
pub use segmentation::segment_roi;
pub use tree::{AnnotationData, RoiFamily};
