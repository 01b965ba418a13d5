//! Volume preparation before skeletonization: binarize, bound, pad.

use crate::error::{Error, Result};
use crate::volume::{Grid, Volume};

/// Inclusive bounding box of nonzero voxels, or `None` for an empty grid.
pub fn foreground_bounds<T: Copy + Default + PartialEq>(
    grid: &Grid<T>,
) -> Option<([usize; 3], [usize; 3])> {
    let zero = T::default();
    let mut mins = [usize::MAX; 3];
    let mut maxes = [0usize; 3];
    let mut found = false;
    for z in 0..grid.depth {
        for y in 0..grid.height {
            let row = grid.offset(z, y, 0);
            for x in 0..grid.width {
                if grid.data[row + x] == zero {
                    continue;
                }
                found = true;
                for (axis, c) in [z, y, x].into_iter().enumerate() {
                    mins[axis] = mins[axis].min(c);
                    maxes[axis] = maxes[axis].max(c);
                }
            }
        }
    }
    found.then_some((mins, maxes))
}

/// Binarize a volume and crop it to the bounding box of its foreground.
///
/// Returns the bounded volume and the `[z, y, x]` minima needed to map
/// points back to the original image space. Planar volumes always report a
/// z minimum of 0.
pub fn volume_prep(volume: &Volume) -> Result<(Volume, [usize; 3])> {
    let binary = volume.map(|v| u8::from(v != 0));
    let (mins, maxes) = foreground_bounds(&binary).ok_or(Error::EmptyVolume)?;
    let bounded = binary.crop(mins, maxes);
    Ok((bounded, mins))
}

/// Add a one-voxel zero border. Planar volumes are padded in-plane only.
pub fn pad_volume<T: Copy + Default>(volume: &Grid<T>) -> Grid<T> {
    let dz = if volume.planar { 0 } else { 1 };
    let mut padded = Grid::new(volume.depth + 2 * dz, volume.height + 2, volume.width + 2)
        .with_planar(volume.planar);
    for z in 0..volume.depth {
        for y in 0..volume.height {
            let src = volume.offset(z, y, 0);
            let dst = padded.offset(z + dz, y + 1, 1);
            padded.data[dst..dst + volume.width]
                .copy_from_slice(&volume.data[src..src + volume.width]);
        }
    }
    padded
}

/// Translate points from a bounded (and padded) volume back into the
/// original image space.
pub fn absolute_points(points: &[[usize; 3]], minima: [usize; 3], padding: [usize; 3]) -> Vec<[f64; 3]> {
    points
        .iter()
        .map(|p| {
            let mut out = [0.0; 3];
            for axis in 0..3 {
                out[axis] = (p[axis] + minima[axis]) as f64 - padding[axis] as f64;
            }
            out
        })
        .collect()
}

/// Padding that [`pad_volume`] applies to each axis.
pub fn padding_of(volume: &Volume) -> [usize; 3] {
    if volume.planar {
        [0, 1, 1]
    } else {
        [1, 1, 1]
    }
}
