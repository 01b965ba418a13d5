//! Centerline radius estimation.
//!
//! A plain Euclidean distance transform measures from voxel centre to voxel
//! centre, which overestimates vessel radii by half a voxel along the
//! principal axes. Distances to background voxels that differ from the point
//! along a single axis are therefore shortened by half the resolution on that
//! axis. Diagonal distances are kept as is.
//!
//! For each skeleton point the search box grows until it contains at least
//! four background voxels; the radius is the mean of the four smallest
//! corrected distances.

use rayon::prelude::*;

use crate::volume::{Resolution, Volume};

/// Largest search half-width.
pub const MAX_SEARCH: usize = 150;

/// Corrected distance for an absolute voxel offset `(dz, dy, dx)`.
pub fn corrected_distance(offset: [usize; 3], resolution: &Resolution) -> f64 {
    let nonzero = offset.iter().filter(|&&o| o != 0).count();
    if nonzero == 1 {
        let axis = offset.iter().position(|&o| o != 0).unwrap_or(0);
        let r = resolution.0[axis];
        offset[axis] as f64 * r - r / 2.0
    } else {
        offset
            .iter()
            .zip(resolution.0.iter())
            .map(|(&o, &r)| (o as f64 * r).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

fn point_radius(volume: &Volume, p: [usize; 3], resolution: &Resolution) -> f64 {
    let planar = volume.planar;
    let dims = volume.shape();
    let mut found: Vec<f64> = Vec::new();

    for i in 0..MAX_SEARCH {
        // Only the shell at Chebyshev distance i is new at this step.
        let lo = |axis: usize| p[axis].saturating_sub(i);
        let hi = |axis: usize| (p[axis] + i).min(dims[axis] - 1);
        let (z0, z1) = if planar { (p[0], p[0]) } else { (lo(0), hi(0)) };
        for z in z0..=z1 {
            let dz = z.abs_diff(p[0]);
            for y in lo(1)..=hi(1) {
                let dy = y.abs_diff(p[1]);
                let row = volume.offset(z, y, 0);
                let interior_row = dz < i && dy < i;
                let mut visit = |x: usize| {
                    if volume.data[row + x] == 0 {
                        let dx = x.abs_diff(p[2]);
                        found.push(corrected_distance([dz, dy, dx], resolution));
                    }
                };
                if interior_row {
                    if p[2] >= i {
                        visit(p[2] - i);
                    }
                    if i > 0 && p[2] + i < dims[2] {
                        visit(p[2] + i);
                    }
                } else {
                    for x in lo(2)..=hi(2) {
                        visit(x);
                    }
                }
            }
        }

        if found.len() > 3 {
            found.sort_by(|a, b| a.total_cmp(b));
            return found[..4].iter().sum::<f64>() / 4.0;
        }
    }

    let last = MAX_SEARCH - 1;
    let fallback = if planar { [0, last, last] } else { [last, last, last] };
    corrected_distance(fallback, resolution)
}

/// Radius of each skeleton point, in physical units.
pub fn calculate_radii(volume: &Volume, points: &[[usize; 3]], resolution: &Resolution) -> Vec<f64> {
    points
        .par_iter()
        .map(|&p| point_radius(volume, p, resolution))
        .collect()
}

/// Radii in voxel units, used for rendering and graph exports.
pub fn calculate_vis_radii(volume: &Volume, points: &[[usize; 3]]) -> Vec<f64> {
    calculate_radii(volume, points, &Resolution::isotropic(1.0))
}
