//! Lee '94 medial-axis thinning.
//!
//! Reference: T.C. Lee, R.L. Kashyap, C.N. Chu. *Building skeleton models
//! via 3-D medial surface/axis thinning algorithms*. CVGIP 1994.
//!
//! Each subiteration scans one border direction. Candidate points are found
//! in parallel against a snapshot of the volume, then removed one at a time
//! with the simple-point test repeated against the live volume, which keeps
//! the removal topology-preserving. Thinning stops once a full cycle over
//! every direction removes nothing.
//!
//! The 3x3x3 neighbourhood of `(z, y, x)` is flattened as
//! `(dz + 1) * 9 + (dx + 1) * 3 + (dy + 1)`; index 13 is the centre.

use rayon::prelude::*;
use tracing::debug;

use crate::volume::Volume;

/// Border directions as `(dz, dy, dx)`: N, S, E, W, U, B.
/// Planar volumes only use the first four.
const BORDERS: [[isize; 3]; 6] = [
    [0, 0, -1],
    [0, 0, 1],
    [0, 1, 0],
    [0, -1, 0],
    [1, 0, 0],
    [-1, 0, 0],
];

/// Lee '94 Table 2: Euler characteristic change for each octant
/// configuration. Only odd configurations (centre set) are stored.
const EULER_TABLE: [i8; 128] = [
    1, -1, -1, 1, -3, -1, -1, 1, -1, 1, 1, -1, 3, 1, 1, -1, //
    -3, -1, 3, 1, 1, -1, 3, 1, -1, 1, 1, -1, 3, 1, 1, -1, //
    -3, 3, -1, 1, 1, 3, -1, 1, -1, 1, 1, -1, 3, 1, 1, -1, //
    1, 3, 3, 1, 5, 3, 3, 1, -1, 1, 1, -1, 3, 1, 1, -1, //
    -7, -1, -1, 1, -3, -1, -1, 1, -1, 1, 1, -1, 3, 1, 1, -1, //
    -3, -1, 3, 1, 1, -1, 3, 1, -1, 1, 1, -1, 3, 1, 1, -1, //
    -3, 3, -1, 1, 1, 3, -1, 1, -1, 1, 1, -1, 3, 1, 1, -1, //
    1, 3, 3, 1, 5, 3, 3, 1, -1, 1, 1, -1, 3, 1, 1, -1,
];

/// Neighbourhood indices of the eight octants (SWU, SEU, NWU, NEU, SWB, SEB,
/// NWB, NEB), ordered from the most to the least significant bit.
const OCTANTS: [[usize; 7]; 8] = [
    [24, 25, 15, 16, 21, 22, 12],
    [26, 23, 17, 14, 25, 22, 16],
    [18, 21, 9, 12, 19, 22, 10],
    [20, 23, 19, 22, 11, 14, 10],
    [6, 15, 7, 16, 3, 12, 4],
    [8, 7, 17, 16, 5, 4, 14],
    [0, 9, 3, 12, 1, 10, 4],
    [2, 1, 11, 10, 5, 4, 14],
];

type Neighborhood = [u8; 27];

#[inline]
fn nb_index(dz: isize, dy: isize, dx: isize) -> usize {
    ((dz + 1) * 9 + (dx + 1) * 3 + (dy + 1)) as usize
}

/// Offsets `(dz, dy, dx)` of each flattened neighbourhood index.
fn nb_offsets() -> [[isize; 3]; 27] {
    let mut out = [[0isize; 3]; 27];
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                out[nb_index(dz, dy, dx)] = [dz, dy, dx];
            }
        }
    }
    out
}

fn neighborhood(volume: &Volume, p: [usize; 3]) -> Neighborhood {
    let mut nb = [0u8; 27];
    let (z, y, x) = (p[0] as isize, p[1] as isize, p[2] as isize);
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let v = volume.get_opt(z + dz, y + dy, x + dx).unwrap_or(0);
                nb[nb_index(dz, dy, dx)] = u8::from(v != 0);
            }
        }
    }
    nb
}

/// Endpoints have at most one foreground neighbour.
#[inline]
fn is_endpoint(nb: &Neighborhood) -> bool {
    nb.iter().map(|&v| v as u32).sum::<u32>() <= 2
}

/// True when removing the centre leaves the Euler characteristic unchanged.
fn is_euler_invariant(nb: &Neighborhood) -> bool {
    let mut euler = 0i32;
    for octant in &OCTANTS {
        let mut n = 1usize;
        for (bit, &i) in octant.iter().enumerate() {
            if nb[i] != 0 {
                n |= 1 << (7 - bit);
            }
        }
        euler += EULER_TABLE[n >> 1] as i32;
    }
    euler == 0
}

/// A point is simple when its foreground 26-neighbours form exactly one
/// 26-connected component.
fn is_simple_point(nb: &Neighborhood, offsets: &[[isize; 3]; 27]) -> bool {
    let fg: Vec<usize> = (0..27).filter(|&i| i != 13 && nb[i] != 0).collect();
    let Some(&first) = fg.first() else {
        return false;
    };
    let mut visited = [false; 27];
    visited[first] = true;
    let mut stack = vec![first];
    let mut reached = 1usize;
    while let Some(a) = stack.pop() {
        for &b in &fg {
            if visited[b] {
                continue;
            }
            let adjacent = (0..3).all(|k| (offsets[a][k] - offsets[b][k]).abs() <= 1);
            if adjacent {
                visited[b] = true;
                reached += 1;
                stack.push(b);
            }
        }
    }
    reached == fg.len()
}

/// Thin a padded binary volume in place down to its centerlines.
pub fn thin(volume: &mut Volume) {
    let offsets = nb_offsets();
    let borders: &[[isize; 3]] = if volume.planar {
        &BORDERS[..4]
    } else {
        &BORDERS[..]
    };

    let mut points = volume.nonzero_points();
    let mut cycles = 0usize;
    loop {
        let mut removed_in_cycle = 0usize;
        for dir in borders {
            let snapshot: &Volume = volume;
            let candidates: Vec<usize> = points
                .par_iter()
                .enumerate()
                .filter(|(_, p)| {
                    let border = snapshot
                        .get_opt(
                            p[0] as isize + dir[0],
                            p[1] as isize + dir[1],
                            p[2] as isize + dir[2],
                        )
                        .unwrap_or(0)
                        == 0;
                    if !border {
                        return false;
                    }
                    let nb = neighborhood(snapshot, **p);
                    !is_endpoint(&nb)
                        && is_euler_invariant(&nb)
                        && is_simple_point(&nb, &offsets)
                })
                .map(|(i, _)| i)
                .collect();

            let mut alive = vec![true; points.len()];
            let mut removed = 0usize;
            for i in candidates {
                let p = points[i];
                let nb = neighborhood(volume, p);
                if is_simple_point(&nb, &offsets) {
                    volume[(p[0], p[1], p[2])] = 0;
                    alive[i] = false;
                    removed += 1;
                }
            }
            if removed > 0 {
                let mut keep = alive.into_iter();
                points.retain(|_| keep.next().unwrap_or(true));
            }
            removed_in_cycle += removed;
        }
        cycles += 1;
        debug!("Thinning cycle {}: removed {} points", cycles, removed_in_cycle);
        if removed_in_cycle == 0 {
            break;
        }
    }
}

/// Skeletonize a padded binary volume and return the centerline points in
/// scan order.
pub fn skeletonize(volume: &Volume) -> Vec<[usize; 3]> {
    let mut skeleton = volume.clone();
    thin(&mut skeleton);
    skeleton.nonzero_points()
}
