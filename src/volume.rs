//! Dense image grids.
//!
//! Volumes are stored row-major and indexed `(z, y, x)`. Planar (2D) images
//! use a depth of 1 and carry the `planar` flag so later stages can restrict
//! neighbourhood searches to the image plane.

use std::ops::{Index, IndexMut};

/// A 3D grid (row-major, x fastest).
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    pub depth: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<T>,
    /// True when the grid was loaded from a 2D image.
    pub planar: bool,
}

/// Binary or labeled voxel volume.
pub type Volume = Grid<u8>;

impl<T: Copy + Default> Grid<T> {
    /// Create a grid filled with the default value.
    pub fn new(depth: usize, height: usize, width: usize) -> Self {
        Self {
            depth,
            height,
            width,
            data: vec![T::default(); depth * height * width],
            planar: false,
        }
    }

    /// Create a single-slice grid for 2D images.
    pub fn new_planar(height: usize, width: usize) -> Self {
        let mut grid = Self::new(1, height, width);
        grid.planar = true;
        grid
    }

    /// Create a grid from an existing buffer (x fastest).
    pub fn from_vec(depth: usize, height: usize, width: usize, data: Vec<T>) -> Self {
        assert_eq!(data.len(), depth * height * width);
        Self {
            depth,
            height,
            width,
            data,
            planar: false,
        }
    }

    pub fn with_planar(mut self, planar: bool) -> Self {
        self.planar = planar;
        self
    }

    /// Shape as `[z, y, x]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.depth, self.height, self.width]
    }

    /// Shape of the image the grid represents: `[y, x]` for planar grids.
    pub fn image_shape(&self) -> Vec<usize> {
        if self.planar {
            vec![self.height, self.width]
        } else {
            vec![self.depth, self.height, self.width]
        }
    }

    #[inline]
    pub fn offset(&self, z: usize, y: usize, x: usize) -> usize {
        (z * self.height + y) * self.width + x
    }

    /// Value at (z, y, x), or the default value when out of bounds.
    #[inline]
    pub fn get(&self, z: usize, y: usize, x: usize) -> T {
        if z < self.depth && y < self.height && x < self.width {
            self.data[self.offset(z, y, x)]
        } else {
            T::default()
        }
    }

    /// Value at signed coordinates, `None` when out of bounds.
    #[inline]
    pub fn get_opt(&self, z: isize, y: isize, x: isize) -> Option<T> {
        if z >= 0
            && y >= 0
            && x >= 0
            && (z as usize) < self.depth
            && (y as usize) < self.height
            && (x as usize) < self.width
        {
            Some(self.data[self.offset(z as usize, y as usize, x as usize)])
        } else {
            None
        }
    }

    #[inline]
    pub fn set(&mut self, z: usize, y: usize, x: usize, val: T) {
        if z < self.depth && y < self.height && x < self.width {
            let i = self.offset(z, y, x);
            self.data[i] = val;
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Apply a function to every voxel.
    pub fn map<U: Copy + Default, F: Fn(T) -> U>(&self, f: F) -> Grid<U> {
        Grid {
            depth: self.depth,
            height: self.height,
            width: self.width,
            data: self.data.iter().map(|v| f(*v)).collect(),
            planar: self.planar,
        }
    }

    /// Copy out the inclusive box `[min, max]`.
    pub fn crop(&self, min: [usize; 3], max: [usize; 3]) -> Self {
        let d = max[0] + 1 - min[0];
        let h = max[1] + 1 - min[1];
        let w = max[2] + 1 - min[2];
        let mut data = Vec::with_capacity(d * h * w);
        for z in min[0]..=max[0] {
            for y in min[1]..=max[1] {
                let start = self.offset(z, y, min[2]);
                data.extend_from_slice(&self.data[start..start + w]);
            }
        }
        Self {
            depth: d,
            height: h,
            width: w,
            data,
            planar: self.planar,
        }
    }
}

impl<T: Copy + Default + PartialEq> Grid<T> {
    /// Number of voxels different from the default value.
    pub fn count_nonzero(&self) -> usize {
        let zero = T::default();
        self.data.iter().filter(|v| **v != zero).count()
    }

    pub fn any(&self) -> bool {
        let zero = T::default();
        self.data.iter().any(|v| *v != zero)
    }

    /// Coordinates of all non-default voxels in scan order.
    pub fn nonzero_points(&self) -> Vec<[usize; 3]> {
        let zero = T::default();
        let mut points = Vec::new();
        for z in 0..self.depth {
            for y in 0..self.height {
                for x in 0..self.width {
                    if self.data[self.offset(z, y, x)] != zero {
                        points.push([z, y, x]);
                    }
                }
            }
        }
        points
    }
}

impl<T> Index<(usize, usize, usize)> for Grid<T> {
    type Output = T;
    fn index(&self, (z, y, x): (usize, usize, usize)) -> &T {
        &self.data[(z * self.height + y) * self.width + x]
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Grid<T> {
    fn index_mut(&mut self, (z, y, x): (usize, usize, usize)) -> &mut T {
        &mut self.data[(z * self.height + y) * self.width + x]
    }
}

/// Physical voxel spacing in `[z, y, x]` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution(pub [f64; 3]);

impl Resolution {
    /// Isotropic spacing.
    pub fn isotropic(r: f64) -> Self {
        Resolution([r, r, r])
    }

    /// Build from user-facing `[X, Y, Z]` spacing.
    pub fn from_xyz(xyz: [f64; 3]) -> Self {
        Resolution([xyz[2], xyz[1], xyz[0]])
    }

    pub fn min(&self) -> f64 {
        self.0.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    /// Volume of one voxel.
    pub fn voxel_volume(&self) -> f64 {
        self.0.iter().product()
    }

    /// Area of one pixel for planar data, otherwise the voxel volume.
    pub fn cell_size(&self, planar: bool) -> f64 {
        if planar {
            self.0[1] * self.0[2]
        } else {
            self.voxel_volume()
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::isotropic(1.0)
    }
}
