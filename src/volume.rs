use crate::geometry::{Geometry, ReferenceGrid};
use crate::pixel::PixelKind;
use crate::resampler::ResampleError;

use ndarray::Array3;

/// A scalar 3-D image with its physical grid.
///
/// Samples are stored as `f32` in `[z, y, x]` order regardless of the
/// declared `pixel_kind`; the kind records what the loader read so that
/// interpolation policy can be chosen from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub data: Array3<f32>,
    pub geometry: Geometry,
    pub pixel_kind: PixelKind,
}

impl Volume {
    pub fn new(data: Array3<f32>, geometry: Geometry, pixel_kind: PixelKind) -> Self {
        Self {
            data,
            geometry,
            pixel_kind,
        }
    }

    /// Volume with unit spacing, zero origin and identity direction.
    pub fn from_array(data: Array3<f32>, pixel_kind: PixelKind) -> Self {
        let (depth, height, width) = data.dim();
        let geometry = Geometry::axis_aligned([width, height, depth], [1.0; 3], [0.0; 3]);
        Self::new(data, geometry, pixel_kind)
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.geometry.spacing
    }

    pub fn size(&self) -> [usize; 3] {
        self.geometry.size
    }

    pub fn origin(&self) -> [f64; 3] {
        self.geometry.origin
    }

    /// The grid other volumes are resampled onto when this volume anchors a
    /// session.
    pub fn reference_grid(&self) -> ReferenceGrid {
        self.geometry.clone()
    }

    /// Sample at integer voxel index `(x, y, z)`.
    pub fn value_at(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        self.data.get((z, y, x)).copied()
    }

    /// Distinct sample values, sorted. Meant for label volumes.
    pub fn distinct_values(&self) -> Vec<f32> {
        let mut values: Vec<f32> = self.data.iter().copied().collect();
        values.sort_by(f32::total_cmp);
        values.dedup();
        values
    }

    pub fn is_grid_aligned_with(&self, other: &Volume) -> bool {
        self.geometry == other.geometry
    }

    /// Check the grid and that the buffer shape agrees with it.
    ///
    /// # Errors
    ///
    /// Returns [`ResampleError::InvalidGeometry`] when the grid is malformed
    /// or the buffer dimensions disagree with `size`.
    pub fn validate(&self) -> Result<(), ResampleError> {
        self.geometry.validate()?;
        if self.data.dim() != self.geometry.shape() {
            return Err(ResampleError::InvalidGeometry(format!(
                "buffer shape {:?} does not match grid size {:?}",
                self.data.dim(),
                self.geometry.size
            )));
        }
        Ok(())
    }
}
