//! Physical grid description shared by every volume.
//!
//! A grid maps a voxel index `(x, y, z)` to a physical point (mm) through
//!
//! ```text
//! point = origin + direction * (spacing ⊙ index)
//! ```
//!
//! where the columns of `direction` are the unit directions of the three
//! image axes. Two volumes with equal geometry are grid-aligned: their voxel
//! indices correspond 1:1 in physical space.

use nalgebra::{Matrix3, Vector3};

use crate::resampler::ResampleError;

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Voxel counts along (x, y, z).
    pub size: [usize; 3],
    /// Physical voxel size along (x, y, z).
    pub spacing: [f64; 3],
    /// Physical position of voxel (0, 0, 0).
    pub origin: [f64; 3],
    /// Direction cosines, one column per image axis.
    pub direction: Matrix3<f64>,
}

/// The target grid of a resample call, taken from an anchor volume.
pub type ReferenceGrid = Geometry;

impl Geometry {
    pub fn new(
        size: [usize; 3],
        spacing: [f64; 3],
        origin: [f64; 3],
        direction: Matrix3<f64>,
    ) -> Self {
        Self {
            size,
            spacing,
            origin,
            direction,
        }
    }

    /// Grid whose axes coincide with the physical axes.
    pub fn axis_aligned(size: [usize; 3], spacing: [f64; 3], origin: [f64; 3]) -> Self {
        Self::new(size, spacing, origin, Matrix3::identity())
    }

    /// ndarray shape of a buffer on this grid: (depth, height, width).
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.size[2], self.size[1], self.size[0])
    }

    pub fn voxel_count(&self) -> usize {
        self.size.iter().product()
    }

    /// Check that the grid defines an invertible index→physical mapping.
    ///
    /// # Errors
    ///
    /// Returns [`ResampleError::InvalidGeometry`] for an empty axis, a
    /// non-positive or non-finite spacing, a non-finite origin, or a singular
    /// direction matrix.
    pub fn validate(&self) -> Result<(), ResampleError> {
        if let Some(axis) = self.size.iter().position(|&n| n == 0) {
            return Err(ResampleError::InvalidGeometry(format!(
                "size along axis {axis} is zero"
            )));
        }
        if let Some(axis) = self
            .spacing
            .iter()
            .position(|&s| !s.is_finite() || s <= 0.0)
        {
            return Err(ResampleError::InvalidGeometry(format!(
                "spacing along axis {axis} is {}",
                self.spacing[axis]
            )));
        }
        if self.origin.iter().any(|o| !o.is_finite()) {
            return Err(ResampleError::InvalidGeometry(
                "origin is not finite".to_string(),
            ));
        }
        if self.direction.iter().any(|d| !d.is_finite()) {
            return Err(ResampleError::InvalidGeometry(
                "direction is not finite".to_string(),
            ));
        }
        if self.direction.determinant().abs() < 1e-9 {
            return Err(ResampleError::InvalidGeometry(
                "direction matrix is singular".to_string(),
            ));
        }
        Ok(())
    }

    /// Linear part of the index→physical mapping: `direction * diag(spacing)`.
    pub fn index_to_physical_matrix(&self) -> Matrix3<f64> {
        self.direction * Matrix3::from_diagonal(&Vector3::from(self.spacing))
    }

    pub fn index_to_physical(&self, index: [f64; 3]) -> [f64; 3] {
        let point =
            Vector3::from(self.origin) + self.index_to_physical_matrix() * Vector3::from(index);
        point.into()
    }

    /// Continuous (fractional) index of a physical point.
    ///
    /// # Errors
    ///
    /// Fails with [`ResampleError::InvalidGeometry`] when the grid is not
    /// invertible.
    pub fn physical_to_continuous_index(&self, point: [f64; 3]) -> Result<[f64; 3], ResampleError> {
        let inverse = self.physical_to_index_matrix()?;
        let index = inverse * (Vector3::from(point) - Vector3::from(self.origin));
        Ok(index.into())
    }

    pub(crate) fn physical_to_index_matrix(&self) -> Result<Matrix3<f64>, ResampleError> {
        self.index_to_physical_matrix().try_inverse().ok_or_else(|| {
            ResampleError::InvalidGeometry("index to physical mapping is singular".to_string())
        })
    }

    /// Whether `other` describes the same grid within `tolerance` (mm for the
    /// origin, relative units elsewhere).
    pub fn is_aligned_with(&self, other: &Geometry, tolerance: f64) -> bool {
        let close = |a: &[f64], b: &[f64]| a.iter().zip(b).all(|(a, b)| (a - b).abs() <= tolerance);
        self.size == other.size
            && close(&self.spacing, &other.spacing)
            && close(&self.origin, &other.origin)
            && close(self.direction.as_slice(), other.direction.as_slice())
    }
}
