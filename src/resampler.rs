//! Resampling of a moving volume onto a reference grid.
//!
//! Every output voxel centre is taken from the reference grid into physical
//! space and from there into the moving volume's continuous index space
//! (identity spatial transform), where it is evaluated with the selected
//! kernel. Label volumes are always sampled nearest-neighbour so that no new
//! label value is ever synthesized.

use crate::enums::{Interpolation, SmoothKernel};
use crate::geometry::Geometry;
use crate::interpolator::{Interpolator, Sampler};
use crate::pixel::{PixelClass, PixelKind};
use crate::volume::Volume;

use nalgebra::Vector3;
use ndarray::{Array3, Zip};
use thiserror::Error;
use web_time::Instant;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Unknown pixel kind: {0}")]
    UnknownPixelKind(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResampleOptions {
    /// Value of output voxels that fall outside the moving volume.
    pub fill_value: f32,
    pub smooth_kernel: SmoothKernel,
    /// Spread the output over the rayon pool. The call still blocks until
    /// every voxel is written.
    pub parallel: bool,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            fill_value: 0.0,
            smooth_kernel: SmoothKernel::default(),
            parallel: true,
        }
    }
}

impl ResampleOptions {
    pub fn with_fill_value(mut self, fill_value: f32) -> Self {
        self.fill_value = fill_value;
        self
    }

    pub fn with_smooth_kernel(mut self, smooth_kernel: SmoothKernel) -> Self {
        self.smooth_kernel = smooth_kernel;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Stateless resampler; holds only its options and may be shared freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeResampler {
    options: ResampleOptions,
}

impl VolumeResampler {
    pub fn new(options: ResampleOptions) -> Self {
        Self { options }
    }

    /// Interpolation policy for a volume whose semantics the caller knows.
    pub fn interpolation_for(&self, is_label: bool) -> Interpolation {
        if is_label {
            Interpolation::NearestNeighbor
        } else {
            Interpolation::Smooth(self.options.smooth_kernel)
        }
    }

    /// Interpolation policy inferred from the declared pixel kind.
    ///
    /// # Errors
    ///
    /// Returns [`ResampleError::UnknownPixelKind`] when the kind is neither
    /// integer nor floating class.
    pub fn interpolation_for_kind(&self, kind: &PixelKind) -> Result<Interpolation, ResampleError> {
        match kind.class() {
            Some(PixelClass::Integer) => Ok(self.interpolation_for(true)),
            Some(PixelClass::Floating) => Ok(self.interpolation_for(false)),
            None => Err(ResampleError::UnknownPixelKind(kind.to_string())),
        }
    }

    /// Resample `moving` onto the grid of `reference`.
    ///
    /// Only the geometry of `reference` is read. The result always has the
    /// reference's size, spacing, origin and direction.
    ///
    /// # Errors
    ///
    /// Returns [`ResampleError::InvalidGeometry`] when either grid is
    /// malformed or `moving`'s buffer disagrees with its grid.
    pub fn resample_to_reference(
        &self,
        moving: &Volume,
        reference: &Volume,
        is_label: bool,
    ) -> Result<Volume, ResampleError> {
        self.resample_to_grid(moving, &reference.geometry, is_label)
    }

    /// Like [`resample_to_reference`](Self::resample_to_reference) but picks
    /// the kernel from `moving.pixel_kind`: nearest-neighbour for integer
    /// kinds, the smooth kernel for floating kinds.
    ///
    /// # Errors
    ///
    /// Returns [`ResampleError::UnknownPixelKind`] when the kind cannot be
    /// classified, or [`ResampleError::InvalidGeometry`] as above.
    pub fn resample_to_reference_auto(
        &self,
        moving: &Volume,
        reference: &Volume,
    ) -> Result<Volume, ResampleError> {
        let interpolation = self.interpolation_for_kind(&moving.pixel_kind)?;
        self.resample_with(moving, &reference.geometry, interpolation)
    }

    pub fn resample_to_grid(
        &self,
        moving: &Volume,
        grid: &Geometry,
        is_label: bool,
    ) -> Result<Volume, ResampleError> {
        self.resample_with(moving, grid, self.interpolation_for(is_label))
    }

    /// Resample with an explicit interpolation policy.
    pub fn resample_with(
        &self,
        moving: &Volume,
        grid: &Geometry,
        interpolation: Interpolation,
    ) -> Result<Volume, ResampleError> {
        moving.validate()?;
        grid.validate()?;

        let start = Instant::now();
        log::debug!(
            "Resampling {:?} ({}) onto {:?} with {:?}",
            moving.size(),
            moving.pixel_kind,
            grid.size,
            interpolation
        );

        // Output index -> physical -> moving continuous index, as one affine map.
        let physical_to_moving = moving.geometry.physical_to_index_matrix()?;
        let linear = physical_to_moving * grid.index_to_physical_matrix();
        let offset =
            physical_to_moving * (Vector3::from(grid.origin) - Vector3::from(moving.geometry.origin));

        let moving_dim = moving.dim();
        let sampler = Sampler::new(moving.data.view(), interpolation);
        let mut output = Array3::<f32>::from_elem(grid.shape(), self.options.fill_value);

        let sample = |(z, y, x): (usize, usize, usize), value: &mut f32| {
            let index: [f64; 3] = (linear * Vector3::new(x as f64, y as f64, z as f64) + offset).into();
            if Interpolator::is_inside(moving_dim, index) {
                *value = sampler.sample(index);
            }
        };
        if self.options.parallel {
            Zip::indexed(&mut output).par_for_each(sample);
        } else {
            Zip::indexed(&mut output).for_each(sample);
        }

        log::debug!(
            "Resampled {} voxels in {:?}",
            grid.voxel_count(),
            start.elapsed()
        );

        Ok(Volume::new(output, grid.clone(), moving.pixel_kind.clone()))
    }
}
