/// Kernel used for continuous (intensity) volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothKernel {
    #[default]
    Linear,
    /// Interpolating cubic B-spline.
    BSpline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Copies the closest voxel; the only policy allowed for label volumes.
    NearestNeighbor,
    Smooth(SmoothKernel),
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Smooth(SmoothKernel::default())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}
