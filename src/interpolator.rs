use ndarray::{Array3, ArrayView3, Axis};

use crate::enums::{Interpolation, SmoothKernel};

/// Pole of the cubic B-spline prefilter, `sqrt(3) - 2`.
const BSPLINE_POLE: f64 = -0.267_949_192_431_122_7;
const PREFILTER_TOLERANCE: f64 = 1e-10;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Whether a continuous `(x, y, z)` index falls inside the buffer padded
    /// by half a voxel on every side. The far border is excluded, so each axis
    /// covers `[-0.5, n - 0.5)`.
    #[inline]
    pub(crate) fn is_inside(dim: (usize, usize, usize), index: [f64; 3]) -> bool {
        let (depth, height, width) = dim;
        index
            .iter()
            .zip([width, height, depth])
            .all(|(&c, n)| c >= -0.5 && c < n as f64 - 0.5)
    }

    #[inline]
    pub(crate) fn nearest(volume: &ArrayView3<f32>, index: [f64; 3]) -> f32 {
        let (depth, height, width) = volume.dim();
        let x = Self::round_clamped(index[0], width);
        let y = Self::round_clamped(index[1], height);
        let z = Self::round_clamped(index[2], depth);
        volume[[z, y, x]]
    }

    #[inline]
    pub(crate) fn trilinear_interpolate(volume: &ArrayView3<f32>, index: [f64; 3]) -> f32 {
        let (depth, height, width) = volume.dim();

        let x = index[0].clamp(0.0, (width - 1) as f64);
        let y = index[1].clamp(0.0, (height - 1) as f64);
        let z = index[2].clamp(0.0, (depth - 1) as f64);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let z0 = z.floor() as usize;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let z1 = (z0 + 1).min(depth - 1);

        let dx = (x - x0 as f64) as f32;
        let dy = (y - y0 as f64) as f32;
        let dz = (z - z0 as f64) as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;
        let one_minus_dz = 1.0 - dz;

        let lerp_x = |z: usize, y: usize| {
            volume[[z, y, x0]].mul_add(one_minus_dx, volume[[z, y, x1]] * dx)
        };

        let v00 = lerp_x(z0, y0);
        let v01 = lerp_x(z0, y1);
        let v10 = lerp_x(z1, y0);
        let v11 = lerp_x(z1, y1);

        let v0 = v00.mul_add(one_minus_dy, v01 * dy);
        let v1 = v10.mul_add(one_minus_dy, v11 * dy);

        v0.mul_add(one_minus_dz, v1 * dz)
    }

    // Round half up, as ITK's nearest-neighbour interpolator does.
    #[inline]
    fn round_clamped(c: f64, n: usize) -> usize {
        ((c + 0.5).floor().max(0.0) as usize).min(n - 1)
    }
}

/// Cubic B-spline basis.
///
/// - (2/3) - |x|^2 + (1/2)|x|^3    for |x| < 1
/// - (1/6)(2 - |x|)^3              for 1 <= |x| < 2
/// - 0                             otherwise
#[inline]
fn cubic_bspline(x: f64) -> f64 {
    let abs_x = x.abs();
    if abs_x < 1.0 {
        (2.0 / 3.0) - abs_x.powi(2) + 0.5 * abs_x.powi(3)
    } else if abs_x < 2.0 {
        (2.0 - abs_x).powi(3) / 6.0
    } else {
        0.0
    }
}

/// Whole-sample mirror of `j` into `0..n`.
#[inline]
fn mirror_index(j: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let k = j.rem_euclid(period);
    if k >= n as isize {
        (period - k) as usize
    } else {
        k as usize
    }
}

/// Cubic B-spline coefficients of a volume.
///
/// Sampling the raw voxels with the B-spline kernel would blur them; the
/// recursive prefilter solves for coefficients whose spline passes exactly
/// through the samples, so integer positions reproduce the input.
pub(crate) struct BSplineCoefficients {
    coefficients: Array3<f64>,
}

impl BSplineCoefficients {
    pub(crate) fn new(volume: &ArrayView3<f32>) -> Self {
        let mut coefficients = volume.mapv(f64::from);
        let mut line = Vec::new();
        for axis in 0..3 {
            for mut lane in coefficients.lanes_mut(Axis(axis)) {
                line.clear();
                line.extend(lane.iter().copied());
                Self::prefilter(&mut line);
                lane.iter_mut().zip(&line).for_each(|(c, &v)| *c = v);
            }
        }
        Self { coefficients }
    }

    pub(crate) fn evaluate(&self, index: [f64; 3]) -> f32 {
        let (depth, height, width) = self.coefficients.dim();
        let (xs, wx) = Self::support(index[0], width);
        let (ys, wy) = Self::support(index[1], height);
        let (zs, wz) = Self::support(index[2], depth);

        let mut value = 0.0;
        for (&z, &weight_z) in zs.iter().zip(&wz) {
            for (&y, &weight_y) in ys.iter().zip(&wy) {
                let row: f64 = xs
                    .iter()
                    .zip(&wx)
                    .map(|(&x, &weight_x)| self.coefficients[[z, y, x]] * weight_x)
                    .sum();
                value += row * weight_y * weight_z;
            }
        }
        value as f32
    }

    fn support(c: f64, n: usize) -> ([usize; 4], [f64; 4]) {
        let start = c.floor() as isize - 1;
        let mut indices = [0; 4];
        let mut weights = [0.0; 4];
        for k in 0..4 {
            let j = start + k as isize;
            indices[k] = mirror_index(j, n);
            weights[k] = cubic_bspline(c - j as f64);
        }
        (indices, weights)
    }

    /// In-place causal/anti-causal recursive filter with mirror boundaries.
    fn prefilter(line: &mut [f64]) {
        let n = line.len();
        if n < 2 {
            return;
        }
        let z = BSPLINE_POLE;
        let gain = (1.0 - z) * (1.0 - 1.0 / z);
        line.iter_mut().for_each(|c| *c *= gain);

        line[0] = Self::initial_causal(line, z);
        for k in 1..n {
            line[k] += z * line[k - 1];
        }
        line[n - 1] = (z / (z * z - 1.0)) * (z * line[n - 2] + line[n - 1]);
        for k in (0..n - 1).rev() {
            line[k] = z * (line[k + 1] - line[k]);
        }
    }

    fn initial_causal(line: &[f64], z: f64) -> f64 {
        let n = line.len();
        let horizon = (PREFILTER_TOLERANCE.ln() / z.abs().ln()).ceil() as usize;
        if horizon < n {
            let mut zn = z;
            let mut sum = line[0];
            for &c in &line[1..horizon] {
                sum += zn * c;
                zn *= z;
            }
            sum
        } else {
            let mut zn = z;
            let iz = 1.0 / z;
            let mut z2n = z.powi((n - 1) as i32);
            let mut sum = line[0] + z2n * line[n - 1];
            z2n *= z2n * iz;
            for &c in &line[1..n - 1] {
                sum += (zn + z2n) * c;
                zn *= z;
                z2n *= iz;
            }
            sum / (1.0 - zn * zn)
        }
    }
}

/// A kernel bound to the volume it samples.
pub(crate) enum Sampler<'a> {
    Nearest(ArrayView3<'a, f32>),
    Linear(ArrayView3<'a, f32>),
    BSpline(BSplineCoefficients),
}

impl<'a> Sampler<'a> {
    pub(crate) fn new(volume: ArrayView3<'a, f32>, interpolation: Interpolation) -> Self {
        match interpolation {
            Interpolation::NearestNeighbor => Sampler::Nearest(volume),
            Interpolation::Smooth(SmoothKernel::Linear) => Sampler::Linear(volume),
            Interpolation::Smooth(SmoothKernel::BSpline) => {
                Sampler::BSpline(BSplineCoefficients::new(&volume))
            }
        }
    }

    #[inline]
    pub(crate) fn sample(&self, index: [f64; 3]) -> f32 {
        match self {
            Sampler::Nearest(volume) => Interpolator::nearest(volume, index),
            Sampler::Linear(volume) => Interpolator::trilinear_interpolate(volume, index),
            Sampler::BSpline(coefficients) => coefficients.evaluate(index),
        }
    }
}
