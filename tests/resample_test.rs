mod common;

use approx::assert_abs_diff_eq;
use common::{label_volume, ramp_volume};
use mri_annotator::{
    Geometry, PixelKind, ResampleError, ResampleOptions, SmoothKernel, Volume, VolumeResampler,
};
use ndarray::Array3;
use proptest::prelude::*;

fn reference_volume(grid: Geometry) -> Volume {
    let (depth, height, width) = grid.shape();
    // Sample values of the reference are never read.
    Volume::new(
        Array3::from_elem((depth, height, width), -5.0),
        grid,
        PixelKind::Int16,
    )
}

#[test]
fn upsampling_scenario_keeps_reference_grid() {
    let moving = ramp_volume([64, 64, 20], [1.0, 1.0, 3.0], [0.0; 3]);
    let reference = reference_volume(Geometry::axis_aligned(
        [256, 256, 20],
        [0.5, 0.5, 3.0],
        [0.0; 3],
    ));

    let output = VolumeResampler::default()
        .resample_to_reference(&moving, &reference, false)
        .unwrap();

    assert_eq!(output.size(), [256, 256, 20]);
    assert_eq!(output.spacing(), [0.5, 0.5, 3.0]);
    assert_eq!(output.dim(), (20, 256, 256));
    assert!(output.is_grid_aligned_with(&reference));
    assert_abs_diff_eq!(
        output.value_at(0, 0, 0).unwrap(),
        moving.value_at(0, 0, 0).unwrap(),
        epsilon = 1e-5
    );
    // Halfway between moving voxels 10 and 11 along x.
    assert_abs_diff_eq!(output.value_at(21, 0, 0).unwrap(), 11.5, epsilon = 1e-4);
    // From x = 63.5 mm on the reference is outside the moving volume.
    assert!(output.value_at(126, 5, 5).unwrap() > 0.0);
    for x in 127..256 {
        assert_eq!(output.value_at(x, 5, 5), Some(0.0));
    }
}

#[test]
fn label_upsampling_never_invents_labels() {
    let moving = label_volume([12, 10, 4], [1.0, 1.0, 2.0]);
    let reference = reference_volume(Geometry::axis_aligned(
        [24, 20, 8],
        [0.5, 0.5, 1.0],
        [0.0; 3],
    ));

    let output = VolumeResampler::default()
        .resample_to_reference(&moving, &reference, true)
        .unwrap();

    assert_eq!(output.geometry, reference.geometry);
    assert_eq!(output.pixel_kind, PixelKind::UInt8);
    assert!(
        output
            .data()
            .iter()
            .all(|v| [0.0, 1.0, 2.0].contains(v))
    );
    assert_eq!(output.distinct_values(), vec![0.0, 1.0, 2.0]);
}

#[test]
fn auto_detection_treats_integer_volumes_as_labels() {
    let moving = label_volume([12, 10, 4], [1.0, 1.0, 2.0]);
    let reference = reference_volume(Geometry::axis_aligned(
        [17, 13, 5],
        [0.7, 0.8, 1.5],
        [0.3, 0.1, 0.0],
    ));
    let resampler = VolumeResampler::default();

    let auto = resampler
        .resample_to_reference_auto(&moving, &reference)
        .unwrap();
    let explicit = resampler
        .resample_to_reference(&moving, &reference, true)
        .unwrap();
    assert_eq!(auto, explicit);
}

#[test]
fn auto_detection_rejects_unclassifiable_kinds() {
    let mut moving = ramp_volume([4, 4, 4], [1.0; 3], [0.0; 3]);
    moving.pixel_kind = PixelKind::parse("vector of 32-bit float");
    let reference = ramp_volume([4, 4, 4], [1.0; 3], [0.0; 3]);

    let error = VolumeResampler::default()
        .resample_to_reference_auto(&moving, &reference)
        .unwrap_err();
    assert!(matches!(error, ResampleError::UnknownPixelKind(ref name) if name == "vector of 32-bit float"));
}

#[test]
fn out_of_bounds_voxels_get_fill_value() {
    let moving = ramp_volume([4, 4, 4], [1.0; 3], [0.0; 3]);
    let grid = Geometry::axis_aligned([12, 12, 12], [1.0; 3], [-4.0, -4.0, -4.0]);

    for (options, fill) in [
        (ResampleOptions::default(), 0.0),
        (ResampleOptions::default().with_fill_value(-1.0), -1.0),
    ] {
        let output = VolumeResampler::new(options)
            .resample_to_grid(&moving, &grid, false)
            .unwrap();
        for ((z, y, x), &value) in output.data().indexed_iter() {
            let inside = [x, y, z].iter().all(|&i| (4..8).contains(&i));
            if inside {
                assert_eq!(Some(value), moving.value_at(x - 4, y - 4, z - 4));
            } else {
                assert_eq!(value, fill, "voxel ({x}, {y}, {z})");
            }
        }
    }
}

#[test]
fn bspline_kernel_is_idempotent_on_identity_grid() {
    let data = Array3::from_shape_fn((5, 7, 9), |(z, y, x)| ((x * 37 + y * 11 + z * 5) % 23) as f32);
    let moving = Volume::new(
        data,
        Geometry::axis_aligned([9, 7, 5], [0.8, 0.8, 3.0], [-10.0, 4.0, 2.5]),
        PixelKind::Float32,
    );
    let resampler =
        VolumeResampler::new(ResampleOptions::default().with_smooth_kernel(SmoothKernel::BSpline));

    let output = resampler
        .resample_to_reference(&moving, &moving, false)
        .unwrap();
    for (a, b) in output.data().iter().zip(moving.data()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
    }
}

#[test]
fn bspline_and_linear_differ_between_samples() {
    let mut moving = label_volume([12, 10, 4], [1.0, 1.0, 2.0]);
    moving.pixel_kind = PixelKind::Float32;
    let grid = Geometry::axis_aligned([12, 10, 4], [1.0, 1.0, 2.0], [0.5, 0.5, 0.0]);

    let linear = VolumeResampler::default()
        .resample_to_grid(&moving, &grid, false)
        .unwrap();
    let bspline =
        VolumeResampler::new(ResampleOptions::default().with_smooth_kernel(SmoothKernel::BSpline))
            .resample_to_grid(&moving, &grid, false)
            .unwrap();

    assert_eq!(linear.geometry, bspline.geometry);
    assert_ne!(linear.data(), bspline.data());
}

#[test]
fn oblique_identity_resample_is_exact_for_nearest() {
    let rotation = nalgebra::Rotation3::from_euler_angles(0.2, 0.1, -0.4);
    let mut moving = label_volume([6, 5, 4], [0.9, 1.1, 2.5]);
    moving.geometry.direction = *rotation.matrix();
    moving.geometry.origin = [12.0, -3.0, 40.0];

    let output = VolumeResampler::default()
        .resample_to_reference(&moving, &moving, true)
        .unwrap();
    assert_eq!(output.data(), moving.data());
}

#[test]
fn invalid_reference_geometry_is_rejected() {
    let moving = ramp_volume([4, 4, 4], [1.0; 3], [0.0; 3]);
    let mut grid = Geometry::axis_aligned([4, 4, 4], [1.0; 3], [0.0; 3]);
    grid.spacing[1] = 0.0;
    assert!(matches!(
        VolumeResampler::default().resample_to_grid(&moving, &grid, false),
        Err(ResampleError::InvalidGeometry(_))
    ));

    let mut moving = moving;
    moving.geometry.size = [0, 4, 4];
    let reference = ramp_volume([4, 4, 4], [1.0; 3], [0.0; 3]);
    assert!(matches!(
        VolumeResampler::default().resample_to_reference(&moving, &reference, true),
        Err(ResampleError::InvalidGeometry(_))
    ));
}

fn grid_strategy() -> impl Strategy<Value = Geometry> {
    (
        prop::array::uniform3(1usize..9),
        prop::array::uniform3(0.25f64..3.0),
        prop::array::uniform3(-10.0f64..10.0),
    )
        .prop_map(|(size, spacing, origin)| Geometry::axis_aligned(size, spacing, origin))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn output_always_carries_reference_geometry(
        moving_grid in grid_strategy(),
        reference_grid in grid_strategy(),
        is_label in any::<bool>(),
    ) {
        let moving = ramp_volume(moving_grid.size, moving_grid.spacing, moving_grid.origin);
        let reference = reference_volume(reference_grid.clone());
        let output = VolumeResampler::default()
            .resample_to_reference(&moving, &reference, is_label)
            .unwrap();
        prop_assert_eq!(&output.geometry, &reference_grid);
        prop_assert_eq!(output.dim(), reference_grid.shape());
    }

    #[test]
    fn identity_resample_returns_the_input(
        grid in grid_strategy(),
        is_label in any::<bool>(),
    ) {
        let moving = ramp_volume(grid.size, grid.spacing, grid.origin);
        let output = VolumeResampler::default()
            .resample_to_reference(&moving, &moving, is_label)
            .unwrap();
        prop_assert_eq!(output.data(), moving.data());
    }

    #[test]
    fn labels_stay_within_the_original_label_set(
        moving_grid in grid_strategy(),
        reference_grid in grid_strategy(),
    ) {
        let moving = label_volume(moving_grid.size, moving_grid.spacing);
        let labels = moving.distinct_values();
        let output = VolumeResampler::default()
            .resample_to_grid(&moving, &reference_grid, true)
            .unwrap();
        for value in output.data() {
            prop_assert!(*value == 0.0 || labels.contains(value));
        }
    }
}
