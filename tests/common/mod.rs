//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use mri_annotator::{Geometry, PixelKind, Volume};
use ndarray::Array3;
use nifti::{NiftiHeader, writer::WriterOptions};
use std::path::Path;

/// Continuous volume whose samples are a strictly positive function of the
/// voxel index, so any fill value of 0 is distinguishable.
pub fn ramp_volume(size: [usize; 3], spacing: [f64; 3], origin: [f64; 3]) -> Volume {
    let data = Array3::from_shape_fn((size[2], size[1], size[0]), |(z, y, x)| {
        1.0 + x as f32 + 3.0 * y as f32 + 7.0 * z as f32
    });
    Volume::new(
        data,
        Geometry::axis_aligned(size, spacing, origin),
        PixelKind::Float32,
    )
}

/// Label volume of blocky regions with labels 0, 1 and 2.
pub fn label_volume(size: [usize; 3], spacing: [f64; 3]) -> Volume {
    let data = Array3::from_shape_fn((size[2], size[1], size[0]), |(z, y, x)| {
        ((x / 3 + y / 2 + z) % 3) as f32
    });
    Volume::new(
        data,
        Geometry::axis_aligned(size, spacing, [0.0; 3]),
        PixelKind::UInt8,
    )
}

#[derive(Clone, Copy)]
pub enum NiftiDatatype {
    UInt8,
    Float32,
}

/// Write a single-file NIfTI-1 volume with an axis-aligned sform. `data` is
/// indexed `[z, y, x]`; `origin` is in NIfTI (RAS) space.
pub fn write_nifti(
    path: &Path,
    data: &Array3<f32>,
    spacing: [f64; 3],
    origin: [f64; 3],
    datatype: NiftiDatatype,
) {
    let mut header = NiftiHeader {
        sform_code: 1,
        qform_code: 0,
        ..NiftiHeader::default()
    };
    for (axis, row) in [&mut header.srow_x, &mut header.srow_y, &mut header.srow_z]
        .into_iter()
        .enumerate()
    {
        *row = [0.0; 4];
        row[axis] = spacing[axis] as f32;
        row[3] = origin[axis] as f32;
        header.pixdim[axis + 1] = spacing[axis] as f32;
    }

    // The writer expects [x, y, z] indexing.
    let writer = WriterOptions::new(path).reference_header(&header);
    match datatype {
        NiftiDatatype::UInt8 => writer.write_nifti(&data.t().mapv(|v| v as u8)),
        NiftiDatatype::Float32 => writer.write_nifti(&data.t()),
    }
    .expect("should have written NIfTI fixture");
}
