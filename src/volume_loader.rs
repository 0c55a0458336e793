use crate::{
    enums::SortBy, geometry::Geometry, pixel::PixelKind, resampler::ResampleError, volume::Volume,
};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use nalgebra::{Matrix3, Vector3};
use ndarray::{Array2, Array3, ArrayD, Axis, Ix3, s};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("Unsupported number of dimensions: {0}")]
    UnsupportedDimensions(usize),

    #[error(transparent)]
    Geometry(#[from] ResampleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),
}

struct DicomSlice<'a> {
    object: &'a FileDicomObject<InMemDicomObject>,
    order: Option<f64>,
    position: Option<Vector3<f64>>,
    image: Array2<f32>,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from a NIfTI file or, for a directory, a DICOM series.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeLoaderError::NotFound`] when `path` does not exist,
    /// otherwise whatever the format-specific loader reports.
    pub fn load(path: impl AsRef<Path>) -> Result<Volume, VolumeLoaderError> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::load_from_directory(path, SortBy::default())
        } else {
            Self::load_nifti(path)
        }
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found, dimensions are inconsistent or
    /// no spacing can be determined
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut slices: Vec<_> = dicom_objects
            .iter()
            .filter_map(|dicom_object| Self::extract_slice(dicom_object, &sort_by))
            .collect();

        if slices.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::sort_slices(&mut slices, sort_by);
        Self::validate_dimensions(&slices)?;

        let volume_array = Self::build_volume_array(&slices);
        let geometry = Self::get_geometry(&slices, volume_array.dim())
            .ok_or(VolumeLoaderError::MissingSpacing)?;
        let pixel_kind = Self::get_pixel_kind(slices[0].object);

        let volume = Volume::new(volume_array, geometry, pixel_kind);
        volume.validate()?;
        log::info!(
            "Loaded DICOM series of {} slices, size {:?}, spacing {:?}",
            slices.len(),
            volume.size(),
            volume.spacing()
        );
        Ok(volume)
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> =
            paths.iter().map(|path| open_file(path.as_ref())).collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::load_from_file_paths(&paths, sort_by)
    }

    /// Load a NIfTI-1 file (`.nii` or `.nii.gz`).
    ///
    /// Geometry is read from the sform, then the qform, then `pixdim`, and is
    /// converted from NIfTI's RAS space to LPS. Files with more than three
    /// dimensions keep their first volume.
    pub fn load_nifti(path: impl AsRef<Path>) -> Result<Volume, VolumeLoaderError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VolumeLoaderError::NotFound(path.to_path_buf()));
        }

        let object = ReaderOptions::new().read_file(path)?;
        let header = object.header().clone();
        let ndim = header.dim[0] as usize;
        if !(2..=7).contains(&ndim) {
            return Err(VolumeLoaderError::UnsupportedDimensions(ndim));
        }

        let data: ArrayD<f32> = object.into_volume().into_ndarray::<f32>()?;
        let data = Self::first_volume(data)?;
        let (width, height, depth) = data.dim();
        // [x, y, z] -> [z, y, x]
        let data = data
            .permuted_axes([2, 1, 0])
            .as_standard_layout()
            .into_owned();

        let geometry = Self::nifti_geometry(&header, [width, height, depth]);
        let volume = Volume::new(data, geometry, Self::nifti_pixel_kind(&header));
        volume.validate()?;
        log::info!(
            "Loaded {} ({}), size {:?}, spacing {:?}",
            path.display(),
            volume.pixel_kind,
            volume.size(),
            volume.spacing()
        );
        Ok(volume)
    }

    fn first_volume(mut data: ArrayD<f32>) -> Result<Array3<f32>, VolumeLoaderError> {
        while data.ndim() > 3 {
            let last = Axis(data.ndim() - 1);
            data = data.index_axis_move(last, 0);
        }
        if data.ndim() == 2 {
            data = data.insert_axis(Axis(2));
        }
        let ndim = data.ndim();
        data.into_dimensionality::<Ix3>()
            .map_err(|_| VolumeLoaderError::UnsupportedDimensions(ndim))
    }

    fn nifti_geometry(header: &NiftiHeader, size: [usize; 3]) -> Geometry {
        let (linear, translation) = if header.sform_code > 0 {
            let rows = [header.srow_x, header.srow_y, header.srow_z];
            let linear = Matrix3::from_fn(|r, c| f64::from(rows[r][c]));
            let translation = Vector3::from_fn(|r, _| f64::from(rows[r][3]));
            (linear, translation)
        } else if header.qform_code > 0 {
            let rotation = Self::quaternion_rotation(
                f64::from(header.quatern_b),
                f64::from(header.quatern_c),
                f64::from(header.quatern_d),
            );
            let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
            let scale = Vector3::new(
                f64::from(header.pixdim[1]).abs(),
                f64::from(header.pixdim[2]).abs(),
                qfac * f64::from(header.pixdim[3]).abs(),
            );
            let translation = Vector3::new(
                f64::from(header.quatern_x),
                f64::from(header.quatern_y),
                f64::from(header.quatern_z),
            );
            (rotation * Matrix3::from_diagonal(&scale), translation)
        } else {
            let scale = Vector3::from_fn(|r, _| f64::from(header.pixdim[r + 1]).abs());
            (Matrix3::from_diagonal(&scale), Vector3::zeros())
        };

        let ras_to_lps = Matrix3::from_diagonal(&Vector3::new(-1.0, -1.0, 1.0));
        let linear = ras_to_lps * linear;
        let origin = ras_to_lps * translation;

        let spacing = [0, 1, 2].map(|c| linear.column(c).norm());
        let mut direction = linear;
        for (c, &s) in spacing.iter().enumerate() {
            if s > 0.0 {
                direction.column_mut(c).unscale_mut(s);
            }
        }

        Geometry::new(size, spacing, origin.into(), direction)
    }

    fn quaternion_rotation(b: f64, c: f64, d: f64) -> Matrix3<f64> {
        let a = (1.0 - b * b - c * c - d * d).max(0.0).sqrt();
        Matrix3::new(
            a * a + b * b - c * c - d * d,
            2.0 * (b * c - a * d),
            2.0 * (b * d + a * c),
            2.0 * (b * c + a * d),
            a * a + c * c - b * b - d * d,
            2.0 * (c * d - a * b),
            2.0 * (b * d - a * c),
            2.0 * (c * d + a * b),
            a * a + d * d - b * b - c * c,
        )
    }

    fn nifti_pixel_kind(header: &NiftiHeader) -> PixelKind {
        let kind = PixelKind::from_nifti_datatype(header.datatype);
        let scaled = header.scl_slope != 0.0 && (header.scl_slope != 1.0 || header.scl_inter != 0.0);
        if scaled && kind.class().is_some() {
            PixelKind::Float32
        } else {
            kind
        }
    }

    fn extract_slice<'a>(
        dicom_object: &'a FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<DicomSlice<'a>> {
        let position = Self::get_position(dicom_object);
        let order = Self::get_sort_order(dicom_object, position, sort_by)?;
        let image = Self::decode_image(dicom_object)?;
        Some(DicomSlice {
            object: dicom_object,
            order,
            position,
            image,
        })
    }

    fn get_position(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Vector3<f64>> {
        let pos = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float64()
            .ok()?;
        (pos.len() == 3).then(|| Vector3::new(pos[0], pos[1], pos[2]))
    }

    /// Row and column direction cosines from Image Orientation (Patient).
    fn get_orientation(
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Option<(Vector3<f64>, Vector3<f64>)> {
        let cosines = dicom_object
            .element(tags::IMAGE_ORIENTATION_PATIENT)
            .ok()?
            .to_multi_float64()
            .ok()?;
        if cosines.len() != 6 {
            return None;
        }
        Some((
            Vector3::new(cosines[0], cosines[1], cosines[2]),
            Vector3::new(cosines[3], cosines[4], cosines[5]),
        ))
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        position: Option<Vector3<f64>>,
        sort_by: &SortBy,
    ) -> Option<Option<f64>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                // Distance along the slice normal, so oblique stacks sort too.
                let position = position?;
                let order = match Self::get_orientation(dicom_object) {
                    Some((row, column)) => row.cross(&column).dot(&position),
                    None => position.z,
                };
                Some(Some(order))
            }
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float64()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(f64::from);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        // Modality rescale is applied, display windowing is not.
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_slices(slices: &mut [DicomSlice<'_>], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            slices.sort_by(|a, b| a.order.partial_cmp(&b.order).unwrap_or(std::cmp::Ordering::Equal));
        }
    }

    fn validate_dimensions(slices: &[DicomSlice<'_>]) -> Result<(), VolumeLoaderError> {
        let first_dim = slices[0].image.dim();
        if slices.iter().any(|slice| slice.image.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(slices: &[DicomSlice<'_>]) -> Array3<f32> {
        let (height, width) = slices[0].image.dim();
        let depth = slices.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, slice) in slices.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&slice.image);
        }

        volume
    }

    fn get_geometry(
        slices: &[DicomSlice<'_>],
        (depth, height, width): (usize, usize, usize),
    ) -> Option<Geometry> {
        // Pixel Spacing is (row spacing, column spacing), i.e. (y, x).
        let pixel_spacing = slices.iter().find_map(|slice| {
            slice
                .object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float64()
                .ok()
                .filter(|spacing| spacing.len() == 2)
        })?;

        let (row, column) = Self::get_orientation(slices[0].object)
            .unwrap_or((Vector3::x(), Vector3::y()));
        let origin = slices[0].position.unwrap_or_else(Vector3::zeros);

        let step = match (slices.first(), slices.get(1)) {
            (Some(first), Some(second)) => first
                .position
                .zip(second.position)
                .map(|(a, b)| b - a)
                .filter(|step| step.norm() > 1e-6),
            _ => None,
        };
        let (slice_direction, slice_spacing) = match step {
            Some(step) => (step.normalize(), step.norm()),
            None => {
                let thickness = slices.iter().find_map(|slice| {
                    slice
                        .object
                        .element(tags::SLICE_THICKNESS)
                        .ok()?
                        .to_float64()
                        .ok()
                })?;
                (row.cross(&column), thickness)
            }
        };

        Some(Geometry::new(
            [width, height, depth],
            [pixel_spacing[1], pixel_spacing[0], slice_spacing],
            origin.into(),
            Matrix3::from_columns(&[row, column, slice_direction]),
        ))
    }

    fn get_pixel_kind(dicom_object: &FileDicomObject<InMemDicomObject>) -> PixelKind {
        let read_u16 = |tag| {
            dicom_object
                .element(tag)
                .ok()
                .and_then(|element| element.to_int::<u16>().ok())
        };
        let read_f64 = |tag| {
            dicom_object
                .element(tag)
                .ok()
                .and_then(|element| element.to_float64().ok())
        };

        let slope = read_f64(tags::RESCALE_SLOPE).unwrap_or(1.0);
        let intercept = read_f64(tags::RESCALE_INTERCEPT).unwrap_or(0.0);
        if slope != 1.0 || intercept.fract() != 0.0 {
            return PixelKind::Float32;
        }

        let bits_allocated = read_u16(tags::BITS_ALLOCATED).unwrap_or(16);
        let signed = read_u16(tags::PIXEL_REPRESENTATION) == Some(1);
        PixelKind::from_dicom_bits(bits_allocated, signed)
    }
}
