//! # MRI annotator library
//!
//! This crate prepares prostate MRI sessions for side-by-side annotation.
//! A session consists of a T2-weighted, an ADC and a DWI volume and,
//! optionally, a lesion segmentation. All of them are brought onto the
//! voxel grid of the T2w volume so that they can be displayed and overlaid
//! voxel for voxel.
//!
//! The heart of the crate is [`VolumeResampler`], which samples a moving
//! volume on the grid (size, spacing, origin, direction) of a reference
//! volume:
//!  - continuous volumes are interpolated (trilinear by default, cubic
//!    B-spline on request)
//!  - label volumes are sampled nearest-neighbour so that no label value is
//!    ever blended or invented
//!  - voxels outside the moving volume receive a fill value (0 by default)
//!
//! Volumes are read from NIfTI files or DICOM series with [`VolumeLoader`],
//! sessions are listed in a CSV [`StudyList`] and aligned with
//! [`align_session`].
//!
//! # Examples
//!
//! ## Aligning an ADC map onto a T2w volume
//!
//! ```no_run
//! # use mri_annotator::{VolumeLoader, VolumeResampler};
//! let t2w = VolumeLoader::load("patient/T2w.nii.gz").expect("should have loaded T2w");
//! let adc = VolumeLoader::load("patient/ADC.nii.gz").expect("should have loaded ADC");
//!
//! let aligned = VolumeResampler::default()
//!     .resample_to_reference(&adc, &t2w, false)
//!     .expect("should have resampled ADC onto the T2w grid");
//! assert_eq!(aligned.geometry, t2w.geometry);
//! ```
//!
//! ## Walking a study list
//!
//! ```no_run
//! # use mri_annotator::{StudyList, VolumeResampler, load_and_align};
//! let mut study = StudyList::from_csv_path("study.csv", "/data/prostate")
//!     .expect("should have read the study list");
//! let resampler = VolumeResampler::default();
//! while let Some(entry) = study.next_entry() {
//!     let session = load_and_align(entry, &resampler).expect("should have aligned session");
//!     println!("{:?}", session.reference_grid().size);
//! }
//! ```

pub mod enums;
pub mod geometry;
mod interpolator;
pub mod pixel;
pub mod resampler;
pub mod session;
pub mod study;
pub mod volume;
pub mod volume_loader;

pub use enums::{Interpolation, SmoothKernel, SortBy};
pub use geometry::{Geometry, ReferenceGrid};
pub use pixel::{PixelClass, PixelKind};
pub use resampler::{ResampleError, ResampleOptions, VolumeResampler};
pub use session::{AlignedSession, SessionError, SessionVolumes, align_session, load_and_align};
pub use study::{StudyEntry, StudyList, StudyListError};
pub use volume::Volume;
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
