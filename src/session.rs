//! Per-session alignment: T2w anchors the grid, ADC and DWI are interpolated
//! onto it and the optional lesion label map is carried over with
//! nearest-neighbour sampling.

use crate::{
    geometry::ReferenceGrid,
    resampler::{ResampleError, VolumeResampler},
    study::StudyEntry,
    volume::Volume,
    volume_loader::{VolumeLoader, VolumeLoaderError},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to load images: {0}")]
    Load(#[from] VolumeLoaderError),

    #[error("Failed to align images: {0}")]
    Resample(#[from] ResampleError),
}

/// Volumes of one session as loaded, each on its own grid.
#[derive(Debug, Clone)]
pub struct SessionVolumes {
    pub t2w: Volume,
    pub adc: Volume,
    pub dwi: Volume,
    pub lesion: Option<Volume>,
}

impl SessionVolumes {
    /// Load the volumes named by `entry`.
    ///
    /// The three continuous volumes must exist. The lesion is loaded only when
    /// its path names an existing file; otherwise the session has none.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Load`] if any required volume, or an existing
    /// lesion file, fails to load.
    pub fn load(entry: &StudyEntry) -> Result<Self, SessionError> {
        let t2w = VolumeLoader::load(&entry.t2w)?;
        let adc = VolumeLoader::load(&entry.adc)?;
        let dwi = VolumeLoader::load(&entry.dwi)?;
        let lesion = match &entry.lesion {
            Some(path) if path.is_file() => Some(VolumeLoader::load(path)?),
            _ => {
                log::info!("No lesion found for this session");
                None
            }
        };
        Ok(Self {
            t2w,
            adc,
            dwi,
            lesion,
        })
    }
}

/// Session volumes sharing the T2w grid voxel for voxel.
#[derive(Debug, Clone)]
pub struct AlignedSession {
    pub t2w: Volume,
    pub adc: Volume,
    pub dwi: Volume,
    pub lesion: Option<Volume>,
}

impl AlignedSession {
    pub fn reference_grid(&self) -> &ReferenceGrid {
        &self.t2w.geometry
    }
}

/// Resample ADC, DWI and the lesion onto the T2w grid.
///
/// # Errors
///
/// Returns [`SessionError::Resample`] when any of the volumes has a malformed
/// grid.
pub fn align_session(
    volumes: SessionVolumes,
    resampler: &VolumeResampler,
) -> Result<AlignedSession, SessionError> {
    let SessionVolumes {
        t2w,
        adc,
        dwi,
        lesion,
    } = volumes;

    let (adc, dwi) = rayon::join(
        || resampler.resample_to_reference(&adc, &t2w, false),
        || resampler.resample_to_reference(&dwi, &t2w, false),
    );
    let lesion = lesion
        .map(|lesion| resampler.resample_to_reference(&lesion, &t2w, true))
        .transpose()?;

    Ok(AlignedSession {
        adc: adc?,
        dwi: dwi?,
        lesion,
        t2w,
    })
}

/// Load the session named by `entry` and align it onto its T2w grid.
pub fn load_and_align(
    entry: &StudyEntry,
    resampler: &VolumeResampler,
) -> Result<AlignedSession, SessionError> {
    align_session(SessionVolumes::load(entry)?, resampler)
}
