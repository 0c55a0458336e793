use serde::Deserialize;
use std::{
    io::Read,
    path::{Path, PathBuf},
};
use thiserror::Error;

const REQUIRED_COLUMNS: [&str; 3] = ["T2w", "ADC", "DWI"];

#[derive(Debug, Error)]
pub enum StudyListError {
    #[error("Error reading CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Study list is missing the {0} column")]
    MissingColumn(&'static str),

    #[error("Study list has no sessions")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct StudyRow {
    #[serde(rename = "T2w")]
    t2w: String,
    #[serde(rename = "ADC")]
    adc: String,
    #[serde(rename = "DWI")]
    dwi: String,
    #[serde(rename = "Lesion", default)]
    lesion: Option<String>,
}

/// File locations of one patient session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyEntry {
    pub t2w: PathBuf,
    pub adc: PathBuf,
    pub dwi: PathBuf,
    pub lesion: Option<PathBuf>,
}

/// Ordered sessions with a cursor that clamps at both ends.
#[derive(Debug, Clone)]
pub struct StudyList {
    entries: Vec<StudyEntry>,
    current: Option<usize>,
}

impl StudyList {
    pub fn new(entries: Vec<StudyEntry>) -> Self {
        Self {
            entries,
            current: None,
        }
    }

    /// Read a CSV study list; relative paths are resolved against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StudyListError::MissingColumn`] when one of `T2w`, `ADC`,
    /// `DWI` is absent and [`StudyListError::Empty`] when there are no rows.
    pub fn from_csv_path(
        path: impl AsRef<Path>,
        base_dir: impl AsRef<Path>,
    ) -> Result<Self, StudyListError> {
        let reader = csv::Reader::from_path(path.as_ref())?;
        Self::from_csv_reader(reader, base_dir.as_ref())
    }

    pub fn from_reader(reader: impl Read, base_dir: impl AsRef<Path>) -> Result<Self, StudyListError> {
        Self::from_csv_reader(csv::Reader::from_reader(reader), base_dir.as_ref())
    }

    fn from_csv_reader<R: Read>(
        mut reader: csv::Reader<R>,
        base_dir: &Path,
    ) -> Result<Self, StudyListError> {
        let headers = reader.headers()?.clone();
        if let Some(column) = REQUIRED_COLUMNS
            .into_iter()
            .find(|column| !headers.iter().any(|header| header.trim() == *column))
        {
            return Err(StudyListError::MissingColumn(column));
        }

        let mut entries = Vec::new();
        for result in reader.deserialize() {
            let row: StudyRow = result?;
            entries.push(StudyEntry {
                t2w: base_dir.join(row.t2w.trim()),
                adc: base_dir.join(row.adc.trim()),
                dwi: base_dir.join(row.dwi.trim()),
                lesion: row
                    .lesion
                    .map(|lesion| lesion.trim().to_string())
                    .filter(|lesion| !lesion.is_empty())
                    .map(|lesion| base_dir.join(lesion)),
            });
        }

        if entries.is_empty() {
            return Err(StudyListError::Empty);
        }
        log::info!("Loaded study list with {} sessions", entries.len());
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StudyEntry] {
        &self.entries
    }

    /// Index of the active session, `None` before the first `next_entry`.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&StudyEntry> {
        self.current.and_then(|index| self.entries.get(index))
    }

    /// Move to the following session.
    ///
    /// Returns `None` and stays on the last session once the end is reached.
    pub fn next_entry(&mut self) -> Option<&StudyEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let next = self.current.map_or(0, |index| index + 1);
        if next >= self.entries.len() {
            log::info!("No more sessions");
            self.current = Some(self.entries.len() - 1);
            return None;
        }
        self.current = Some(next);
        self.entries.get(next)
    }

    /// Move to the preceding session.
    ///
    /// Returns `None` and rests on the first session when there is nothing
    /// before the cursor.
    pub fn previous_entry(&mut self) -> Option<&StudyEntry> {
        if self.entries.is_empty() {
            return None;
        }
        match self.current {
            Some(index) if index > 0 => {
                self.current = Some(index - 1);
                self.entries.get(index - 1)
            }
            _ => {
                log::info!("No previous sessions");
                self.current = Some(0);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "T2w,ADC,DWI,Lesion\n\
        p1/t2w.nii.gz,p1/adc.nii.gz,p1/dwi.nii.gz,p1/lesion.nii.gz\n\
        p2/t2w.nii.gz,p2/adc.nii.gz,p2/dwi.nii.gz,\n\
        p3/t2w.nii.gz,p3/adc.nii.gz,p3/dwi.nii.gz,p3/lesion.nii.gz\n";

    fn study() -> StudyList {
        StudyList::from_reader(CSV.as_bytes(), "/data").unwrap()
    }

    #[test]
    fn rows_resolve_against_base_dir() {
        let study = study();
        assert_eq!(study.len(), 3);
        let first = &study.entries()[0];
        assert_eq!(first.t2w, PathBuf::from("/data/p1/t2w.nii.gz"));
        assert_eq!(first.lesion, Some(PathBuf::from("/data/p1/lesion.nii.gz")));
        assert_eq!(study.entries()[1].lesion, None);
    }

    #[test]
    fn lesion_column_is_optional() {
        let csv = "T2w,ADC,DWI\na.nii,b.nii,c.nii\n";
        let study = StudyList::from_reader(csv.as_bytes(), "").unwrap();
        assert_eq!(study.entries()[0].lesion, None);
        assert_eq!(study.entries()[0].dwi, PathBuf::from("c.nii"));
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let csv = "T2w,DWI\na.nii,c.nii\n";
        assert!(matches!(
            StudyList::from_reader(csv.as_bytes(), ""),
            Err(StudyListError::MissingColumn("ADC"))
        ));
    }

    #[test]
    fn header_only_is_empty() {
        assert!(matches!(
            StudyList::from_reader("T2w,ADC,DWI\n".as_bytes(), ""),
            Err(StudyListError::Empty)
        ));
    }

    #[test]
    fn next_clamps_at_the_end() {
        let mut study = study();
        assert_eq!(study.current(), None);
        assert!(study.next_entry().is_some());
        assert!(study.next_entry().is_some());
        assert_eq!(
            study.next_entry().map(|entry| entry.t2w.clone()),
            Some(PathBuf::from("/data/p3/t2w.nii.gz"))
        );
        assert!(study.next_entry().is_none());
        assert_eq!(study.current_index(), Some(2));
    }

    #[test]
    fn previous_clamps_at_the_start() {
        let mut study = study();
        assert!(study.previous_entry().is_none());
        assert_eq!(study.current_index(), Some(0));

        study.next_entry();
        assert_eq!(study.current_index(), Some(1));
        assert_eq!(
            study.previous_entry().map(|entry| entry.adc.clone()),
            Some(PathBuf::from("/data/p1/adc.nii.gz"))
        );
        assert!(study.previous_entry().is_none());
        assert_eq!(study.current_index(), Some(0));
    }

    #[test]
    fn empty_list_never_moves() {
        let mut study = StudyList::new(Vec::new());
        assert!(study.next_entry().is_none());
        assert!(study.previous_entry().is_none());
        assert_eq!(study.current_index(), None);
    }
}
