//! Find out which frames in a directory still need information added.

use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::collection::ImageFileCollection;
use crate::data::filter::Predicate;
use crate::data::loader::{write_list, write_summary};
use crate::data::model::SummaryTable;
use crate::error::{CollectionError, PatchError};
use crate::patch::has_maximdl_image_types;

/// Keywords summarised by default.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "imagetyp", "filter", "exptime", "ccd-temp", "object", "date-obs", "ra", "dec",
];

/// Output file names.
pub struct DefaultFileNames;

impl DefaultFileNames {
    pub const NEEDS_FILTER: &'static str = "NEEDS_FILTER.txt";
    pub const NEEDS_OBJECT_NAME: &'static str = "NEEDS_OBJECT_NAME.txt";
    pub const NEEDS_POINTING: &'static str = "NEEDS_POINTING_INFO.txt";
    pub const MANIFEST: &'static str = "Manifest.txt";
    /// Column name used in the list files.
    pub const LIST_COLUMN: &'static str = "File";
}

#[derive(Debug, Clone, Default)]
pub struct TriageReport {
    /// Summary of the requested keywords, `None` for a directory without
    /// readable FITS files.
    pub summary: Option<SummaryTable>,
    pub needs_filter: Vec<String>,
    pub needs_object_name: Vec<String>,
    pub needs_pointing: Vec<String>,
}

impl TriageReport {
    pub fn is_complete(&self) -> bool {
        self.needs_filter.is_empty() && self.needs_object_name.is_empty() && self.needs_pointing.is_empty()
    }
}

/// Summarise `dir` and list frames missing a filter, an object name or a
/// pointing. Fails while MaxIm DL style image types remain.
pub fn triage_directory<S: AsRef<str>>(dir: &Path, keywords: &[S]) -> Result<TriageReport, PatchError> {
    let mut collection = ImageFileCollection::open(dir, keywords)?;
    let summary = collection.summary().cloned();
    if summary.is_none() {
        warn!("No readable FITS files in {}", dir.display());
        return Ok(TriageReport::default());
    }
    collection.set_keywords(&["imagetyp"])?;
    if has_maximdl_image_types(&collection)? {
        return Err(PatchError::MaximDlImageTypes);
    }

    let mut needs_filter = Vec::new();
    for image_type in ["light", "flat"] {
        needs_filter.extend(
            collection.files_filtered(&Predicate::new().with("imagetyp", image_type).missing("filter"))?,
        );
    }
    let nameless = Predicate::new().with("imagetyp", "light").missing("object");
    let needs_object_name = collection.files_filtered(&nameless)?;
    let needs_pointing = collection.files_filtered(&nameless.missing("ra").missing("objctra"))?;

    info!(
        "{}: {} need filter, {} need object name, {} need pointing",
        dir.display(),
        needs_filter.len(),
        needs_object_name.len(),
        needs_pointing.len()
    );
    Ok(TriageReport {
        summary,
        needs_filter,
        needs_object_name,
        needs_pointing,
    })
}

/// Write the list files and manifest for `report` into `dir`. Lists from a
/// previous run are removed first; empty lists are not written.
pub fn write_triage_outputs(dir: &Path, report: &TriageReport) -> Result<(), CollectionError> {
    let lists = [
        (DefaultFileNames::NEEDS_FILTER, &report.needs_filter),
        (DefaultFileNames::NEEDS_OBJECT_NAME, &report.needs_object_name),
        (DefaultFileNames::NEEDS_POINTING, &report.needs_pointing),
    ];
    for (name, _) in &lists {
        let path = dir.join(name);
        if path.exists() {
            fs::remove_file(&path)?;
        }
    }
    for (name, files) in &lists {
        if !files.is_empty() {
            write_list(&dir.join(name), DefaultFileNames::LIST_COLUMN, files)?;
        }
    }
    if let Some(summary) = report.summary.as_ref().filter(|s| !s.is_empty()) {
        write_summary(summary, &dir.join(DefaultFileNames::MANIFEST))?;
    }
    Ok(())
}
