use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::ValueKind;

/// Errors from reading or writing FITS primary HDUs.
#[derive(Error, Debug)]
pub enum FitsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid FITS format: {0}")]
    InvalidFormat(String),

    #[error("Missing required keyword: {0}")]
    MissingKeyword(String),

    #[error("Unsupported BITPIX: {0}")]
    UnsupportedBitpix(i64),

    #[error("Invalid keyword name: '{0}'")]
    InvalidKeyword(String),

    #[error("Value of {keyword} is {len} characters quoted, a card holds at most {max}")]
    ValueTooLong { keyword: String, len: usize, max: usize },

    #[error("File already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
}

/// Errors from indexing, filtering and iterating an image collection.
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Different data types found for keyword {keyword}: {expected} and {found}")]
    TypeMismatch {
        keyword: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("keyword {0} is not in the current summary")]
    KeywordNotInSummary(String),

    #[error("No generator for {0}")]
    UnknownSelector(String),

    #[error("Collection has no location; there are no files to iterate over")]
    NoLocation,

    #[error("Location is not a readable directory: {}", .0.display())]
    BadLocation(PathBuf),

    #[error("Unable to open table file {}: {source}", .path.display())]
    SummaryFile {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Malformed summary table: {0}")]
    MalformedSummary(String),

    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error("Unable to perform file operation: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PartialEq for CollectionError {
    fn eq(&self, other: &Self) -> bool {
        use CollectionError::*;
        match (self, other) {
            (
                TypeMismatch {
                    keyword: a,
                    expected: ea,
                    found: fa,
                },
                TypeMismatch {
                    keyword: b,
                    expected: eb,
                    found: fb,
                },
            ) => a == b && ea == eb && fa == fb,
            (KeywordNotInSummary(a), KeywordNotInSummary(b)) => a == b,
            (UnknownSelector(a), UnknownSelector(b)) => a == b,
            (BadLocation(a), BadLocation(b)) => a == b,
            (MalformedSummary(a), MalformedSummary(b)) => a == b,
            (NoLocation, NoLocation) => true,

            // Wrapped errors compare by variant only
            (SummaryFile { path: a, .. }, SummaryFile { path: b, .. }) => a == b,
            (Fits(_), Fits(_)) => true,
            (Io(_), Io(_)) => true,
            (Csv(_), Csv(_)) => true,

            _ => false,
        }
    }
}

/// Errors from grouping a summary table.
#[derive(Error, Debug, PartialEq)]
pub enum GroupError {
    #[error("{0} is not a column of the summary table")]
    UnknownKey(String),

    #[error("The table column named {key} cannot be used as an index because its values are not unique ({value} repeats)")]
    IndexNotUnique { key: String, value: String },

    #[error("The table column named {0} cannot be used as an index because some of its values are missing")]
    MaskedIndex(String),
}

/// Errors from keyword objects with synonyms.
#[derive(Error, Debug, PartialEq)]
pub enum KeywordError {
    #[error("Invalid keyword name: '{0}'")]
    InvalidName(String),

    #[error("Found more than one value for keyword {names}: values found are {values}")]
    ConflictingValues { names: String, values: String },

    #[error("Keyword not found in header: {0}")]
    NotFound(String),

    #[error("Keyword {0} has no value to write")]
    NoValue(String),

    #[error("Value for keyword {0} does not fit on one header card")]
    ValueTooLong(String),
}

/// Errors from header patching.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Unknown history mode: {0}")]
    UnknownHistoryMode(String),

    #[error("Cannot parse DATE-OBS value '{0}'")]
    BadDateObs(String),

    #[error("Cannot parse sexagesimal value '{0}'")]
    BadSexagesimal(String),

    #[error("Correct MaxImDL-style image types before proceeding")]
    MaximDlImageTypes,

    #[error(transparent)]
    Keyword(#[from] KeywordError),

    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error("Unable to read table: {0}")]
    Table(#[from] csv::Error),

    #[error("Unable to perform file operation: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid observatory configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Errors from overscan trimming and frame combination.
#[derive(Error, Debug)]
pub enum ReductionError {
    #[error("Overscan keywords missing from header, cannot trim")]
    MissingOverscanKeywords,

    #[error("{file} has no {keyword} keyword")]
    MissingKeyword { file: String, keyword: String },

    #[error("No images to combine")]
    NothingToCombine,

    #[error("Image shapes differ: {expected:?} and {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Darks with exposure time {exposure} have a temperature problem: {file} deviates by {deviation:.2} C")]
    TemperatureProblem {
        exposure: f64,
        file: String,
        deviation: f64,
    },

    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error(transparent)]
    Fits(#[from] FitsError),
}
