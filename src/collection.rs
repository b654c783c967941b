use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info, warn};

use crate::data::filter::{matching_rows, Predicate};
use crate::data::loader::{read_summary, write_summary};
use crate::data::model::{Cell, Column, HeaderValue, SummaryTable, FILE_COLUMN};
use crate::error::{CollectionError, FitsError};
use crate::fits::{self, Hdu, Header, ImageData};

/// Keyword that expands to every keyword found in any header.
pub const ALL_KEYWORDS: &str = "*";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How to build an [`ImageFileCollection`].
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    /// Directory to scan. `None` is only useful with a summary file.
    pub location: Option<PathBuf>,
    /// Keywords to index; `*` selects all of them.
    pub keywords: Vec<String>,
    /// File name extensions, without the dot.
    pub extensions: Vec<String>,
    /// Also match `<ext>.gz`.
    pub find_compressed: bool,
    /// Summary CSV to load instead of scanning; relative to `location`
    /// when one is set.
    pub summary_file: Option<PathBuf>,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            location: None,
            keywords: Vec::new(),
            extensions: vec!["fit".to_string(), "fits".to_string()],
            find_compressed: true,
            summary_file: None,
        }
    }
}

impl CollectionOptions {
    pub fn at(location: impl Into<PathBuf>) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn keywords<S: AsRef<str>>(mut self, keywords: &[S]) -> Self {
        self.keywords = keywords.iter().map(|k| k.as_ref().to_string()).collect();
        self
    }

    pub fn extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.extensions = extensions.iter().map(|e| e.as_ref().to_string()).collect();
        self
    }

    pub fn find_compressed(mut self, yes: bool) -> Self {
        self.find_compressed = yes;
        self
    }

    pub fn summary_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_file = Some(path.into());
        self
    }
}

/// Where modified files go after a processing visitor has seen them.
///
/// With neither `suffix` nor `destination` the target is the source itself,
/// which is only written when `overwrite` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveOptions {
    pub suffix: Option<String>,
    pub destination: Option<PathBuf>,
    pub overwrite: bool,
}

impl SaveOptions {
    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: Some(suffix.into()),
            ..Self::default()
        }
    }

    pub fn to_directory(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: Some(destination.into()),
            ..Self::default()
        }
    }

    pub fn in_place() -> Self {
        Self {
            overwrite: true,
            ..Self::default()
        }
    }

    pub fn overwrite(mut self, yes: bool) -> Self {
        self.overwrite = yes;
        self
    }

    fn is_active(&self) -> bool {
        self.suffix.is_some() || self.destination.is_some() || self.overwrite
    }

    /// Write `hdu`, read from `source`, to its target. Does nothing when no
    /// target is set; an existing target without `overwrite` is skipped with
    /// a warning.
    pub fn save(&self, source: &Path, hdu: &Hdu) -> Result<(), CollectionError> {
        if self.is_active() {
            save_hdu(source, hdu, self)?;
        }
        Ok(())
    }

    /// Path a file at `source` is written to.
    pub fn target_for(&self, source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match &self.suffix {
            Some(suffix) => insert_suffix(&name, suffix),
            None => name,
        };
        let dir = match &self.destination {
            Some(dir) => dir.clone(),
            None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        dir.join(name)
    }
}

/// `a.fit` + `_new` is `a_new.fit`; a trailing `.gz` stays attached to the
/// extension so `a.fits.gz` becomes `a_new.fits.gz`.
fn insert_suffix(name: &str, suffix: &str) -> String {
    let (stem, gz) = match name.strip_suffix(".gz") {
        Some(stem) => (stem, ".gz"),
        None => (name, ""),
    };
    match stem.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{suffix}{}{gz}", &stem[..dot], &stem[dot..]),
        _ => format!("{stem}{suffix}{gz}"),
    }
}

// ---------------------------------------------------------------------------
// Selector: what each iteration step yields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Header,
    Hdu,
    Data,
}

impl FromStr for Selector {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "header" => Ok(Selector::Header),
            "hdu" => Ok(Selector::Hdu),
            "data" => Ok(Selector::Data),
            other => Err(CollectionError::UnknownSelector(other.to_string())),
        }
    }
}

/// One iteration step for a [`Selector`].
#[derive(Debug, Clone, PartialEq)]
pub enum Unit {
    Header(Header),
    Hdu(Hdu),
    Data(ImageData),
}

fn load_unit(path: &Path, selector: Selector) -> Result<Unit, CollectionError> {
    Ok(match selector {
        Selector::Header => Unit::Header(fits::read_header(path)?),
        Selector::Hdu => Unit::Hdu(fits::read_hdu(path)?),
        Selector::Data => Unit::Data(fits::read_hdu(path)?.image()?),
    })
}

// ---------------------------------------------------------------------------
// ImageFileCollection
// ---------------------------------------------------------------------------

/// A directory of FITS files and a summary table of their header keywords.
#[derive(Debug, Clone)]
pub struct ImageFileCollection {
    location: Option<PathBuf>,
    files: Vec<String>,
    summary: Option<SummaryTable>,
    generation: u64,
}

impl ImageFileCollection {
    /// Scan `location` and index the given keywords.
    pub fn open<S: AsRef<str>>(location: impl Into<PathBuf>, keywords: &[S]) -> Result<Self, CollectionError> {
        Self::new(CollectionOptions::at(location).keywords(keywords))
    }

    pub fn new(options: CollectionOptions) -> Result<Self, CollectionError> {
        let files = match &options.location {
            Some(dir) => discover_files(dir, &options.extensions, options.find_compressed)?,
            None => Vec::new(),
        };
        let mut collection = ImageFileCollection {
            location: options.location.clone(),
            files,
            summary: None,
            generation: 0,
        };

        if let Some(summary_file) = &options.summary_file {
            let path = match &collection.location {
                Some(dir) => dir.join(summary_file),
                None => summary_file.clone(),
            };
            collection.generation += 1;
            match read_summary(&path, collection.generation) {
                Ok(table) => {
                    info!("Loaded summary of {} files from {}", table.len(), path.display());
                    collection.summary = Some(table);
                    if !options.keywords.is_empty() {
                        collection.set_keywords(&options.keywords)?;
                    }
                    return Ok(collection);
                }
                Err(e) if collection.location.is_some() => {
                    warn!("Unable to open table file {}: {e}", path.display());
                }
                Err(e) => return Err(e),
            }
        }

        collection.summary = collection.build(&options.keywords)?;
        Ok(collection)
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Every matching file name in the directory, including unreadable ones.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn summary(&self) -> Option<&SummaryTable> {
        self.summary.as_ref()
    }

    /// Column names of the summary, `file` first; empty without a summary.
    pub fn keywords(&self) -> Vec<&str> {
        self.summary
            .as_ref()
            .map(SummaryTable::column_names)
            .unwrap_or_default()
    }

    /// Change the indexed keywords. A subset of the current columns trims the
    /// table in place; anything else rebuilds it.
    pub fn set_keywords<S: AsRef<str>>(&mut self, keywords: &[S]) -> Result<(), CollectionError> {
        let requested = dedup_keywords(keywords.iter().map(|k| k.as_ref()));
        if let Some(table) = &mut self.summary {
            let is_subset = requested
                .iter()
                .all(|k| k != ALL_KEYWORDS && table.has_column(k));
            if is_subset {
                table.retain_columns(&requested);
                return Ok(());
            }
        }
        self.summary = self.build(&requested)?;
        Ok(())
    }

    /// Drop the summary table altogether.
    pub fn clear_keywords(&mut self) {
        self.summary = None;
    }

    /// Values of one column in table order, masked cells skipped. With
    /// `unique`, later repeats are dropped.
    pub fn values(&self, keyword: &str, unique: bool) -> Result<Vec<HeaderValue>, CollectionError> {
        let column = self
            .summary
            .as_ref()
            .and_then(|t| t.column(keyword))
            .ok_or_else(|| CollectionError::KeywordNotInSummary(keyword.to_string()))?;
        let mut seen: HashSet<&HeaderValue> = HashSet::new();
        Ok(column
            .present_values()
            .filter(|v| !unique || seen.insert(*v))
            .cloned()
            .collect())
    }

    /// Rows matching `predicate`. Keywords the summary lacks are added first.
    pub fn matching_rows(&mut self, predicate: &Predicate) -> Result<Vec<usize>, CollectionError> {
        self.ensure_columns(predicate.keywords())?;
        Ok(match &self.summary {
            Some(table) => matching_rows(table, predicate),
            None => Vec::new(),
        })
    }

    /// Names of files matching `predicate`, in table order.
    pub fn files_filtered(&mut self, predicate: &Predicate) -> Result<Vec<String>, CollectionError> {
        let rows = self.matching_rows(predicate)?;
        let Some(table) = &self.summary else {
            return Ok(Vec::new());
        };
        Ok(rows
            .into_iter()
            .filter_map(|row| table.file_name(row).map(str::to_string))
            .collect())
    }

    /// Full path of every file in the summary. Without a summary the files
    /// are checked afresh and unreadable ones left out.
    pub fn paths(&self) -> Result<Vec<PathBuf>, CollectionError> {
        let dir = self.location.as_ref().ok_or(CollectionError::NoLocation)?;
        let names: Vec<&str> = match &self.summary {
            Some(table) => table.file_names(),
            None => read_headers(dir, &self.files).into_iter().map(|(n, _)| n).collect(),
        };
        Ok(names.into_iter().map(|n| dir.join(n)).collect())
    }

    /// Full paths of the files matching `predicate`.
    pub fn filtered_paths(&mut self, predicate: &Predicate) -> Result<Vec<PathBuf>, CollectionError> {
        let dir = self.location.clone().ok_or(CollectionError::NoLocation)?;
        if predicate.is_empty() && self.summary.is_none() {
            return self.paths();
        }
        Ok(self
            .files_filtered(predicate)?
            .into_iter()
            .map(|n| dir.join(n))
            .collect())
    }

    /// Write the summary table as CSV.
    pub fn write_summary(&self, path: &Path) -> Result<(), CollectionError> {
        match &self.summary {
            Some(table) => write_summary(table, path),
            None => write_summary(&SummaryTable::from_columns(Vec::new(), self.generation), path),
        }
    }

    // -- read-only iteration --

    /// Headers of matching files; each step opens and closes one file.
    pub fn headers(
        &mut self,
        predicate: &Predicate,
    ) -> Result<impl Iterator<Item = Result<Header, CollectionError>>, CollectionError> {
        let paths = self.filtered_paths(predicate)?;
        Ok(paths
            .into_iter()
            .map(|p| fits::read_header(&p).map_err(CollectionError::from)))
    }

    /// Like [`headers`](Self::headers), paired with the file path.
    pub fn frames(
        &mut self,
        predicate: &Predicate,
    ) -> Result<impl Iterator<Item = Result<(PathBuf, Header), CollectionError>>, CollectionError> {
        let paths = self.filtered_paths(predicate)?;
        Ok(paths
            .into_iter()
            .map(|p| -> Result<(PathBuf, Header), CollectionError> {
                let header = fits::read_header(&p)?;
                Ok((p, header))
            }))
    }

    pub fn hdus(
        &mut self,
        predicate: &Predicate,
    ) -> Result<impl Iterator<Item = Result<Hdu, CollectionError>>, CollectionError> {
        let paths = self.filtered_paths(predicate)?;
        Ok(paths
            .into_iter()
            .map(|p| fits::read_hdu(&p).map_err(CollectionError::from)))
    }

    /// Pixel data of matching files, scaled to physical values.
    pub fn data(
        &mut self,
        predicate: &Predicate,
    ) -> Result<impl Iterator<Item = Result<ImageData, CollectionError>>, CollectionError> {
        let paths = self.filtered_paths(predicate)?;
        Ok(paths
            .into_iter()
            .map(|p| -> Result<ImageData, CollectionError> { Ok(fits::read_hdu(&p)?.image()?) }))
    }

    /// Iterate with the unit chosen at run time.
    pub fn units(
        &mut self,
        selector: Selector,
        predicate: &Predicate,
    ) -> Result<impl Iterator<Item = Result<Unit, CollectionError>>, CollectionError> {
        let paths = self.filtered_paths(predicate)?;
        Ok(paths.into_iter().map(move |p| load_unit(&p, selector)))
    }

    // -- processing visitors --

    /// Hand each matching header to `visit`, then save the file per `save`.
    /// Returns the number of files visited.
    pub fn process_headers<E, F>(
        &mut self,
        predicate: &Predicate,
        save: &SaveOptions,
        mut visit: F,
    ) -> Result<usize, E>
    where
        E: From<CollectionError>,
        F: FnMut(&Path, &mut Header) -> Result<(), E>,
    {
        self.process_hdus(predicate, save, |path, hdu| visit(path, &mut hdu.header))
    }

    /// Hand each matching HDU to `visit`, then save the file per `save`.
    pub fn process_hdus<E, F>(
        &mut self,
        predicate: &Predicate,
        save: &SaveOptions,
        mut visit: F,
    ) -> Result<usize, E>
    where
        E: From<CollectionError>,
        F: FnMut(&Path, &mut Hdu) -> Result<(), E>,
    {
        let paths = self.filtered_paths(predicate)?;
        for path in &paths {
            let mut hdu = fits::read_hdu(path).map_err(CollectionError::from)?;
            visit(path, &mut hdu)?;
            save.save(path, &hdu)?;
        }
        Ok(paths.len())
    }

    // -- internals --

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Make sure every keyword is a column, rebuilding with the union of the
    /// current and missing keywords when needed.
    fn ensure_columns<'a>(&mut self, keywords: impl Iterator<Item = &'a str>) -> Result<(), CollectionError> {
        let missing: Vec<&str> = match &self.summary {
            Some(table) => keywords.filter(|k| !table.has_column(k)).collect(),
            None => keywords.collect(),
        };
        if missing.is_empty() && self.summary.is_some() {
            return Ok(());
        }
        let mut wanted: Vec<&str> = self
            .summary
            .as_ref()
            .map(|t| t.column_names().into_iter().skip(1).collect())
            .unwrap_or_default();
        wanted.extend(missing);
        let wanted = dedup_keywords(wanted.into_iter());
        debug!("Extending summary to keywords {wanted:?}");
        self.summary = self.build(&wanted)?;
        Ok(())
    }

    /// Build a fresh summary table. Without a location the existing table is
    /// kept and new keywords become all-masked columns.
    fn build<S: AsRef<str>>(&mut self, keywords: &[S]) -> Result<Option<SummaryTable>, CollectionError> {
        let generation = self.next_generation();
        let Some(dir) = &self.location else {
            return Ok(self
                .summary
                .as_ref()
                .map(|t| extend_masked(t, keywords, generation)));
        };

        let readable = read_headers(dir, &self.files);
        if readable.is_empty() {
            return Ok(None);
        }

        let names = expand_keywords(keywords, readable.iter().map(|(_, h)| h));
        info!(
            "Indexing {} keywords in {} files of {}",
            names.len(),
            readable.len(),
            dir.display()
        );

        let mut file_column = Column::new(FILE_COLUMN);
        let mut columns: Vec<Column> = names.iter().map(Column::new).collect();
        for (name, header) in &readable {
            let _ = file_column.push(Cell::Value(HeaderValue::from(*name)));
            for column in columns.iter_mut() {
                let value = header.get(&column.name).cloned();
                let found = value.as_ref().map(HeaderValue::kind);
                if let Err(expected) = column.push(value.into()) {
                    return Err(CollectionError::TypeMismatch {
                        keyword: column.name.clone(),
                        expected,
                        found: found.unwrap_or(expected),
                    });
                }
            }
        }
        columns.insert(0, file_column);
        Ok(Some(SummaryTable::from_columns(columns, generation)))
    }
}

/// Headers of the files that can be read; the rest are logged and skipped.
fn read_headers<'a>(dir: &Path, files: &'a [String]) -> Vec<(&'a str, Header)> {
    let mut readable = Vec::with_capacity(files.len());
    for name in files {
        let path = dir.join(name);
        match fits::read_header(&path) {
            Ok(header) => readable.push((name.as_str(), header)),
            Err(e) => warn!("Unable to get FITS header for file {}: {e}", path.display()),
        }
    }
    readable
}

fn save_hdu(source: &Path, hdu: &Hdu, save: &SaveOptions) -> Result<(), CollectionError> {
    let target = save.target_for(source);
    match fits::write_hdu(&target, hdu, save.overwrite) {
        Ok(()) => {
            debug!("Wrote {}", target.display());
            Ok(())
        }
        Err(FitsError::AlreadyExists(path)) => {
            warn!("Not overwriting existing file {}", path.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Requested keywords with case-insensitive duplicates and `file` removed.
fn dedup_keywords<'a>(keywords: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for k in keywords.map(str::trim).filter(|k| !k.is_empty()) {
        if k.eq_ignore_ascii_case(FILE_COLUMN) || out.iter().any(|o| o.eq_ignore_ascii_case(k)) {
            continue;
        }
        out.push(k.to_string());
    }
    out
}

/// Replace `*` with every keyword of every header, in first-seen order.
fn expand_keywords<'h, S: AsRef<str>>(
    keywords: &[S],
    headers: impl Iterator<Item = &'h Header> + Clone,
) -> Vec<String> {
    let mut expanded: Vec<&str> = Vec::new();
    for keyword in keywords.iter().map(|k| k.as_ref()) {
        if keyword == ALL_KEYWORDS {
            for header in headers.clone() {
                expanded.extend(header.keywords());
            }
        } else {
            expanded.push(keyword);
        }
    }
    dedup_keywords(expanded.into_iter())
}

fn extend_masked<S: AsRef<str>>(table: &SummaryTable, keywords: &[S], generation: u64) -> SummaryTable {
    let mut columns: Vec<Column> = table.columns().to_vec();
    for keyword in keywords.iter().map(|k| k.as_ref()) {
        if keyword == ALL_KEYWORDS || table.has_column(keyword) {
            continue;
        }
        let mut column = Column::new(keyword);
        column.cells = vec![Cell::Masked; table.len()];
        columns.push(column);
    }
    let mut out = SummaryTable::from_columns(columns, generation);
    let keep: Vec<String> = keywords.iter().map(|k| k.as_ref().to_string()).collect();
    if !keep.iter().any(|k| k == ALL_KEYWORDS) {
        out.retain_columns(&keep);
    }
    out
}

/// Matching file names: grouped by extension in the order given, sorted
/// within each group, each name once.
pub fn discover_files(
    dir: &Path,
    extensions: &[String],
    find_compressed: bool,
) -> Result<Vec<String>, CollectionError> {
    if !dir.is_dir() {
        return Err(CollectionError::BadLocation(dir.to_path_buf()));
    }
    let mut names: Vec<String> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();

    let mut suffixes: Vec<String> = extensions.iter().map(|e| format!(".{e}")).collect();
    if find_compressed {
        suffixes.extend(extensions.iter().map(|e| format!(".{e}.gz")));
    }

    let mut files: Vec<String> = Vec::new();
    for suffix in &suffixes {
        for name in names.iter().filter(|n| n.ends_with(suffix.as_str())) {
            if !files.contains(name) {
                files.push(name.clone());
            }
        }
    }
    debug!("Found {} FITS files in {}", files.len(), dir.display());
    Ok(files)
}
