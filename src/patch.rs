//! Header patching: site, time, pointing and overscan keywords.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::astro::{
    self, airmass, alt_az, deg_to_dms, hour_angle, local_sidereal_time, parse_date_obs, round_to,
    sexagesimal_string, signed_sexagesimal, EquatorialCoord,
};
use crate::collection::{ImageFileCollection, SaveOptions};
use crate::data::filter::Predicate;
use crate::data::loader::guess_value_type;
use crate::data::model::HeaderValue;
use crate::error::{KeywordError, PatchError};
use crate::fits::{self, Header};
use crate::keyword::FitsKeyword;
use crate::site::{ImageSoftware, Instrument, ObservatoryConfig};

/// Default name of the object list looked for in the image directory.
pub const DEFAULT_OBJECT_LIST: &str = "obsinfo.txt";

// ---------------------------------------------------------------------------
// Image types and history markers
// ---------------------------------------------------------------------------

/// MaxIm DL writes `Bias Frame`; IRAF calls that `BIAS`. Safe to call on an
/// IRAF-style type.
pub fn iraf_image_type(image_type: &str) -> String {
    image_type
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_uppercase()
}

/// Flats and lights are the frames that need a `FILTER`.
pub fn needs_filter(image_type: &str) -> bool {
    matches!(image_type, "FLAT" | "LIGHT")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Begin,
    End,
}

impl FromStr for HistoryMode {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "begin" => Ok(HistoryMode::Begin),
            "end" => Ok(HistoryMode::End),
            _ => Err(PatchError::UnknownHistoryMode(s.to_string())),
        }
    }
}

impl fmt::Display for HistoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryMode::Begin => f.write_str("BEGIN"),
            HistoryMode::End => f.write_str("END"),
        }
    }
}

/// Marker line bracketing the HISTORY written by one operation.
pub fn history(function: &str, mode: HistoryMode) -> String {
    let marker = match mode {
        HistoryMode::Begin => "+++++",
        HistoryMode::End => "-----",
    };
    let stamp = astro::iso_timestamp(astro::now_utc());
    format!("{marker} {mode} {function} {stamp} {marker}")
}

/// Rewrite `IMAGETYP` in IRAF style. Returns whether it changed.
pub fn change_imagetype_to_iraf(header: &mut Header, history: bool) -> Result<bool, PatchError> {
    let Some(current) = header.get_str("IMAGETYP").map(str::to_string) else {
        return Ok(false);
    };
    let iraf = iraf_image_type(&current);
    if iraf == current {
        return Ok(false);
    }
    FitsKeyword::new("IMAGETYP")?
        .with_value(iraf)
        .add_to_header(header, false, history)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Individual patch steps
// ---------------------------------------------------------------------------

/// Remove keywords the acquisition software is known to get wrong, then set
/// its purged flag. A header already flagged is left alone unless `force`.
/// Returns whether anything was purged.
pub fn purge_bad_keywords(
    header: &mut Header,
    software: &ImageSoftware,
    history: bool,
    force: bool,
) -> Result<bool, PatchError> {
    let already = header
        .get(&software.purged_flag_keyword)
        .and_then(HeaderValue::as_bool)
        .unwrap_or(false);
    if already && !force {
        return Ok(false);
    }
    for keyword in &software.bad_keywords {
        if header.remove(keyword).is_some() && history {
            header.add_history(&format!("Removed keyword {keyword}"));
        }
    }
    FitsKeyword::new(&software.purged_flag_keyword)?
        .with_value(true)
        .with_comment(&format!("Have bad keywords been removed by {}?", software.name))
        .add_to_header(header, false, history)?;
    Ok(true)
}

/// Record where the overscan region is. `axes` is `[NAXIS1, NAXIS2]`.
pub fn add_overscan(
    header: &mut Header,
    axes: &[usize],
    instrument: &Instrument,
    history: bool,
) -> Result<(), PatchError> {
    let has_overscan = instrument.has_overscan(axes);
    FitsKeyword::new("OSCAN")?
        .with_value(has_overscan)
        .with_comment("True if image has overscan region")
        .add_to_header(header, false, history)?;
    if let (true, Some(axis), Some(start)) =
        (has_overscan, instrument.overscan_axis, instrument.overscan_start)
    {
        FitsKeyword::new("OSCANAX")?
            .with_value(axis as i64)
            .with_comment("Overscan axis, 1 is NAXIS1, 2 is NAXIS 2")
            .add_to_header(header, false, history)?;
        FitsKeyword::new("OSCANST")?
            .with_value(start as i64)
            .with_comment("Starting pixel of overscan region")
            .add_to_header(header, false, history)?;
    }
    Ok(())
}

/// LATITUDE/SITELAT, LONGITUD/SITELONG and ALTITUDE.
pub fn add_site_keywords(header: &mut Header, config: &ObservatoryConfig, history: bool) -> Result<(), PatchError> {
    let site = &config.site;
    let keywords = [
        FitsKeyword::new("LATITUDE")?
            .with_synonyms(&["SITELAT"])?
            .with_comment("[degrees] Observatory latitude")
            .with_value(signed_sexagesimal(site.latitude, 2)),
        FitsKeyword::new("LONGITUD")?
            .with_synonyms(&["SITELONG"])?
            .with_comment("[degrees east] Observatory longitude")
            .with_value(signed_sexagesimal(site.longitude, 2)),
        FitsKeyword::new("ALTITUDE")?
            .with_comment("[meters] Observatory altitude")
            .with_value(site.altitude),
    ];
    for keyword in &keywords {
        keyword.add_to_header(header, true, history)?;
    }
    Ok(())
}

/// JD-OBS, MJD-OBS and LST from `DATE-OBS`. Returns the local sidereal time
/// in hours, or `None` when the header has no `DATE-OBS`.
pub fn add_time_keywords(
    header: &mut Header,
    config: &ObservatoryConfig,
    history: bool,
) -> Result<Option<f64>, PatchError> {
    let Some(date_obs) = header.get_str("DATE-OBS").map(str::to_string) else {
        return Ok(None);
    };
    let epoch = parse_date_obs(&date_obs)?;
    let lst = local_sidereal_time(epoch, config.site.longitude);
    let keywords = [
        FitsKeyword::new("JD-OBS")?
            .with_comment("Julian Date at start of observation")
            .with_value(round_to(astro::julian_date(epoch), 6)),
        FitsKeyword::new("MJD-OBS")?
            .with_comment("Modified Julian date at start of observation")
            .with_value(round_to(astro::modified_julian_date(epoch), 6)),
        FitsKeyword::new("LST")?
            .with_comment("Local Sidereal Time at start of observation")
            .with_value(sexagesimal_string(deg_to_dms(lst), 2, false)),
    ];
    for keyword in &keywords {
        keyword.add_to_header(header, false, history)?;
    }
    Ok(Some(lst))
}

fn pointing_keyword(name: &str, synonym: &str, comment: &str) -> Result<FitsKeyword, KeywordError> {
    Ok(FitsKeyword::new(name)?
        .with_synonyms(&[synonym])?
        .with_comment(comment))
}

/// RA and Dec of a frame, normalised to colon-separated strings. `None` when
/// the header carries no pointing.
pub fn read_pointing(header: &Header) -> Result<Option<(String, String)>, PatchError> {
    let mut ra = pointing_keyword("RA", "OBJCTRA", "Approximate RA at EQUINOX")?;
    let mut dec = pointing_keyword("DEC", "OBJCTDEC", "Approximate DEC at EQUINOX")?;
    for keyword in [&mut ra, &mut dec] {
        match keyword.set_value_from_header(header) {
            Ok(()) => {}
            Err(KeywordError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
    let text = |k: &FitsKeyword| {
        k.value
            .as_ref()
            .map(|v| v.to_string().trim().replace(' ', ":"))
            .unwrap_or_default()
    };
    Ok(Some((text(&ra), text(&dec))))
}

/// RA/OBJCTRA, DEC/OBJCTDEC, HA, AIRMASS/SECZ, ALT-OBJ and AZ-OBJ for a
/// light frame. Returns false when the frame has no pointing.
pub fn add_apparent_position(
    header: &mut Header,
    lst: f64,
    config: &ObservatoryConfig,
    history: bool,
) -> Result<bool, PatchError> {
    let Some((ra_text, dec_text)) = read_pointing(header)? else {
        return Ok(false);
    };
    let coord = EquatorialCoord::from_sexagesimal(&ra_text, &dec_text)?;
    let (alt, az) = alt_az(&coord, lst, config.site.latitude);
    let ha = hour_angle(lst, coord.ra_hours());

    pointing_keyword("RA", "OBJCTRA", "Approximate RA at EQUINOX")?
        .with_value(ra_text)
        .add_to_header(header, true, history)?;
    pointing_keyword("DEC", "OBJCTDEC", "Approximate DEC at EQUINOX")?
        .with_value(dec_text)
        .add_to_header(header, true, history)?;
    FitsKeyword::new("HA")?
        .with_comment("Hour angle")
        .with_value(sexagesimal_string(deg_to_dms(ha), 2, false))
        .add_to_header(header, false, history)?;
    if alt > 0.0 {
        FitsKeyword::new("AIRMASS")?
            .with_synonyms(&["SECZ"])?
            .with_comment("Airmass (Sec(Z)) at start of observation")
            .with_value(round_to(airmass(alt), 3))
            .add_to_header(header, true, history)?;
    }
    FitsKeyword::new("ALT-OBJ")?
        .with_comment("[degrees] Altitude of object, no refraction")
        .with_value(round_to(alt, 5))
        .add_to_header(header, false, history)?;
    FitsKeyword::new("AZ-OBJ")?
        .with_comment("[degrees] Azimuth of object, no refraction")
        .with_value(round_to(az, 5))
        .add_to_header(header, false, history)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Directory-level operations
// ---------------------------------------------------------------------------

/// Which steps [`patch_headers`] performs and where results go.
#[derive(Debug, Clone)]
pub struct PatchOptions {
    pub save: SaveOptions,
    pub purge_bad: bool,
    pub add_time: bool,
    pub add_apparent_pos: bool,
    pub add_overscan: bool,
    pub fix_imagetype: bool,
    pub config: ObservatoryConfig,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            save: SaveOptions::with_suffix("_new"),
            purge_bad: true,
            add_time: true,
            add_apparent_pos: true,
            add_overscan: true,
            fix_imagetype: true,
            config: ObservatoryConfig::default(),
        }
    }
}

/// Patch every FITS file in `dir`. Returns the number of files processed.
pub fn patch_headers(dir: &Path, options: &PatchOptions) -> Result<usize, PatchError> {
    let mut collection = ImageFileCollection::open(dir, &["imagetyp"])?;
    let config = &options.config;
    let count = collection.process_hdus(&Predicate::new(), &options.save, |path, hdu| -> Result<(), PatchError> {
        let axes = hdu.data.axes.clone();
        let header = &mut hdu.header;
        header.add_history(&history("patch_headers", HistoryMode::Begin));

        if options.purge_bad {
            if let Some(software) = config.software_for(header) {
                purge_bad_keywords(header, software, true, false)?;
            }
        }
        if options.fix_imagetype {
            change_imagetype_to_iraf(header, true)?;
        }

        add_site_keywords(header, config, true)?;
        let lst = if options.add_time {
            add_time_keywords(header, config, true)?
        } else {
            None
        };

        if options.add_overscan {
            match config.instrument_for(header) {
                Some(instrument) => add_overscan(header, &axes, instrument, true)?,
                None => warn!("No known instrument for {}; overscan not recorded", path.display()),
            }
        }

        let is_light = header.get_str("IMAGETYP").is_some_and(|t| t == "LIGHT");
        if options.add_apparent_pos && is_light {
            match lst {
                Some(lst) => {
                    if !add_apparent_position(header, lst, config, true)? {
                        warn!("No pointing information in {}", path.display());
                    }
                }
                None => warn!("No DATE-OBS in {}; apparent position skipped", path.display()),
            }
        }

        header.add_history(&history("patch_headers", HistoryMode::End));
        Ok(())
    })?;
    info!("Patched {count} files in {}", dir.display());
    Ok(count)
}

/// One row of an object list: a name and, optionally, its position
/// (RA in hours, Dec in degrees, both sexagesimal).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectEntry {
    pub object: String,
    #[serde(default)]
    pub ra: Option<String>,
    #[serde(default)]
    pub dec: Option<String>,
}

impl ObjectEntry {
    pub fn coordinates(&self) -> Result<Option<EquatorialCoord>, PatchError> {
        match (&self.ra, &self.dec) {
            (Some(ra), Some(dec)) if !ra.trim().is_empty() && !dec.trim().is_empty() => {
                Ok(Some(EquatorialCoord::from_sexagesimal(ra, dec)?))
            }
            _ => Ok(None),
        }
    }
}

/// Read a CSV object list with an `object` column and optional `ra`/`dec`.
pub fn read_object_list(path: &Path) -> Result<Vec<ObjectEntry>, PatchError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut entries = Vec::new();
    for row in reader.deserialize() {
        entries.push(row?);
    }
    Ok(entries)
}

/// Options for [`add_object_info`].
#[derive(Debug, Clone)]
pub struct ObjectInfoOptions {
    /// Defaults to `obsinfo.txt` in the image directory.
    pub object_list: Option<PathBuf>,
    /// Largest pointing offset, in degrees, still counted as a match.
    pub match_radius: f64,
    pub save: SaveOptions,
}

impl Default for ObjectInfoOptions {
    fn default() -> Self {
        Self {
            object_list: None,
            match_radius: 1.0,
            save: SaveOptions::with_suffix("_new"),
        }
    }
}

/// True when any `IMAGETYP` in the collection is still MaxIm DL style.
pub fn has_maximdl_image_types(collection: &ImageFileCollection) -> Result<bool, PatchError> {
    if collection.summary().is_none() {
        return Ok(false);
    }
    Ok(collection
        .values("imagetyp", true)?
        .iter()
        .filter_map(HeaderValue::as_str)
        .any(|t| t.to_ascii_lowercase().contains("frame")))
}

/// Set `OBJECT` on light frames that lack one, using the nearest listed
/// object within the match radius. Returns the number of frames named.
pub fn add_object_info(dir: &Path, options: &ObjectInfoOptions) -> Result<usize, PatchError> {
    let list_path = options
        .object_list
        .clone()
        .unwrap_or_else(|| dir.join(DEFAULT_OBJECT_LIST));
    let mut objects = Vec::new();
    for entry in read_object_list(&list_path)? {
        match entry.coordinates()? {
            Some(coord) => objects.push((entry.object, coord)),
            None => warn!("Object {} has no coordinates and cannot be matched", entry.object),
        }
    }

    let mut collection = ImageFileCollection::open(dir, &["imagetyp", "object"])?;
    if has_maximdl_image_types(&collection)? {
        return Err(PatchError::MaximDlImageTypes);
    }
    let lights_without_name = Predicate::new().with("imagetyp", "LIGHT").missing("object");
    let mut named = 0;
    collection.process_headers(&lights_without_name, &options.save, |path, header| -> Result<(), PatchError> {
        let Some((ra, dec)) = read_pointing(header)? else {
            warn!("No pointing information in {}", path.display());
            return Ok(());
        };
        header.add_history(&history("add_object_info", HistoryMode::Begin));
        let pointing = EquatorialCoord::from_sexagesimal(&ra, &dec)?;
        let nearest = objects
            .iter()
            .map(|(name, coord)| (name, pointing.separation(coord)))
            .filter(|(_, sep)| *sep <= options.match_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match nearest {
            Some((name, _)) => {
                FitsKeyword::new("OBJECT")?
                    .with_comment("Target of the observations")
                    .with_value(name.as_str())
                    .add_to_header(header, false, true)?;
                named += 1;
            }
            None => warn!("No listed object near the pointing of {}", path.display()),
        }
        header.add_history(&history("add_object_info", HistoryMode::End));
        Ok(())
    })?;
    Ok(named)
}

// ---------------------------------------------------------------------------
// Keyword tables
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct KeyRow {
    #[serde(alias = "Keyword")]
    keyword: String,
    #[serde(alias = "Value")]
    value: String,
}

/// Read a CSV table with `keyword` and `value` columns. A value in single
/// quotes is always a string (`'+49 49 14'`); anything else is typed the way
/// a command line filter value is.
pub fn read_key_table(path: &Path) -> Result<Vec<FitsKeyword>, PatchError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut keys = Vec::new();
    for row in reader.deserialize() {
        let row: KeyRow = row?;
        let value = match row.value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
            Some(quoted) => HeaderValue::from(quoted),
            None => guess_value_type(&row.value),
        };
        keys.push(FitsKeyword::new(&row.keyword)?.with_value(value));
    }
    Ok(keys)
}

/// Read a list of files: a header line, then one name per row in the first
/// column, as the triage lists are written. Relative names are resolved
/// against the list's own directory.
pub fn read_file_list(path: &Path) -> Result<Vec<PathBuf>, PatchError> {
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut files = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(name) = record.get(0).filter(|n| !n.is_empty()) {
            files.push(base.join(name));
        }
    }
    Ok(files)
}

/// Set every keyword of `keys` in each file, replacing values already there.
/// Returns the number of files processed.
pub fn add_keys(files: &[PathBuf], keys: &[FitsKeyword], save: &SaveOptions) -> Result<usize, PatchError> {
    for path in files {
        let mut hdu = fits::read_hdu(path)?;
        hdu.header.add_history(&history("add_keys", HistoryMode::Begin));
        for key in keys {
            debug!("{}: {}", path.display(), key.history_comment(None));
            key.add_to_header(&mut hdu.header, false, true)?;
        }
        hdu.header.add_history(&history("add_keys", HistoryMode::End));
        save.save(path, &hdu)?;
    }
    info!("Added {} keywords to {} files", keys.len(), files.len());
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iraf_types() {
        for (maxim, iraf) in [
            ("Bias Frame", "BIAS"),
            ("Dark Frame", "DARK"),
            ("Light Frame", "LIGHT"),
            ("Flat Frame", "FLAT"),
            ("LIGHT", "LIGHT"),
        ] {
            assert_eq!(iraf_image_type(maxim), iraf);
        }
        assert!(needs_filter("FLAT"));
        assert!(needs_filter("LIGHT"));
        assert!(!needs_filter("BIAS"));
    }

    #[test]
    fn history_markers() {
        let begin = history("history_markers", HistoryMode::Begin);
        assert!(begin.find("BEGIN").is_some_and(|i| i > 0));
        assert!(begin.ends_with('+'));
        assert!(begin.contains("history_markers"));

        let end = history("history_markers", HistoryMode::End);
        assert!(end.find("END").is_some_and(|i| i > 0));
        assert!(end.ends_with('-'));

        assert!(matches!(
            "not a mode".parse::<HistoryMode>(),
            Err(PatchError::UnknownHistoryMode(_))
        ));
    }

    #[test]
    fn imagetype_fix_only_writes_history_on_change() {
        let mut header = Header::new();
        header.set("IMAGETYP", "Bias Frame").unwrap();
        assert!(change_imagetype_to_iraf(&mut header, false).unwrap());
        assert_eq!(header.get_str("IMAGETYP"), Some("BIAS"));

        assert!(!change_imagetype_to_iraf(&mut header, true).unwrap());
        assert_eq!(header.history().count(), 0);

        header.set("IMAGETYP", "Bias Frame").unwrap();
        assert!(change_imagetype_to_iraf(&mut header, true).unwrap());
        assert_eq!(header.history().count(), 1);
    }

    #[test]
    fn purges_maximdl5_keywords() {
        let config = ObservatoryConfig::default();
        let mut header = Header::new();
        header.set("SWCREATE", "MaxIm DL Version 5.21 130912 01A17").unwrap();
        header.set("OBJECT", "m101").unwrap();
        header.set("AIRMASS", 1.2).unwrap();
        header.set("EXPTIME", 30.0).unwrap();

        let software = config.software_for(&header).unwrap();
        assert!(purge_bad_keywords(&mut header, software, true, false).unwrap());
        for bad in &software.bad_keywords {
            assert!(!header.contains(bad));
        }
        assert!(header.contains("EXPTIME"));
        assert_eq!(header.get("PURGED"), Some(&HeaderValue::Bool(true)));

        header.set("OBJECT", "m101").unwrap();
        assert!(!purge_bad_keywords(&mut header, software, false, false).unwrap());
        assert!(header.contains("OBJECT"));
        assert!(purge_bad_keywords(&mut header, software, false, true).unwrap());
        assert!(!header.contains("OBJECT"));
    }

    #[test]
    fn overscan_for_apogee() {
        let apogee = &ObservatoryConfig::default().instruments[0];
        let mut with = Header::new();
        add_overscan(&mut with, &[3085, 2048], apogee, false).unwrap();
        assert_eq!(with.get("OSCAN"), Some(&HeaderValue::Bool(true)));
        assert_eq!(with.get_i64("OSCANAX"), Some(1));
        assert_eq!(with.get_i64("OSCANST"), Some(3073));

        let mut without = Header::new();
        add_overscan(&mut without, &[3072, 2048], apogee, false).unwrap();
        assert_eq!(without.get("OSCAN"), Some(&HeaderValue::Bool(false)));
        assert!(!without.contains("OSCANST"));
    }

    #[test]
    fn site_and_time_keywords() {
        let config = ObservatoryConfig::default();
        let mut header = Header::new();
        header.set("DATE-OBS", "2012-01-01T06:00:00").unwrap();
        add_site_keywords(&mut header, &config, false).unwrap();
        let lst = add_time_keywords(&mut header, &config, false).unwrap().unwrap();

        assert_eq!(header.get_str("LATITUDE"), Some("+46:52:00.41"));
        assert_eq!(header.get_str("SITELAT"), Some("+46:52:00.41"));
        assert_eq!(header.get_str("SITELONG"), Some("-96:27:11.80"));
        assert_eq!(header.get_f64("ALTITUDE"), Some(311.8));
        assert_eq!(header.get_f64("JD-OBS"), Some(2455927.75));
        assert_eq!(header.get_f64("MJD-OBS"), Some(55927.25));
        assert!((0.0..24.0).contains(&lst));
        assert_eq!(header.get_str("LST").map(str::len), Some(11));
    }

    #[test]
    fn missing_date_obs_skips_time() {
        let mut header = Header::new();
        let lst = add_time_keywords(&mut header, &ObservatoryConfig::default(), false).unwrap();
        assert!(lst.is_none());
        assert!(!header.contains("JD-OBS"));
    }

    #[test]
    fn pointing_is_normalised() {
        let mut header = Header::new();
        header.set("OBJCTRA", "14 03 12.5").unwrap();
        header.set("OBJCTDEC", "+54 20 56").unwrap();
        let (ra, dec) = read_pointing(&header).unwrap().unwrap();
        assert_eq!(ra, "14:03:12.5");
        assert_eq!(dec, "+54:20:56");

        let added = add_apparent_position(&mut header, 14.0, &ObservatoryConfig::default(), false).unwrap();
        assert!(added);
        assert_eq!(header.get_str("RA"), Some("14:03:12.5"));
        assert_eq!(header.get_str("OBJCTRA"), Some("14:03:12.5"));
        assert!(header.contains("ALT-OBJ"));
        assert!(header.contains("AZ-OBJ"));
        assert!(header.get_f64("AIRMASS").is_some_and(|a| a >= 1.0));
        assert_eq!(header.get_f64("AIRMASS"), header.get_f64("SECZ"));
    }

    #[test]
    fn no_pointing_is_not_an_error() {
        let mut header = Header::new();
        assert!(read_pointing(&header).unwrap().is_none());
        assert!(!add_apparent_position(&mut header, 1.0, &ObservatoryConfig::default(), false).unwrap());
    }
}
