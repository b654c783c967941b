use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PatchError;
use crate::fits::Header;

/// Observing site location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
    /// Meters
    pub altitude: f64,
}

/// A camera, recognised by the `INSTRUME` values it writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub name: String,
    pub fits_names: Vec<String>,
    pub rows: usize,
    pub columns: usize,
    /// First overscan pixel along `overscan_axis`.
    pub overscan_start: Option<usize>,
    /// 1 for `NAXIS1`, 2 for `NAXIS2`.
    pub overscan_axis: Option<usize>,
}

impl Instrument {
    /// `axes` is `[NAXIS1, NAXIS2, ...]`.
    pub fn has_overscan(&self, axes: &[usize]) -> bool {
        match (self.overscan_start, self.overscan_axis) {
            (Some(start), Some(axis)) if axis >= 1 => {
                axes.get(axis - 1).is_some_and(|&len| len > start)
            }
            _ => false,
        }
    }
}

fn default_purged_flag() -> String {
    "PURGED".to_string()
}

/// Acquisition software whose headers may carry wrong keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSoftware {
    pub name: String,
    /// Exact value written in `fits_keyword`.
    pub fits_name: String,
    pub major_version: u32,
    pub minor_version: u32,
    #[serde(default)]
    pub bad_keywords: Vec<String>,
    pub fits_keyword: String,
    #[serde(default = "default_purged_flag")]
    pub purged_flag_keyword: String,
}

impl ImageSoftware {
    pub fn created_this(&self, version: &str) -> bool {
        version == self.fits_name
    }
}

/// Everything patching needs to know about the observatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservatoryConfig {
    pub site: Site,
    pub instruments: Vec<Instrument>,
    pub software: Vec<ImageSoftware>,
}

impl Default for ObservatoryConfig {
    fn default() -> Self {
        fn maxim(fits_name: &str, major: u32, minor: u32, bad: &[&str]) -> ImageSoftware {
            ImageSoftware {
                name: "MaxImDL".to_string(),
                fits_name: fits_name.to_string(),
                major_version: major,
                minor_version: minor,
                bad_keywords: bad.iter().map(|k| k.to_string()).collect(),
                fits_keyword: "SWCREATE".to_string(),
                purged_flag_keyword: default_purged_flag(),
            }
        }
        Self {
            site: Site {
                name: "Feder Observatory".to_string(),
                latitude: 46.86678,
                longitude: -96.453278,
                altitude: 311.8,
            },
            instruments: vec![Instrument {
                name: "Apogee Alta U9".to_string(),
                fits_names: vec!["Apogee Alta".to_string(), "Apogee USB/Net".to_string()],
                rows: 2048,
                columns: 3085,
                overscan_start: Some(3073),
                overscan_axis: Some(1),
            }],
            software: vec![
                maxim("MaxIm DL Version 4.10", 4, 10, &[]),
                maxim(
                    "MaxIm DL Version 5.21 130912 01A17",
                    5,
                    21,
                    &["OBJECT", "JD", "JD-HELIO", "OBJCTALT", "OBJCTAZ", "OBJCTHA", "AIRMASS"],
                ),
            ],
        }
    }
}

impl ObservatoryConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, PatchError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Instrument whose FITS names include the header's `INSTRUME`.
    pub fn instrument_for(&self, header: &Header) -> Option<&Instrument> {
        let name = header.get_str("INSTRUME")?;
        self.instruments
            .iter()
            .find(|i| i.fits_names.iter().any(|n| n == name))
    }

    /// Software that wrote this header, judged by its own keyword.
    pub fn software_for(&self, header: &Header) -> Option<&ImageSoftware> {
        self.software.iter().find(|s| {
            header
                .get_str(&s.fits_keyword)
                .is_some_and(|v| s.created_this(v))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_feder() {
        let cfg = ObservatoryConfig::default();
        assert_eq!(cfg.site.name, "Feder Observatory");
        assert_eq!(cfg.instruments[0].overscan_start, Some(3073));
        assert_eq!(cfg.software[1].bad_keywords.len(), 7);
    }

    #[test]
    fn overscan_depends_on_axis_length() {
        let apogee = &ObservatoryConfig::default().instruments[0];
        assert!(apogee.has_overscan(&[3085, 2048]));
        assert!(!apogee.has_overscan(&[3073, 2048]));
        assert!(!apogee.has_overscan(&[]));
    }

    #[test]
    fn finds_instrument_and_software_from_header() {
        let cfg = ObservatoryConfig::default();
        let mut header = Header::new();
        header.set("INSTRUME", "Apogee USB/Net").unwrap();
        header.set("SWCREATE", "MaxIm DL Version 5.21 130912 01A17").unwrap();
        assert_eq!(cfg.instrument_for(&header).unwrap().name, "Apogee Alta U9");
        assert_eq!(cfg.software_for(&header).unwrap().major_version, 5);

        header.set("SWCREATE", "Something Else").unwrap();
        assert!(cfg.software_for(&header).is_none());
    }

    #[test]
    fn json_round_trip_and_defaults() {
        let json = serde_json::to_string(&ObservatoryConfig::default()).unwrap();
        let back: ObservatoryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ObservatoryConfig::default());

        let minimal = r#"{
            "site": {"name": "Here", "latitude": 1.0, "longitude": 2.0, "altitude": 3.0},
            "instruments": [],
            "software": [{"name": "X", "fits_name": "X 1.0", "major_version": 1,
                          "minor_version": 0, "fits_keyword": "SWCREATE"}]
        }"#;
        let cfg: ObservatoryConfig = serde_json::from_str(minimal).unwrap();
        assert_eq!(cfg.software[0].purged_flag_keyword, "PURGED");
        assert!(cfg.software[0].bad_keywords.is_empty());
    }
}
