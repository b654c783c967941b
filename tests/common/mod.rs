#![allow(dead_code)]

use std::path::{Path, PathBuf};

use astro_frames::data::model::HeaderValue;
use astro_frames::fits::{write_hdu, Hdu, Header, ImageData};
use tempfile::TempDir;

pub fn header(cards: &[(&str, HeaderValue)]) -> Header {
    let mut header = Header::new();
    for (keyword, value) in cards {
        header.set(keyword, value.clone()).unwrap();
    }
    header
}

/// Write a small FITS file holding `image` with the given header cards.
pub fn write_image(dir: &Path, name: &str, cards: &[(&str, HeaderValue)], image: &ImageData) -> PathBuf {
    let path = dir.join(name);
    write_hdu(&path, &Hdu::from_image(header(cards), image), false).unwrap();
    path
}

/// Write a flat 4x3 frame.
pub fn write_frame(dir: &Path, name: &str, cards: &[(&str, HeaderValue)]) -> PathBuf {
    write_image(dir, name, cards, &ImageData::filled(4, 3, 100.0))
}

pub fn s(value: &str) -> HeaderValue {
    HeaderValue::String(value.to_string())
}

pub fn f(value: f64) -> HeaderValue {
    HeaderValue::Float(value)
}

/// One LIGHT frame with FILTER=R and one BIAS frame without FILTER.
pub fn light_and_bias() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_frame(
        dir.path(),
        "light.fit",
        &[("IMAGETYP", s("LIGHT")), ("FILTER", s("R")), ("EXPTIME", f(30.0))],
    );
    write_frame(dir.path(), "bias.fit", &[("IMAGETYP", s("BIAS")), ("EXPTIME", f(0.0))]);
    dir
}

/// A mixed night: calibration frames and lights, one of them unnamed and
/// one with no pointing, plus an unreadable file.
pub fn mixed_night() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    write_frame(p, "bias1.fit", &[("IMAGETYP", s("BIAS")), ("CCD-TEMP", f(-20.0))]);
    write_frame(p, "bias2.fit", &[("IMAGETYP", s("BIAS")), ("CCD-TEMP", f(-20.2))]);
    write_frame(p, "flat.fits", &[("IMAGETYP", s("FLAT"))]);
    write_frame(
        p,
        "m101.fit",
        &[
            ("IMAGETYP", s("LIGHT")),
            ("FILTER", s("R")),
            ("OBJECT", s("m101")),
            ("OBJCTRA", s("14 03 12.5")),
            ("OBJCTDEC", s("+54 20 56")),
        ],
    );
    write_frame(
        p,
        "nameless.fit",
        &[
            ("IMAGETYP", s("LIGHT")),
            ("FILTER", s("V")),
            ("OBJCTRA", s("14 03 13.0")),
            ("OBJCTDEC", s("+54 21 10")),
        ],
    );
    write_frame(p, "lost.fit", &[("IMAGETYP", s("LIGHT"))]);
    std::fs::write(p.join("broken.fit"), b"not a fits file").unwrap();
    dir
}
