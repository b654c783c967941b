//! Time and coordinate helpers for header patching.
//!
//! Angles are in degrees unless a name says otherwise; right ascension and
//! sidereal time are in hours.

use std::f64::consts::{PI, TAU};
use std::time::{SystemTime, UNIX_EPOCH};

use hifitime::{Epoch, TimeScale};

use crate::error::PatchError;

/// MJD of J2000.0
const T2000: f64 = 51544.5;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Parse a `DATE-OBS` value, `YYYY-MM-DDThh:mm:ss[.sss]` in UTC. A bare
/// date means midnight.
pub fn parse_date_obs(date_obs: &str) -> Result<Epoch, PatchError> {
    let bad = || PatchError::BadDateObs(date_obs.to_string());
    let trimmed = date_obs.trim();
    let (date, time) = trimmed.split_once('T').unwrap_or((trimmed, "00:00:00"));

    let ymd: Vec<&str> = date.split('-').collect();
    let [year, month, day] = ymd.as_slice() else {
        return Err(bad());
    };
    let year: i32 = year.parse().map_err(|_| bad())?;
    let month: u8 = month.parse().map_err(|_| bad())?;
    let day: u8 = day.parse().map_err(|_| bad())?;

    let hms: Vec<&str> = time.split(':').collect();
    let [hour, minute, second] = hms.as_slice() else {
        return Err(bad());
    };
    let hour: u8 = hour.parse().map_err(|_| bad())?;
    let minute: u8 = minute.parse().map_err(|_| bad())?;
    let seconds: f64 = second.parse().map_err(|_| bad())?;
    if !(0.0..61.0).contains(&seconds) || month == 0 || month > 12 || day == 0 || day > 31 || hour > 23 || minute > 59 {
        return Err(bad());
    }
    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * 1e9).round() as u32;

    Epoch::maybe_from_gregorian(
        year,
        month,
        day,
        hour,
        minute,
        whole as u8,
        nanos,
        TimeScale::UTC,
    )
    .map_err(|_| bad())
}

/// Current time, from the system clock.
pub fn now_utc() -> Epoch {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    Epoch::from_unix_seconds(seconds)
}

/// `YYYY-MM-DDThh:mm:ss` in UTC, whole seconds.
pub fn iso_timestamp(epoch: Epoch) -> String {
    let (y, m, d, hh, mm, ss, _) = epoch.to_gregorian_utc();
    format!("{y:04}-{m:02}-{d:02}T{hh:02}:{mm:02}:{ss:02}")
}

pub fn julian_date(epoch: Epoch) -> f64 {
    epoch.to_jde_utc_days()
}

pub fn modified_julian_date(epoch: Epoch) -> f64 {
    epoch.to_mjd_utc_days()
}

/// Greenwich mean sidereal time (IAU 1982) in radians, `[0, 2π)`. UTC is
/// used for UT1.
fn gmst(mjd: f64) -> f64 {
    const C0: f64 = 24110.54841;
    const C1: f64 = 8640184.812866;
    const C2: f64 = 9.3104e-2;
    const C3: f64 = -6.2e-6;
    // sidereal day / solar day
    const RAP: f64 = 1.00273790934;

    let day = mjd.floor();
    let t = (day - T2000) / 36525.0;
    let gmst0 = (((C3 * t + C2) * t + C1) * t + C0) * TAU / 86400.0;
    (gmst0 + mjd.fract() * TAU * RAP).rem_euclid(TAU)
}

/// Local mean sidereal time in hours for an east longitude in degrees.
pub fn local_sidereal_time(epoch: Epoch, longitude: f64) -> f64 {
    let lst = (gmst(modified_julian_date(epoch)) + longitude.to_radians()).rem_euclid(TAU);
    lst * 12.0 / PI
}

// ---------------------------------------------------------------------------
// Sexagesimal
// ---------------------------------------------------------------------------

/// Split decimal degrees (or hours) into whole units, minutes and seconds.
/// Uses floor division, so negative input gives a negative leading part
/// with positive minutes and seconds.
pub fn deg_to_dms(value: f64) -> (i64, i64, f64) {
    let total = value * 3600.0;
    let minutes = total.div_euclid(60.0);
    let seconds = total.rem_euclid(60.0);
    let degrees = minutes.div_euclid(60.0);
    let minutes = minutes.rem_euclid(60.0);
    (degrees as i64, minutes as i64, seconds)
}

/// Format `(units, minutes, seconds)` as `dd:mm:ss.ss`. `precision` is the
/// number of decimals on the seconds; `sign` forces a leading `+`.
pub fn sexagesimal_string(dms: (i64, i64, f64), precision: usize, sign: bool) -> String {
    let (d, m, s) = dms;
    let width = precision + 3;
    if sign {
        format!("{d:+03}:{m:02}:{s:0width$.precision$}")
    } else {
        format!("{d:02}:{m:02}:{s:0width$.precision$}")
    }
}

/// Signed `±dd:mm:ss.ss` for a decimal value of either sign.
pub fn signed_sexagesimal(value: f64, precision: usize) -> String {
    let (d, m, s) = deg_to_dms(value.abs());
    let sign = if value < 0.0 { '-' } else { '+' };
    format!("{sign}{}", sexagesimal_string((d, m, s), precision, false))
}

/// Parse `dd:mm:ss.s` or `dd mm ss.s` into decimal units. A leading `-`
/// applies to the whole value.
pub fn parse_sexagesimal(text: &str) -> Result<f64, PatchError> {
    let bad = || PatchError::BadSexagesimal(text.to_string());
    let trimmed = text.trim();
    let negative = trimmed.starts_with('-');
    let parts: Vec<f64> = trimmed
        .trim_start_matches(['+', '-'])
        .split([':', ' '])
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<f64>().map_err(|_| bad()))
        .collect::<Result<_, _>>()?;
    if parts.is_empty() || parts.len() > 3 {
        return Err(bad());
    }
    let magnitude = parts
        .iter()
        .zip([1.0, 60.0, 3600.0])
        .map(|(v, scale)| v / scale)
        .sum::<f64>();
    Ok(if negative { -magnitude } else { magnitude })
}

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// Right ascension and declination, both in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquatorialCoord {
    pub ra: f64,
    pub dec: f64,
}

impl EquatorialCoord {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    /// From header strings: RA in hours, Dec in degrees.
    pub fn from_sexagesimal(ra: &str, dec: &str) -> Result<Self, PatchError> {
        Ok(Self {
            ra: parse_sexagesimal(ra)? * 15.0,
            dec: parse_sexagesimal(dec)?,
        })
    }

    pub fn ra_hours(&self) -> f64 {
        self.ra / 15.0
    }

    /// Great-circle distance in degrees (Vincenty form).
    pub fn separation(&self, other: &EquatorialCoord) -> f64 {
        angular_separation(self, other)
    }
}

/// Hour angle in hours, wrapped to `[0, 24)`.
pub fn hour_angle(lst_hours: f64, ra_hours: f64) -> f64 {
    (lst_hours - ra_hours).rem_euclid(24.0)
}

/// Altitude and azimuth (north through east) in degrees, without
/// refraction.
pub fn alt_az(coord: &EquatorialCoord, lst_hours: f64, latitude: f64) -> (f64, f64) {
    let ha = (lst_hours * 15.0 - coord.ra).to_radians();
    let dec = coord.dec.to_radians();
    let lat = latitude.to_radians();

    let sin_alt = dec.sin() * lat.sin() + dec.cos() * lat.cos() * ha.cos();
    let alt = sin_alt.clamp(-1.0, 1.0).asin();
    let az = (-dec.cos() * ha.sin()).atan2(dec.sin() * lat.cos() - dec.cos() * lat.sin() * ha.cos());
    (alt.to_degrees(), az.to_degrees().rem_euclid(360.0))
}

/// Plane-parallel airmass, `sec z`.
pub fn airmass(altitude: f64) -> f64 {
    1.0 / (90.0 - altitude).to_radians().cos()
}

pub fn angular_separation(a: &EquatorialCoord, b: &EquatorialCoord) -> f64 {
    let (ra1, dec1) = (a.ra.to_radians(), a.dec.to_radians());
    let (ra2, dec2) = (b.ra.to_radians(), b.dec.to_radians());
    let dra = ra2 - ra1;
    let num = ((dec2.cos() * dra.sin()).powi(2)
        + (dec1.cos() * dec2.sin() - dec1.sin() * dec2.cos() * dra.cos()).powi(2))
    .sqrt();
    let den = dec1.sin() * dec2.sin() + dec1.cos() * dec2.cos() * dra.cos();
    num.atan2(den).to_degrees()
}

/// Round to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const DMS: (i64, i64, f64) = (1, 2, 3.1415);

    #[test]
    fn sexagesimal_formatting() {
        assert_eq!(sexagesimal_string(DMS, 2, false), "01:02:03.14");
        assert_eq!(sexagesimal_string(DMS, 2, true), "+01:02:03.14");
        assert_eq!(sexagesimal_string(DMS, 3, false), "01:02:03.142");
        assert_eq!(sexagesimal_string(DMS, 3, true), "+01:02:03.142");
    }

    #[test]
    fn sexagesimal_parsing() {
        assert_abs_diff_eq!(parse_sexagesimal("01:30:00").unwrap(), 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(parse_sexagesimal("-00 30 00").unwrap(), -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(parse_sexagesimal("+54:20:56.4").unwrap(), 54.349, epsilon = 1e-9);
        assert!(parse_sexagesimal("north").is_err());
    }

    #[test]
    fn signed_values() {
        assert_eq!(signed_sexagesimal(46.86678, 2), "+46:52:00.41");
        assert_eq!(signed_sexagesimal(-96.453278, 2), "-96:27:11.80");
    }

    #[test]
    fn timestamps() {
        let epoch = parse_date_obs("2012-03-04T05:06:07.25").unwrap();
        assert_eq!(iso_timestamp(epoch), "2012-03-04T05:06:07");
    }

    #[test]
    fn dms_split() {
        let (d, m, s) = deg_to_dms(1.5125);
        assert_eq!((d, m), (1, 30));
        assert_abs_diff_eq!(s, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn julian_dates_at_j2000() {
        let epoch = parse_date_obs("2000-01-01T12:00:00").unwrap();
        assert_abs_diff_eq!(julian_date(epoch), 2451545.0, epsilon = 1e-6);
        assert_abs_diff_eq!(modified_julian_date(epoch), 51544.5, epsilon = 1e-6);
    }

    #[test]
    fn date_obs_rejects_garbage() {
        assert!(parse_date_obs("yesterday").is_err());
        assert!(parse_date_obs("2012-13-01T00:00:00").is_err());
        assert!(parse_date_obs("2012-01-01T00:00").is_err());
        assert!(parse_date_obs("2012-01-01").is_ok());
    }

    #[test]
    fn sidereal_time_at_j2000() {
        let epoch = parse_date_obs("2000-01-01T12:00:00").unwrap();
        // GMST at J2000.0 is 18h 41m 50.55s
        assert_abs_diff_eq!(local_sidereal_time(epoch, 0.0), 18.697375, epsilon = 1e-3);
        assert_abs_diff_eq!(
            local_sidereal_time(epoch, -90.0),
            18.697375 - 6.0,
            epsilon = 1e-3
        );
    }

    #[test]
    fn meridian_transit() {
        let latitude = 46.86678;
        let zenith = EquatorialCoord::new(15.0 * 3.0, latitude);
        let (alt, _) = alt_az(&zenith, 3.0, latitude);
        assert_abs_diff_eq!(alt, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(airmass(alt), 1.0, epsilon = 1e-9);

        let equator = EquatorialCoord::new(0.0, 0.0);
        let (alt, az) = alt_az(&equator, 0.0, latitude);
        assert_abs_diff_eq!(alt, 90.0 - latitude, epsilon = 1e-9);
        assert_abs_diff_eq!(az, 180.0, epsilon = 1e-9);
    }

    #[test]
    fn hour_angle_wraps() {
        assert_abs_diff_eq!(hour_angle(1.0, 23.0), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hour_angle(23.0, 1.0), 22.0, epsilon = 1e-12);
    }

    #[test]
    fn separation() {
        let a = EquatorialCoord::new(10.0, 0.0);
        let b = EquatorialCoord::new(11.0, 0.0);
        assert_abs_diff_eq!(a.separation(&b), 1.0, epsilon = 1e-9);
        let pole = EquatorialCoord::new(123.0, 90.0);
        assert_abs_diff_eq!(a.separation(&pole), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(1.23456, 3), 1.235);
        assert_eq!(round_to(2455927.123456789, 6), 2455927.123457);
    }
}
