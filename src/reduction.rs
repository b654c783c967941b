//! Overscan trimming and master bias/dark frames.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::astro;
use crate::collection::ImageFileCollection;
use crate::data::filter::Predicate;
use crate::error::ReductionError;
use crate::fits::{self, Hdu, Header, ImageData};

/// Largest allowed difference, in degrees C, between a dark's CCD-TEMP and
/// the mean of its exposure group.
pub const TEMPERATURE_TOLERANCE: f64 = 1.0;

/// Header values copied from the first input frame onto a master.
const COPY_FROM_SAMPLE: [&str; 5] = ["XBINNING", "YBINNING", "XPIXSZ", "YPIXSZ", "EXPTIME"];

// ---------------------------------------------------------------------------
// Overscan
// ---------------------------------------------------------------------------

/// Cut the overscan region described by OSCAN/OSCANAX/OSCANST off `image`
/// and update `header` to match. An image without overscan is returned as is.
pub fn trim_overscan(header: &mut Header, image: &ImageData) -> Result<ImageData, ReductionError> {
    let has_overscan = header
        .get("OSCAN")
        .and_then(|v| v.as_bool())
        .ok_or(ReductionError::MissingOverscanKeywords)?;
    if !has_overscan {
        return Ok(image.clone());
    }
    let (Some(axis), Some(start)) = (header.get_i64("OSCANAX"), header.get_i64("OSCANST")) else {
        return Err(ReductionError::MissingOverscanKeywords);
    };
    let start = usize::try_from(start).map_err(|_| ReductionError::MissingOverscanKeywords)?;

    // Axis 2 runs along the rows.
    let trimmed = if axis == 2 {
        image.crop(start, image.width)
    } else {
        image.crop(image.height, start)
    };

    header.remove("OSCANST");
    header.remove("OSCANAX");
    header.set("OSCAN", false)?;
    header.set_with_comment("TRIMMED", true, "Has overscan been trimmed from image?")?;
    Ok(trimmed)
}

// ---------------------------------------------------------------------------
// Combination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineMethod {
    Mean,
    Median,
}

impl fmt::Display for CombineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombineMethod::Mean => f.write_str("mean"),
            CombineMethod::Median => f.write_str("median"),
        }
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Pixel-by-pixel combination of images that all share one shape.
pub fn combine(images: &[ImageData], method: CombineMethod) -> Result<ImageData, ReductionError> {
    let first = images.first().ok_or(ReductionError::NothingToCombine)?;
    if let Some(other) = images.iter().find(|im| im.shape() != first.shape()) {
        return Err(ReductionError::ShapeMismatch {
            expected: first.shape(),
            found: other.shape(),
        });
    }

    let n = images.len() as f64;
    let mut stack = vec![0.0; images.len()];
    let pixels = (0..first.pixels.len())
        .map(|i| match method {
            CombineMethod::Mean => images.iter().map(|im| im.pixels[i]).sum::<f64>() / n,
            CombineMethod::Median => {
                for (slot, im) in stack.iter_mut().zip(images) {
                    *slot = im.pixels[i];
                }
                median(&mut stack)
            }
        })
        .collect();
    Ok(ImageData::new(first.width, first.height, pixels)?)
}

/// Mean and population standard deviation.
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

// ---------------------------------------------------------------------------
// Master frames
// ---------------------------------------------------------------------------

/// Wrap a combined image in an HDU whose header describes the master.
pub fn master_frame(
    image: &ImageData,
    image_type: &str,
    temperature: f64,
    temperature_dev: f64,
    sample: Option<&Header>,
    method: Option<CombineMethod>,
) -> Result<Hdu, ReductionError> {
    let mut header = Header::new();
    header.set("IMAGETYP", image_type)?;
    header.set_with_comment(
        "DATE",
        astro::iso_timestamp(astro::now_utc()),
        "Creation date of file",
    )?;
    header.set_with_comment("CCD-TEMP", temperature, "Average temperature of CCD")?;
    header.set_with_comment(
        "TEMP-DEV",
        temperature_dev,
        "Standard deviation of CCD temperature",
    )?;
    if let Some(method) = method {
        header.set_with_comment(
            "CMBN-MTH",
            method.to_string(),
            "Combination method for producing master",
        )?;
    }
    if let Some(sample) = sample {
        for key in COPY_FROM_SAMPLE {
            let Some(value) = sample.get(key) else {
                continue;
            };
            match sample.comment_of(key) {
                Some(comment) => header.set_with_comment(key, value.clone(), comment)?,
                None => header.set(key, value.clone())?,
            }
        }
    }
    Ok(Hdu::from_image(header, image))
}

/// Record how many and which files went into a master.
pub fn add_files_info(header: &mut Header, files: &[String]) -> Result<(), ReductionError> {
    header.set_with_comment(
        "N-FILES",
        files.len() as i64,
        "Number of files combined to make master",
    )?;
    header.add_comment("This master produced by combining the files below:");
    for file in files {
        header.add_comment(&format!("    {file}"));
    }
    Ok(())
}

/// Where [`build_masters`] writes and whether it may replace files.
#[derive(Debug, Clone)]
pub struct MasterOptions {
    /// Defaults to the image directory.
    pub destination: Option<PathBuf>,
    pub overwrite: bool,
    pub temperature_tolerance: f64,
}

impl Default for MasterOptions {
    fn default() -> Self {
        Self {
            destination: None,
            overwrite: false,
            temperature_tolerance: TEMPERATURE_TOLERANCE,
        }
    }
}

pub fn master_dark_name(exposure: f64, temperature: f64) -> String {
    format!("Master_Dark_{exposure:.2}_sec_{temperature:.2}_degC.fit")
}

pub const MASTER_BIAS_NAME: &str = "Master_Bias.fit";

/// One input frame: file name, header and CCD temperature.
struct Frame {
    name: String,
    path: PathBuf,
    header: Header,
    temperature: f64,
}

fn load_frames(collection: &mut ImageFileCollection, image_type: &str) -> Result<Vec<Frame>, ReductionError> {
    let mut frames = Vec::new();
    for entry in collection.frames(&Predicate::new().with("imagetyp", image_type))? {
        let (path, header) = entry?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temperature = header
            .get_f64("CCD-TEMP")
            .ok_or_else(|| ReductionError::MissingKeyword {
                file: name.clone(),
                keyword: "CCD-TEMP".to_string(),
            })?;
        frames.push(Frame {
            name,
            path,
            header,
            temperature,
        });
    }
    Ok(frames)
}

fn write_master(
    frames: &[&Frame],
    image_type: &str,
    target: &Path,
    overwrite: bool,
) -> Result<(f64, f64), ReductionError> {
    let images = frames
        .iter()
        .map(|f| -> Result<ImageData, ReductionError> { Ok(fits::read_hdu(&f.path)?.image()?) })
        .collect::<Result<Vec<_>, _>>()?;
    let combined = combine(&images, CombineMethod::Median)?;
    let temperatures: Vec<f64> = frames.iter().map(|f| f.temperature).collect();
    let (mean, std) = mean_and_std(&temperatures);

    let sample = frames.first().map(|f| &f.header);
    let mut hdu = master_frame(&combined, image_type, mean, std, sample, Some(CombineMethod::Median))?;
    let names: Vec<String> = frames.iter().map(|f| f.name.clone()).collect();
    add_files_info(&mut hdu.header, &names)?;
    fits::write_hdu(target, &hdu, overwrite)?;
    info!("Wrote {} from {} frames", target.display(), frames.len());
    Ok((mean, std))
}

/// Median-combine the BIAS frames of `dir` into a master bias and the DARK
/// frames into one master per exposure time. Returns the files written.
pub fn build_masters(dir: &Path, options: &MasterOptions) -> Result<Vec<PathBuf>, ReductionError> {
    let out_dir = options.destination.as_deref().unwrap_or(dir);
    let mut collection = ImageFileCollection::open(dir, &["imagetyp", "exptime", "ccd-temp"])?;
    let mut written = Vec::new();
    if collection.summary().is_none() {
        warn!("No readable FITS files in {}", dir.display());
        return Ok(written);
    }

    let biases = load_frames(&mut collection, "BIAS")?;
    if !biases.is_empty() {
        let target = out_dir.join(MASTER_BIAS_NAME);
        let frames: Vec<&Frame> = biases.iter().collect();
        write_master(&frames, "MASTER BIAS", &target, options.overwrite)?;
        written.push(target);
    }

    let darks = load_frames(&mut collection, "DARK")?;
    let mut exposures: Vec<f64> = Vec::new();
    for dark in &darks {
        let exposure = dark
            .header
            .get_f64("EXPTIME")
            .ok_or_else(|| ReductionError::MissingKeyword {
                file: dark.name.clone(),
                keyword: "EXPTIME".to_string(),
            })?;
        if !exposures.contains(&exposure) {
            exposures.push(exposure);
        }
    }
    exposures.sort_by(f64::total_cmp);

    for exposure in exposures {
        let group: Vec<&Frame> = darks
            .iter()
            .filter(|d| d.header.get_f64("EXPTIME") == Some(exposure))
            .collect();
        let temperatures: Vec<f64> = group.iter().map(|d| d.temperature).collect();
        let (mean, _) = mean_and_std(&temperatures);
        if let Some(bad) = group
            .iter()
            .find(|d| (d.temperature - mean).abs() >= options.temperature_tolerance)
        {
            return Err(ReductionError::TemperatureProblem {
                exposure,
                file: bad.name.clone(),
                deviation: bad.temperature - mean,
            });
        }
        let target = out_dir.join(master_dark_name(exposure, mean));
        write_master(&group, "MASTER DARK", &target, options.overwrite)?;
        written.push(target);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::HeaderValue;
    use approx::assert_abs_diff_eq;

    fn image(width: usize, height: usize, f: impl Fn(usize, usize) -> f64) -> ImageData {
        let pixels = (0..height)
            .flat_map(|r| (0..width).map(move |c| (r, c)))
            .map(|(r, c)| f(r, c))
            .collect();
        ImageData::new(width, height, pixels).unwrap()
    }

    fn overscan_header(axis: i64, start: i64) -> Header {
        let mut header = Header::new();
        header.set("OSCAN", true).unwrap();
        header.set("OSCANAX", axis).unwrap();
        header.set("OSCANST", start).unwrap();
        header
    }

    #[test]
    fn trims_columns_on_axis_one() {
        let mut header = overscan_header(1, 3);
        let trimmed = trim_overscan(&mut header, &image(5, 2, |r, c| (r * 10 + c) as f64)).unwrap();
        assert_eq!(trimmed.shape(), (2, 3));
        assert_eq!(trimmed.pixels, vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(header.get("OSCAN"), Some(&HeaderValue::Bool(false)));
        assert_eq!(header.get("TRIMMED"), Some(&HeaderValue::Bool(true)));
        assert!(!header.contains("OSCANST"));
        assert!(!header.contains("OSCANAX"));
    }

    #[test]
    fn trims_rows_on_axis_two() {
        let mut header = overscan_header(2, 1);
        let trimmed = trim_overscan(&mut header, &image(2, 3, |r, _| r as f64)).unwrap();
        assert_eq!(trimmed.shape(), (1, 2));
    }

    #[test]
    fn trimming_needs_keywords() {
        let mut header = Header::new();
        let im = ImageData::filled(2, 2, 1.0);
        assert!(matches!(
            trim_overscan(&mut header, &im),
            Err(ReductionError::MissingOverscanKeywords)
        ));

        header.set("OSCAN", false).unwrap();
        assert_eq!(trim_overscan(&mut header, &im).unwrap(), im);
    }

    #[test]
    fn median_and_mean_combination() {
        let images = [
            ImageData::filled(2, 2, 1.0),
            ImageData::filled(2, 2, 2.0),
            ImageData::filled(2, 2, 9.0),
        ];
        let med = combine(&images, CombineMethod::Median).unwrap();
        assert!(med.pixels.iter().all(|&p| p == 2.0));
        let mean = combine(&images, CombineMethod::Mean).unwrap();
        assert!(mean.pixels.iter().all(|&p| p == 4.0));

        let even = combine(&images[..2], CombineMethod::Median).unwrap();
        assert_abs_diff_eq!(even.pixels[0], 1.5);
    }

    #[test]
    fn combination_errors() {
        assert!(matches!(
            combine(&[], CombineMethod::Median),
            Err(ReductionError::NothingToCombine)
        ));
        let mixed = [ImageData::filled(2, 2, 0.0), ImageData::filled(3, 2, 0.0)];
        assert!(matches!(
            combine(&mixed, CombineMethod::Mean),
            Err(ReductionError::ShapeMismatch {
                expected: (2, 2),
                found: (2, 3)
            })
        ));
    }

    #[test]
    fn temperature_statistics() {
        let (mean, std) = mean_and_std(&[-20.0, -21.0, -19.0, -20.0]);
        assert_abs_diff_eq!(mean, -20.0);
        assert_abs_diff_eq!(std, 0.5f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn master_header() {
        let mut sample = Header::new();
        sample.set_with_comment("XBINNING", 2i64, "Binning factor in width").unwrap();
        sample.set("EXPTIME", 30.0).unwrap();
        sample.set("OBJECT", "m101").unwrap();

        let mut hdu = master_frame(
            &ImageData::filled(2, 2, 0.0),
            "MASTER DARK",
            -20.0,
            0.1,
            Some(&sample),
            Some(CombineMethod::Median),
        )
        .unwrap();
        add_files_info(&mut hdu.header, &["a.fit".to_string(), "b.fit".to_string()]).unwrap();

        let h = &hdu.header;
        assert_eq!(h.get_str("IMAGETYP"), Some("MASTER DARK"));
        assert_eq!(h.get_str("CMBN-MTH"), Some("median"));
        assert_eq!(h.get_f64("CCD-TEMP"), Some(-20.0));
        assert_eq!(h.get_i64("XBINNING"), Some(2));
        assert_eq!(h.comment_of("XBINNING"), Some("Binning factor in width"));
        assert_eq!(h.get_f64("EXPTIME"), Some(30.0));
        assert!(!h.contains("OBJECT"));
        assert_eq!(h.get_i64("N-FILES"), Some(2));
        assert_eq!(
            h.comments().collect::<Vec<_>>(),
            vec![
                "This master produced by combining the files below:",
                "    a.fit",
                "    b.fit"
            ]
        );
    }

    #[test]
    fn dark_names() {
        assert_eq!(master_dark_name(30.0, -20.123), "Master_Dark_30.00_sec_-20.12_degC.fit");
    }
}
