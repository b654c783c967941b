use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use astro_frames::fits::{write_hdu, Hdu, Header, ImageData};

/// Write a night of synthetic frames, headers in MaxIm DL style.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output directory, created if needed
    #[arg(default_value = "sample_night")]
    output: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 64)]
    width: usize,

    #[arg(long, default_value_t = 48)]
    height: usize,
}

const BIAS_LEVEL: f64 = 1000.0;
const READ_NOISE: f64 = 10.0;
const DARK_RATE: f64 = 0.5;
/// Star width (sigma) in pixels.
const SEEING: f64 = 1.5;

/// Seeded noise source so the same seed writes the same night.
struct Camera {
    rng: StdRng,
    read_noise: Normal<f64>,
}

impl Camera {
    fn new(seed: u64) -> Result<Self> {
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            read_noise: Normal::new(0.0, READ_NOISE)?,
        })
    }

    fn noise(&mut self) -> f64 {
        self.read_noise.sample(&mut self.rng)
    }

    /// CCD temperature scattered around the set point.
    fn temperature(&mut self, set_point: f64) -> f64 {
        set_point + 0.01 * self.noise()
    }
}

/// Counts from a circular Gaussian star of `peak` counts centred at `centre`.
fn star_counts(col: f64, row: f64, centre: (f64, f64), peak: f64) -> f64 {
    let r2 = (col - centre.0).powi(2) + (row - centre.1).powi(2);
    peak * (-r2 / (2.0 * SEEING * SEEING)).exp()
}

/// What kind of frame to simulate.
struct FramePlan<'a> {
    image_type: &'a str,
    exposure: f64,
    temperature: f64,
    filter: Option<&'a str>,
    object: Option<&'a str>,
    /// RA (hours) and Dec (degrees) as sexagesimal strings
    pointing: Option<(&'a str, &'a str)>,
    /// Star centre and peak counts
    star: Option<(f64, f64, f64)>,
    flat_level: Option<f64>,
}

impl<'a> FramePlan<'a> {
    fn calibration(image_type: &'a str, exposure: f64, temperature: f64) -> Self {
        Self {
            image_type,
            exposure,
            temperature,
            filter: None,
            object: None,
            pointing: None,
            star: None,
            flat_level: None,
        }
    }
}

fn render(frame: &FramePlan, width: usize, height: usize, camera: &mut Camera) -> Result<ImageData> {
    let level = BIAS_LEVEL + DARK_RATE * frame.exposure + frame.flat_level.unwrap_or(0.0);
    let mut pixels = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let star = frame
                .star
                .map_or(0.0, |(x, y, peak)| star_counts(col as f64, row as f64, (x, y), peak));
            pixels.push((level + star + camera.noise()).round());
        }
    }
    Ok(ImageData::new(width, height, pixels)?)
}

fn header_for(frame: &FramePlan, date_obs: &str) -> Result<Header> {
    let mut header = Header::new();
    header.set_with_comment("EXPTIME", frame.exposure, "[s] Exposure time")?;
    header.set_with_comment("CCD-TEMP", frame.temperature, "[C] CCD temperature")?;
    header.set_with_comment("XBINNING", 1i64, "Binning factor in width")?;
    header.set_with_comment("YBINNING", 1i64, "Binning factor in height")?;
    header.set_with_comment("XPIXSZ", 9.0, "[um] Pixel width")?;
    header.set_with_comment("YPIXSZ", 9.0, "[um] Pixel height")?;
    header.set_with_comment("IMAGETYP", frame.image_type, "Type of image")?;
    header.set_with_comment("DATE-OBS", date_obs, "UTC at start of exposure")?;
    header.set("INSTRUME", "Apogee Alta")?;
    header.set("SWCREATE", "MaxIm DL Version 5.21 130912 01A17")?;
    if let Some(filter) = frame.filter {
        header.set("FILTER", filter)?;
    }
    if let Some(object) = frame.object {
        header.set("OBJECT", object)?;
    }
    if let Some((ra, dec)) = frame.pointing {
        header.set("OBJCTRA", ra)?;
        header.set("OBJCTDEC", dec)?;
    }
    Ok(header)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut camera = Camera::new(cli.seed)?;
    fs::create_dir_all(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;

    let m101 = ("14 03 12.5", "+54 20 56");
    let light = |filter, object, pointing, star| FramePlan {
        image_type: "Light Frame",
        exposure: 60.0,
        temperature: -20.0,
        filter,
        object,
        pointing,
        star,
        flat_level: None,
    };

    let mut frames: Vec<(String, FramePlan)> = Vec::new();
    for i in 0..5 {
        let t = camera.temperature(-20.0);
        frames.push((format!("bias-{i:03}.fit"), FramePlan::calibration("Bias Frame", 0.0, t)));
    }
    for exposure in [30.0, 90.0] {
        for i in 0..3 {
            let t = camera.temperature(-20.0);
            frames.push((
                format!("dark-{exposure:.0}s-{i:03}.fit"),
                FramePlan::calibration("Dark Frame", exposure, t),
            ));
        }
    }
    for (i, filter) in ["R", "V"].into_iter().enumerate() {
        frames.push((
            format!("flat-{filter}.fit"),
            FramePlan {
                filter: Some(filter),
                flat_level: Some(20000.0),
                ..FramePlan::calibration("Flat Frame", 5.0, -20.0 + 0.05 * i as f64)
            },
        ));
    }
    frames.push((
        "m101-R-001.fit".to_string(),
        light(Some("R"), Some("m101"), Some(m101), Some((20.0, 24.0, 5000.0))),
    ));
    frames.push((
        "m101-R-002.fit".to_string(),
        light(Some("R"), None, Some(m101), Some((21.0, 24.0, 5200.0))),
    ));
    frames.push(("unknown-001.fit".to_string(), light(None, None, None, None)));

    for (i, (name, frame)) in frames.iter().enumerate() {
        let date_obs = format!("2012-06-01T04:{:02}:00", (i * 2) % 60);
        let header = header_for(frame, &date_obs)?;
        let image = render(frame, cli.width, cli.height, &mut camera)?;
        let path = cli.output.join(name);
        write_hdu(&path, &Hdu::from_image(header, &image), true)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let objects = cli.output.join("obsinfo.txt");
    fs::write(&objects, "object,ra,dec\nm101,14:03:12.5,+54:20:56\nm13,16:41:41.2,+36:27:35\n")
        .with_context(|| format!("writing {}", objects.display()))?;

    println!("Wrote {} frames to {}", frames.len(), cli.output.display());
    Ok(())
}
