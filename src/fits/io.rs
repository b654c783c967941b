use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::header::{is_structural, Card, Header, BLOCK_SIZE};
use crate::data::model::HeaderValue;
use crate::error::FitsError;

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}

fn open(path: &Path) -> Result<Box<dyn Read>, FitsError> {
    let file = BufReader::new(File::open(path)?);
    if is_gzip(path) {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Read header blocks until the `END` card.
fn read_header_from<R: Read>(reader: &mut R) -> Result<Header, FitsError> {
    let mut header = Header::new();
    let mut block = vec![0u8; BLOCK_SIZE];
    loop {
        match reader.read_exact(&mut block) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(FitsError::InvalidFormat("file ends before END card".into()));
            }
            Err(e) => return Err(e.into()),
        }
        if header.parse_block(&block)? {
            return Ok(header);
        }
    }
}

/// Read only the primary header of a FITS file (`.gz` allowed).
pub fn read_header(path: &Path) -> Result<Header, FitsError> {
    let mut reader = open(path)?;
    read_header_from(&mut reader)
}

/// Read the primary HDU. Bytes after the padded data unit (extensions) are
/// kept verbatim so a rewrite carries them through.
pub fn read_hdu(path: &Path) -> Result<Hdu, FitsError> {
    let mut reader = open(path)?;
    let header = read_header_from(&mut reader)?;

    let bitpix = header
        .get_i64("BITPIX")
        .ok_or_else(|| FitsError::MissingKeyword("BITPIX".to_string()))?;
    let naxis = header
        .get_i64("NAXIS")
        .ok_or_else(|| FitsError::MissingKeyword("NAXIS".to_string()))?;
    if !(0..=999).contains(&naxis) {
        return Err(FitsError::InvalidFormat(format!("NAXIS = {naxis} is out of range")));
    }
    let mut axes = Vec::with_capacity(naxis as usize);
    for n in 1..=naxis {
        let key = format!("NAXIS{n}");
        let len = header
            .get_i64(&key)
            .ok_or_else(|| FitsError::MissingKeyword(key.clone()))?;
        let len = usize::try_from(len)
            .map_err(|_| FitsError::InvalidFormat(format!("{key} = {len} is negative")))?;
        axes.push(len);
    }

    // The size comes from the header, so read what is there rather than
    // allocating the claimed length up front.
    let len = DataUnit::byte_len(bitpix, &axes)?;
    let mut bytes = Vec::new();
    (&mut reader).take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(FitsError::InvalidFormat(format!(
            "data unit is truncated: {} of {len} bytes",
            bytes.len()
        )));
    }

    let padding = padding_for(len);
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    let trailing = if rest.len() > padding {
        rest.split_off(padding)
    } else {
        Vec::new()
    };

    Ok(Hdu {
        header,
        data: DataUnit { bitpix, axes, bytes },
        trailing,
    })
}

/// Write an HDU. Refuses to replace an existing file unless `overwrite`.
pub fn write_hdu(path: &Path, hdu: &Hdu, overwrite: bool) -> Result<(), FitsError> {
    if path.exists() && !overwrite {
        return Err(FitsError::AlreadyExists(path.to_path_buf()));
    }
    let file = BufWriter::new(File::create(path)?);
    if is_gzip(path) {
        let mut encoder = GzEncoder::new(file, Compression::default());
        hdu.write_to(&mut encoder)?;
        encoder.finish()?.flush()?;
    } else {
        let mut file = file;
        hdu.write_to(&mut file)?;
        file.flush()?;
    }
    Ok(())
}

fn padding_for(len: usize) -> usize {
    (BLOCK_SIZE - len % BLOCK_SIZE) % BLOCK_SIZE
}

// ---------------------------------------------------------------------------
// Data unit
// ---------------------------------------------------------------------------

/// Raw primary data unit: big-endian samples as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUnit {
    pub bitpix: i64,
    /// `NAXIS1`, `NAXIS2`, ... (fastest varying first)
    pub axes: Vec<usize>,
    pub bytes: Vec<u8>,
}

impl DataUnit {
    pub fn empty() -> Self {
        Self {
            bitpix: 8,
            axes: Vec::new(),
            bytes: Vec::new(),
        }
    }

    fn bytes_per_sample(bitpix: i64) -> Result<usize, FitsError> {
        match bitpix {
            8 | 16 | 32 | 64 | -32 | -64 => Ok((bitpix.unsigned_abs() / 8) as usize),
            other => Err(FitsError::UnsupportedBitpix(other)),
        }
    }

    /// Size of the unpadded data unit; an error when the axes overflow.
    pub fn byte_len(bitpix: i64, axes: &[usize]) -> Result<usize, FitsError> {
        if axes.is_empty() {
            return Ok(0);
        }
        axes.iter()
            .try_fold(Self::bytes_per_sample(bitpix)?, |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| FitsError::InvalidFormat(format!("data unit of axes {axes:?} is too large")))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Samples as `f64`, before BSCALE/BZERO.
    fn raw_samples(&self) -> Result<Vec<f64>, FitsError> {
        let size = Self::bytes_per_sample(self.bitpix)?;
        let samples = self.bytes.chunks_exact(size);
        let values = match self.bitpix {
            8 => samples.map(|c| f64::from(c[0])).collect(),
            16 => samples
                .map(|c| f64::from(i16::from_be_bytes([c[0], c[1]])))
                .collect(),
            32 => samples
                .map(|c| f64::from(i32::from_be_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
            64 => samples
                .map(|c| {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(c);
                    i64::from_be_bytes(b) as f64
                })
                .collect(),
            -32 => samples
                .map(|c| f64::from(f32::from_be_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
            _ => samples
                .map(|c| {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(c);
                    f64::from_be_bytes(b)
                })
                .collect(),
        };
        Ok(values)
    }
}

/// A 2-D image of physical pixel values, row-major (`height` rows of
/// `width` pixels).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<f64>,
}

impl ImageData {
    pub fn new(width: usize, height: usize, pixels: Vec<f64>) -> Result<Self, FitsError> {
        if width.checked_mul(height) != Some(pixels.len()) {
            return Err(FitsError::InvalidFormat(format!(
                "{} pixels cannot fill a {width}x{height} image",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width * height],
        }
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.height && col < self.width).then(|| self.pixels[row * self.width + col])
    }

    /// Keep the first `rows` rows and first `cols` columns.
    pub fn crop(&self, rows: usize, cols: usize) -> ImageData {
        let rows = rows.min(self.height);
        let cols = cols.min(self.width);
        let pixels = self
            .pixels
            .chunks(self.width.max(1))
            .take(rows)
            .flat_map(|row| row[..cols].iter().copied())
            .collect();
        ImageData {
            width: cols,
            height: rows,
            pixels,
        }
    }

    pub fn mean(&self) -> f64 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        self.pixels.iter().sum::<f64>() / self.pixels.len() as f64
    }
}

// ---------------------------------------------------------------------------
// HDU
// ---------------------------------------------------------------------------

/// Primary header plus data unit, and whatever followed them in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct Hdu {
    pub header: Header,
    pub data: DataUnit,
    pub trailing: Vec<u8>,
}

impl Hdu {
    /// Build an HDU holding `image` as 32-bit floats.
    pub fn from_image(header: Header, image: &ImageData) -> Self {
        let mut hdu = Hdu {
            header,
            data: DataUnit::empty(),
            trailing: Vec::new(),
        };
        hdu.set_image(image);
        hdu
    }

    /// Replace the data unit with `image` stored as BITPIX -32. Scaling
    /// keywords are dropped since the stored values are physical.
    pub fn set_image(&mut self, image: &ImageData) {
        self.header.remove("BSCALE");
        self.header.remove("BZERO");
        let bytes = image
            .pixels
            .iter()
            .flat_map(|&v| (v as f32).to_be_bytes())
            .collect();
        self.data = DataUnit {
            bitpix: -32,
            axes: vec![image.width, image.height],
            bytes,
        };
    }

    /// Decode the data unit to physical values.
    pub fn image(&self) -> Result<ImageData, FitsError> {
        let (width, height) = match self.data.axes.as_slice() {
            [w] => (*w, 1),
            [w, h] => (*w, *h),
            [] => return Err(FitsError::InvalidFormat("HDU has no data".into())),
            axes => {
                return Err(FitsError::InvalidFormat(format!(
                    "expected a 2-D image, found {} axes",
                    axes.len()
                )))
            }
        };
        let bscale = self.header.get_f64("BSCALE").unwrap_or(1.0);
        let bzero = self.header.get_f64("BZERO").unwrap_or(0.0);
        let pixels = self
            .data
            .raw_samples()?
            .into_iter()
            .map(|v| v * bscale + bzero)
            .collect();
        ImageData::new(width, height, pixels)
    }

    /// Header cards with the structural keywords rebuilt from the data unit.
    fn output_header(&self) -> Header {
        let mut out = Header::new();
        out.push_card(Card::new("SIMPLE", HeaderValue::Bool(true)));
        out.push_card(Card::new("BITPIX", HeaderValue::Integer(self.data.bitpix)));
        out.push_card(Card::new("NAXIS", HeaderValue::Integer(self.data.axes.len() as i64)));
        for (i, len) in self.data.axes.iter().enumerate() {
            out.push_card(Card::new(format!("NAXIS{}", i + 1), HeaderValue::Integer(*len as i64)));
        }
        for card in self.header.cards() {
            if card.is_commentary() || !is_structural(&card.keyword) {
                out.push_card(card.clone());
            }
        }
        out
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), FitsError> {
        writer.write_all(&self.output_header().to_bytes())?;
        writer.write_all(&self.data.bytes)?;
        writer.write_all(&vec![0u8; padding_for(self.data.bytes.len())])?;
        writer.write_all(&self.trailing)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hdu() -> Hdu {
        let mut header = Header::new();
        header.set("IMAGETYP", "LIGHT").unwrap();
        header.set("EXPTIME", 30.0).unwrap();
        let image = ImageData::new(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        Hdu::from_image(header, &image)
    }

    #[test]
    fn write_then_read_plain_and_gzip() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.fit", "a.fits.gz"] {
            let path = dir.path().join(name);
            let hdu = sample_hdu();
            write_hdu(&path, &hdu, false).unwrap();

            let header = read_header(&path).unwrap();
            assert_eq!(header.get_str("IMAGETYP"), Some("LIGHT"));
            assert_eq!(header.get_i64("NAXIS1"), Some(3));
            assert_eq!(header.get_i64("BITPIX"), Some(-32));

            let back = read_hdu(&path).unwrap();
            assert_eq!(back.image().unwrap(), hdu.image().unwrap());
        }
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.fit");
        write_hdu(&path, &sample_hdu(), false).unwrap();
        let err = write_hdu(&path, &sample_hdu(), false).unwrap_err();
        assert!(matches!(err, FitsError::AlreadyExists(_)));
        write_hdu(&path, &sample_hdu(), true).unwrap();
    }

    #[test]
    fn non_fits_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.fit");
        std::fs::write(&path, b"definitely not a FITS file").unwrap();
        assert!(read_header(&path).is_err());
    }

    #[test]
    fn applies_bscale_and_bzero() {
        let mut header = Header::new();
        header.set("BZERO", 32768i64).unwrap();
        let bytes = [-32768i16, 0, 100]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let hdu = Hdu {
            header,
            data: DataUnit {
                bitpix: 16,
                axes: vec![3, 1],
                bytes,
            },
            trailing: Vec::new(),
        };
        assert_eq!(hdu.image().unwrap().pixels, vec![0.0, 32768.0, 32868.0]);
    }

    #[test]
    fn trailing_extensions_survive_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ext.fit");
        let mut hdu = sample_hdu();
        hdu.trailing = vec![b'X'; BLOCK_SIZE];
        write_hdu(&path, &hdu, false).unwrap();
        let back = read_hdu(&path).unwrap();
        assert_eq!(back.trailing, hdu.trailing);
    }

    fn write_raw_header(path: &Path, naxis1: i64, naxis2: i64) {
        let mut header = Header::new();
        header.set("SIMPLE", true).unwrap();
        header.set("BITPIX", 16i64).unwrap();
        header.set("NAXIS", 2i64).unwrap();
        header.set("NAXIS1", naxis1).unwrap();
        header.set("NAXIS2", naxis2).unwrap();
        std::fs::write(path, header.to_bytes()).unwrap();
    }

    #[test]
    fn corrupt_axes_are_format_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.fit");

        write_raw_header(&path, 1 << 40, 1 << 40);
        assert!(matches!(read_hdu(&path), Err(FitsError::InvalidFormat(_))));

        // Plausible but absent: reported as truncated, nothing allocated up front
        write_raw_header(&path, 100_000, 100_000);
        assert!(matches!(read_hdu(&path), Err(FitsError::InvalidFormat(_))));

        write_raw_header(&path, -4, 3);
        assert!(matches!(read_hdu(&path), Err(FitsError::InvalidFormat(_))));

        // The header alone is still readable
        assert_eq!(read_header(&path).unwrap().get_i64("NAXIS1"), Some(-4));
    }

    #[test]
    fn byte_len_checks_overflow() {
        assert_eq!(DataUnit::byte_len(-32, &[3, 2]).unwrap(), 24);
        assert_eq!(DataUnit::byte_len(8, &[]).unwrap(), 0);
        assert!(DataUnit::byte_len(64, &[usize::MAX, 2]).is_err());
    }

    #[test]
    fn crop_keeps_leading_rows_and_columns() {
        let image = ImageData::new(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let cropped = image.crop(2, 2);
        assert_eq!(cropped.shape(), (2, 2));
        assert_eq!(cropped.pixels, vec![1.0, 2.0, 4.0, 5.0]);
    }
}
