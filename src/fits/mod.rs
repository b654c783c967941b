//! Primary-HDU FITS access: header cards, data unit, gzip transparency.
//!
//! Only what the collection tools need: 80-character cards in 2880-byte
//! blocks, an image data unit decoded to physical values, and anything after
//! the primary HDU carried through untouched.

pub mod header;
pub mod io;

pub use header::{normalize_keyword, Card, Header};
pub use io::{read_hdu, read_header, write_hdu, DataUnit, Hdu, ImageData};
