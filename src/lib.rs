//! Index, filter, patch and combine directories of FITS images.
//!
//! [`collection::ImageFileCollection`] summarises chosen header keywords of
//! every FITS file in a directory and answers keyword queries over that
//! summary. The remaining modules build on it: [`group`] arranges the
//! summary into a tree by keyword values, [`patch`] adds observatory, time,
//! pointing and user-supplied keywords, [`triage`] lists frames that still
//! need information, and [`reduction`] makes master bias and dark frames.

pub mod astro;
pub mod collection;
pub mod data;
pub mod error;
pub mod fits;
pub mod group;
pub mod keyword;
pub mod logging;
pub mod patch;
pub mod reduction;
pub mod site;
pub mod triage;
