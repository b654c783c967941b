//! Summary data layer: keyword values, the summary table, CSV I/O and
//! filtering.
//!
//! Architecture:
//! ```text
//!  FITS headers            summary .csv
//!        │                      │
//!        ▼                      ▼
//!   ┌──────────┐          ┌──────────┐
//!   │collection│          │  loader   │  parse CSV → SummaryTable
//!   └──────────┘          └──────────┘
//!        │                      │
//!        └──────────┬───────────┘
//!                   ▼
//!           ┌──────────────┐
//!           │ SummaryTable │  file column + one Column per keyword
//!           └──────────────┘
//!                   │
//!                   ▼
//!             ┌──────────┐
//!             │  filter   │  apply keyword predicates → matching rows
//!             └──────────┘
//! ```

pub mod loader;
pub mod model;
pub mod filter;
