//! pooling_types
//! Shared data model for equimolar sub-pooling: measured fragment regions,
//! the samples they belong to and the plate coordinates of those samples.
#![deny(missing_docs)]

mod region;
mod sample;
mod well;

pub use region::{FragmentRegion, MolarityUnit, RegionRecord};
pub use sample::{Sample, SampleKey, StrengthClass};
pub use well::{WellPosition, WellPositionError, PLATE_COLUMNS, PLATE_ROWS};
