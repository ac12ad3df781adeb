use crate::region::FragmentRegion;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumString};

/// Identity of a sample: one well on one source plate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleKey {
    /// Identifier of the source file the well was measured in.
    pub source_file_id: String,
    /// Well id on the source plate.
    pub well_id: String,
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.well_id, self.source_file_id)
    }
}

/// A classified sample. At most one dimer and one library region survive
/// classification; either may be absent for an incomplete sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Identifier of the source file the well was measured in.
    pub source_file_id: String,
    /// Well id on the source plate.
    pub well_id: String,
    /// Free-text sample description.
    pub description: Option<String>,
    /// Instrument run file the well was measured in.
    pub run_file: Option<String>,
    /// Adapter/primer dimer artifact region.
    pub dimer: Option<FragmentRegion>,
    /// Library region of interest.
    pub library: Option<FragmentRegion>,
}

impl Sample {
    /// The (source file, well) identity of this sample.
    pub fn key(&self) -> SampleKey {
        SampleKey {
            source_file_id: self.source_file_id.clone(),
            well_id: self.well_id.clone(),
        }
    }

    /// Library molarity in nmol/l, if a library region was found.
    pub fn library_molarity(&self) -> Option<f64> {
        self.library.map(|r| r.molarity)
    }

    /// Dimer molarity in nmol/l, if a dimer region was found.
    pub fn dimer_molarity(&self) -> Option<f64> {
        self.dimer.map(|r| r.molarity)
    }

    /// Ratio of library to dimer molarity.
    pub fn target_ratio(&self) -> Option<f64> {
        match (self.library_molarity(), self.dimer_molarity()) {
            (Some(lib), Some(dimer)) if dimer != 0.0 => Some(lib / dimer),
            _ => None,
        }
    }

    /// True when both a dimer and a library region are present.
    pub fn is_complete(&self) -> bool {
        self.dimer.is_some() && self.library.is_some()
    }
}

/// Strength bucket of a sample, each with its own pipetting volume range.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StrengthClass {
    /// Library molarity above the strength threshold.
    Strong,
    /// Library molarity at or below the strength threshold.
    Weak,
}

impl StrengthClass {
    /// Both classes, in the order their pools are numbered.
    pub const ALL: [StrengthClass; 2] = [StrengthClass::Strong, StrengthClass::Weak];

    /// Strong if `library_molarity > threshold`, weak otherwise.
    pub fn of(library_molarity: f64, threshold: f64) -> StrengthClass {
        if library_molarity > threshold {
            StrengthClass::Strong
        } else {
            StrengthClass::Weak
        }
    }
}
