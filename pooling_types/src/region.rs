use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Unit in which a region molarity was reported by the instrument.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum MolarityUnit {
    /// nmol/l, the unit used everywhere downstream of ingestion.
    #[strum(serialize = "nmol/l")]
    #[serde(rename = "nmol/l")]
    NanomolarPerLiter,
    /// pmol/l, reported by some instrument software versions.
    #[strum(serialize = "pmol/l")]
    #[serde(rename = "pmol/l")]
    PicomolarPerLiter,
}

impl MolarityUnit {
    /// Convert a molarity expressed in this unit to nmol/l.
    pub fn to_nanomolar(self, value: f64) -> f64 {
        match self {
            MolarityUnit::NanomolarPerLiter => value,
            MolarityUnit::PicomolarPerLiter => value / 1000.0,
        }
    }
}

/// One measured peak of an electrophoresis compact region table.
/// The molarity is always in nmol/l.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentRegion {
    /// Lower size bound of the region in bp.
    pub from_bp: u32,
    /// Upper size bound of the region in bp.
    pub to_bp: u32,
    /// Mass concentration as reported by the instrument.
    pub concentration: f64,
    /// Molar concentration in nmol/l.
    pub molarity: f64,
}

/// A single row of the input region table, before unit normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    /// Identifier of the file (and therefore plate) the row came from.
    pub source_file_id: String,
    /// Well the sample was loaded from, e.g. `B7`.
    pub well_id: String,
    /// Free-text sample description, if the report carried one.
    pub description: Option<String>,
    /// Instrument run file named in the report's `FileName` column.
    pub run_file: Option<String>,
    /// Lower size bound of the region in bp.
    pub from_bp: u32,
    /// Upper size bound of the region in bp.
    pub to_bp: u32,
    /// Mass concentration as reported by the instrument.
    pub concentration: f64,
    /// Molarity in `molarity_unit`.
    pub molarity: f64,
    /// Unit of `molarity`.
    pub molarity_unit: MolarityUnit,
}

impl RegionRecord {
    /// The measured region with its molarity converted to nmol/l.
    pub fn region(&self) -> FragmentRegion {
        FragmentRegion {
            from_bp: self.from_bp,
            to_bp: self.to_bp,
            concentration: self.concentration,
            molarity: self.molarity_unit.to_nanomolar(self.molarity),
        }
    }
}
