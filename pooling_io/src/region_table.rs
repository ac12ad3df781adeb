//! Reading compact region tables exported by the electrophoresis instrument.

use crate::csv_parser::CsvParser;
use anyhow::{anyhow, Context, Result};
use log::debug;
use pooling_types::{MolarityUnit, RegionRecord};
use std::path::Path;

const FILETYPE: &str = "compact region table";

pub const WELL_ID: &str = "WellId";
pub const FROM_BP: &str = "From [bp]";
pub const TO_BP: &str = "To [bp]";
pub const SAMPLE_DESCRIPTION: &str = "Sample Description";
/// Instrument run file, repeated on every row.
pub const RUN_FILE: &str = "FileName";
const CONCENTRATION_MARKER: &str = "Conc.";
const MOLARITY_MARKER: &str = "Region Molarity";

/// Columns whose exact names vary between instrument software versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionColumns {
    pub concentration: String,
    pub molarity: String,
    pub molarity_unit: MolarityUnit,
}

impl RegionColumns {
    /// The last matching header wins for both columns.
    pub fn detect(parser: &CsvParser) -> Result<RegionColumns> {
        let concentration = parser
            .headers()
            .iter()
            .rev()
            .find(|h| h.contains(CONCENTRATION_MARKER))
            .ok_or_else(|| {
                anyhow!(
                    "No concentration column (a header containing '{CONCENTRATION_MARKER}') in '{}'",
                    parser.filename().display()
                )
            })?;

        let (molarity, molarity_unit) = parser
            .headers()
            .iter()
            .rev()
            .filter(|h| h.contains(MOLARITY_MARKER))
            .find_map(|h| {
                [
                    MolarityUnit::NanomolarPerLiter,
                    MolarityUnit::PicomolarPerLiter,
                ]
                .into_iter()
                .find(|unit| h.contains(&unit.to_string()))
                .map(|unit| (h.as_str(), unit))
            })
            .ok_or_else(|| {
                anyhow!(
                    "No molarity column (a '{MOLARITY_MARKER}' header in nmol/l or pmol/l) in '{}'",
                    parser.filename().display()
                )
            })?;

        Ok(RegionColumns {
            concentration: concentration.to_string(),
            molarity: molarity.to_string(),
            molarity_unit,
        })
    }
}

/// Sizes are integral bp, but some exports write them as `150.0`.
fn parse_bp(parser: &CsvParser, col: &str) -> Result<u32> {
    let value: f64 = parser.parse_field(col, "fragment size in bp")?;
    let rounded = value.round();
    if !(0.0..=f64::from(u32::MAX)).contains(&rounded) {
        return Err(anyhow!(
            "Fragment size {value} in '{col}' of '{}' is out of range",
            parser.filename().display()
        ));
    }
    Ok(rounded as u32)
}

/// Convert every row of an already opened region table to a `RegionRecord`
/// tagged with `source_file_id`. Rows without a concentration or molarity
/// value are skipped.
pub fn parse_region_table(parser: &mut CsvParser, source_file_id: &str) -> Result<Vec<RegionRecord>> {
    let columns = RegionColumns::detect(parser)?;
    let has_description = parser.find_header(|h| h == SAMPLE_DESCRIPTION).is_some();
    let has_run_file = parser.find_header(|h| h == RUN_FILE).is_some();

    let mut records = Vec::with_capacity(parser.len());
    for line in 0..parser.len() {
        parser.set_line(line);
        let well_id = parser.require_string(WELL_ID)?;
        let concentration: Option<f64> = parser.try_parse_field(&columns.concentration, "number")?;
        let molarity: Option<f64> = parser.try_parse_field(&columns.molarity, "number")?;
        let (Some(concentration), Some(molarity)) = (concentration, molarity) else {
            debug!("{source_file_id}: skipping region of {well_id} without concentration or molarity");
            continue;
        };
        let description = if has_description {
            parser.try_get_string(SAMPLE_DESCRIPTION)?
        } else {
            None
        };
        let run_file = if has_run_file {
            parser.try_get_string(RUN_FILE)?
        } else {
            None
        };
        records.push(RegionRecord {
            source_file_id: source_file_id.to_string(),
            well_id,
            description,
            run_file,
            from_bp: parse_bp(parser, FROM_BP)?,
            to_bp: parse_bp(parser, TO_BP)?,
            concentration,
            molarity,
            molarity_unit: columns.molarity_unit,
        });
    }
    Ok(records)
}

/// Read the region table at `path`. Records are tagged with the file name.
pub fn read_region_table(path: &Path) -> Result<Vec<RegionRecord>> {
    let source_file_id = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("'{}' is not a file", path.display()))?;
    let mut parser = CsvParser::new(path, [WELL_ID, FROM_BP, TO_BP], FILETYPE)?;
    parse_region_table(&mut parser, &source_file_id)
}
