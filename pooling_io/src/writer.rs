//! The sub-pooling result table, readable by people and by the liquid handler.

use crate::input_folder::SourcePlates;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use itertools::Itertools;
use pooling_core::{PoolingPlan, SampleOutcome};
use pooling_types::{Sample, WellPosition};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

pub const BUFFER_LOCATION: &str = "TEBuffer[001]";
pub const BUFFER_WELL_POSITION: u32 = 1;
pub const DESTINATION_PLATE: &str = "DestinationPlate[001]";
/// Subfolder of the input folder results go to by default.
pub const OUTPUT_FOLDER: &str = "output";

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Pipetting volumes, to the 0.1µl the robot can deliver.
fn volume(value: f64) -> f64 {
    round_to(value, 1)
}

fn amount(value: f64) -> f64 {
    round_to(value, 2)
}

/// One line of the result table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "Tape Well")]
    pub tape_well: String,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "Dimer Conc.")]
    pub dimer_concentration: Option<f64>,
    #[serde(rename = "Dimer Molarity")]
    pub dimer_molarity: Option<f64>,
    #[serde(rename = "Lib Conc.")]
    pub library_concentration: Option<f64>,
    #[serde(rename = "Lib Molarity")]
    pub library_molarity: Option<f64>,
    #[serde(rename = "target ratio")]
    pub target_ratio: Option<f64>,
    #[serde(rename = "sub-pool number")]
    pub pool_number: Option<usize>,
    #[serde(rename = "volume added")]
    pub volume_added: Option<f64>,
    #[serde(rename = "target molarity contribution")]
    pub molar_contribution: Option<f64>,
    #[serde(rename = "sub-pool volume")]
    pub pool_volume: Option<f64>,
    #[serde(rename = "sub-pool samples")]
    pub pool_samples: Option<usize>,
    #[serde(rename = "notes")]
    pub notes: String,
    #[serde(rename = "SourcePlateLocation")]
    pub source_plate_location: String,
    #[serde(rename = "SourceWellPosition")]
    pub source_well_position: u32,
    #[serde(rename = "VolSample")]
    pub vol_sample: f64,
    #[serde(rename = "BufferLocation")]
    pub buffer_location: &'static str,
    #[serde(rename = "BufferWellPosition")]
    pub buffer_well_position: u32,
    #[serde(rename = "VolBuffer")]
    pub vol_buffer: f64,
    #[serde(rename = "DestinationPlate")]
    pub destination_plate: &'static str,
    #[serde(rename = "DestinationWellPosition")]
    pub destination_well_position: usize,
}

impl OutputRow {
    pub fn new(sample: &Sample, outcome: &SampleOutcome, plates: &SourcePlates) -> OutputRow {
        OutputRow {
            // the instrument run if the table named one, else the table itself
            file_name: sample
                .run_file
                .clone()
                .unwrap_or_else(|| sample.source_file_id.clone()),
            tape_well: sample.well_id.clone(),
            description: sample.description.clone(),
            dimer_concentration: sample.dimer.map(|r| amount(r.concentration)),
            dimer_molarity: sample.dimer_molarity().map(amount),
            library_concentration: sample.library.map(|r| amount(r.concentration)),
            library_molarity: sample.library_molarity().map(amount),
            target_ratio: sample.target_ratio().map(amount),
            pool_number: outcome.pool_number,
            volume_added: outcome.volume_added.map(volume),
            molar_contribution: outcome.molar_contribution.map(amount),
            pool_volume: outcome.pool_volume.map(volume),
            pool_samples: outcome.pool_samples,
            notes: outcome.notes_text(),
            source_plate_location: plates
                .get(&sample.source_file_id)
                .map(|p| p.location())
                .unwrap_or_default(),
            // 0 when the well id is not on a 96-well plate
            source_well_position: sample
                .well_id
                .parse::<WellPosition>()
                .map_or(0, WellPosition::linear_index),
            vol_sample: outcome.volume_added.map_or(0.0, volume),
            buffer_location: BUFFER_LOCATION,
            buffer_well_position: BUFFER_WELL_POSITION,
            vol_buffer: 0.0,
            destination_plate: DESTINATION_PLATE,
            destination_well_position: outcome.pool_number.unwrap_or(0),
        }
    }
}

/// Pooled samples by pool and decreasing library molarity, then unpooled
/// samples in input order.
fn output_order(a: (&Sample, &SampleOutcome), b: (&Sample, &SampleOutcome)) -> Ordering {
    match (a.1.pool_number, b.1.pool_number) {
        (Some(pa), Some(pb)) => pa.cmp(&pb).then_with(|| {
            let ma = a.0.library_molarity().unwrap_or(f64::NEG_INFINITY);
            let mb = b.0.library_molarity().unwrap_or(f64::NEG_INFINITY);
            mb.total_cmp(&ma)
        }),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn build_rows(plan: &PoolingPlan, plates: &SourcePlates) -> Vec<OutputRow> {
    plan.rows()
        .sorted_by(|&a, &b| output_order(a, b))
        .map(|(sample, outcome)| OutputRow::new(sample, outcome, plates))
        .collect()
}

/// `<timestamp>_sub-pooling.csv`
pub fn output_file_name(timestamp: NaiveDateTime) -> String {
    format!(
        "{}_{}",
        timestamp.format("%Y-%m-%d_%H%M%S"),
        crate::input_folder::OUTPUT_FILE_SUFFIX
    )
}

pub fn default_output_dir(input_folder: &Path) -> PathBuf {
    input_folder.join(OUTPUT_FOLDER)
}

pub fn write_rows(path: &Path, rows: &[OutputRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| path.display().to_string())?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().with_context(|| path.display().to_string())?;
    Ok(())
}

/// Write the table for `plan` into `output_dir`, created if needed, and
/// return the path of the new file.
pub fn write_plan(
    plan: &PoolingPlan,
    plates: &SourcePlates,
    output_dir: &Path,
    timestamp: NaiveDateTime,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Creating output folder '{}'", output_dir.display()))?;
    let path = output_dir.join(output_file_name(timestamp));
    write_rows(&path, &build_rows(plan, plates))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_folder::assign_plate_numbers;
    use chrono::NaiveDate;
    use pooling_params::PoolingConfig;
    use pooling_types::{MolarityUnit, RegionRecord};
    use pretty_assertions::assert_eq;

    fn record(file: &str, well: &str, from_bp: u32, to_bp: u32, molarity: f64) -> RegionRecord {
        RegionRecord {
            source_file_id: file.to_string(),
            well_id: well.to_string(),
            description: None,
            run_file: None,
            from_bp,
            to_bp,
            concentration: 123.456,
            molarity,
            molarity_unit: MolarityUnit::NanomolarPerLiter,
        }
    }

    fn plan() -> (PoolingPlan, SourcePlates) {
        let mut records = Vec::new();
        for (file, well, molarity) in [
            ("a.csv", "A1", 3.0),
            ("a.csv", "B2", 30.0),
            ("b.csv", "H12", 1.5),
            ("b.csv", "A3", 20.0),
        ] {
            records.push(record(file, well, 120, 150, 0.9));
            records.push(record(file, well, 180, 650, molarity));
        }
        for r in records.iter_mut().filter(|r| r.source_file_id == "b.csv") {
            r.run_file = Some("2024-01-12 - 10.21.06.D1000".to_string());
        }
        // No library region
        records.push(record("b.csv", "C1", 120, 150, 0.9));
        let plan = pooling_core::plan_pools(&records, &PoolingConfig::default()).unwrap();
        let plates = assign_plate_numbers(vec!["in/a.csv".into(), "in/b.csv".into()]);
        (plan, plates)
    }

    #[test]
    fn test_output_file_name() {
        let timestamp = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 2)
            .unwrap();
        assert_eq!(output_file_name(timestamp), "2024-03-07_090502_sub-pooling.csv");
        assert_eq!(
            default_output_dir(Path::new("/data/run")),
            PathBuf::from("/data/run/output")
        );
    }

    #[test]
    fn test_build_rows() {
        let (plan, plates) = plan();
        let rows = build_rows(&plan, &plates);
        let order: Vec<_> = rows
            .iter()
            .map(|r| (r.tape_well.as_str(), r.pool_number))
            .collect();
        assert_eq!(
            order,
            vec![
                ("B2", Some(1)),
                ("A3", Some(1)),
                ("A1", Some(2)),
                ("H12", Some(2)),
                ("C1", None),
            ]
        );

        // 30 nmol/l anchor at 3µl, 20 nmol/l needs 4.5µl; x4.44 to 20µl
        let a3 = &rows[1];
        assert_eq!(a3.volume_added, Some(20.0));
        assert_eq!(a3.vol_sample, 20.0);
        assert_eq!(a3.pool_volume, Some(33.3));
        assert_eq!(a3.molar_contribution, Some(400.0));
        assert_eq!(a3.dimer_concentration, Some(123.46));
        assert_eq!(a3.target_ratio, Some(22.22));
        assert_eq!(a3.file_name, "2024-01-12 - 10.21.06.D1000");
        assert_eq!(a3.source_plate_location, "SourcePlate[002]");
        assert_eq!(a3.source_well_position, 3);
        assert_eq!(a3.destination_well_position, 1);

        assert_eq!(rows[3].source_well_position, 96);
        assert_eq!(rows[2].file_name, "a.csv");

        let c1 = &rows[4];
        assert_eq!(c1.file_name, "b.csv");
        assert_eq!(c1.library_molarity, None);
        assert_eq!(c1.volume_added, None);
        assert_eq!(c1.vol_sample, 0.0);
        assert_eq!(c1.destination_well_position, 0);
        assert_eq!(c1.notes, "Missing library region");
    }

    #[test]
    fn test_write_plan() {
        let (plan, plates) = plan();
        let dir = tempfile::tempdir().unwrap();
        let output_dir = default_output_dir(dir.path());
        let timestamp = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 2)
            .unwrap();
        let path = write_plan(&plan, &plates, &output_dir, timestamp).unwrap();
        assert_eq!(path, output_dir.join("2024-03-07_090502_sub-pooling.csv"));

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "FileName,Tape Well,Description,Dimer Conc.,Dimer Molarity,Lib Conc.,Lib Molarity,\
             target ratio,sub-pool number,volume added,target molarity contribution,\
             sub-pool volume,sub-pool samples,notes,SourcePlateLocation,SourceWellPosition,\
             VolSample,BufferLocation,BufferWellPosition,VolBuffer,DestinationPlate,\
             DestinationWellPosition"
        );
        assert_eq!(lines.count(), 5);
        assert!(text.contains(",,,,,Missing library region,SourcePlate[002],25,0.0,TEBuffer[001],1,0.0,DestinationPlate[001],0"));
    }
}
