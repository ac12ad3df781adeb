//! Assign the measured regions of a well to its dimer and library peaks.

use crate::errors::{MissingRegion, SampleDefect};
use log::debug;
use pooling_types::{FragmentRegion, RegionRecord, Sample, SampleKey};
use std::collections::HashMap;

/// A region is a dimer candidate if it starts at or below this size...
pub const DIMER_MAX_FROM_BP: u32 = 160;
/// ...and ends at or below this size.
pub const DIMER_MAX_TO_BP: u32 = 200;
/// Regions starting at or above this size are library candidates.
pub const LIBRARY_MIN_FROM_BP: u32 = 160;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RegionKind {
    Dimer,
    Library,
    Unclassified,
}

impl RegionKind {
    /// The dimer predicate wins when both match (a 160-200 bp region).
    pub fn of(region: &FragmentRegion) -> RegionKind {
        if region.from_bp <= DIMER_MAX_FROM_BP && region.to_bp <= DIMER_MAX_TO_BP {
            RegionKind::Dimer
        } else if region.from_bp >= LIBRARY_MIN_FROM_BP {
            RegionKind::Library
        } else {
            RegionKind::Unclassified
        }
    }
}

/// The dimer and library regions of one well.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct RegionAssignment {
    pub dimer: Option<FragmentRegion>,
    pub library: Option<FragmentRegion>,
}

/// Pick the single dimer and library region out of the regions measured for a well.
pub fn classify(regions: &[FragmentRegion]) -> Result<RegionAssignment, SampleDefect> {
    let mut dimers = Vec::new();
    let mut libraries = Vec::new();
    for region in regions {
        match RegionKind::of(region) {
            RegionKind::Dimer => dimers.push(*region),
            RegionKind::Library => libraries.push(*region),
            RegionKind::Unclassified => debug!(
                "ignoring region {}-{} bp, neither dimer nor library",
                region.from_bp, region.to_bp
            ),
        }
    }
    if dimers.len() > 1 {
        return Err(SampleDefect::MultipleDimerRegions {
            count: dimers.len(),
        });
    }
    if libraries.len() > 1 {
        return Err(SampleDefect::MultipleLibraryRegions {
            count: libraries.len(),
        });
    }
    Ok(RegionAssignment {
        dimer: dimers.pop(),
        library: libraries.pop(),
    })
}

/// All regions measured for one well, prior to classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub key: SampleKey,
    pub description: Option<String>,
    pub run_file: Option<String>,
    pub regions: Vec<FragmentRegion>,
}

/// Group region rows by (source file, well), keeping the order in which
/// wells first appear. The first non-empty description and run file of a
/// well are kept.
pub fn group_records(records: &[RegionRecord]) -> Vec<RawSample> {
    let mut index: HashMap<SampleKey, usize> = HashMap::new();
    let mut samples: Vec<RawSample> = Vec::new();
    for record in records {
        let key = SampleKey {
            source_file_id: record.source_file_id.clone(),
            well_id: record.well_id.clone(),
        };
        let i = *index.entry(key.clone()).or_insert_with(|| {
            samples.push(RawSample {
                key,
                description: None,
                run_file: None,
                regions: Vec::new(),
            });
            samples.len() - 1
        });
        let sample = &mut samples[i];
        if sample.description.is_none() {
            sample.description = record
                .description
                .as_ref()
                .filter(|d| !d.trim().is_empty())
                .cloned();
        }
        if sample.run_file.is_none() {
            sample.run_file = record.run_file.clone();
        }
        sample.regions.push(record.region());
    }
    samples
}

/// Classify a well and decide whether it can take part in pooling.
/// Returns the sample together with the defect that keeps it out of pooling, if any.
pub fn classify_sample(raw: &RawSample) -> (Sample, Option<SampleDefect>) {
    let mut sample = Sample {
        source_file_id: raw.key.source_file_id.clone(),
        well_id: raw.key.well_id.clone(),
        description: raw.description.clone(),
        run_file: raw.run_file.clone(),
        dimer: None,
        library: None,
    };
    let assignment = match classify(&raw.regions) {
        Ok(assignment) => assignment,
        Err(defect) => return (sample, Some(defect)),
    };
    sample.dimer = assignment.dimer;
    sample.library = assignment.library;

    let missing = match (sample.dimer.is_some(), sample.library.is_some()) {
        (true, true) => None,
        (false, true) => Some(MissingRegion::Dimer),
        (true, false) => Some(MissingRegion::Library),
        (false, false) => Some(MissingRegion::Both),
    };
    if let Some(missing) = missing {
        return (sample, Some(SampleDefect::Incomplete { missing }));
    }

    match sample.library_molarity() {
        Some(molarity) if !(molarity.is_finite() && molarity > 0.0) => {
            (sample, Some(SampleDefect::InvalidLibraryMolarity { molarity }))
        }
        _ => (sample, None),
    }
}
