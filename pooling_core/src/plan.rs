use crate::annotate::{annotate, PoolSummary, SampleOutcome};
use crate::assign::assign;
use crate::classify::{classify_sample, group_records};
use crate::errors::{PoolingError, SampleDefect};
use crate::scale::{scale_pools, ScaledPool};
use anyhow::Result;
use log::{info, warn};
use pooling_params::PoolingConfig;
use pooling_types::{RegionRecord, Sample};

/// Pools and per-sample annotations computed for one input table.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolingPlan {
    /// Samples in the order their wells first appear in the input.
    pub samples: Vec<Sample>,
    /// Parallel to `samples`.
    pub outcomes: Vec<SampleOutcome>,
    pub pools: Vec<ScaledPool>,
    pub summaries: Vec<PoolSummary>,
}

impl PoolingPlan {
    pub fn num_pools(&self) -> usize {
        self.pools.len()
    }

    pub fn num_pooled_samples(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_pooled()).count()
    }

    /// Each sample paired with its outcome.
    pub fn rows(&self) -> impl Iterator<Item = (&Sample, &SampleOutcome)> + '_ {
        self.samples.iter().zip(&self.outcomes)
    }
}

/// Classify, pack, scale and annotate the samples described by `records`.
pub fn plan_pools(records: &[RegionRecord], config: &PoolingConfig) -> Result<PoolingPlan> {
    config
        .validate()
        .map_err(|source| PoolingError::InvalidConfig { source })?;
    if records.is_empty() {
        return Err(PoolingError::NoSamples.into());
    }
    if !records.iter().any(|r| r.molarity.is_finite()) {
        return Err(PoolingError::NoMolarityData {
            num_records: records.len(),
        }
        .into());
    }

    let mut samples = Vec::new();
    let mut defects: Vec<(usize, SampleDefect)> = Vec::new();
    let mut candidates = Vec::new();
    for (i, raw) in group_records(records).iter().enumerate() {
        let (sample, defect) = classify_sample(raw);
        match defect {
            Some(defect) => {
                warn!("{}: {defect}", raw.key);
                defects.push((i, defect));
            }
            None => candidates.push(i),
        }
        samples.push(sample);
    }
    info!(
        "classified {} samples, {} eligible for pooling",
        samples.len(),
        candidates.len()
    );

    let assignment = assign(&samples, &candidates, config);
    for exclusion in &assignment.exclusions {
        warn!("{}: {}", samples[exclusion.sample].key(), exclusion.defect);
    }
    defects.extend(
        assignment
            .exclusions
            .into_iter()
            .map(|e| (e.sample, e.defect)),
    );

    let pools = scale_pools(&assignment.pools, config);
    for pool in &pools {
        if pool.outcome.below_minimum {
            warn!(
                "pool {} holds {:.1}µl after scaling, below the {}µl minimum",
                pool.number, pool.outcome.post_scale_volume, config.pool_volume.min
            );
        }
    }
    let (outcomes, summaries) = annotate(samples.len(), &defects, &pools, config);
    info!(
        "assigned {} of {} samples to {} pools",
        outcomes.iter().filter(|o| o.is_pooled()).count(),
        samples.len(),
        pools.len()
    );
    Ok(PoolingPlan {
        samples,
        outcomes,
        pools,
        summaries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::VOLUME_TOLERANCE;
    use assert_approx_eq::assert_approx_eq;
    use pooling_types::{MolarityUnit, StrengthClass};
    use pretty_assertions::assert_eq;
    use proptest::collection::vec;
    use proptest::{prop_assert, prop_assert_eq, proptest};

    fn record(well: &str, from_bp: u32, to_bp: u32, molarity: f64) -> RegionRecord {
        RegionRecord {
            source_file_id: "2024-01-12 compact region.csv".to_string(),
            well_id: well.to_string(),
            description: None,
            run_file: None,
            from_bp,
            to_bp,
            concentration: 400.0,
            molarity,
            molarity_unit: MolarityUnit::NanomolarPerLiter,
        }
    }

    /// A well with one dimer and one library region.
    fn well(well: &str, library_molarity: f64) -> Vec<RegionRecord> {
        vec![
            record(well, 125, 155, 0.8),
            record(well, 190, 340, library_molarity),
        ]
    }

    #[test]
    fn test_plan_pools() -> Result<()> {
        let mut records: Vec<RegionRecord> = [
            ("A1", 24.0),
            ("A2", 12.0),
            ("A3", 3.0),
            ("A4", 1.5),
            ("A5", 18.0),
        ]
        .iter()
        .flat_map(|&(w, m)| well(w, m))
        .collect();
        // Ambiguous library
        records.extend(well("B1", 9.0));
        records.push(record("B1", 400, 700, 2.0));
        // Library only
        records.push(record("B2", 200, 300, 9.0));
        // pmol/l, 8.0 nmol/l
        records.extend(well("B3", 8000.0).into_iter().map(|mut r| {
            r.molarity_unit = MolarityUnit::PicomolarPerLiter;
            r
        }));

        let plan = plan_pools(&records, &PoolingConfig::default())?;
        assert_eq!(plan.samples.len(), 8);
        assert_eq!(plan.num_pools(), 2);

        let strong = &plan.summaries[0];
        assert_eq!(strong.class, StrengthClass::Strong);
        // 24 -> 3µl anchor (72), 18 -> 4µl, 12 -> 6µl; 8 -> 9µl too weak
        assert_eq!(strong.sample_count, 3);
        assert_approx_eq!(strong.pre_scale_volume, 13.0);

        let weak = &plan.summaries[1];
        assert_eq!(weak.class, StrengthClass::Weak);
        // 3 -> 7µl anchor (21), 1.5 -> 14µl
        assert_eq!(weak.sample_count, 2);
        assert_approx_eq!(weak.pre_scale_volume, 21.0);

        let notes: Vec<_> = plan
            .rows()
            .map(|(s, o)| (s.well_id.as_str(), o.pool_number, o.notes_text()))
            .collect();
        assert_eq!(notes[5].0, "B1");
        assert_eq!(notes[5].2, "Multiple library regions (2)");
        assert_eq!(notes[6].2, "Missing dimer region");
        assert_eq!(notes[7].0, "B3");
        assert_eq!(notes[7].1, None);
        assert_eq!(notes[7].2, "Too weak - requires 9.00µl (>7.0µl maximum)");
        assert_eq!(notes[0].1, Some(1));
        assert_eq!(notes[2].1, Some(2));
        assert_eq!(plan.num_pooled_samples(), 5);
        Ok(())
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let err = plan_pools(&[], &PoolingConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PoolingError>(),
            Some(PoolingError::NoSamples)
        ));
    }

    #[test]
    fn test_missing_molarity_is_fatal() {
        let records = vec![record("A1", 130, 150, f64::NAN), record("A1", 200, 300, f64::NAN)];
        let err = plan_pools(&records, &PoolingConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PoolingError>(),
            Some(PoolingError::NoMolarityData { num_records: 2 })
        ));
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let config = PoolingConfig {
            max_samples_per_pool: 0,
            ..PoolingConfig::default()
        };
        let err = plan_pools(&well("A1", 10.0), &config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PoolingError>(),
            Some(PoolingError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_all_defective_samples_are_not_fatal() {
        let records = vec![record("A1", 130, 150, 1.0), record("A2", 130, 150, 2.0)];
        let plan = plan_pools(&records, &PoolingConfig::default()).unwrap();
        assert_eq!(plan.num_pools(), 0);
        assert!(plan
            .outcomes
            .iter()
            .all(|o| o.notes_text() == "Missing library region"));
    }

    proptest! {
        #[test]
        fn prop_test_plan_invariants(molarities in vec(0.2f64..120.0, 1..150)) {
            let records: Vec<_> = molarities
                .iter()
                .enumerate()
                .flat_map(|(i, &m)| well(&format!("W{i}"), m))
                .collect();
            let config = PoolingConfig::default();
            let plan = plan_pools(&records, &config).unwrap();
            prop_assert_eq!(&plan, &plan_pools(&records, &config).unwrap());

            for pool in &plan.pools {
                prop_assert!(pool.outcome.applied_scale >= 1.0);
                prop_assert!(pool.outcome.post_scale_volume >= pool.outcome.pre_scale_volume);
                prop_assert!(pool.outcome.pre_scale_volume <= config.pool_volume.max + VOLUME_TOLERANCE);
                let anchor = pool.pool.anchor_molar_contribution();
                for c in pool.pool.contributions() {
                    let molarity = plan.samples[c.sample].library_molarity().unwrap();
                    prop_assert!((c.volume * molarity - anchor).abs() <= 1e-9 * anchor);
                    prop_assert!(c.volume <= config.max_volume_per_sample + 1e-9);
                }
            }
            for (sample, outcome) in plan.rows() {
                // Unpooled samples always say why
                prop_assert!(outcome.is_pooled() || !outcome.notes.is_empty(), "{:?}", sample);
            }
        }
    }
}
