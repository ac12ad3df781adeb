//! Notes and summaries attached to samples and pools.

use crate::errors::SampleDefect;
use crate::scale::{ScaleLimit, ScaleOutcome, ScaledPool};
use itertools::Itertools;
use pooling_params::PoolingConfig;
use pooling_types::StrengthClass;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    /// The sample was left out of pooling.
    Defect(SampleDefect),
    /// The pool was scaled all the way to the target volume.
    Scaled { factor: f64, from_volume: f64 },
    /// The pool was scaled until its largest member hit the per-sample maximum.
    ScaledToCeiling {
        factor: f64,
        from_volume: f64,
        to_volume: f64,
        max_per_sample: f64,
    },
    /// Warning: still under the minimum pool volume after scaling.
    PoolBelowMinimum { minimum: f64 },
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::Defect(defect) => write!(f, "{defect}"),
            Note::Scaled {
                factor,
                from_volume,
            } => write!(f, "Scaled x{factor:.2} from {from_volume:.1}µl"),
            Note::ScaledToCeiling {
                factor,
                from_volume,
                to_volume,
                max_per_sample,
            } => write!(
                f,
                "Scaled x{factor:.2} (capped by {max_per_sample:.1}µl per-sample maximum) \
                 from {from_volume:.1}µl to {to_volume:.1}µl"
            ),
            Note::PoolBelowMinimum { minimum } => write!(f, "Pool below {minimum}µl minimum"),
        }
    }
}

/// Notes every member of a pool carries after scaling.
pub fn scaling_notes(outcome: &ScaleOutcome, config: &PoolingConfig) -> Vec<Note> {
    let mut notes = Vec::new();
    match outcome.limit {
        ScaleLimit::Target => notes.push(Note::Scaled {
            factor: outcome.applied_scale,
            from_volume: outcome.pre_scale_volume,
        }),
        ScaleLimit::SampleCeiling => notes.push(Note::ScaledToCeiling {
            factor: outcome.applied_scale,
            from_volume: outcome.pre_scale_volume,
            to_volume: outcome.post_scale_volume,
            max_per_sample: config.max_volume_per_sample,
        }),
        ScaleLimit::Unscaled => {}
    }
    if outcome.below_minimum {
        notes.push(Note::PoolBelowMinimum {
            minimum: config.pool_volume.min,
        });
    }
    notes
}

/// Per-pool numbers reported alongside the sample table.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSummary {
    pub number: usize,
    pub class: StrengthClass,
    pub sample_count: usize,
    pub total_volume: f64,
    pub pre_scale_volume: f64,
    pub applied_scale: f64,
    pub below_minimum: bool,
}

/// Everything the output table says about one sample.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleOutcome {
    pub pool_number: Option<usize>,
    pub volume_added: Option<f64>,
    pub molar_contribution: Option<f64>,
    pub pool_volume: Option<f64>,
    pub pool_samples: Option<usize>,
    pub notes: Vec<Note>,
}

impl SampleOutcome {
    pub fn is_pooled(&self) -> bool {
        self.pool_number.is_some()
    }

    /// Notes joined the way they appear in the output table.
    pub fn notes_text(&self) -> String {
        self.notes.iter().join("; ")
    }
}

/// Build the outcome of each of `num_samples` samples from the defects found
/// while classifying and packing, and from the scaled pools.
pub fn annotate(
    num_samples: usize,
    defects: &[(usize, SampleDefect)],
    pools: &[ScaledPool],
    config: &PoolingConfig,
) -> (Vec<SampleOutcome>, Vec<PoolSummary>) {
    let mut outcomes = vec![SampleOutcome::default(); num_samples];
    for (sample, defect) in defects {
        outcomes[*sample].notes.push(Note::Defect(defect.clone()));
    }

    let mut summaries = Vec::with_capacity(pools.len());
    for scaled in pools {
        let total_volume = scaled.pool.total_volume();
        let notes = scaling_notes(&scaled.outcome, config);
        for c in scaled.pool.contributions() {
            let outcome = &mut outcomes[c.sample];
            outcome.pool_number = Some(scaled.number);
            outcome.volume_added = Some(c.volume);
            outcome.molar_contribution = Some(c.molar_contribution);
            outcome.pool_volume = Some(total_volume);
            outcome.pool_samples = Some(scaled.pool.len());
            outcome.notes.extend(notes.iter().cloned());
        }
        summaries.push(PoolSummary {
            number: scaled.number,
            class: scaled.pool.class(),
            sample_count: scaled.pool.len(),
            total_volume,
            pre_scale_volume: scaled.outcome.pre_scale_volume,
            applied_scale: scaled.outcome.applied_scale,
            below_minimum: scaled.outcome.below_minimum,
        });
    }
    (outcomes, summaries)
}
