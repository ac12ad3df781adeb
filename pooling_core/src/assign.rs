//! Greedy equimolar bin-packing of samples into sub-pools.
//!
//! Samples of one strength class are visited from the highest to the lowest
//! library molarity. The first sample of a pool is pipetted at the class
//! minimum volume and fixes the molar amount every later member has to
//! match. Because molarity only decreases along the visit order, the volume
//! required from each later member only increases.

use crate::errors::SampleDefect;
use itertools::Itertools;
use log::debug;
use pooling_params::{PoolingConfig, VolumeRange};
use pooling_types::{Sample, StrengthClass};

/// Absolute slack (µl) on every volume bound comparison.
pub const VOLUME_TOLERANCE: f64 = 1e-9;

/// The share of one sample in a pool.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PoolContribution {
    /// Index of the sample in the run's sample table.
    pub sample: usize,
    /// Volume to transfer, in µl.
    pub volume: f64,
    /// `volume` times the library molarity.
    pub molar_contribution: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    class: StrengthClass,
    contributions: Vec<PoolContribution>,
    anchor_molar_contribution: f64,
}

impl Pool {
    /// Open a pool anchored on `sample`, pipetted at `anchor_volume`.
    fn open(class: StrengthClass, sample: usize, molarity: f64, anchor_volume: f64) -> Pool {
        let anchor_molar_contribution = anchor_volume * molarity;
        Pool {
            class,
            contributions: vec![PoolContribution {
                sample,
                volume: anchor_volume,
                molar_contribution: anchor_molar_contribution,
            }],
            anchor_molar_contribution,
        }
    }

    fn admit(&mut self, sample: usize, volume: f64) {
        self.contributions.push(PoolContribution {
            sample,
            volume,
            molar_contribution: self.anchor_molar_contribution,
        });
    }

    /// A copy of this pool with every volume multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Pool {
        Pool {
            class: self.class,
            contributions: self
                .contributions
                .iter()
                .map(|c| PoolContribution {
                    sample: c.sample,
                    volume: c.volume * factor,
                    molar_contribution: c.molar_contribution * factor,
                })
                .collect(),
            anchor_molar_contribution: self.anchor_molar_contribution * factor,
        }
    }

    pub fn class(&self) -> StrengthClass {
        self.class
    }

    pub fn contributions(&self) -> &[PoolContribution] {
        &self.contributions
    }

    /// Molar amount contributed by each member.
    pub fn anchor_molar_contribution(&self) -> f64 {
        self.anchor_molar_contribution
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    pub fn total_volume(&self) -> f64 {
        self.contributions.iter().map(|c| c.volume).sum()
    }

    /// Largest single-sample volume in the pool.
    pub fn max_volume(&self) -> f64 {
        self.contributions
            .iter()
            .map(|c| c.volume)
            .fold(0.0, f64::max)
    }

    /// Volume of a sample at `molarity` that matches the anchor contribution.
    pub fn required_volume(&self, molarity: f64) -> f64 {
        self.anchor_molar_contribution / molarity
    }
}

/// What happens to the next candidate of a class given the open pool.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Decision {
    /// Join the open pool with this volume.
    Admit { volume: f64 },
    /// Pipettable, but the open pool is full; seal it and anchor a new one.
    SealAndOpen { required_volume: f64 },
    /// Required volume below the class range.
    TooStrong { required_volume: f64 },
    /// Required volume above the class range.
    TooWeak { required_volume: f64 },
}

/// Decide the fate of a candidate with library `molarity` against the open `pool`.
pub fn evaluate_candidate(
    pool: &Pool,
    molarity: f64,
    range: VolumeRange,
    config: &PoolingConfig,
) -> Decision {
    let required_volume = pool.required_volume(molarity);
    if required_volume < range.min - VOLUME_TOLERANCE {
        return Decision::TooStrong { required_volume };
    }
    if required_volume > range.max + VOLUME_TOLERANCE {
        return Decision::TooWeak { required_volume };
    }
    let fits_volume =
        pool.total_volume() + required_volume <= config.pool_volume.max + VOLUME_TOLERANCE;
    let fits_count = pool.len() < config.max_samples_per_pool;
    if fits_volume && fits_count {
        Decision::Admit {
            volume: required_volume,
        }
    } else {
        Decision::SealAndOpen { required_volume }
    }
}

/// A sample that was dropped while packing.
#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub sample: usize,
    pub defect: SampleDefect,
}

/// A sealed pool with its 1-based position in the run.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberedPool {
    pub number: usize,
    pub pool: Pool,
}

/// Result of packing all classes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assignment {
    /// Pools in numbering order.
    pub pools: Vec<NumberedPool>,
    pub exclusions: Vec<Exclusion>,
}

/// Fold state while packing one strength class.
struct ClassPacking<'a> {
    class: StrengthClass,
    range: VolumeRange,
    config: &'a PoolingConfig,
    open: Option<Pool>,
    sealed: Vec<Pool>,
    exclusions: Vec<Exclusion>,
}

impl<'a> ClassPacking<'a> {
    fn new(class: StrengthClass, config: &'a PoolingConfig) -> Self {
        ClassPacking {
            class,
            range: config.volume_range(class),
            config,
            open: None,
            sealed: Vec::new(),
            exclusions: Vec::new(),
        }
    }

    fn open_pool(&self, sample: usize, molarity: f64) -> Pool {
        Pool::open(self.class, sample, molarity, self.range.min)
    }

    fn step(mut self, (sample, molarity): (usize, f64)) -> Self {
        let Some(mut pool) = self.open.take() else {
            self.open = Some(self.open_pool(sample, molarity));
            return self;
        };
        match evaluate_candidate(&pool, molarity, self.range, self.config) {
            Decision::Admit { volume } => {
                pool.admit(sample, volume);
                self.open = Some(pool);
            }
            Decision::SealAndOpen { required_volume } => {
                debug!(
                    "sealing {} pool of {} samples ({:.2}µl), sample {sample} needs {required_volume:.2}µl",
                    self.class,
                    pool.len(),
                    pool.total_volume()
                );
                self.sealed.push(pool);
                self.open = Some(self.open_pool(sample, molarity));
            }
            Decision::TooStrong { required_volume } => {
                self.exclusions.push(Exclusion {
                    sample,
                    defect: SampleDefect::TooStrong {
                        required_volume,
                        min_volume: self.range.min,
                    },
                });
                self.open = Some(pool);
            }
            Decision::TooWeak { required_volume } => {
                self.exclusions.push(Exclusion {
                    sample,
                    defect: SampleDefect::TooWeak {
                        required_volume,
                        max_volume: self.range.max,
                    },
                });
                self.open = Some(pool);
            }
        }
        self
    }

    fn finish(mut self) -> (Vec<Pool>, Vec<Exclusion>) {
        if let Some(pool) = self.open.take() {
            self.sealed.push(pool);
        }
        (self.sealed, self.exclusions)
    }
}

/// Pack the library regions of one class, visiting `(sample, molarity)`
/// pairs strongest first. Ties keep their input order.
pub fn pack_class(
    class: StrengthClass,
    candidates: impl IntoIterator<Item = (usize, f64)>,
    config: &PoolingConfig,
) -> (Vec<Pool>, Vec<Exclusion>) {
    candidates
        .into_iter()
        .sorted_by(|a, b| b.1.total_cmp(&a.1))
        .fold(ClassPacking::new(class, config), ClassPacking::step)
        .finish()
}

/// Number pools consecutively starting from `first`.
pub fn number_pools(pools: impl IntoIterator<Item = Pool>, first: usize) -> Vec<NumberedPool> {
    (first..)
        .zip(pools)
        .map(|(number, pool)| NumberedPool { number, pool })
        .collect()
}

/// Pack the `candidates` (indices into `samples` of complete samples with a
/// valid library molarity) into pools. Strong pools are numbered before weak pools.
pub fn assign(samples: &[Sample], candidates: &[usize], config: &PoolingConfig) -> Assignment {
    let mut pools = Vec::new();
    let mut exclusions = Vec::new();
    for class in StrengthClass::ALL {
        let members = candidates.iter().filter_map(|&i| {
            let molarity = samples[i].library_molarity()?;
            (StrengthClass::of(molarity, config.strength_threshold) == class)
                .then_some((i, molarity))
        });
        let (class_pools, class_exclusions) = pack_class(class, members, config);
        debug!(
            "{class} class: {} pools, {} exclusions",
            class_pools.len(),
            class_exclusions.len()
        );
        pools.extend(class_pools);
        exclusions.extend(class_exclusions);
    }
    Assignment {
        pools: number_pools(pools, 1),
        exclusions,
    }
}
