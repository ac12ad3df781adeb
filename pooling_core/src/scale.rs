//! Scale sealed pools up toward the target pool volume.

use crate::assign::{NumberedPool, Pool, VOLUME_TOLERANCE};
use pooling_params::PoolingConfig;

/// What bounded the scale factor of a pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScaleLimit {
    /// Reached the target pool volume.
    Target,
    /// Stopped at the per-sample volume ceiling.
    SampleCeiling,
    /// Left as assigned; the scaler never shrinks a pool.
    Unscaled,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScaleOutcome {
    pub pre_scale_volume: f64,
    pub post_scale_volume: f64,
    /// Factor that would bring the pool to the target volume.
    pub target_scale: f64,
    /// Factor that would bring the largest member to the per-sample maximum.
    pub ceiling_scale: f64,
    pub applied_scale: f64,
    pub limit: ScaleLimit,
    /// Post-scale volume is still under the pool volume minimum.
    pub below_minimum: bool,
}

/// Compute the scale factor for a pool of `total_volume` µl whose largest
/// member takes `max_sample_volume` µl.
pub fn scale_factors(
    total_volume: f64,
    max_sample_volume: f64,
    config: &PoolingConfig,
) -> ScaleOutcome {
    let target_scale = config.target_pool_volume / total_volume;
    let ceiling_scale = config.max_volume_per_sample / max_sample_volume;
    let (applied_scale, limit) = if target_scale.min(ceiling_scale) < 1.0 {
        (1.0, ScaleLimit::Unscaled)
    } else if target_scale <= ceiling_scale {
        (target_scale, ScaleLimit::Target)
    } else {
        (ceiling_scale, ScaleLimit::SampleCeiling)
    };
    let post_scale_volume = total_volume * applied_scale;
    ScaleOutcome {
        pre_scale_volume: total_volume,
        post_scale_volume,
        target_scale,
        ceiling_scale,
        applied_scale,
        limit,
        below_minimum: post_scale_volume < config.pool_volume.min - VOLUME_TOLERANCE,
    }
}

/// Scale every member of `pool` by the same factor, which keeps the pool equimolar.
pub fn scale_pool(pool: &Pool, config: &PoolingConfig) -> (Pool, ScaleOutcome) {
    let outcome = scale_factors(pool.total_volume(), pool.max_volume(), config);
    (pool.scaled(outcome.applied_scale), outcome)
}

/// A numbered pool after scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledPool {
    pub number: usize,
    pub pool: Pool,
    pub outcome: ScaleOutcome,
}

pub fn scale_pools(pools: &[NumberedPool], config: &PoolingConfig) -> Vec<ScaledPool> {
    pools
        .iter()
        .map(|numbered| {
            let (pool, outcome) = scale_pool(&numbered.pool, config);
            ScaledPool {
                number: numbered.number,
                pool,
                outcome,
            }
        })
        .collect()
}
