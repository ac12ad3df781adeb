//! pooling_params
//! Tunable parameters of the sub-pooling planner and their TOML loader.
// Warning groups (as of rust 1.55)
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2021_compatibility,
    rust_2018_idioms,
    unused
)]

use anyhow::{ensure, Context, Result};
use log::{info, warn};
use pooling_types::StrengthClass;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the parameter file looked up next to the running executable.
pub const PARAMETERS_FILE_NAME: &str = "pooling.toml";

/// Closed interval of volumes in µl.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRange {
    pub min: f64,
    pub max: f64,
}

impl VolumeRange {
    pub const fn new(min: f64, max: f64) -> Self {
        VolumeRange { min, max }
    }

    /// True if `volume` lies in `[min - tolerance, max + tolerance]`.
    pub fn contains(&self, volume: f64, tolerance: f64) -> bool {
        volume >= self.min - tolerance && volume <= self.max + tolerance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolingConfig {
    /// Library molarity (nmol/l) above which a sample is strong.
    pub strength_threshold: f64,
    /// Pipetting range for strong samples. The minimum is the anchor volume of a strong pool.
    pub strong_volume: VolumeRange,
    /// Lower pipetting bound for weak samples; the upper bound is `max_volume_per_sample`.
    pub weak_min_volume: f64,
    /// Hard per-sample ceiling, also caps volume scaling.
    pub max_volume_per_sample: f64,
    /// Acceptable total volume of a sub-pool.
    pub pool_volume: VolumeRange,
    /// Total volume the scaler aims for.
    pub target_pool_volume: f64,
    pub max_samples_per_pool: usize,
}

pub const DEFAULT_CONFIG: PoolingConfig = PoolingConfig {
    strength_threshold: 5.0,
    strong_volume: VolumeRange::new(3.0, 7.0),
    weak_min_volume: 7.0,
    max_volume_per_sample: 20.0,
    pool_volume: VolumeRange::new(100.0, 150.0),
    target_pool_volume: 150.0,
    max_samples_per_pool: 48,
};

impl Default for PoolingConfig {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}

macro_rules! describe_non_default {
    ($config:expr, $($a:ident),+ $(,)?) => {{
        let mut changed = Vec::new();
        $(
            if DEFAULT_CONFIG.$a != $config.$a {
                changed.push(format!("{} = {:?}", stringify!($a), $config.$a));
            }
        )+
        changed
    }};
}

impl PoolingConfig {
    /// Pipetting range of the weak class.
    pub fn weak_volume(&self) -> VolumeRange {
        VolumeRange::new(self.weak_min_volume, self.max_volume_per_sample)
    }

    /// Pipetting range of a strength class.
    pub fn volume_range(&self, class: StrengthClass) -> VolumeRange {
        match class {
            StrengthClass::Strong => self.strong_volume,
            StrengthClass::Weak => self.weak_volume(),
        }
    }

    /// Check that the parameters describe a feasible pooling setup.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.strength_threshold.is_finite() && self.strength_threshold >= 0.0,
            "strength_threshold must be a non-negative number, got {}",
            self.strength_threshold
        );
        for (name, range) in [
            ("strong_volume", self.strong_volume),
            ("weak volume", self.weak_volume()),
            ("pool_volume", self.pool_volume),
        ] {
            ensure!(
                range.min.is_finite() && range.max.is_finite() && range.min > 0.0,
                "{name} bounds must be positive numbers, got [{}, {}]",
                range.min,
                range.max
            );
            ensure!(
                range.min <= range.max,
                "{name} minimum {} exceeds its maximum {}",
                range.min,
                range.max
            );
        }
        ensure!(
            self.strong_volume.max <= self.max_volume_per_sample,
            "strong_volume maximum {} exceeds max_volume_per_sample {}",
            self.strong_volume.max,
            self.max_volume_per_sample
        );
        // a pool must at least hold its anchor sample
        for (name, anchor) in [
            ("strong_volume minimum", self.strong_volume.min),
            ("weak_min_volume", self.weak_min_volume),
        ] {
            ensure!(
                anchor <= self.pool_volume.max,
                "{name} {anchor} exceeds the pool_volume maximum {}",
                self.pool_volume.max
            );
        }
        ensure!(
            self.target_pool_volume > 0.0 && self.target_pool_volume <= self.pool_volume.max,
            "target_pool_volume {} must lie in (0, {}]",
            self.target_pool_volume,
            self.pool_volume.max
        );
        ensure!(
            self.max_samples_per_pool >= 1,
            "max_samples_per_pool must be at least 1"
        );
        Ok(())
    }

    /// Parse parameters from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read parameters from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
        PoolingConfig::from_toml_str(&s).with_context(|| path.display().to_string())
    }

    /// Load the run parameters. An explicit path must exist; otherwise
    /// `pooling.toml` next to the executable is used if present, else the defaults.
    /// Call [`PoolingConfig::warn_non_default`] once any overrides are applied.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = if let Some(path) = explicit {
            info!("reading parameters from {}", path.display());
            PoolingConfig::from_file(path)?
        } else {
            let path = std::env::current_exe()
                .context("Unable to locate the running executable")?
                .with_file_name(PARAMETERS_FILE_NAME);
            if path.exists() {
                info!("reading parameters from {}", path.display());
                PoolingConfig::from_file(&path)?
            } else {
                warn!(
                    "could not find {PARAMETERS_FILE_NAME} at {}, falling back to defaults",
                    path.display()
                );
                PoolingConfig::default()
            }
        };
        Ok(config)
    }

    /// `name = value` of every parameter that differs from its default.
    pub fn non_default_parameters(&self) -> Vec<String> {
        describe_non_default!(
            self,
            strength_threshold,
            strong_volume,
            weak_min_volume,
            max_volume_per_sample,
            pool_volume,
            target_pool_volume,
            max_samples_per_pool,
        )
    }

    /// Log every parameter that differs from its default.
    pub fn warn_non_default(&self) {
        for parameter in self.non_default_parameters() {
            warn!("using non-default {parameter}");
        }
    }
}
