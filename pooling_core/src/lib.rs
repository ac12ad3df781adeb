//! pooling_core
//!
//! Equimolar sub-pooling of sequencing libraries. Region rows are grouped
//! into wells and classified into dimer and library peaks, complete samples
//! are packed into pools of equal molar contribution per strength class,
//! pools are scaled toward the target volume and every sample is annotated
//! with its pool or the reason it was left out.

pub mod annotate;
pub mod assign;
pub mod classify;
pub mod errors;
mod plan;
pub mod scale;

pub use annotate::{Note, PoolSummary, SampleOutcome};
pub use assign::{Assignment, Pool, PoolContribution};
pub use errors::{PoolingError, SampleDefect};
pub use plan::{plan_pools, PoolingPlan};
pub use scale::{ScaleLimit, ScaleOutcome, ScaledPool};
