use std::fmt;

/// Which regions a sample is missing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MissingRegion {
    Dimer,
    Library,
    Both,
}

impl fmt::Display for MissingRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissingRegion::Dimer => "Missing dimer region",
            MissingRegion::Library => "Missing library region",
            MissingRegion::Both => "Missing dimer and library regions",
        })
    }
}

/// A problem with a single sample. The sample is left out of pooling and
/// the rest of the batch carries on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleDefect {
    #[error("Multiple dimer regions ({count})")]
    MultipleDimerRegions { count: usize },

    #[error("Multiple library regions ({count})")]
    MultipleLibraryRegions { count: usize },

    #[error("{missing}")]
    Incomplete { missing: MissingRegion },

    #[error("Invalid library molarity ({molarity} nmol/l)")]
    InvalidLibraryMolarity { molarity: f64 },

    /// Would need less than the class minimum, too little to pipette.
    #[error("Too strong - requires {required_volume:.2}µl (<{min_volume:.1}µl minimum)")]
    TooStrong {
        required_volume: f64,
        min_volume: f64,
    },

    /// Would need more than the class maximum.
    #[error("Too weak - requires {required_volume:.2}µl (>{max_volume:.1}µl maximum)")]
    TooWeak {
        required_volume: f64,
        max_volume: f64,
    },
}

/// Errors that make a whole run impossible.
#[derive(Debug, thiserror::Error)]
pub enum PoolingError {
    #[error("The input table contains no samples.")]
    NoSamples,

    #[error("None of the {num_records} input regions has a numeric molarity.")]
    NoMolarityData { num_records: usize },

    #[error("Invalid pooling parameters")]
    InvalidConfig { source: anyhow::Error },
}
