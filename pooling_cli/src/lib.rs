//! subpool
#![deny(missing_docs)]

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use env_logger::Builder;
use itertools::Itertools;
use log::LevelFilter;
use pooling_core::{plan_pools, PoolingPlan};
use pooling_io::{default_output_dir, load_input_folder, write_plan, SourcePlates};
use pooling_params::PoolingConfig;
use std::io::Write;
use std::path::PathBuf;

/// Plan equimolar sub-pools from electrophoresis compact region tables
#[derive(Parser, Debug, Clone, PartialEq)]
#[clap(name = "subpool", version)]
pub struct SubpoolArgs {
    /// Folder containing the compact region CSV files, one per plate
    pub input_folder: PathBuf,

    /// Maximum number of samples per sub-pool, overriding the parameters file
    #[clap(long, value_name = "NUM")]
    pub max_samples: Option<usize>,

    /// Parameters file to use instead of the one next to the executable
    #[clap(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Where to write the result table [default: <INPUT_FOLDER>/output]
    #[clap(long, value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Log per-sample decisions
    #[clap(long, short)]
    pub verbose: bool,
}

/// Install the logger. `RUST_LOG` overrides the level chosen here.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .parse_default_env()
        .init();
}

/// Convert an io::error to a string and strip "(os error 2)" from the end.
fn io_error_to_string(err: &std::io::Error) -> String {
    let s = err.to_string();
    s.strip_suffix(&format!(" (os error {})", err.raw_os_error().unwrap_or(0)))
        .unwrap_or(&s)
        .to_string()
}

/// Format an error with its causes, one per line.
pub fn format_error_chain(err: &anyhow::Error) -> String {
    match err.downcast_ref::<std::io::Error>() {
        Some(io_err) if err.chain().len() == 1 => format!("ERROR: {}", io_error_to_string(io_err)),
        _ => format!("ERROR: {}", err.chain().join("\n\tCaused by: ")),
    }
}

/// Print an error chain.
pub fn print_error_chain(err: &anyhow::Error) {
    eprintln!("{}", format_error_chain(err));
}

/// Parameters from the parameters file with command line overrides applied.
fn load_config(args: &SubpoolArgs) -> Result<PoolingConfig> {
    let mut config = PoolingConfig::load(args.config.as_deref())?;
    if let Some(max_samples) = args.max_samples {
        config.max_samples_per_pool = max_samples;
    }
    config.warn_non_default();
    Ok(config)
}

fn print_plates(plates: &SourcePlates) {
    println!("Plate assignment:");
    for plate in plates.iter() {
        println!("  Plate {:03}: {}", plate.number, plate.source_file_id);
    }
}

fn print_summary(plan: &PoolingPlan) {
    println!(
        "Processed {} samples into {} sub-pools",
        plan.samples.len(),
        plan.num_pools()
    );
    for pool in &plan.summaries {
        println!(
            "  Pool {}: {} samples, {:.1}ul total",
            pool.number, pool.sample_count, pool.total_volume
        );
    }
}

/// Read the input folder, plan the sub-pools and write the result table.
/// Returns the path of the table.
pub fn run(args: &SubpoolArgs) -> Result<PathBuf> {
    let config = load_config(args)?;

    println!("Processing CSV files in {}...", args.input_folder.display());
    let input = load_input_folder(&args.input_folder)?;
    print_plates(&input.plates);

    let plan = plan_pools(&input.records, &config).with_context(|| {
        format!(
            "Unable to plan sub-pools for '{}'",
            args.input_folder.display()
        )
    })?;

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(&args.input_folder));
    let path = write_plan(&plan, &input.plates, &output_dir, Local::now().naive_local())?;
    println!("Pooling strategy saved to: {}", path.display());
    print_summary(&plan);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn verify_cli() {
        SubpoolArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let args =
            SubpoolArgs::try_parse_from(["subpool", "runs/0412", "--max-samples", "24", "-v"])
                .unwrap();
        assert_eq!(
            args,
            SubpoolArgs {
                input_folder: PathBuf::from("runs/0412"),
                max_samples: Some(24),
                config: None,
                output_dir: None,
                verbose: true,
            }
        );
        assert!(SubpoolArgs::try_parse_from(["subpool"]).is_err());
        assert!(SubpoolArgs::try_parse_from(["subpool", "in", "--max-samples", "x"]).is_err());
    }

    #[test]
    fn test_error_chain() {
        let err = anyhow::anyhow!("No CSV files found in 'runs'").context("Unable to plan");
        assert_eq!(
            format_error_chain(&err),
            "ERROR: Unable to plan\n\tCaused by: No CSV files found in 'runs'"
        );

        let io_err = std::fs::read(Path::new("/nonexistent/table.csv")).unwrap_err();
        assert_eq!(
            format_error_chain(&anyhow::Error::from(io_err)),
            "ERROR: No such file or directory"
        );
    }

    fn write_config(dir: &Path) -> PathBuf {
        let path = dir.join("pooling.toml");
        std::fs::write(&path, "max_samples_per_pool = 48\n").unwrap();
        path
    }

    #[test]
    fn test_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut table =
            String::from("WellId,From [bp],To [bp],Conc. [pg/µl],Region Molarity [nmol/l]\n");
        for (well, molarity) in [("A1", 30.0), ("A2", 20.0), ("A3", 15.0)] {
            table.push_str(&format!("{well},120,150,50,1.0\n{well},200,600,900,{molarity}\n"));
        }
        std::fs::write(dir.path().join("plate.csv"), table).unwrap();

        let args = SubpoolArgs {
            input_folder: dir.path().to_path_buf(),
            max_samples: Some(2),
            config: Some(write_config(dir.path())),
            output_dir: None,
            verbose: false,
        };
        let path = run(&args).unwrap();
        assert_eq!(path.parent(), Some(dir.path().join("output").as_path()));
        let text = std::fs::read_to_string(&path).unwrap();
        // Two pools of two and one samples, plus the header
        assert_eq!(text.lines().count(), 4);

        // A result written next to the plate tables is ignored by later runs
        let beside_inputs = SubpoolArgs {
            output_dir: Some(dir.path().to_path_buf()),
            ..args.clone()
        };
        let path = run(&beside_inputs).unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        let input = load_input_folder(dir.path()).unwrap();
        assert_eq!(input.plates.len(), 1);
        assert!(input.skipped.is_empty());
        assert_eq!(input.records.len(), 6);
    }

    #[test]
    fn test_cli_overrides_are_reported_as_non_default() {
        let dir = tempfile::tempdir().unwrap();
        let args = SubpoolArgs {
            input_folder: dir.path().to_path_buf(),
            max_samples: Some(24),
            config: Some(write_config(dir.path())),
            output_dir: None,
            verbose: false,
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.max_samples_per_pool, 24);
        assert_eq!(
            config.non_default_parameters(),
            vec!["max_samples_per_pool = 24"]
        );
    }

    #[test]
    fn test_run_without_tables_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = SubpoolArgs {
            input_folder: dir.path().to_path_buf(),
            max_samples: None,
            config: Some(write_config(dir.path())),
            output_dir: None,
            verbose: false,
        };
        let err = run(&args).unwrap_err();
        assert!(err.to_string().starts_with("No CSV files found"));
    }
}
