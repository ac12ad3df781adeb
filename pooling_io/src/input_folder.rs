//! Discovery of the region tables in an input folder and their plate numbers.

use crate::region_table::read_region_table;
use anyhow::{bail, Context, Result};
use itertools::Itertools;
use log::{info, warn};
use pooling_types::RegionRecord;
use std::path::{Path, PathBuf};

/// Files written by a previous run end with this and are never read back.
pub const OUTPUT_FILE_SUFFIX: &str = "sub-pooling.csv";

/// A region table file and the plate number it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePlate {
    pub number: usize,
    pub path: PathBuf,
    /// File name, matching `RegionRecord::source_file_id`.
    pub source_file_id: String,
}

impl SourcePlate {
    /// Robot deck label, e.g. `SourcePlate[003]`.
    pub fn location(&self) -> String {
        format!("SourcePlate[{:03}]", self.number)
    }
}

/// Source plates of a run, in plate number order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePlates(Vec<SourcePlate>);

impl SourcePlates {
    pub fn iter(&self) -> impl Iterator<Item = &SourcePlate> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, source_file_id: &str) -> Option<&SourcePlate> {
        self.0.iter().find(|p| p.source_file_id == source_file_id)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// All `*.csv` files directly in `folder` that are not previous outputs,
/// sorted by file name.
pub fn find_input_files(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        bail!("Input folder '{}' does not exist or is not a folder", folder.display());
    }
    let pattern = format!("{}/*.csv", glob::Pattern::escape(&folder.to_string_lossy()));
    let files: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("Listing CSV files in '{}'", folder.display()))?
        .try_collect()?;
    Ok(files
        .into_iter()
        .filter(|f| f.is_file() && !file_name(f).ends_with(OUTPUT_FILE_SUFFIX))
        .sorted_by_key(|f| file_name(f))
        .collect())
}

/// Number `files` 1.. in the order given.
pub fn assign_plate_numbers(files: Vec<PathBuf>) -> SourcePlates {
    SourcePlates(
        files
            .into_iter()
            .enumerate()
            .map(|(i, path)| SourcePlate {
                number: i + 1,
                source_file_id: file_name(&path),
                path,
            })
            .collect(),
    )
}

/// Region records read from every table of an input folder.
#[derive(Debug)]
pub struct FolderInput {
    pub plates: SourcePlates,
    pub records: Vec<RegionRecord>,
    /// Tables that could not be read, with the reason.
    pub skipped: Vec<(PathBuf, anyhow::Error)>,
}

/// Read every region table in `folder`. A table that cannot be read is
/// skipped with a warning; a folder without any table is an error.
pub fn load_input_folder(folder: &Path) -> Result<FolderInput> {
    let files = find_input_files(folder)?;
    if files.is_empty() {
        bail!("No CSV files found in '{}'", folder.display());
    }
    let plates = assign_plate_numbers(files);

    let mut records = Vec::new();
    let mut skipped = Vec::new();
    for plate in plates.iter() {
        match read_region_table(&plate.path) {
            Ok(table) => {
                info!(
                    "read {} regions from plate {:03} ({})",
                    table.len(),
                    plate.number,
                    plate.source_file_id
                );
                records.extend(table);
            }
            Err(err) => {
                warn!("skipping '{}': {err:#}", plate.path.display());
                skipped.push((plate.path.clone(), err));
            }
        }
    }
    Ok(FolderInput {
        plates,
        records,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "WellId,From [bp],To [bp],Conc. [pg/µl],Region Molarity [nmol/l]\n";

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_find_input_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.csv", HEADER);
        write(dir.path(), "a.csv", HEADER);
        write(dir.path(), "2024-01-01_120000_sub-pooling.csv", HEADER);
        write(dir.path(), "notes.txt", "");
        std::fs::create_dir(dir.path().join("output")).unwrap();

        let files = find_input_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| file_name(f)).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);

        let plates = assign_plate_numbers(files);
        assert_eq!(plates.len(), 2);
        assert_eq!(plates.get("b.csv").unwrap().number, 2);
        assert_eq!(plates.get("b.csv").unwrap().location(), "SourcePlate[002]");
        assert!(plates.get("c.csv").is_none());
    }

    #[test]
    fn test_folder_with_glob_characters() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("run [1]");
        std::fs::create_dir(&folder).unwrap();
        write(&folder, "a.csv", HEADER);
        assert_eq!(find_input_files(&folder).unwrap().len(), 1);
    }

    #[test]
    fn test_load_input_folder_skips_bad_tables() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "plate1.csv",
            &format!("{HEADER}A1,40,150,100,1.0\nA1,200,600,2000,10.0\n"),
        );
        write(dir.path(), "plate2.csv", "WellId,From [bp],To [bp]\nA1,40,150\n");

        let input = load_input_folder(dir.path()).unwrap();
        assert_eq!(input.plates.len(), 2);
        assert_eq!(input.records.len(), 2);
        assert_eq!(input.skipped.len(), 1);
        assert_eq!(input.skipped[0].0, dir.path().join("plate2.csv"));
    }

    #[test]
    fn test_empty_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_input_folder(dir.path()).is_err());
        assert!(load_input_folder(&dir.path().join("missing")).is_err());
    }
}
