//! Reading instrument region tables from an input folder and writing the
//! sub-pooling result table.

pub mod csv_parser;
pub mod input_folder;
pub mod region_table;
pub mod writer;

pub use input_folder::{
    assign_plate_numbers, find_input_files, load_input_folder, FolderInput, SourcePlate,
    SourcePlates,
};
pub use region_table::read_region_table;
pub use writer::{build_rows, default_output_dir, write_plan, OutputRow};
