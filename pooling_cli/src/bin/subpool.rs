//! subpool
#![deny(missing_docs)]

use clap::Parser;
use pooling_cli::{print_error_chain, run, setup_logging, SubpoolArgs};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = SubpoolArgs::parse();
    setup_logging(args.verbose);
    match run(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            print_error_chain(&err);
            ExitCode::FAILURE
        }
    }
}
