//! # photo-dedupe
//!
//! Command-line entry point for the scan-and-group duplicate engine.

mod cli;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
