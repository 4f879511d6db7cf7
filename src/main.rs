//! Assetflow - command-line asset builder and dev server

use std::process::ExitCode;

use assetflow::cli;

fn main() -> ExitCode {
    cli::run()
}
