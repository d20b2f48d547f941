use std::process::ExitCode;

use clap::Parser;
use tilesnap::cli::{self, CliArgs};
use tilesnap::logger;

fn main() -> ExitCode {
    // Session log (overwrites previous session log)
    logger::init();

    let args = CliArgs::parse();
    cli::run(args)
}
