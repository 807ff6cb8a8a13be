use std::process::ExitCode;

use clap::Parser;
use layerpaint::{cli, logger};

fn main() -> ExitCode {
    // Session log is truncated on every launch.
    logger::init();

    let args = cli::CliArgs::parse();
    logger::set_echo(args.verbose);
    if let Some(path) = logger::log_path() {
        layerpaint::log_info!("LayerPaint {} starting, log at {}", env!("CARGO_PKG_VERSION"), path.display());
    }
    cli::run(args)
}
