//! `ptree` binary: parses arguments, sets up logging and reports failures.

use std::{process, str::FromStr};

use clap::Parser;
use log::{LevelFilter, debug, error, info};

use ptree::PtreeError;
use ptree_cli::{Args, Command, ErrorAdapter};

fn main() {
    miette::set_panic_hook();

    let args = Args::parse();
    init_logging(&args.log_level);

    let command = match &args.command {
        Command::Generate(_) => "generate",
        Command::Diagram(_) => "diagram",
        Command::Git(_) => "git",
    };
    info!(command; "Starting ptree");
    debug!(args:?; "Parsed arguments");

    match ptree_cli::run(&args) {
        Ok(()) => info!(command; "Done"),
        Err(err) => {
            error!(command; "Failed\n{}", render(err));
            process::exit(1);
        }
    }
}

/// Rate-limit back-off warnings carry the env_logger timestamp, so the
/// logger is always on; an unknown level falls back to `warn`.
fn init_logging(level: &str) {
    let filter = LevelFilter::from_str(level).unwrap_or_else(|_| {
        eprintln!("Unknown log level '{level}', falling back to 'warn'");
        LevelFilter::Warn
    });

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(filter)
        .init();
}

fn render(err: PtreeError) -> String {
    let mut report = String::new();
    miette::GraphicalReportHandler::new()
        .render_report(&mut report, &ErrorAdapter(err))
        .expect("Writing to String buffer is infallible");
    report
}
