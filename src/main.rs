use anyhow::Result;
use std::process;

use groupcast::{app, cli, logging};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args();
    cli::validate_args(&args)?;

    let config_manager = app::load_configuration(&args)?;

    let log_config = app::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;

    let config = app::build_config(&args, &config_manager)?;
    app::run_command(&args.command, &config)
}
