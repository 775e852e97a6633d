mod cli;
mod convert;
mod decode;
mod error;
mod logging;
mod metadata;
mod output;
mod readers;
mod table;
mod types;
mod value_labels;

use std::io::IsTerminal;

use clap::Parser;
use cli::{Cli, Commands, ConvertArgs, InspectArgs};
use logging::{init_logging, LogConfig};
use tracing::{error, info};
use types::Result;

fn main() {
    let cli = Cli::parse();

    let config = LogConfig::from_verbosity(cli.verbose, cli.quiet)
        .with_ansi(std::io::stderr().is_terminal());
    if let Err(e) = init_logging(&config) {
        eprintln!("{}", e);
    }

    let result = match &cli.command {
        Commands::Convert(args) => run_convert(args),
        Commands::Inspect(args) => run_inspect(args),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run_convert(args: &ConvertArgs) -> Result<()> {
    let result = convert::convert_file(&args.input, &args.options())?;

    info!("Data written to: {}", result.paths.data.display());
    info!("Metadata written to: {}", result.paths.metadata.display());
    if let Some(report) = &result.decode_report {
        info!(
            "Decoded data written to: {} ({} columns decoded)",
            result.paths.decoded.display(),
            report.decoded.len()
        );
    }
    if !result.warnings.is_empty() {
        info!("{} warning(s) during conversion", result.warnings.len());
    }
    Ok(())
}

fn run_inspect(args: &InspectArgs) -> Result<()> {
    let metadata = convert::inspect_file(&args.input, &args.read_options())?;

    if let Some(out_path) = &args.out {
        output::write_json_file(&metadata, out_path)?;
        info!("Metadata written to: {}", out_path.display());
    } else {
        output::write_json_stdout(&metadata)?;
    }
    Ok(())
}
