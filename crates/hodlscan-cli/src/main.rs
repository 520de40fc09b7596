mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::io;

use clap::Parser;

use crate::cli::Cli;
use crate::commands::CommandOutput;
use crate::error::CliError;

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    logging::init(cli.log_json)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let (warning_count, error_count) = match commands::run(&cli)? {
        CommandOutput::Envelope(envelope) => {
            output::render(&mut out, &envelope, cli.format, cli.pretty)?;
            (envelope.meta.warnings.len(), envelope.errors.len())
        }
        CommandOutput::Raw(aggregate) => {
            output::render_raw(&mut out, &aggregate, cli.pretty)?;
            let dropped = aggregate
                .iter()
                .filter(|(_, result)| result.is_success() && result.diagnostics().rejected() > 0)
                .count();
            (dropped, aggregate.failures().count())
        }
    };

    if cli.strict && (warning_count > 0 || error_count > 0) {
        return Err(CliError::StrictModeViolation {
            warning_count,
            error_count,
        });
    }

    Ok(())
}
