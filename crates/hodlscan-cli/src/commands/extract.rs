use std::time::Instant;

use hodlscan_core::{Envelope, Pipeline};

use crate::cli::ExtractArgs;
use crate::error::CliError;

use super::{elapsed_ms, read_documents, CommandOutput};

pub fn run(args: &ExtractArgs, pipeline: &Pipeline) -> Result<CommandOutput, CliError> {
    let documents = read_documents(&args.docs)?;

    let started = Instant::now();
    let aggregate = pipeline.run(&documents);
    let latency_ms = elapsed_ms(started);

    if args.raw {
        return Ok(CommandOutput::Raw(aggregate));
    }

    let Envelope { meta, data, errors } = Envelope::for_run(aggregate, latency_ms)?;
    let envelope = Envelope::with_errors(meta, serde_json::to_value(&data)?, errors)?;
    Ok(CommandOutput::Envelope(envelope))
}
