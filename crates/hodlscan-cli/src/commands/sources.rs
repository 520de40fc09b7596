use serde::Serialize;

use hodlscan_core::{FieldMap, Pipeline, SourceName};

use crate::cli::SourcesArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct SourceEntry<'a> {
    name: &'a SourceName,
    signature: &'static str,
    locator: String,
    select: String,
    format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FieldMap>,
}

#[derive(Debug, Serialize)]
struct SourcesResponseData<'a> {
    mode: &'static str,
    sources: Vec<SourceEntry<'a>>,
}

pub fn run(args: &SourcesArgs, pipeline: &Pipeline) -> Result<CommandResult, CliError> {
    let sources = pipeline
        .sources()
        .iter()
        .map(|source| SourceEntry {
            name: source.name(),
            signature: source.signature().kind(),
            locator: source.signature().to_string(),
            select: source.selection().to_string(),
            format: source.decoder().format().to_string(),
            fields: args.verbose.then(|| source.normalizer().fields()),
        })
        .collect::<Vec<_>>();

    let names = pipeline
        .sources()
        .iter()
        .map(|source| source.name().clone())
        .collect();
    let data = serde_json::to_value(SourcesResponseData {
        mode: pipeline.mode().as_str(),
        sources,
    })?;

    Ok(CommandResult::ok(data, names))
}
