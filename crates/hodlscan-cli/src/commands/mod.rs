mod extract;
mod probe;
mod sources;

use std::io::Read;
use std::time::Instant;

use hodlscan_core::{
    AggregateResult, DecoderRegistry, Envelope, EnvelopeError, EnvelopeMeta, Pipeline,
    PipelineConfig, RawDocument, SourceName, SCHEMA_VERSION,
};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::cli::{Cli, Command, DocArg};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub latency_ms: u64,
    pub sources: Vec<SourceName>,
}

impl CommandResult {
    pub fn ok(data: Value, sources: Vec<SourceName>) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            latency_ms: 0,
            sources,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

/// What a command hands back for rendering.
pub enum CommandOutput {
    Envelope(Envelope<Value>),
    /// `extract --raw`: the aggregate alone.
    Raw(AggregateResult),
}

pub fn run(cli: &Cli) -> Result<CommandOutput, CliError> {
    let pipeline = load_pipeline(cli)?;

    match &cli.command {
        Command::Extract(args) => extract::run(args, &pipeline),
        Command::Sources(args) => finish(sources::run(args, &pipeline)?).map(CommandOutput::Envelope),
        Command::Probe(args) => finish(probe::run(args, &pipeline)?).map(CommandOutput::Envelope),
    }
}

fn load_pipeline(cli: &Cli) -> Result<Pipeline, CliError> {
    let mut config = PipelineConfig::resolve(cli.config.as_deref())?;
    if let Some(mode) = cli.mode {
        config = config.with_mode(mode.into());
    }
    debug!(
        config = ?cli.config,
        sources = config.sources.len(),
        mode = config.mode.as_str(),
        "configuration loaded"
    );

    Ok(config.build(&DecoderRegistry::default())?)
}

fn finish(result: CommandResult) -> Result<Envelope<Value>, CliError> {
    let CommandResult {
        data,
        warnings,
        errors,
        latency_ms,
        sources,
    } = result;

    let mut meta = EnvelopeMeta::new(
        Uuid::new_v4().to_string(),
        SCHEMA_VERSION,
        sources,
        latency_ms,
    )?;
    for warning in warnings {
        meta.push_warning(warning);
    }

    Envelope::with_errors(meta, data, errors).map_err(CliError::from)
}

/// Reads every `NAME=PATH` argument into a document, in argument order.
fn read_documents(docs: &[DocArg]) -> Result<Vec<RawDocument>, CliError> {
    if docs.iter().filter(|doc| doc.is_stdin()).count() > 1 {
        return Err(CliError::Usage(
            "stdin ('-') can back only one document".to_owned(),
        ));
    }

    docs.iter()
        .map(|doc| {
            let text = if doc.is_stdin() {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .map_err(|source| CliError::Read {
                        path: "-".to_owned(),
                        source,
                    })?;
                text
            } else {
                std::fs::read_to_string(&doc.path).map_err(|source| CliError::Read {
                    path: doc.path.display().to_string(),
                    source,
                })?
            };
            debug!(source = %doc.name, bytes = text.len(), "document read");
            Ok(RawDocument::new(doc.name.clone(), text))
        })
        .collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    fn doc(name: &str, path: PathBuf) -> DocArg {
        DocArg {
            name: SourceName::parse(name).expect("valid"),
            path,
        }
    }

    #[test]
    fn reads_documents_in_argument_order() {
        let mut first = tempfile::NamedTempFile::new().expect("temp");
        let mut second = tempfile::NamedTempFile::new().expect("temp");
        first.write_all(b"<html>a</html>").expect("write");
        second.write_all(b"<html>b</html>").expect("write");

        let documents = read_documents(&[
            doc("mara", second.path().to_path_buf()),
            doc("strategy", first.path().to_path_buf()),
        ])
        .expect("reads");

        assert_eq!(documents[0].source().as_str(), "mara");
        assert_eq!(documents[0].text(), "<html>b</html>");
        assert_eq!(documents[1].text(), "<html>a</html>");
    }

    #[test]
    fn missing_document_is_a_read_error() {
        let err = read_documents(&[doc("mara", PathBuf::from("/nonexistent/page.html"))])
            .expect_err("must fail");
        assert!(matches!(err, CliError::Read { .. }));
    }

    #[test]
    fn stdin_may_back_one_document_only() {
        let err = read_documents(&[
            doc("mara", PathBuf::from("-")),
            doc("strategy", PathBuf::from("-")),
        ])
        .expect_err("must fail");
        assert!(matches!(err, CliError::Usage(_)));
    }
}
