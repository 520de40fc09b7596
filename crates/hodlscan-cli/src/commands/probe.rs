use std::time::Instant;

use serde::Serialize;

use hodlscan_core::{Candidate, CandidateSelection, EnvelopeError, Pipeline, Source, SourceName};

use crate::cli::ProbeArgs;
use crate::error::CliError;

use super::{elapsed_ms, read_documents, CommandResult};

#[derive(Debug, Serialize)]
struct CandidatePreview {
    index: usize,
    accepted: bool,
    chars: usize,
    preview: String,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    source: SourceName,
    locator: String,
    select: String,
    format: String,
    candidates: usize,
    selected: Option<usize>,
    previews: Vec<CandidatePreview>,
}

#[derive(Debug, Serialize)]
struct ProbeResponseData {
    reports: Vec<ProbeReport>,
}

pub fn run(args: &ProbeArgs, pipeline: &Pipeline) -> Result<CommandResult, CliError> {
    let documents = read_documents(&args.docs)?;
    let started = Instant::now();

    let mut reports = Vec::new();
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    for document in &documents {
        let name = document.source();
        let Some(source) = pipeline.source(name.as_str()) else {
            errors.push(
                EnvelopeError::new(
                    "unknown_source",
                    format!("no source named '{name}' is configured"),
                )?
                .with_source(name.clone()),
            );
            continue;
        };

        let candidates = source.locate(document);
        let selected = planned_candidate(source, &candidates);
        if candidates.is_empty() {
            warnings.push(format!("source '{name}': signature matched nothing"));
        } else if selected.is_none() {
            warnings.push(format!(
                "source '{name}': selection {} picks no candidate out of {}",
                source.selection(),
                candidates.len()
            ));
        }

        reports.push(ProbeReport {
            source: name.clone(),
            locator: source.signature().to_string(),
            select: source.selection().to_string(),
            format: source.decoder().format().to_string(),
            candidates: candidates.len(),
            selected,
            previews: candidates
                .iter()
                .map(|candidate| CandidatePreview {
                    index: candidate.index,
                    accepted: source.decoder().accepts(candidate),
                    chars: candidate.text.chars().count(),
                    preview: candidate.preview(args.preview_chars),
                })
                .collect(),
        });
    }

    let sources = documents
        .iter()
        .map(|document| document.source().clone())
        .collect();
    let data = serde_json::to_value(ProbeResponseData { reports })?;

    Ok(CommandResult::ok(data, sources)
        .with_warnings(warnings)
        .with_errors(errors)
        .with_latency(elapsed_ms(started)))
}

/// The candidate extraction would decode, without decoding it. For `first-decodable`,
/// the first candidate the decoder accepts.
fn planned_candidate(source: &Source, candidates: &[Candidate]) -> Option<usize> {
    let candidate = match source.selection() {
        CandidateSelection::First => candidates.first(),
        CandidateSelection::Last => candidates.last(),
        CandidateSelection::Nth(index) => candidates.get(index),
        CandidateSelection::FirstDecodable => candidates
            .iter()
            .find(|candidate| source.decoder().accepts(candidate)),
    };
    candidate.map(|candidate| candidate.index)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use hodlscan_core::{DecoderRegistry, PipelineConfig};

    use super::*;
    use crate::cli::parse_doc_arg;

    #[test]
    fn reports_candidates_and_out_of_range_selection() {
        let mut file = tempfile::NamedTempFile::new().expect("temp");
        file.write_all(br#"<script type="application/json">{"only": "one"}</script>"#)
            .expect("write");
        let pipeline = PipelineConfig::builtin()
            .and_then(|config| config.build(&DecoderRegistry::default()))
            .expect("builtin pipeline");
        let args = ProbeArgs {
            docs: vec![
                parse_doc_arg(&format!("mara={}", file.path().display())).expect("arg"),
                parse_doc_arg(&format!("ghost={}", file.path().display())).expect("arg"),
            ],
            preview_chars: 8,
        };

        let result = run(&args, &pipeline).expect("runs");

        let report = &result.data["reports"][0];
        assert_eq!(report["candidates"], 1);
        assert!(report["selected"].is_null());
        assert_eq!(report["previews"][0]["preview"], "{\"only\":…");
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, "unknown_source");
    }
}
