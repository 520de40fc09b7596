use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::decoders::Decoder;
use crate::locator::{Candidate, CandidateSelection, Locator, Signature};
use crate::normalizer::{FieldMap, Normalizer};
use crate::result::{AggregateResult, Diagnostics, ExtractionResult, FailureCode, Rejection};
use crate::{ConfigError, DecodeError, LocateError, RawDocument, RawRecord, SourceName};

/// How a pipeline schedules its sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

impl ExecutionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        }
    }
}

/// One configured source: where its payload lives, how to decode it, and how its fields map
/// onto the canonical record.
#[derive(Clone)]
pub struct Source {
    name: SourceName,
    locator: Locator,
    selection: CandidateSelection,
    decoder: Arc<dyn Decoder>,
    normalizer: Normalizer,
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("signature", self.locator.signature())
            .field("selection", &self.selection)
            .field("format", &self.decoder.format())
            .field("fields", self.normalizer.fields())
            .finish()
    }
}

impl Source {
    pub fn new(
        name: SourceName,
        signature: Signature,
        decoder: Arc<dyn Decoder>,
        fields: FieldMap,
    ) -> Result<Self, LocateError> {
        Ok(Self {
            name,
            locator: Locator::new(signature)?,
            selection: CandidateSelection::default(),
            decoder,
            normalizer: Normalizer::new(fields),
        })
    }

    pub fn with_selection(mut self, selection: CandidateSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn name(&self) -> &SourceName {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        self.locator.signature()
    }

    pub fn selection(&self) -> CandidateSelection {
        self.selection
    }

    pub fn decoder(&self) -> &dyn Decoder {
        self.decoder.as_ref()
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// All candidates the signature finds in `document`, tagged with this source's format.
    pub fn locate(&self, document: &RawDocument) -> Vec<Candidate> {
        self.locator.locate(document, &self.decoder.format())
    }

    /// Runs locate, decode and normalize for one document.
    ///
    /// Never fails: every problem becomes an [`ExtractionResult::Failed`] for this source.
    pub fn extract(&self, document: &RawDocument) -> ExtractionResult {
        let span = info_span!(
            "extract",
            source = %self.name,
            format = %self.decoder.format(),
            bytes = document.len()
        );
        let _entered = span.enter();

        let candidates = self.locate(document);
        let mut diagnostics = Diagnostics {
            candidates: candidates.len(),
            ..Diagnostics::default()
        };
        debug!(candidates = candidates.len(), selection = %self.selection, "located candidates");

        if candidates.is_empty() {
            warn!("signature matched nothing");
            return ExtractionResult::failed(
                FailureCode::NoMatch,
                "no matching block found",
                diagnostics,
            );
        }

        let raw_records = match self.select_and_decode(&candidates) {
            Ok((index, records)) => {
                diagnostics.selected = Some(index);
                records
            }
            Err(SelectionFailure::OutOfRange { requested }) => {
                warn!(requested, "selected candidate is out of range");
                return ExtractionResult::failed(
                    FailureCode::CandidateOutOfRange,
                    format!(
                        "candidate #{requested} requested but only {} matched",
                        candidates.len()
                    ),
                    diagnostics,
                );
            }
            Err(SelectionFailure::Decode { index, error }) => {
                diagnostics.selected = index;
                warn!(candidate = ?index, error = %error, "decode failed");
                return ExtractionResult::failed(
                    FailureCode::DecodeFailed,
                    error.to_string(),
                    diagnostics,
                );
            }
        };

        diagnostics.decoded = raw_records.len();
        debug!(decoded = raw_records.len(), "decoded raw records");

        let mut records = Vec::with_capacity(raw_records.len());
        for (position, raw) in raw_records.iter().enumerate() {
            match self.normalizer.normalize(raw) {
                Ok(record) => records.push(record),
                Err(error) => {
                    warn!(position, error = %error, "rejected record");
                    diagnostics.rejections.push(Rejection {
                        position,
                        reason: error.to_string(),
                    });
                }
            }
        }

        if records.is_empty() && diagnostics.decoded > 0 {
            return ExtractionResult::failed(
                FailureCode::NoValidRecords,
                "no valid records",
                diagnostics,
            );
        }

        debug!(
            records = records.len(),
            rejected = diagnostics.rejected(),
            "normalized records"
        );
        ExtractionResult::extracted(records, diagnostics)
    }

    fn select_and_decode(
        &self,
        candidates: &[Candidate],
    ) -> Result<(usize, Vec<RawRecord>), SelectionFailure> {
        let chosen = match self.selection {
            CandidateSelection::First => candidates.first(),
            CandidateSelection::Last => candidates.last(),
            CandidateSelection::Nth(requested) => Some(
                candidates
                    .get(requested)
                    .ok_or(SelectionFailure::OutOfRange { requested })?,
            ),
            CandidateSelection::FirstDecodable => return self.first_decodable(candidates),
        };

        let Some(candidate) = chosen else {
            return Err(SelectionFailure::OutOfRange { requested: 0 });
        };
        self.decode_one(candidate)
            .map(|records| (candidate.index, records))
            .map_err(|error| SelectionFailure::Decode {
                index: Some(candidate.index),
                error,
            })
    }

    fn first_decodable(
        &self,
        candidates: &[Candidate],
    ) -> Result<(usize, Vec<RawRecord>), SelectionFailure> {
        let mut last_failure = None;
        for candidate in candidates.iter().filter(|c| self.decoder.accepts(c)) {
            match self.decoder.decode(candidate) {
                Ok(records) => return Ok((candidate.index, records)),
                Err(error) => {
                    debug!(candidate = candidate.index, error = %error, "candidate did not decode");
                    last_failure = Some(SelectionFailure::Decode {
                        index: Some(candidate.index),
                        error,
                    });
                }
            }
        }

        Err(last_failure.unwrap_or_else(|| SelectionFailure::Decode {
            index: None,
            error: DecodeError::NoCandidateAccepted {
                count: candidates.len(),
                format: self.decoder.format().to_string(),
            },
        }))
    }

    fn decode_one(&self, candidate: &Candidate) -> Result<Vec<RawRecord>, DecodeError> {
        if !self.decoder.accepts(candidate) {
            return Err(DecodeError::CandidateRejected {
                index: candidate.index,
                format: self.decoder.format().to_string(),
            });
        }
        self.decoder.decode(candidate)
    }
}

enum SelectionFailure {
    OutOfRange {
        requested: usize,
    },
    Decode {
        index: Option<usize>,
        error: DecodeError,
    },
}

/// A set of sources run together over a batch of documents.
#[derive(Debug, Clone)]
pub struct Pipeline {
    sources: Vec<Source>,
    mode: ExecutionMode,
}

impl Pipeline {
    pub fn new(sources: Vec<Source>, mode: ExecutionMode) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for source in &sources {
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::DuplicateSource {
                    name: source.name.to_string(),
                });
            }
        }
        Ok(Self { sources, mode })
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources
            .iter()
            .find(|source| source.name.as_str() == name)
    }

    /// Extracts every document, one result per distinct source in input order.
    ///
    /// A document naming an unconfigured source gets an `unknown_source` failure. When the
    /// same source appears twice, only its first document is used.
    pub fn run(&self, documents: &[RawDocument]) -> AggregateResult {
        let started = Instant::now();

        let mut seen = HashSet::new();
        let batch = documents
            .iter()
            .filter(|document| {
                let first = seen.insert(document.source().as_str());
                if !first {
                    warn!(source = %document.source(), "duplicate document ignored");
                }
                first
            })
            .collect::<Vec<_>>();

        let entries = match self.mode {
            ExecutionMode::Parallel => batch
                .par_iter()
                .map(|document| self.run_document(document))
                .collect::<Vec<_>>(),
            ExecutionMode::Sequential => batch
                .iter()
                .map(|document| self.run_document(document))
                .collect::<Vec<_>>(),
        };

        let aggregate = AggregateResult::new(entries);
        info!(
            mode = self.mode.as_str(),
            sources = aggregate.len(),
            failed = aggregate.failures().count(),
            elapsed_ms = elapsed_ms(started),
            "pipeline run complete"
        );
        aggregate
    }

    fn run_document(&self, document: &RawDocument) -> (SourceName, ExtractionResult) {
        let name = document.source().clone();
        let result = match self.source(name.as_str()) {
            Some(source) => source.extract(document),
            None => {
                warn!(source = %name, "no source configured for document");
                ExtractionResult::failed(
                    FailureCode::UnknownSource,
                    format!("no source named '{name}' is configured"),
                    Diagnostics::default(),
                )
            }
        };
        (name, result)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    let elapsed = started.elapsed().as_millis();
    u64::try_from(elapsed).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::{AnchoredArrayDecoder, PlainJsonDecoder};

    fn name(value: &str) -> SourceName {
        SourceName::parse(value).expect("valid")
    }

    fn json_source(source: &str) -> Source {
        Source::new(
            name(source),
            Signature::json_script(),
            Arc::new(PlainJsonDecoder::at("/rows")),
            FieldMap::new("date", "btc", "price"),
        )
        .expect("valid signature")
    }

    fn chart_source() -> Source {
        Source::new(
            name("chart"),
            Signature::anchored("purchases: [", r"\]"),
            Arc::new(AnchoredArrayDecoder::default()),
            FieldMap::new("date", "btc", "price"),
        )
        .expect("valid signature")
    }

    fn json_page(body: &str) -> String {
        format!(r#"<html><script type="application/json">{body}</script></html>"#)
    }

    #[test]
    fn extracts_and_recomputes_cost() {
        let page = json_page(
            r#"{"rows":[{"date":"2024-03-01","btc":"2","price":"$100.25","cost":999}]}"#,
        );
        let result = json_source("alpha").extract(&RawDocument::new(name("alpha"), page));

        let records = result.records().expect("extracted");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total_cost_usd, 200.5);
        assert_eq!(result.diagnostics().selected, Some(0));
    }

    #[test]
    fn missing_block_is_no_match() {
        let result = json_source("alpha")
            .extract(&RawDocument::new(name("alpha"), "<html><body></body></html>"));

        let failure = result.failure().expect("failed");
        assert_eq!(failure.code, FailureCode::NoMatch);
        assert_eq!(failure.reason, "no matching block found");
    }

    #[test]
    fn nth_selection_beyond_matches_is_out_of_range() {
        let source = json_source("alpha").with_selection(CandidateSelection::Nth(3));
        let result = source.extract(&RawDocument::new(name("alpha"), json_page("{}")));

        assert_eq!(
            result.failure().map(|failure| failure.code),
            Some(FailureCode::CandidateOutOfRange)
        );
    }

    #[test]
    fn first_decodable_skips_broken_candidates() {
        let page = format!(
            "{}{}",
            json_page("not json"),
            json_page(r#"{"rows":[{"date":"2024-03-01","btc":1,"price":5}]}"#)
        );
        let source = json_source("alpha").with_selection(CandidateSelection::FirstDecodable);
        let result = source.extract(&RawDocument::new(name("alpha"), page));

        assert!(result.is_success());
        assert_eq!(result.diagnostics().selected, Some(1));
    }

    #[test]
    fn first_decodable_reports_every_candidate_rejected() {
        let page = format!("{}{}", json_page("window.a = 1"), json_page("window.b = 2"));
        let source = json_source("alpha").with_selection(CandidateSelection::FirstDecodable);
        let result = source.extract(&RawDocument::new(name("alpha"), page));

        let failure = result.failure().expect("failed");
        assert_eq!(failure.code, FailureCode::DecodeFailed);
        assert_eq!(
            failure.reason,
            "all 2 candidate(s) were rejected by the 'plain-json' decoder"
        );
        assert_eq!(result.diagnostics().selected, None);
    }

    #[test]
    fn rejected_records_are_counted_and_survivors_kept() {
        let page = json_page(
            r#"{"rows":[{"date":"2024-03-01","btc":1,"price":5},{"date":"soon","btc":1,"price":5}]}"#,
        );
        let result = json_source("alpha").extract(&RawDocument::new(name("alpha"), page));

        assert_eq!(result.records().map(<[_]>::len), Some(1));
        assert_eq!(result.diagnostics().rejected(), 1);
        assert_eq!(result.diagnostics().rejections[0].position, 1);
    }

    #[test]
    fn all_rejected_is_no_valid_records() {
        let page = json_page(r#"{"rows":[{"date":"2024-03-01","btc":"lots","price":5}]}"#);
        let result = json_source("alpha").extract(&RawDocument::new(name("alpha"), page));

        let failure = result.failure().expect("failed");
        assert_eq!(failure.code, FailureCode::NoValidRecords);
        assert_eq!(failure.reason, "no valid records");
    }

    #[test]
    fn empty_payload_is_an_empty_success() {
        let page = json_page(r#"{"rows":[]}"#);
        let result = json_source("alpha").extract(&RawDocument::new(name("alpha"), page));
        assert_eq!(result.records().map(<[_]>::len), Some(0));
    }

    #[test]
    fn rejects_duplicate_source_names() {
        let err = Pipeline::new(
            vec![json_source("alpha"), json_source("alpha")],
            ExecutionMode::Sequential,
        )
        .expect_err("duplicate");
        assert!(matches!(err, ConfigError::DuplicateSource { .. }));
    }

    #[test]
    fn run_isolates_failures_and_keeps_input_order() {
        let pipeline = Pipeline::new(
            vec![json_source("alpha"), chart_source()],
            ExecutionMode::Parallel,
        )
        .expect("pipeline");
        let documents = vec![
            RawDocument::new(
                name("chart"),
                r#"<script>var purchases: [{"date":"2024-01-02","btc":1,"price":10}];</script>"#,
            ),
            RawDocument::new(name("alpha"), json_page("{broken")),
            RawDocument::new(name("ghost"), "<html></html>"),
        ];

        let aggregate = pipeline.run(&documents);

        let order = aggregate
            .iter()
            .map(|(source, _)| source.as_str().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(order, ["chart", "alpha", "ghost"]);
        assert!(aggregate.get("chart").is_some_and(ExtractionResult::is_success));
        assert_eq!(
            aggregate.get("alpha").and_then(|r| r.failure()).map(|f| f.code),
            Some(FailureCode::DecodeFailed)
        );
        assert_eq!(
            aggregate.get("ghost").and_then(|r| r.failure()).map(|f| f.code),
            Some(FailureCode::UnknownSource)
        );
    }

    #[test]
    fn duplicate_documents_keep_the_first() {
        let pipeline =
            Pipeline::new(vec![chart_source()], ExecutionMode::Sequential).expect("pipeline");
        let documents = vec![
            RawDocument::new(name("chart"), "no data here"),
            RawDocument::new(
                name("chart"),
                r#"purchases: [{"date":"2024-01-02","btc":1,"price":10}]"#,
            ),
        ];

        let aggregate = pipeline.run(&documents);

        assert_eq!(aggregate.len(), 1);
        assert_eq!(
            aggregate.get("chart").and_then(|r| r.failure()).map(|f| f.code),
            Some(FailureCode::NoMatch)
        );
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let pipeline = Pipeline::new(
            vec![json_source("alpha"), chart_source()],
            ExecutionMode::Parallel,
        )
        .expect("pipeline");
        let documents = vec![
            RawDocument::new(
                name("alpha"),
                json_page(r#"{"rows":[{"date":"2024-03-01","btc":1.5,"price":"61,000"}]}"#),
            ),
            RawDocument::new(name("chart"), "<html></html>"),
        ];

        let parallel = pipeline.run(&documents).to_json().expect("json");
        let sequential = pipeline
            .clone()
            .with_mode(ExecutionMode::Sequential)
            .run(&documents)
            .to_json()
            .expect("json");
        assert_eq!(parallel, sequential);
    }
}
