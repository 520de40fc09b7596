use std::fmt::{Display, Formatter};

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::{PurchaseRecord, SourceName};

/// Why a source produced no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// The signature matched nothing: markup changed, or the page has no data yet.
    NoMatch,
    /// The selection asked for a candidate position the page does not have.
    CandidateOutOfRange,
    /// The selected candidate did not parse under its format.
    DecodeFailed,
    /// Records decoded, but every one of them failed normalization.
    NoValidRecords,
    /// A document arrived for a source the pipeline does not know.
    UnknownSource,
}

impl FailureCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoMatch => "no_match",
            Self::CandidateOutOfRange => "candidate_out_of_range",
            Self::DecodeFailed => "decode_failed",
            Self::NoValidRecords => "no_valid_records",
            Self::UnknownSource => "unknown_source",
        }
    }
}

impl Display for FailureCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Position of the record in decoder output.
    pub position: usize,
    pub reason: String,
}

/// Per-source bookkeeping, kept for callers and logs but not part of the wire records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub candidates: usize,
    pub selected: Option<usize>,
    pub decoded: usize,
    pub rejections: Vec<Rejection>,
}

impl Diagnostics {
    pub fn rejected(&self) -> usize {
        self.rejections.len()
    }
}

/// Records for a source that extracted successfully (possibly zero of them).
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub records: Vec<PurchaseRecord>,
    pub diagnostics: Diagnostics,
}

/// Structured failure for a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    pub code: FailureCode,
    pub reason: String,
    pub diagnostics: Diagnostics,
}

impl Serialize for ExtractionFailure {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ExtractionFailure", 2)?;
        state.serialize_field("reason", &self.reason)?;
        state.serialize_field("code", &self.code)?;
        state.end()
    }
}

/// Outcome for one source: its full record set, or an explicit failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    Extracted(Extraction),
    Failed(ExtractionFailure),
}

impl ExtractionResult {
    pub fn extracted(records: Vec<PurchaseRecord>, diagnostics: Diagnostics) -> Self {
        Self::Extracted(Extraction {
            records,
            diagnostics,
        })
    }

    pub fn failed(code: FailureCode, reason: impl Into<String>, diagnostics: Diagnostics) -> Self {
        Self::Failed(ExtractionFailure {
            code,
            reason: reason.into(),
            diagnostics,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Extracted(_))
    }

    /// Records on success, `None` on failure.
    pub fn records(&self) -> Option<&[PurchaseRecord]> {
        match self {
            Self::Extracted(extraction) => Some(&extraction.records),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ExtractionFailure> {
        match self {
            Self::Extracted(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        match self {
            Self::Extracted(extraction) => &extraction.diagnostics,
            Self::Failed(failure) => &failure.diagnostics,
        }
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Extracted(extraction) => extraction.records.serialize(serializer),
            Self::Failed(failure) => failure.serialize(serializer),
        }
    }
}

/// Results for every attempted source, in input order.
///
/// A source that was not attempted has no entry; a source that was attempted always has
/// one, even when it failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    entries: Vec<(SourceName, ExtractionResult)>,
}

impl AggregateResult {
    pub fn new(entries: Vec<(SourceName, ExtractionResult)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, source: &str) -> Option<&ExtractionResult> {
        self.entries
            .iter()
            .find(|(name, _)| name.as_str() == source)
            .map(|(_, result)| result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceName, &ExtractionResult)> {
        self.entries.iter().map(|(name, result)| (name, result))
    }

    pub fn sources(&self) -> Vec<SourceName> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&SourceName, &ExtractionFailure)> {
        self.entries
            .iter()
            .filter_map(|(name, result)| result.failure().map(|failure| (name, failure)))
    }

    /// Compact JSON rendering of the wire shape.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for AggregateResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, result) in &self.entries {
            map.serialize_entry(name, result)?;
        }
        map.end()
    }
}
