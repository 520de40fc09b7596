//! Core pipeline for hodlscan.
//!
//! Pulls bitcoin purchase records out of fetched HTML pages that embed them in different
//! ways, and reduces them to one canonical record shape.
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Locate | [`locator`] | [`Candidate`]s matching a source's [`Signature`] |
//! | Decode | [`decoders`] | Source-shaped [`RawRecord`]s |
//! | Normalize | [`normalizer`] | Canonical [`PurchaseRecord`]s |
//! | Orchestrate | [`pipeline`] | An [`AggregateResult`] keyed by source |
//!
//! Sources are declared in TOML ([`config`]); fetching pages and serving results are left
//! to the caller.

pub mod config;
pub mod decoders;
pub mod document;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod locator;
pub mod normalizer;
pub mod pipeline;
pub mod result;
pub mod value;

pub use config::{PipelineConfig, SourceConfig};
pub use decoders::{Decoder, DecoderRegistry, DecoderSpec, FormatTag};
pub use document::RawDocument;
pub use domain::{PurchaseRecord, SourceName};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta, SCHEMA_VERSION};
pub use error::{ConfigError, CoreError, DecodeError, LocateError, ValidationError};
pub use locator::{Candidate, CandidateSelection, Capture, Locator, Signature};
pub use normalizer::{FieldKeys, FieldMap, Normalizer};
pub use pipeline::{ExecutionMode, Pipeline, Source};
pub use result::{
    AggregateResult, Diagnostics, Extraction, ExtractionFailure, ExtractionResult, FailureCode,
    Rejection,
};
pub use value::{RawRecord, RawValue};
