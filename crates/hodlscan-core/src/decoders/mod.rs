//! Format decoders and the registry that builds them from configuration.
//!
//! A decoder turns one located [`Candidate`] into source-shaped [`RawRecord`]s. Decoders are
//! pure: no I/O, no shared state. The pipeline only ever sees `dyn Decoder`, so a new page
//! format means a new decoder registered here, not a change to the orchestrator.
//!
//! | Format | Decoder | Payload |
//! |--------|---------|---------|
//! | `plain-json` | [`PlainJsonDecoder`] | Standard JSON, e.g. `__NEXT_DATA__` |
//! | `rich` | [`RichDecoder`] | devalue-flattened payload inside a JSON envelope |
//! | `anchored-array` | [`AnchoredArrayDecoder`] | Array body cut out of inline script |
//! | `html-table` | [`HtmlTableDecoder`] | Rendered `<table>` rows |

mod anchored;
mod devalue;
mod html_table;
mod plain_json;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::locator::Candidate;
use crate::{ConfigError, DecodeError, RawRecord};

pub use anchored::{AnchoredArrayDecoder, AnchoredArrayParams};
pub use devalue::{unflatten, RichDecoder, RichParams};
pub use html_table::{HtmlTableDecoder, HtmlTableParams};
pub use plain_json::{PlainJsonDecoder, PlainJsonParams};

/// Name of the embedded-data format a decoder claims.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatTag(Cow<'static, str>);

impl FormatTag {
    pub const PLAIN_JSON: &'static str = "plain-json";
    pub const RICH: &'static str = "rich";
    pub const ANCHORED_ARRAY: &'static str = "anchored-array";
    pub const HTML_TABLE: &'static str = "html-table";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn plain_json() -> Self {
        Self(Cow::Borrowed(Self::PLAIN_JSON))
    }

    pub const fn rich() -> Self {
        Self(Cow::Borrowed(Self::RICH))
    }

    pub const fn anchored_array() -> Self {
        Self(Cow::Borrowed(Self::ANCHORED_ARRAY))
    }

    pub const fn html_table() -> Self {
        Self(Cow::Borrowed(Self::HTML_TABLE))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FormatTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoder contract.
pub trait Decoder: Send + Sync {
    fn format(&self) -> FormatTag;

    /// Cheap check that `candidate` is worth decoding. Defaults to a format-tag match.
    fn accepts(&self, candidate: &Candidate) -> bool {
        candidate.format == self.format()
    }

    fn decode(&self, candidate: &Candidate) -> Result<Vec<RawRecord>, DecodeError>;
}

/// Decoder declaration as written in configuration: a format name plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderSpec {
    pub format: String,
    #[serde(flatten)]
    pub params: toml::Table,
}

impl DecoderSpec {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            params: toml::Table::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.params.insert(key.to_owned(), value.into());
        self
    }
}

/// Builds a decoder from its configuration parameters.
pub type DecoderFactory = fn(&toml::Table) -> Result<Arc<dyn Decoder>, ConfigError>;

/// Format name to decoder factory.
#[derive(Clone)]
pub struct DecoderRegistry {
    factories: BTreeMap<String, DecoderFactory>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(FormatTag::PLAIN_JSON, |params| {
            let params = parse_params::<PlainJsonParams>(FormatTag::PLAIN_JSON, params)?;
            Ok(Arc::new(PlainJsonDecoder::new(params)))
        });
        registry.register(FormatTag::RICH, |params| {
            let params = parse_params::<RichParams>(FormatTag::RICH, params)?;
            Ok(Arc::new(RichDecoder::new(params)))
        });
        registry.register(FormatTag::ANCHORED_ARRAY, |params| {
            let params = parse_params::<AnchoredArrayParams>(FormatTag::ANCHORED_ARRAY, params)?;
            Ok(Arc::new(AnchoredArrayDecoder::new(params)))
        });
        registry.register(FormatTag::HTML_TABLE, |params| {
            let params = parse_params::<HtmlTableParams>(FormatTag::HTML_TABLE, params)?;
            Ok(Arc::new(HtmlTableDecoder::new(params)))
        });
        registry
    }
}

impl DecoderRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registers (or replaces) the factory for `format`.
    pub fn register(&mut self, format: &str, factory: DecoderFactory) {
        self.factories.insert(format.to_owned(), factory);
    }

    pub fn formats(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn build(&self, spec: &DecoderSpec) -> Result<Arc<dyn Decoder>, ConfigError> {
        let factory = self
            .factories
            .get(&spec.format)
            .ok_or_else(|| ConfigError::UnknownFormat {
                format: spec.format.clone(),
                known: self.formats(),
            })?;
        factory(&spec.params)
    }
}

/// Deserializes decoder parameters, naming the format in any error.
pub fn parse_params<T>(format: &str, params: &toml::Table) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    toml::Value::Table(params.clone())
        .try_into()
        .map_err(|error: toml::de::Error| ConfigError::DecoderParams {
            format: format.to_owned(),
            reason: error.message().to_owned(),
        })
}

/// Parses candidate text as JSON, reporting failures as [`DecodeError`].
pub(crate) fn parse_json(text: &str) -> Result<serde_json::Value, DecodeError> {
    serde_json::from_str(text.trim()).map_err(DecodeError::from)
}

/// `true` when the trimmed text opens like a JSON object or array.
pub(crate) fn looks_like_json(text: &str) -> bool {
    matches!(text.trim_start().chars().next(), Some('{' | '['))
}
