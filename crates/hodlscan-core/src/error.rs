use thiserror::Error;

/// Field-level coercion and contract errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("source name cannot be empty")]
    EmptySourceName,
    #[error("source name contains invalid character '{ch}' at index {index}")]
    SourceNameInvalidChar { ch: char, index: usize },

    #[error("required field '{field}' is missing (looked up {keys:?})")]
    MissingField {
        field: &'static str,
        keys: Vec<String>,
    },
    #[error("field '{field}' is not numeric: '{value}'")]
    NotNumeric { field: &'static str, value: String },
    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' is not a recognizable date: '{value}'")]
    InvalidDate { field: &'static str, value: String },

    #[error("request_id must be at least 8 characters")]
    InvalidRequestId,
    #[error("schema_version must match vMAJOR.MINOR.PATCH: '{value}'")]
    InvalidSchemaVersion { value: String },
    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
}

/// A located candidate did not parse under the format its decoder claims.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid JSON at line {line}, column {column}: {message}")]
    InvalidJson {
        message: String,
        line: usize,
        column: usize,
    },
    #[error("path '{path}' not found in decoded payload")]
    MissingPath { path: String },
    #[error("value at '{path}' is not {expected}")]
    UnexpectedShape { path: String, expected: &'static str },
    #[error("rich payload index {index} is out of range (payload holds {len} values)")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("rich payload contains a cyclic reference at index {index}")]
    CyclicReference { index: usize },
    #[error("rich payload uses unknown type tag '{tag}'")]
    UnknownTypeTag { tag: String },
    #[error("rich payload is malformed: {reason}")]
    MalformedRichPayload { reason: String },
    #[error("rich payload nests references deeper than {limit} levels")]
    RichPayloadTooDeep { limit: usize },
    #[error("rich payload expands to more than {limit} values")]
    RichPayloadTooLarge { limit: usize },
    #[error("rich payload date '{value}' is not a valid ISO timestamp")]
    InvalidRichDate { value: String },
    #[error("markup could not be read: {reason}")]
    Markup { reason: String },
    #[error("candidate #{index} was rejected by the '{format}' decoder")]
    CandidateRejected { index: usize, format: String },
    #[error("all {count} candidate(s) were rejected by the '{format}' decoder")]
    NoCandidateAccepted { count: usize, format: String },
}

impl From<serde_json::Error> for DecodeError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidJson {
            message: error.to_string(),
            line: error.line(),
            column: error.column(),
        }
    }
}

/// A signature that cannot be turned into a working matcher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("block signature tag cannot be empty")]
    EmptyTag,
    #[error("block selector '{selector}' is invalid: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("anchored signature anchor cannot be empty")]
    EmptyAnchor,
    #[error("terminator pattern '{pattern}' is invalid: {reason}")]
    InvalidTerminator { pattern: String, reason: String },
}

/// Errors raised while turning configuration into a runnable pipeline.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown decoder format '{format}', registered formats: {known:?}")]
    UnknownFormat { format: String, known: Vec<String> },
    #[error("invalid parameters for decoder '{format}': {reason}")]
    DecoderParams { format: String, reason: String },
    #[error("source '{name}' is declared more than once")]
    DuplicateSource { name: String },
    #[error("source '{name}' has no field keys for '{field}'")]
    EmptyFieldKeys { name: String, field: &'static str },
    #[error("source '{name}': {source}")]
    Signature {
        name: String,
        #[source]
        source: LocateError,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
