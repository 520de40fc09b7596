use hodlscan_core::{ConfigError, CoreError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid arguments: {0}")]
    Usage(String),

    #[error("failed to read document '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialize logging: {0}")]
    Logging(String),

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ValidationError> for CliError {
    fn from(error: ValidationError) -> Self {
        Self::Core(error.into())
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        Self::Core(error.into())
    }
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Core(CoreError::Serialization(_)) => 10,
            Self::Core(_) | Self::Usage(_) => 2,
            Self::StrictModeViolation { .. } => 5,
            Self::Read { .. } | Self::Logging(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_exit_codes() {
        let config = CliError::from(ConfigError::DuplicateSource {
            name: "mara".to_owned(),
        });
        assert!(matches!(config, CliError::Core(CoreError::Config(_))));
        assert_eq!(config.exit_code(), 2);

        let validation = CliError::from(ValidationError::EmptySourceName);
        assert!(matches!(validation, CliError::Core(CoreError::Validation(_))));
        assert_eq!(validation.exit_code(), 2);

        let decode = CliError::from(CoreError::from(hodlscan_core::DecodeError::MissingPath {
            path: "/body".to_owned(),
        }));
        assert_eq!(decode.exit_code(), 2);

        let strict = CliError::StrictModeViolation {
            warning_count: 1,
            error_count: 0,
        };
        assert_eq!(strict.exit_code(), 5);

        let read = CliError::Read {
            path: "missing.html".to_owned(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(read.exit_code(), 10);
    }
}
