//! Source declarations in TOML, and their compilation into a [`Pipeline`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decoders::{DecoderRegistry, DecoderSpec};
use crate::locator::{CandidateSelection, Signature};
use crate::normalizer::FieldMap;
use crate::pipeline::{ExecutionMode, Pipeline, Source};
use crate::{ConfigError, SourceName};

const BUILTIN_SOURCES: &str = include_str!("../config/sources.toml");

/// Whole-pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// One `[[sources]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub name: SourceName,
    pub signature: Signature,
    #[serde(default)]
    pub select: CandidateSelection,
    pub decoder: DecoderSpec,
    pub fields: FieldMap,
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// The source set shipped with the crate.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_SOURCES)
    }

    /// `path` when given, the built-in set otherwise.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(&self, registry: &DecoderRegistry) -> Result<Pipeline, ConfigError> {
        let sources = self
            .sources
            .iter()
            .map(|source| source.build(registry))
            .collect::<Result<Vec<_>, _>>()?;
        Pipeline::new(sources, self.mode)
    }
}

impl SourceConfig {
    pub fn build(&self, registry: &DecoderRegistry) -> Result<Source, ConfigError> {
        if let Some(field) = self.fields.first_empty() {
            return Err(ConfigError::EmptyFieldKeys {
                name: self.name.to_string(),
                field,
            });
        }

        let decoder = registry.build(&self.decoder)?;
        let source = Source::new(
            self.name.clone(),
            self.signature.clone(),
            decoder,
            self.fields.clone(),
        )
        .map_err(|source| ConfigError::Signature {
            name: self.name.to_string(),
            source,
        })?;

        Ok(source.with_selection(self.select))
    }
}
