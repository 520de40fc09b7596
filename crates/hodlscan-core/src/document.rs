use std::sync::Arc;

use crate::SourceName;

/// Full text of one fetched page, tagged with the source it belongs to.
///
/// The text is shared behind an `Arc` so documents can be handed to parallel workers
/// without copying page bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    source: SourceName,
    text: Arc<str>,
}

impl RawDocument {
    pub fn new(source: SourceName, text: impl Into<Arc<str>>) -> Self {
        Self {
            source,
            text: text.into(),
        }
    }

    pub fn source(&self) -> &SourceName {
        &self.source
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
