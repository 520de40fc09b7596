//! Candidate location: finding the regions of a page that hold embedded data.
//!
//! Two signature kinds are supported:
//!
//! - **block**: every element with a given tag and exact attribute values, e.g.
//!   `<script type="application/json">`. The candidate is the element's inner text (or its
//!   outer HTML for table-like payloads).
//! - **anchored**: a literal anchor followed by the shortest run of characters up to a
//!   terminator pattern. Used for payloads inlined in script code.
//!
//! Matching never fails at extraction time. A signature that cannot be compiled is rejected
//! when the [`Locator`] is built, and a document without matches yields no candidates.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::decoders::FormatTag;
use crate::{LocateError, RawDocument};

/// What part of a matched block becomes the candidate text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capture {
    #[default]
    Text,
    Html,
}

/// Declarative rule describing where a decoder's payload lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signature {
    Block {
        tag: String,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        #[serde(default)]
        capture: Capture,
    },
    Anchored {
        anchor: String,
        terminator: String,
    },
}

impl Signature {
    /// `<script type="application/json">` blocks.
    pub fn json_script() -> Self {
        Self::block("script", [("type", "application/json")])
    }

    pub fn block<'a>(tag: &str, attributes: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::Block {
            tag: tag.to_owned(),
            attributes: attributes
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect(),
            capture: Capture::Text,
        }
    }

    pub fn anchored(anchor: &str, terminator: &str) -> Self {
        Self::Anchored {
            anchor: anchor.to_owned(),
            terminator: terminator.to_owned(),
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Block { .. } => "block",
            Self::Anchored { .. } => "anchored",
        }
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Block {
                tag, attributes, ..
            } => f.write_str(&css_selector(tag, attributes)),
            Self::Anchored { anchor, terminator } => {
                write!(f, "{anchor} ... /{terminator}/")
            }
        }
    }
}

/// A located substring believed to hold one decoder's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Position among all matches of the signature, in document order.
    pub index: usize,
    pub format: FormatTag,
    pub text: String,
}

impl Candidate {
    pub fn new(index: usize, format: FormatTag, text: impl Into<String>) -> Self {
        Self {
            index,
            format,
            text: text.into(),
        }
    }

    /// First `max_chars` characters with whitespace runs collapsed.
    pub fn preview(&self, max_chars: usize) -> String {
        let collapsed = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= max_chars {
            return collapsed;
        }
        let mut preview = collapsed.chars().take(max_chars).collect::<String>();
        preview.push('…');
        preview
    }
}

/// Which located candidate a source decodes when a signature matches more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateSelection {
    #[default]
    First,
    Last,
    /// Zero-based position in document order.
    Nth(usize),
    /// The first candidate, in document order, that the decoder accepts and decodes.
    FirstDecodable,
}

impl Display for CandidateSelection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => f.write_str("first"),
            Self::Last => f.write_str("last"),
            Self::Nth(index) => write!(f, "nth({index})"),
            Self::FirstDecodable => f.write_str("first-decodable"),
        }
    }
}

/// Compiled form of a [`Signature`].
#[derive(Debug, Clone)]
pub struct Locator {
    signature: Signature,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Block { selector: Selector, capture: Capture },
    Anchored { pattern: Regex },
}

impl Locator {
    pub fn new(signature: Signature) -> Result<Self, LocateError> {
        let matcher = match &signature {
            Signature::Block {
                tag,
                attributes,
                capture,
            } => {
                if tag.trim().is_empty() {
                    return Err(LocateError::EmptyTag);
                }
                let css = css_selector(tag, attributes);
                let selector =
                    Selector::parse(&css).map_err(|error| LocateError::InvalidSelector {
                        selector: css.clone(),
                        reason: error.to_string(),
                    })?;
                Matcher::Block {
                    selector,
                    capture: *capture,
                }
            }
            Signature::Anchored { anchor, terminator } => {
                if anchor.is_empty() {
                    return Err(LocateError::EmptyAnchor);
                }
                // Validate the terminator on its own so the error names the user's pattern.
                Regex::new(terminator).map_err(|error| LocateError::InvalidTerminator {
                    pattern: terminator.clone(),
                    reason: error.to_string(),
                })?;
                let pattern = Regex::new(&format!(
                    "(?s){}(.*?)(?:{})",
                    regex::escape(anchor),
                    terminator
                ))
                .map_err(|error| LocateError::InvalidTerminator {
                    pattern: terminator.clone(),
                    reason: error.to_string(),
                })?;
                Matcher::Anchored { pattern }
            }
        };

        Ok(Self { signature, matcher })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Every match in document order, each tagged with `format`.
    pub fn locate(&self, document: &RawDocument, format: &FormatTag) -> Vec<Candidate> {
        let texts = match &self.matcher {
            Matcher::Block { selector, capture } => {
                let html = Html::parse_document(document.text());
                html.select(selector)
                    .map(|element| match capture {
                        Capture::Text => element.text().collect::<String>(),
                        Capture::Html => element.html(),
                    })
                    .collect::<Vec<_>>()
            }
            Matcher::Anchored { pattern } => pattern
                .captures_iter(document.text())
                .filter_map(|captures| captures.get(1))
                .map(|fragment| fragment.as_str().to_owned())
                .collect::<Vec<_>>(),
        };

        texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Candidate::new(index, format.clone(), text))
            .collect()
    }
}

fn css_selector(tag: &str, attributes: &BTreeMap<String, String>) -> String {
    let mut css = tag.trim().to_owned();
    for (name, value) in attributes {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        css.push_str(&format!("[{name}=\"{escaped}\"]"));
    }
    css
}
