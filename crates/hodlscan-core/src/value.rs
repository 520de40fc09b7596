//! Loosely-typed decoder output.
//!
//! Every decoder, whatever its wire format, produces [`RawValue`] trees so the normalizer
//! has a single shape to coerce from. Values that plain JSON cannot carry (dates, `NaN`,
//! big integers, `undefined`) have their own variants and are never left as strings.

use std::collections::BTreeMap;

use serde_json::Value;
use time::OffsetDateTime;

use crate::DecodeError;

/// Decoded value prior to normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(String),
    String(String),
    Date(OffsetDateTime),
    RegExp { source: String, flags: String },
    Array(Vec<RawValue>),
    Set(Vec<RawValue>),
    Map(Vec<(RawValue, RawValue)>),
    Object(BTreeMap<String, RawValue>),
}

impl RawValue {
    /// `true` for `null` and `undefined`, which field lookups treat as absent.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::BigInt(_) => "bigint",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::RegExp { .. } => "regexp",
            Self::Array(_) => "array",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
        }
    }

    /// Resolves an RFC 6901 JSON pointer. The empty pointer returns `self`.
    pub fn pointer(&self, pointer: &str) -> Option<&RawValue> {
        if pointer.is_empty() {
            return Some(self);
        }
        let rest = pointer.strip_prefix('/')?;

        rest.split('/')
            .map(unescape_token)
            .try_fold(self, |current, token| match current {
                Self::Object(fields) => fields.get(&token),
                Self::Array(items) | Self::Set(items) => {
                    token.parse::<usize>().ok().and_then(|index| items.get(index))
                }
                Self::Map(entries) => entries.iter().find_map(|(key, value)| match key {
                    Self::String(key) if *key == token => Some(value),
                    _ => None,
                }),
                _ => None,
            })
    }

    /// Short human-readable rendering used in rejection diagnostics.
    pub fn preview(&self) -> String {
        match self {
            Self::String(value) => value.clone(),
            Self::Number(value) => value.to_string(),
            Self::BigInt(value) => format!("{value}n"),
            Self::Bool(value) => value.to_string(),
            Self::Date(value) => value.to_string(),
            other => format!("<{}>", other.kind()),
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Bool(value),
            Value::Number(number) => match number.as_f64() {
                Some(value) => Self::Number(value),
                None => Self::BigInt(number.to_string()),
            },
            Value::String(value) => Self::String(value),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(fields) => Self::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

/// One source-shaped record: field names and types are whatever the page used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new(fields: BTreeMap<String, RawValue>) -> Self {
        Self { fields }
    }

    /// Wraps an object value; any other shape is reported against `path`.
    pub fn from_value(value: RawValue, path: &str) -> Result<Self, DecodeError> {
        match value {
            RawValue::Object(fields) => Ok(Self { fields }),
            _ => Err(DecodeError::UnexpectedShape {
                path: path.to_owned(),
                expected: "an object",
            }),
        }
    }

    /// Looks up a plain key, or a JSON pointer when `key` starts with `/`.
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        if key.starts_with('/') {
            let (head, tail) = split_pointer(key);
            return self.fields.get(&head)?.pointer(tail);
        }
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: RawValue) {
        self.fields.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Resolves `pointer` in `root` and expects an array of objects there.
pub(crate) fn records_at(root: &RawValue, pointer: &str) -> Result<Vec<RawRecord>, DecodeError> {
    let target = root.pointer(pointer).ok_or_else(|| DecodeError::MissingPath {
        path: pointer.to_owned(),
    })?;

    let RawValue::Array(items) = target else {
        return Err(DecodeError::UnexpectedShape {
            path: pointer.to_owned(),
            expected: "an array of records",
        });
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| RawRecord::from_value(item.clone(), &format!("{pointer}/{index}")))
        .collect()
}

/// Applies `unwrap` steps: each pointer is resolved and a string found there is parsed as JSON.
pub(crate) fn unwrap_json(mut current: Value, steps: &[String]) -> Result<Value, DecodeError> {
    for step in steps {
        let next = current
            .pointer_mut(step)
            .map(Value::take)
            .ok_or_else(|| DecodeError::MissingPath { path: step.clone() })?;

        current = match next {
            Value::String(text) => serde_json::from_str(&text)?,
            other => other,
        };
    }
    Ok(current)
}

fn split_pointer(pointer: &str) -> (String, &str) {
    let body = &pointer[1..];
    match body.find('/') {
        Some(end) => (unescape_token(&body[..end]), &body[end..]),
        None => (unescape_token(body), ""),
    }
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}
