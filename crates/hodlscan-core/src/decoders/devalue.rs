//! Rich serialization: the devalue flat format used by SvelteKit-style pages.
//!
//! The payload is a JSON array. Element 0 is the root; objects and arrays hold indices into
//! the same array instead of nested values; negative indices are constants that JSON can't
//! express. Typed entries are arrays whose first element is a type name:
//!
//! ```text
//! [{"balances":1},[2],{"date":3,"btcDelta":4},["Date","2024-03-01T00:00:00.000Z"],12.5]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::{looks_like_json, parse_json, Decoder, FormatTag};
use crate::locator::Candidate;
use crate::value::{records_at, unwrap_json};
use crate::{DecodeError, RawRecord, RawValue};

const UNDEFINED: i64 = -1;
const HOLE: i64 = -2;
const NAN: i64 = -3;
const POSITIVE_INFINITY: i64 = -4;
const NEGATIVE_INFINITY: i64 = -5;
const NEGATIVE_ZERO: i64 = -6;

/// Reference nesting allowed while hydrating, matching serde_json's own recursion limit.
pub const MAX_DEPTH: usize = 128;
/// Values a hydrated tree may hold once shared references are expanded.
pub const MAX_NODES: usize = 1_000_000;

/// Parameters for [`RichDecoder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RichParams {
    /// Pointers through the JSON envelope to the flattened payload, applied in order.
    #[serde(default)]
    pub unwrap: Vec<String>,
    /// Pointer to the record array inside the reconstructed payload.
    #[serde(default)]
    pub records: String,
}

/// JSON envelope around a devalue payload.
#[derive(Debug, Clone)]
pub struct RichDecoder {
    params: RichParams,
}

impl RichDecoder {
    pub fn new(params: RichParams) -> Self {
        Self { params }
    }
}

impl Decoder for RichDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::rich()
    }

    fn accepts(&self, candidate: &Candidate) -> bool {
        candidate.format == self.format() && looks_like_json(&candidate.text)
    }

    fn decode(&self, candidate: &Candidate) -> Result<Vec<RawRecord>, DecodeError> {
        let envelope = parse_json(&candidate.text)?;
        let flattened = unwrap_json(envelope, &self.params.unwrap)?;
        let root = unflatten(&flattened)?;
        records_at(&root, &self.params.records)
    }
}

/// Rebuilds a value tree from a parsed devalue payload.
pub fn unflatten(payload: &Value) -> Result<RawValue, DecodeError> {
    match payload {
        Value::Number(number) => {
            let constant = number
                .as_i64()
                .ok_or_else(|| malformed("bare number is not a constant"))?;
            constant_value(constant)
        }
        Value::Array(values) if !values.is_empty() => Hydrator::new(values).hydrate(0),
        _ => Err(malformed("payload must be a non-empty array")),
    }
}

struct Hydrator<'a> {
    values: &'a [Value],
    /// Finished slots with the node count of their subtree.
    hydrated: Vec<Option<(RawValue, usize)>>,
    in_progress: Vec<bool>,
    depth: usize,
    nodes: usize,
}

impl<'a> Hydrator<'a> {
    fn new(values: &'a [Value]) -> Self {
        Self {
            values,
            hydrated: vec![None; values.len()],
            in_progress: vec![false; values.len()],
            depth: 0,
            nodes: 0,
        }
    }

    fn count(&mut self, nodes: usize) -> Result<(), DecodeError> {
        self.nodes = self.nodes.saturating_add(nodes);
        if self.nodes > MAX_NODES {
            return Err(DecodeError::RichPayloadTooLarge { limit: MAX_NODES });
        }
        Ok(())
    }

    fn hydrate(&mut self, index: i64) -> Result<RawValue, DecodeError> {
        if index < 0 {
            return constant_value(index);
        }

        let slot = usize::try_from(index)
            .ok()
            .filter(|slot| *slot < self.values.len())
            .ok_or(DecodeError::IndexOutOfRange {
                index,
                len: self.values.len(),
            })?;

        // Shared references expand into copies; count them before cloning.
        if let Some(size) = self.hydrated[slot].as_ref().map(|(_, size)| *size) {
            self.count(size)?;
        }
        if let Some((done, _)) = &self.hydrated[slot] {
            return Ok(done.clone());
        }
        if self.in_progress[slot] {
            return Err(DecodeError::CyclicReference { index: slot });
        }
        if self.depth >= MAX_DEPTH {
            return Err(DecodeError::RichPayloadTooDeep { limit: MAX_DEPTH });
        }

        let before = self.nodes;
        self.count(1)?;
        self.in_progress[slot] = true;
        self.depth += 1;
        let value = self.hydrate_slot(slot)?;
        self.depth -= 1;
        self.in_progress[slot] = false;
        self.hydrated[slot] = Some((value.clone(), self.nodes - before));
        Ok(value)
    }

    fn hydrate_slot(&mut self, slot: usize) -> Result<RawValue, DecodeError> {
        let values = self.values;
        match &values[slot] {
            Value::Null => Ok(RawValue::Null),
            Value::Bool(value) => Ok(RawValue::Bool(*value)),
            Value::Number(number) => Ok(number
                .as_f64()
                .map(RawValue::Number)
                .unwrap_or_else(|| RawValue::BigInt(number.to_string()))),
            Value::String(value) => Ok(RawValue::String(value.clone())),
            Value::Array(items) => match items.first() {
                Some(Value::String(tag)) => self.hydrate_typed(tag, &items[1..]),
                _ => items
                    .iter()
                    .map(|item| -> Result<RawValue, DecodeError> {
                        let index = reference(item)?;
                        if index == HOLE {
                            Ok(RawValue::Undefined)
                        } else {
                            self.hydrate(index)
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(RawValue::Array),
            },
            Value::Object(fields) => fields
                .iter()
                .map(|(key, item)| -> Result<(String, RawValue), DecodeError> {
                    Ok((key.clone(), self.hydrate(reference(item)?)?))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(RawValue::Object),
        }
    }

    fn hydrate_typed(&mut self, tag: &str, args: &[Value]) -> Result<RawValue, DecodeError> {
        match tag {
            "Date" => {
                let text = string_arg(args, tag)?;
                OffsetDateTime::parse(text, &Rfc3339)
                    .map(RawValue::Date)
                    .map_err(|_| DecodeError::InvalidRichDate {
                        value: text.to_owned(),
                    })
            }
            "BigInt" => Ok(RawValue::BigInt(string_arg(args, tag)?.to_owned())),
            "URL" | "URLSearchParams" => Ok(RawValue::String(string_arg(args, tag)?.to_owned())),
            "RegExp" => Ok(RawValue::RegExp {
                source: string_arg(args, tag)?.to_owned(),
                flags: args
                    .get(1)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            }),
            // Boxed primitive: the argument is the literal value, not an index.
            "Object" => args
                .first()
                .cloned()
                .map(RawValue::from)
                .ok_or_else(|| malformed("boxed Object entry has no value")),
            "Set" => args
                .iter()
                .map(|item| -> Result<RawValue, DecodeError> {
                    self.hydrate(reference(item)?)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(RawValue::Set),
            "Map" => {
                let pairs = pairs(args, tag)?;
                pairs
                    .into_iter()
                    .map(|(key, value)| -> Result<(RawValue, RawValue), DecodeError> {
                        Ok((self.hydrate(key)?, self.hydrate(value)?))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(RawValue::Map)
            }
            // Object created without a prototype: alternating key / value-index pairs.
            "null" => {
                let mut fields = BTreeMap::new();
                for chunk in args.chunks(2) {
                    let [key, value] = chunk else {
                        return Err(malformed("null-prototype entry has an odd argument count"));
                    };
                    let key = key
                        .as_str()
                        .ok_or_else(|| malformed("null-prototype key is not a string"))?;
                    fields.insert(key.to_owned(), self.hydrate(reference(value)?)?);
                }
                Ok(RawValue::Object(fields))
            }
            other => Err(DecodeError::UnknownTypeTag {
                tag: other.to_owned(),
            }),
        }
    }
}

fn constant_value(constant: i64) -> Result<RawValue, DecodeError> {
    match constant {
        UNDEFINED | HOLE => Ok(RawValue::Undefined),
        NAN => Ok(RawValue::Number(f64::NAN)),
        POSITIVE_INFINITY => Ok(RawValue::Number(f64::INFINITY)),
        NEGATIVE_INFINITY => Ok(RawValue::Number(f64::NEG_INFINITY)),
        NEGATIVE_ZERO => Ok(RawValue::Number(-0.0)),
        other => Err(malformed(&format!("unknown constant {other}"))),
    }
}

fn reference(value: &Value) -> Result<i64, DecodeError> {
    value
        .as_i64()
        .ok_or_else(|| malformed(&format!("expected an index, found {value}")))
}

fn string_arg<'v>(args: &'v [Value], tag: &str) -> Result<&'v str, DecodeError> {
    args.first()
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(&format!("{tag} entry is missing its string argument")))
}

fn pairs(args: &[Value], tag: &str) -> Result<Vec<(i64, i64)>, DecodeError> {
    if args.len() % 2 != 0 {
        return Err(malformed(&format!("{tag} entry has an odd argument count")));
    }
    args.chunks(2)
        .map(|pair| -> Result<(i64, i64), DecodeError> {
            Ok((reference(&pair[0])?, reference(&pair[1])?))
        })
        .collect()
}

fn malformed(reason: &str) -> DecodeError {
    DecodeError::MalformedRichPayload {
        reason: reason.to_owned(),
    }
}
