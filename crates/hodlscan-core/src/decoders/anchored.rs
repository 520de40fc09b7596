use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Decoder, FormatTag};
use crate::locator::Candidate;
use crate::{DecodeError, RawRecord, RawValue};

/// Parameters for [`AnchoredArrayDecoder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnchoredArrayParams {
    /// Field names for positional elements when the array holds tuples such as
    /// `[timestamp, amount, price]` rather than objects.
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Array body captured between an anchor and its terminator.
///
/// The located fragment is the inside of a JS array literal, so it is wrapped in brackets
/// before parsing. Anything that is not strict JSON once wrapped (unquoted keys, trailing
/// commas, function calls) is a [`DecodeError`].
#[derive(Debug, Clone, Default)]
pub struct AnchoredArrayDecoder {
    params: AnchoredArrayParams,
}

impl AnchoredArrayDecoder {
    pub fn new(params: AnchoredArrayParams) -> Self {
        Self { params }
    }

    pub fn with_columns<'a>(columns: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(AnchoredArrayParams {
            columns: columns.into_iter().map(str::to_owned).collect(),
        })
    }

    fn record_from(&self, index: usize, item: Value) -> Result<RawRecord, DecodeError> {
        match item {
            Value::Object(_) => RawRecord::from_value(RawValue::from(item), &format!("/{index}")),
            Value::Array(cells) if !self.params.columns.is_empty() => {
                let mut record = RawRecord::default();
                for (name, cell) in self.params.columns.iter().zip(cells) {
                    record.insert(name.clone(), RawValue::from(cell));
                }
                Ok(record)
            }
            _ => Err(DecodeError::UnexpectedShape {
                path: format!("/{index}"),
                expected: if self.params.columns.is_empty() {
                    "an object"
                } else {
                    "an object or a tuple"
                },
            }),
        }
    }
}

impl Decoder for AnchoredArrayDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::anchored_array()
    }

    fn decode(&self, candidate: &Candidate) -> Result<Vec<RawRecord>, DecodeError> {
        let wrapped = format!("[{}]", candidate.text);
        let Value::Array(items) = serde_json::from_str::<Value>(&wrapped)? else {
            return Err(DecodeError::UnexpectedShape {
                path: String::new(),
                expected: "an array",
            });
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| self.record_from(index, item))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str) -> Candidate {
        Candidate::new(0, FormatTag::anchored_array(), text)
    }

    #[test]
    fn wraps_object_fragment() {
        let decoder = AnchoredArrayDecoder::default();
        let records = decoder
            .decode(&candidate(r#"{"date":"2024-01-02","btc":1.5},{"date":"2024-01-09","btc":2}"#))
            .expect("decodes");

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("btc"), Some(&RawValue::Number(2.0)));
    }

    #[test]
    fn maps_tuples_through_columns() {
        let decoder = AnchoredArrayDecoder::with_columns(["date", "btc", "price"]);
        let records = decoder
            .decode(&candidate("[1709251200000, 3, 61000.5], [1709337600000, 1, 62000]"))
            .expect("decodes");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("date"), Some(&RawValue::Number(1_709_251_200_000.0)));
        assert_eq!(records[0].get("price"), Some(&RawValue::Number(61_000.5)));
    }

    #[test]
    fn tuples_without_columns_are_rejected() {
        let decoder = AnchoredArrayDecoder::default();
        let err = decoder.decode(&candidate("[1, 2]")).expect_err("must fail");
        assert!(matches!(err, DecodeError::UnexpectedShape { .. }));
    }

    #[test]
    fn javascript_literals_are_a_decode_error() {
        let decoder = AnchoredArrayDecoder::default();
        let err = decoder
            .decode(&candidate("{date: '2024-01-02', btc: 1}"))
            .expect_err("must fail");
        assert!(matches!(err, DecodeError::InvalidJson { .. }));
    }

    #[test]
    fn empty_fragment_is_an_empty_array() {
        let decoder = AnchoredArrayDecoder::default();
        assert!(decoder.decode(&candidate("  ")).expect("decodes").is_empty());
    }
}
