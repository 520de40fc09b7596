use serde::{Deserialize, Serialize};

use super::{looks_like_json, parse_json, Decoder, FormatTag};
use crate::locator::Candidate;
use crate::value::{records_at, unwrap_json};
use crate::{DecodeError, RawRecord, RawValue};

/// Parameters for [`PlainJsonDecoder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlainJsonParams {
    /// Pointers whose string values are themselves JSON, applied in order.
    #[serde(default)]
    pub unwrap: Vec<String>,
    /// Pointer to the record array once unwrapped. Empty means the root.
    #[serde(default)]
    pub records: String,
}

/// Standard JSON payload, e.g. a Next.js `__NEXT_DATA__` block.
#[derive(Debug, Clone)]
pub struct PlainJsonDecoder {
    params: PlainJsonParams,
}

impl PlainJsonDecoder {
    pub fn new(params: PlainJsonParams) -> Self {
        Self { params }
    }

    pub fn at(records: &str) -> Self {
        Self::new(PlainJsonParams {
            unwrap: Vec::new(),
            records: records.to_owned(),
        })
    }
}

impl Decoder for PlainJsonDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::plain_json()
    }

    fn accepts(&self, candidate: &Candidate) -> bool {
        candidate.format == self.format() && looks_like_json(&candidate.text)
    }

    fn decode(&self, candidate: &Candidate) -> Result<Vec<RawRecord>, DecodeError> {
        let parsed = parse_json(&candidate.text)?;
        let payload = unwrap_json(parsed, &self.params.unwrap)?;
        records_at(&RawValue::from(payload), &self.params.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str) -> Candidate {
        Candidate::new(0, FormatTag::plain_json(), text)
    }

    #[test]
    fn decodes_next_data_records() {
        let decoder = PlainJsonDecoder::at("/props/pageProps/bitcoinData");
        let text = r#"{"props":{"pageProps":{"bitcoinData":[
            {"date_of_purchase":"2024-03-01","count":100,"purchase_price":"61,000"},
            {"date_of_purchase":"2024-03-05","count":25,"purchase_price":"66,500"}
        ]}}}"#;

        let records = decoder.decode(&candidate(text)).expect("decodes");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("count"), Some(&RawValue::Number(100.0)));
        assert_eq!(
            records[1].get("purchase_price"),
            Some(&RawValue::String("66,500".to_owned()))
        );
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let decoder = PlainJsonDecoder::at("");
        let err = decoder
            .decode(&candidate(r#"{"props": [1, 2"#))
            .expect_err("must fail");
        assert!(matches!(err, DecodeError::InvalidJson { .. }));
    }

    #[test]
    fn missing_records_path_is_a_decode_error() {
        let decoder = PlainJsonDecoder::at("/props/pageProps/bitcoinData");
        let err = decoder
            .decode(&candidate(r#"{"props":{"pageProps":{}}}"#))
            .expect_err("must fail");
        assert!(matches!(err, DecodeError::MissingPath { .. }));
    }

    #[test]
    fn accepts_only_json_looking_candidates_of_its_format() {
        let decoder = PlainJsonDecoder::at("");
        assert!(decoder.accepts(&candidate("  [1]")));
        assert!(!decoder.accepts(&candidate("window.x = 1")));
        assert!(!decoder.accepts(&Candidate::new(0, FormatTag::rich(), "[1]")));
    }

    #[test]
    fn empty_array_decodes_to_no_records() {
        let decoder = PlainJsonDecoder::at("/rows");
        let records = decoder.decode(&candidate(r#"{"rows":[]}"#)).expect("decodes");
        assert!(records.is_empty());
    }
}
