use std::sync::Arc;

use hodlscan_core::decoders::{
    AnchoredArrayDecoder, HtmlTableDecoder, PlainJsonDecoder, RichDecoder, RichParams,
};
use hodlscan_core::{Candidate, DecodeError, Decoder, DecoderRegistry, DecoderSpec, FormatTag};

#[derive(Clone)]
struct DecoderCase {
    format: FormatTag,
    decoder: Arc<dyn Decoder>,
    well_formed: &'static str,
    expected_records: usize,
    malformed: &'static str,
}

fn decoder_cases() -> Vec<DecoderCase> {
    vec![
        DecoderCase {
            format: FormatTag::plain_json(),
            decoder: Arc::new(PlainJsonDecoder::at("/rows")),
            well_formed: r#"{"rows":[{"date":"2024-03-01","btc":1},{"date":"2024-03-02","btc":2}]}"#,
            expected_records: 2,
            malformed: r#"{"rows":[{"date":"2024-03-01",]}"#,
        },
        DecoderCase {
            format: FormatTag::rich(),
            decoder: Arc::new(RichDecoder::new(RichParams {
                unwrap: vec!["/data".to_owned()],
                records: "/balances".to_owned(),
            })),
            well_formed: r#"{"data":[{"balances":1},[2],{"date":3,"btcDelta":4},["Date","2024-03-01T00:00:00.000Z"],1.5]}"#,
            expected_records: 1,
            malformed: r#"{"data":[{"balances":9}]}"#,
        },
        DecoderCase {
            format: FormatTag::anchored_array(),
            decoder: Arc::new(AnchoredArrayDecoder::default()),
            well_formed: r#"{"date":"2024-03-01","btc":1},{"date":"2024-03-02","btc":2},{"date":"2024-03-03","btc":3}"#,
            expected_records: 3,
            malformed: r#"{date:"2024-03-01",btc:1}"#,
        },
        DecoderCase {
            format: FormatTag::html_table(),
            decoder: Arc::new(HtmlTableDecoder::default()),
            well_formed: "<table><tr><th>date</th><th>btc</th></tr><tr><td>2024-03-01</td><td>1</td></tr></table>",
            expected_records: 1,
            malformed: "<table><tr><td>2024-03-01</td><td>1</td></tr></table>",
        },
    ]
}

#[test]
fn decoders_claim_their_format() {
    for case in decoder_cases() {
        assert_eq!(case.decoder.format(), case.format, "decoder '{}'", case.format);
    }
}

#[test]
fn well_formed_candidates_decode_for_all_decoders() {
    for case in decoder_cases() {
        let candidate = Candidate::new(0, case.format.clone(), case.well_formed);
        assert!(
            case.decoder.accepts(&candidate),
            "decoder '{}': accepts well-formed candidate",
            case.format
        );

        let records = case
            .decoder
            .decode(&candidate)
            .unwrap_or_else(|error| panic!("decoder '{}' failed: {error}", case.format));
        assert_eq!(
            records.len(),
            case.expected_records,
            "decoder '{}': record count",
            case.format
        );
        assert!(
            records.iter().all(|record| record.get("date").is_some()),
            "decoder '{}': every record keeps its date field",
            case.format
        );
    }
}

#[test]
fn malformed_candidates_fail_with_decode_error_for_all_decoders() {
    for case in decoder_cases() {
        let candidate = Candidate::new(0, case.format.clone(), case.malformed);
        let result: Result<_, DecodeError> = case.decoder.decode(&candidate);
        assert!(
            result.is_err(),
            "decoder '{}': malformed input must be a DecodeError",
            case.format
        );
    }
}

#[test]
fn decoders_ignore_candidates_tagged_for_other_formats() {
    let cases = decoder_cases();
    for case in &cases {
        for other in cases.iter().filter(|other| other.format != case.format) {
            let candidate = Candidate::new(0, other.format.clone(), case.well_formed);
            assert!(
                !case.decoder.accepts(&candidate),
                "decoder '{}' accepted a '{}' candidate",
                case.format,
                other.format
            );
        }
    }
}

#[test]
fn decoding_is_pure() {
    for case in decoder_cases() {
        let candidate = Candidate::new(0, case.format.clone(), case.well_formed);
        let first = case.decoder.decode(&candidate).expect("decodes");
        let second = case.decoder.decode(&candidate).expect("decodes");
        assert_eq!(first, second, "decoder '{}': repeated decode", case.format);
    }
}

#[test]
fn registry_builds_every_builtin_format_with_default_parameters() {
    let registry = DecoderRegistry::default();
    for case in decoder_cases() {
        let decoder = registry
            .build(&DecoderSpec::new(case.format.as_str()))
            .unwrap_or_else(|error| panic!("format '{}' did not build: {error}", case.format));
        assert_eq!(decoder.format(), case.format);
    }
}
