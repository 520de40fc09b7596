use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use super::{Decoder, FormatTag};
use crate::locator::Candidate;
use crate::{DecodeError, RawRecord, RawValue};

/// Parameters for [`HtmlTableDecoder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HtmlTableParams {
    /// Record keys by column position. When empty, header cell text is used.
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Rendered `<table>` markup, one record per body row.
///
/// Cell text is trimmed and kept as strings; the normalizer does the numeric and date
/// coercion like for any other source.
#[derive(Debug, Clone, Default)]
pub struct HtmlTableDecoder {
    params: HtmlTableParams,
}

impl HtmlTableDecoder {
    pub fn new(params: HtmlTableParams) -> Self {
        Self { params }
    }
}

impl Decoder for HtmlTableDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::html_table()
    }

    fn accepts(&self, candidate: &Candidate) -> bool {
        candidate.format == self.format() && candidate.text.trim_start().starts_with("<table")
    }

    fn decode(&self, candidate: &Candidate) -> Result<Vec<RawRecord>, DecodeError> {
        let fragment = Html::parse_fragment(&candidate.text);
        let rows = selector("tr")?;
        let headers = selector("th")?;
        let cells = selector("td")?;

        let mut columns = self.params.columns.clone();
        let mut records = Vec::new();

        for row in fragment.select(&rows) {
            let values = row.select(&cells).map(cell_text).collect::<Vec<_>>();
            if values.is_empty() {
                if columns.is_empty() {
                    columns = row.select(&headers).map(cell_text).collect();
                }
                continue;
            }

            if columns.is_empty() {
                return Err(DecodeError::UnexpectedShape {
                    path: "thead".to_owned(),
                    expected: "a header row or configured columns",
                });
            }

            let mut record = RawRecord::default();
            for (name, value) in columns.iter().zip(values) {
                record.insert(name.clone(), RawValue::String(value));
            }
            records.push(record);
        }

        Ok(records)
    }
}

fn selector(css: &str) -> Result<Selector, DecodeError> {
    Selector::parse(css).map_err(|error| DecodeError::Markup {
        reason: format!("selector '{css}': {error}"),
    })
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"<table class="stats-table">
        <thead><tr><th>Date</th><th>BTC</th><th>Price</th></tr></thead>
        <tbody>
            <tr><td><span>03/01/2024</span></td><td><span>1,200</span></td><td>$61,000</td></tr>
            <tr><td><span>03/08/2024</span></td><td><span> 350 </span></td><td>$66,250.50</td></tr>
        </tbody>
    </table>"#;

    fn candidate(text: &str) -> Candidate {
        Candidate::new(0, FormatTag::html_table(), text)
    }

    #[test]
    fn uses_header_text_as_keys() {
        let records = HtmlTableDecoder::default()
            .decode(&candidate(TABLE))
            .expect("decodes");

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].get("Date"),
            Some(&RawValue::String("03/01/2024".to_owned()))
        );
        assert_eq!(
            records[1].get("BTC"),
            Some(&RawValue::String("350".to_owned()))
        );
    }

    #[test]
    fn configured_columns_override_headers() {
        let decoder = HtmlTableDecoder::new(HtmlTableParams {
            columns: vec!["date".to_owned(), "btc".to_owned(), "price".to_owned()],
        });

        let records = decoder.decode(&candidate(TABLE)).expect("decodes");

        assert_eq!(
            records[1].get("price"),
            Some(&RawValue::String("$66,250.50".to_owned()))
        );
    }

    #[test]
    fn headerless_table_without_columns_is_rejected() {
        let err = HtmlTableDecoder::default()
            .decode(&candidate("<table><tr><td>1</td></tr></table>"))
            .expect_err("must fail");
        assert!(matches!(err, DecodeError::UnexpectedShape { .. }));
    }

    #[test]
    fn accepts_table_markup_only() {
        let decoder = HtmlTableDecoder::default();
        assert!(decoder.accepts(&candidate(TABLE)));
        assert!(!decoder.accepts(&candidate("{\"rows\": []}")));
    }
}
