use std::io::Write;

use hodlscan_core::{AggregateResult, Envelope};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(
    out: &mut impl Write,
    envelope: &Envelope<Value>,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            writeln!(out, "{payload}")?;
        }
        OutputFormat::Table => render_table(out, envelope)?,
    }

    Ok(())
}

/// Bare source-to-records JSON, with no run metadata.
pub fn render_raw(
    out: &mut impl Write,
    aggregate: &AggregateResult,
    pretty: bool,
) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(aggregate)?
    } else {
        aggregate.to_json()?
    };
    writeln!(out, "{payload}")?;
    Ok(())
}

fn render_table(out: &mut impl Write, envelope: &Envelope<Value>) -> Result<(), CliError> {
    let meta = &envelope.meta;
    let generated_at = meta
        .generated_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| meta.generated_at.to_string());

    writeln!(out, "request_id  : {}", meta.request_id)?;
    writeln!(out, "schema      : {}", meta.schema_version)?;
    writeln!(out, "generated_at: {generated_at}")?;
    writeln!(
        out,
        "sources     : {}",
        meta.sources
            .iter()
            .map(|source| source.as_str())
            .collect::<Vec<_>>()
            .join(",")
    )?;
    writeln!(out, "latency_ms  : {}", meta.latency_ms)?;

    if !meta.warnings.is_empty() {
        writeln!(out, "warnings:")?;
        for warning in &meta.warnings {
            writeln!(out, "  - {warning}")?;
        }
    }

    writeln!(out, "data:")?;
    match &envelope.data {
        Value::Object(entries) => {
            for (key, value) in entries {
                render_entry(out, key, value)?;
            }
        }
        other => render_json_block(out, other, "  ")?,
    }

    if !envelope.errors.is_empty() {
        writeln!(out, "errors:")?;
        for error in &envelope.errors {
            match &error.source {
                Some(source) => writeln!(out, "  - {source}: {}: {}", error.code, error.message)?,
                None => writeln!(out, "  - {}: {}", error.code, error.message)?,
            }
        }
    }

    Ok(())
}

fn render_entry(out: &mut impl Write, key: &str, value: &Value) -> Result<(), CliError> {
    if let Some(rows) = record_rows(value) {
        writeln!(out, "  [{key}] {} record(s)", rows.len())?;
        if !rows.is_empty() {
            writeln!(
                out,
                "    {:<10}  {:>14}  {:>14}  {:>18}",
                "date", "btc_amount", "avg_price_usd", "total_cost_usd"
            )?;
        }
        for row in rows {
            writeln!(
                out,
                "    {:<10}  {:>14}  {:>14}  {:>18}",
                cell(row, "date"),
                cell(row, "btc_amount"),
                cell(row, "avg_price_usd"),
                cell(row, "total_cost_usd")
            )?;
        }
        return Ok(());
    }

    if let (Some(code), Some(reason)) = (
        value.get("code").and_then(Value::as_str),
        value.get("reason").and_then(Value::as_str),
    ) {
        writeln!(out, "  [{key}] failed ({code}): {reason}")?;
        return Ok(());
    }

    writeln!(out, "  [{key}]")?;
    render_json_block(out, value, "    ")
}

/// Rows when `value` is an array of canonical records.
fn record_rows(value: &Value) -> Option<&[Value]> {
    let rows = value.as_array()?;
    rows.iter()
        .all(|row| row.get("date").is_some() && row.get("btc_amount").is_some())
        .then_some(rows.as_slice())
}

fn cell(row: &Value, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn render_json_block(out: &mut impl Write, value: &Value, indent: &str) -> Result<(), CliError> {
    let pretty = serde_json::to_string_pretty(value)?;
    for line in pretty.lines() {
        writeln!(out, "{indent}{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hodlscan_core::{EnvelopeError, EnvelopeMeta, SourceName, SCHEMA_VERSION};
    use serde_json::json;

    fn envelope() -> Envelope<Value> {
        let mara = SourceName::parse("mara").expect("valid");
        let strategy = SourceName::parse("strategy").expect("valid");
        let meta = EnvelopeMeta::new(
            "request-12345",
            SCHEMA_VERSION,
            vec![strategy, mara.clone()],
            7,
        )
        .expect("meta");
        let data = json!({
            "strategy": [{
                "date": "2024-03-01",
                "btc_amount": 2.0,
                "avg_price_usd": 100.5,
                "total_cost_usd": 201.0
            }],
            "mara": {"reason": "no matching block found", "code": "no_match"}
        });
        let error = EnvelopeError::new("no_match", "no matching block found")
            .expect("error")
            .with_source(mara);
        Envelope::with_errors(meta, data, vec![error]).expect("envelope")
    }

    fn rendered(format: OutputFormat) -> String {
        let mut buffer = Vec::new();
        render(&mut buffer, &envelope(), format, false).expect("render");
        String::from_utf8(buffer).expect("utf8")
    }

    #[test]
    fn json_output_is_one_line() {
        let text = rendered(OutputFormat::Json);
        assert_eq!(text.lines().count(), 1);
        let parsed: Value = serde_json::from_str(&text).expect("json");
        assert_eq!(parsed["meta"]["schema_version"], "v1.0.0");
        assert_eq!(parsed["errors"][0]["source"], "mara");
    }

    #[test]
    fn table_lists_records_and_failures() {
        let text = rendered(OutputFormat::Table);
        assert!(text.contains("sources     : strategy,mara"));
        assert!(text.contains("[strategy] 1 record(s)"));
        assert!(text.contains("2024-03-01"));
        assert!(text.contains("[mara] failed (no_match): no matching block found"));
        assert!(text.contains("  - mara: no_match: no matching block found"));
    }

    #[test]
    fn raw_output_is_the_aggregate_only() {
        let mut buffer = Vec::new();
        render_raw(&mut buffer, &AggregateResult::default(), false).expect("render");
        assert_eq!(String::from_utf8(buffer).expect("utf8"), "{}\n");
    }
}
