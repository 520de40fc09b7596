//! Source-shaped records to canonical [`PurchaseRecord`]s.
//!
//! A record is normalized completely or not at all: a missing field or a failed coercion
//! rejects the whole record. `total_cost_usd` is always recomputed, so any cost column the
//! source carries is ignored.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::domain::iso_date;
use crate::{PurchaseRecord, RawRecord, RawValue, ValidationError};

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₿', '¢', '₹', '₩'];
const CURRENCY_CODES: &[&str] = &["USD", "BTC", "US"];

/// One or more source keys for a canonical field; the first present, non-null key wins.
///
/// Keys starting with `/` are JSON pointers into the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "KeysRepr", into = "KeysRepr")]
pub struct FieldKeys(Vec<String>);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum KeysRepr {
    One(String),
    Many(Vec<String>),
}

impl From<KeysRepr> for FieldKeys {
    fn from(value: KeysRepr) -> Self {
        match value {
            KeysRepr::One(key) => Self(vec![key]),
            KeysRepr::Many(keys) => Self(keys),
        }
    }
}

impl From<FieldKeys> for KeysRepr {
    fn from(value: FieldKeys) -> Self {
        match <[String; 1]>::try_from(value.0) {
            Ok([key]) => Self::One(key),
            Err(keys) => Self::Many(keys),
        }
    }
}

impl FieldKeys {
    pub fn new<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        Self(keys.into_iter().map(str::to_owned).collect())
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn lookup<'r>(&self, record: &'r RawRecord) -> Option<&'r RawValue> {
        self.0
            .iter()
            .filter_map(|key| record.get(key))
            .find(|value| !value.is_nullish())
    }
}

impl From<&str> for FieldKeys {
    fn from(key: &str) -> Self {
        Self(vec![key.to_owned()])
    }
}

/// Where each canonical field lives in a source's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldMap {
    pub date: FieldKeys,
    pub btc_amount: FieldKeys,
    pub avg_price_usd: FieldKeys,
}

impl FieldMap {
    pub fn new(
        date: impl Into<FieldKeys>,
        btc_amount: impl Into<FieldKeys>,
        avg_price_usd: impl Into<FieldKeys>,
    ) -> Self {
        Self {
            date: date.into(),
            btc_amount: btc_amount.into(),
            avg_price_usd: avg_price_usd.into(),
        }
    }

    /// Name of the first canonical field with no keys, if any.
    pub fn first_empty(&self) -> Option<&'static str> {
        [
            ("date", &self.date),
            ("btc_amount", &self.btc_amount),
            ("avg_price_usd", &self.avg_price_usd),
        ]
        .into_iter()
        .find(|(_, keys)| keys.is_empty())
        .map(|(field, _)| field)
    }
}

/// Maps raw records onto the canonical shape for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    fields: FieldMap,
}

impl Normalizer {
    pub fn new(fields: FieldMap) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn normalize(&self, record: &RawRecord) -> Result<PurchaseRecord, ValidationError> {
        let date = coerce_date("date", required(record, "date", &self.fields.date)?)?;
        let btc_amount = coerce_number(
            "btc_amount",
            required(record, "btc_amount", &self.fields.btc_amount)?,
        )?;
        let avg_price_usd = coerce_number(
            "avg_price_usd",
            required(record, "avg_price_usd", &self.fields.avg_price_usd)?,
        )?;

        PurchaseRecord::new(date, btc_amount, avg_price_usd)
    }
}

fn required<'r>(
    record: &'r RawRecord,
    field: &'static str,
    keys: &FieldKeys,
) -> Result<&'r RawValue, ValidationError> {
    keys.lookup(record)
        .ok_or_else(|| ValidationError::MissingField {
            field,
            keys: keys.keys().to_vec(),
        })
}

/// Coerces numbers, numeric strings with currency formatting, and big integers to `f64`.
pub fn coerce_number(field: &'static str, value: &RawValue) -> Result<f64, ValidationError> {
    let number = match value {
        RawValue::Number(number) => *number,
        RawValue::String(text) | RawValue::BigInt(text) => parse_numeric_text(field, text)?,
        other => {
            return Err(ValidationError::NotNumeric {
                field,
                value: other.preview(),
            })
        }
    };

    if !number.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(number)
}

/// Strips whitespace, thousands separators, currency symbols and codes, then parses.
pub fn parse_numeric_text(field: &'static str, text: &str) -> Result<f64, ValidationError> {
    let not_numeric = || ValidationError::NotNumeric {
        field,
        value: text.to_owned(),
    };

    let mut residual = text
        .chars()
        .filter(|ch| !ch.is_whitespace() && !matches!(ch, ',' | '_'))
        .filter(|ch| !CURRENCY_SYMBOLS.contains(ch))
        .collect::<String>();

    for code in CURRENCY_CODES {
        if let Some(rest) = strip_prefix_ignore_case(&residual, code) {
            residual = rest.to_owned();
        }
        if let Some(rest) = strip_suffix_ignore_case(&residual, code) {
            residual = rest.to_owned();
        }
    }

    // A sign separated from the digits by a stripped symbol ("-$5") leaves "-5", which parses.
    let is_plain_number = !residual.is_empty()
        && residual
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'));
    if !is_plain_number {
        return Err(not_numeric());
    }

    residual.parse::<f64>().map_err(|_| not_numeric())
}

/// Coerces real dates, ISO/RFC 3339 strings, US `M/D/YYYY` strings and epoch milliseconds
/// to a UTC calendar date.
pub fn coerce_date(field: &'static str, value: &RawValue) -> Result<Date, ValidationError> {
    let invalid = || ValidationError::InvalidDate {
        field,
        value: value.preview(),
    };

    let date = match value {
        RawValue::Date(datetime) => datetime.to_offset(UtcOffset::UTC).date(),
        RawValue::String(text) => parse_date_text(text.trim()).ok_or_else(invalid)?,
        RawValue::Number(millis) if millis.is_finite() => {
            let nanos = (*millis as i128).checked_mul(1_000_000).ok_or_else(invalid)?;
            OffsetDateTime::from_unix_timestamp_nanos(nanos)
                .map(OffsetDateTime::date)
                .map_err(|_| invalid())?
        }
        _ => return Err(invalid()),
    };

    // Canonical dates are always four-digit `YYYY-MM-DD`.
    if !(0..=9999).contains(&date.year()) {
        return Err(invalid());
    }
    Ok(date)
}

fn parse_date_text(text: &str) -> Option<Date> {
    if let Ok(datetime) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(datetime.to_offset(UtcOffset::UTC).date());
    }
    if let Ok(date) = Date::parse(text, iso_date::FORMAT) {
        return Some(date);
    }
    if let Some(date) = parse_naive_datetime(text) {
        return Some(date);
    }
    parse_us_date(text)
}

fn parse_naive_datetime(text: &str) -> Option<Date> {
    let seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let fractional =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    let normalized = text.replacen(' ', "T", 1);

    PrimitiveDateTime::parse(&normalized, seconds)
        .or_else(|_| PrimitiveDateTime::parse(&normalized, fractional))
        .ok()
        .map(PrimitiveDateTime::date)
}

fn parse_us_date(text: &str) -> Option<Date> {
    let mut parts = text.split('/');
    let (month, day, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    Date::from_calendar_date(year.parse().ok()?, month, day.parse().ok()?).ok()
}

fn strip_prefix_ignore_case<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

fn strip_suffix_ignore_case<'t>(text: &'t str, suffix: &str) -> Option<&'t str> {
    let split = text.len().checked_sub(suffix.len())?;
    let tail = text.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &text[..split])
}
