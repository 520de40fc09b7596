use serde::{Deserialize, Serialize};
use time::Date;

use crate::ValidationError;

/// Canonical bitcoin purchase record.
///
/// `total_cost_usd` is always derived from the other two numeric fields and is never taken
/// from a source page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordRepr")]
pub struct PurchaseRecord {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub btc_amount: f64,
    pub avg_price_usd: f64,
    pub total_cost_usd: f64,
}

impl PurchaseRecord {
    pub fn new(date: Date, btc_amount: f64, avg_price_usd: f64) -> Result<Self, ValidationError> {
        validate_finite("btc_amount", btc_amount)?;
        validate_non_negative("avg_price_usd", avg_price_usd)?;

        let total_cost_usd = btc_amount * avg_price_usd;
        validate_finite("total_cost_usd", total_cost_usd)?;

        Ok(Self {
            date,
            btc_amount,
            avg_price_usd,
            total_cost_usd,
        })
    }

    /// Calendar date as `YYYY-MM-DD`.
    pub fn iso_date(&self) -> String {
        iso_date::format(self.date)
    }
}

/// Wire form read back from JSON; any stored `total_cost_usd` is recomputed.
#[derive(Deserialize)]
struct RecordRepr {
    #[serde(with = "iso_date")]
    date: Date,
    btc_amount: f64,
    avg_price_usd: f64,
}

impl TryFrom<RecordRepr> for PurchaseRecord {
    type Error = ValidationError;

    fn try_from(repr: RecordRepr) -> Result<Self, Self::Error> {
        Self::new(repr.date, repr.btc_amount, repr.avg_price_usd)
    }
}

fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(())
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

/// Serde adapter writing `time::Date` as `YYYY-MM-DD`.
pub(crate) mod iso_date {
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::BorrowedFormatItem;
    use time::macros::format_description;
    use time::Date;

    pub(crate) const FORMAT: &[BorrowedFormatItem<'static>] =
        format_description!("[year]-[month]-[day]");

    pub(crate) fn format(date: Date) -> String {
        // Four-digit years always fit the description.
        date.format(FORMAT).unwrap_or_else(|_| date.to_string())
    }

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(*date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Date::parse(&value, FORMAT).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn derives_total_cost() {
        let record = PurchaseRecord::new(date!(2024 - 03 - 01), 2.5, 60_000.0).expect("valid");
        assert_eq!(record.total_cost_usd, 150_000.0);
    }

    #[test]
    fn serializes_wire_shape_in_field_order() {
        let record = PurchaseRecord::new(date!(2024 - 03 - 01), 2.0, 100.5).expect("valid");
        let json = serde_json::to_string(&record).expect("serialize");
        assert_eq!(
            json,
            r#"{"date":"2024-03-01","btc_amount":2.0,"avg_price_usd":100.5,"total_cost_usd":201.0}"#
        );
    }

    #[test]
    fn allows_negative_amount_for_disposals() {
        let record = PurchaseRecord::new(date!(2023 - 12 - 31), -1.0, 40_000.0).expect("valid");
        assert_eq!(record.total_cost_usd, -40_000.0);
    }

    #[test]
    fn rejects_negative_price() {
        let err = PurchaseRecord::new(date!(2024 - 01 - 01), 1.0, -5.0).expect_err("must fail");
        assert_eq!(
            err,
            ValidationError::NegativeValue {
                field: "avg_price_usd"
            }
        );
    }

    #[test]
    fn deserializing_recomputes_stored_cost() {
        let record: PurchaseRecord = serde_json::from_str(
            r#"{"date":"2024-03-01","btc_amount":2.0,"avg_price_usd":100.5,"total_cost_usd":1.0}"#,
        )
        .expect("valid");
        assert_eq!(record.total_cost_usd, 201.0);
    }

    #[test]
    fn deserializing_validates_fields() {
        let result = serde_json::from_str::<PurchaseRecord>(
            r#"{"date":"2024-03-01","btc_amount":1.0,"avg_price_usd":-5.0,"total_cost_usd":-5.0}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_nan_amount() {
        let err = PurchaseRecord::new(date!(2024 - 01 - 01), f64::NAN, 5.0).expect_err("must fail");
        assert!(matches!(err, ValidationError::NonFiniteValue { .. }));
    }
}
