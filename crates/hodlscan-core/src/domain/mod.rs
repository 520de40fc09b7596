//! # Domain Models
//!
//! Canonical types the pipeline produces. Construction validates every invariant, so a
//! [`PurchaseRecord`] that exists is always well-formed.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PurchaseRecord`] | Canonical purchase row: date, amount, price, derived cost |
//! | [`SourceName`] | Validated source identifier |

mod record;
mod source_name;

pub(crate) use record::iso_date;
pub use record::PurchaseRecord;
pub use source_name::SourceName;
