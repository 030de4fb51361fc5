//! Canonical meter identities shared by the billing export and the upload
//! template.
//!
//! A canonical identity reads `Constellation__<CustomerId>__<MeterNumber>`,
//! optionally followed by `__<Description>`. Template cells may carry extra
//! text after a comma, which is discarded before parsing. Any other text
//! directly after the ten meter digits is tolerated and ignored.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::model::BillingRecord;

/// Literal every identity starts with.
pub const IDENTITY_PREFIX: &str = "Constellation__";
/// Prefix of identities that follow the naming convention in the template.
pub const TEMPLATE_PREFIX: &str = "Constellation__RG-";
/// Separator between identity segments.
pub const SEGMENT_SEPARATOR: &str = "__";
/// Width of a canonical meter number.
pub const METER_NUMBER_DIGITS: usize = 10;

/// Meter identity parsed from a template cell or derived from a billing
/// record.
///
/// Equality and hashing only consider the customer id and meter number; the
/// description is informational.
#[derive(Debug, Clone, Eq)]
pub struct MeterIdentity {
    customer_id: String,
    meter_number: String,
    description: Option<String>,
}

impl MeterIdentity {
    /// Builds an identity from a billing record's customer id and meter
    /// number. The segments are taken as given; mismatched shapes simply fail
    /// to match later.
    pub fn from_parts(customer_id: impl Into<String>, meter_number: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            meter_number: meter_number.into(),
            description: None,
        }
    }

    pub fn from_record(record: &BillingRecord) -> Self {
        Self::from_parts(record.customer_id.clone(), record.meter_number.clone())
    }

    /// Parses a template identity cell. Returns `None` unless the text before
    /// the first comma starts with `Constellation__RG-<digits>__<10 digits>`.
    /// A tail of the form `__<description>` becomes the description; other
    /// tails are accepted but not kept.
    pub fn parse_template(value: &str) -> Option<Self> {
        let head = value.split(',').next().unwrap_or_default().trim();
        let rest = head.strip_prefix(IDENTITY_PREFIX)?;

        let (customer_id, rest) = rest.split_once(SEGMENT_SEPARATOR)?;
        let customer_digits = customer_id.strip_prefix("RG-")?;
        if !is_digits(customer_digits) {
            return None;
        }

        let meter_number = rest.get(..METER_NUMBER_DIGITS)?;
        if !is_digits(meter_number) {
            return None;
        }

        let description = rest[METER_NUMBER_DIGITS..]
            .strip_prefix(SEGMENT_SEPARATOR)
            .filter(|description| !description.is_empty())
            .map(str::to_string);

        Some(Self {
            customer_id: customer_id.to_string(),
            meter_number: meter_number.to_string(),
            description,
        })
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn meter_number(&self) -> &str {
        &self.meter_number
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// `Constellation__<CustomerId>__<MeterNumber>`, without description.
    pub fn canonical(&self) -> String {
        format!(
            "{IDENTITY_PREFIX}{}{SEGMENT_SEPARATOR}{}",
            self.customer_id, self.meter_number
        )
    }
}

impl PartialEq for MeterIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.customer_id == other.customer_id && self.meter_number == other.meter_number
    }
}

impl Hash for MeterIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.customer_id.hash(state);
        self.meter_number.hash(state);
    }
}

impl fmt::Display for MeterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Canonical identity for a template cell, i.e. the text before the first
/// comma, or `None` if the cell does not follow the naming convention.
pub fn normalize_template_value(value: &str) -> Option<String> {
    MeterIdentity::parse_template(value)?;
    Some(value.split(',').next().unwrap_or_default().trim().to_string())
}

/// Canonical identity for a billing record's customer id and meter number.
pub fn normalize_record(customer_id: &str, meter_number: &str) -> String {
    MeterIdentity::from_parts(customer_id, meter_number).canonical()
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
}
