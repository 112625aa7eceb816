//! Capability offers: what a storage pool provides for one named attribute.
//!
//! Backends describe their pools with loosely-typed JSON attribute maps.
//! [`decode_offer_map`] sniffs the shape of every value once and turns it into
//! a [`CapabilityOffer`]; everything after that point works on the typed
//! variants only.
//!
//! # Classification order
//!
//! ```text
//! true / false                 -> Boolean
//! [int, int] with min <= max   -> NumericRange
//! [string, ...] (or [])        -> Enum
//! anything else                -> Generic
//! ```
//!
//! An array holding numbers that is not a valid range (wrong arity, floats,
//! mixed element types, `min > max`) is a *malformed* attribute. Under
//! [`DecodeMode::Lenient`] it is kept as a generic offer, under
//! [`DecodeMode::Strict`] the whole decode fails.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::DecodeMode;
use crate::error::{PoolError, Result};

/// Decoded attribute map, keyed by capability name.
pub type OfferMap = HashMap<String, CapabilityOffer>;

/// Typed description of what a pool offers for one attribute.
///
/// Serializes back to the JSON shape it was decoded from, so a decoded map can
/// be re-encoded and decoded again without changing variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum CapabilityOffer {
    /// A feature that is either on or off, e.g. `compressed`.
    Boolean {
        /// Offered (or wanted) flag value.
        value: bool,
    },
    /// An inclusive integer range, e.g. supported IOPS.
    NumericRange {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
    /// A set of named choices, e.g. storage tiers.
    Enum {
        /// Offered (or wanted) choices.
        choices: BTreeSet<String>,
    },
    /// A value of any other shape, kept verbatim.
    Generic {
        /// Source value.
        raw: Value,
    },
}

impl CapabilityOffer {
    pub fn boolean(value: bool) -> Self {
        Self::Boolean { value }
    }

    /// Build a range offer. Fails when `min > max`.
    pub fn range(min: i64, max: i64) -> Result<Self> {
        if min > max {
            return Err(PoolError::InvalidArgument(format!(
                "range lower bound {min} exceeds upper bound {max}"
            )));
        }
        Ok(Self::NumericRange { min, max })
    }

    pub fn choices<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    pub fn generic(raw: Value) -> Self {
        Self::Generic { raw }
    }

    /// Short variant name, used in log fields and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Boolean { .. } => "boolean",
            Self::NumericRange { .. } => "range",
            Self::Enum { .. } => "enum",
            Self::Generic { .. } => "generic",
        }
    }

    /// Whether this offer (the pool's `have`) meets `want`.
    ///
    /// Variants never coerce into one another: a boolean want is only met by
    /// a boolean offer, and so on. A generic offer only meets a generic want
    /// with a deeply equal raw value.
    pub fn satisfies(&self, want: &CapabilityOffer) -> bool {
        match (self, want) {
            (Self::Boolean { value: have }, Self::Boolean { value: want }) => have == want,
            (
                Self::NumericRange {
                    min: have_min,
                    max: have_max,
                },
                Self::NumericRange {
                    min: want_min,
                    max: want_max,
                },
            ) => want_min >= have_min && want_max <= have_max,
            (Self::Enum { choices: have }, Self::Enum { choices: want }) => want.is_subset(have),
            (Self::Generic { raw: have }, Self::Generic { raw: want }) => have == want,
            _ => false,
        }
    }
}

/// Free-function form of [`CapabilityOffer::satisfies`].
pub fn satisfies(have: &CapabilityOffer, want: &CapabilityOffer) -> bool {
    have.satisfies(want)
}

impl fmt::Display for CapabilityOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean { value } => write!(f, "Boolean({value})"),
            Self::NumericRange { min, max } => write!(f, "NumericRange({min}..={max})"),
            Self::Enum { choices } => {
                let joined: Vec<&str> = choices.iter().map(String::as_str).collect();
                write!(f, "Enum({})", joined.join(","))
            }
            Self::Generic { raw } => write!(f, "Generic({raw})"),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON shape conversion
// ---------------------------------------------------------------------------

impl From<CapabilityOffer> for Value {
    fn from(offer: CapabilityOffer) -> Self {
        match offer {
            CapabilityOffer::Boolean { value } => Value::Bool(value),
            CapabilityOffer::NumericRange { min, max } => Value::from(vec![min, max]),
            CapabilityOffer::Enum { choices } => {
                Value::Array(choices.into_iter().map(Value::String).collect())
            }
            CapabilityOffer::Generic { raw } => raw,
        }
    }
}

/// Lenient conversion: malformed shapes become [`CapabilityOffer::Generic`].
impl From<Value> for CapabilityOffer {
    fn from(raw: Value) -> Self {
        match classify(&raw) {
            Ok(Some(offer)) => offer,
            Ok(None) | Err(_) => Self::Generic { raw },
        }
    }
}

/// Classify one raw value.
///
/// `Ok(None)` means the value is legitimately opaque; `Err` carries the
/// reason a numeric-looking array could not be read as a range.
fn classify(raw: &Value) -> std::result::Result<Option<CapabilityOffer>, String> {
    match raw {
        Value::Bool(value) => Ok(Some(CapabilityOffer::Boolean { value: *value })),
        Value::Array(items) if items.iter().any(Value::is_number) => decode_range(items).map(Some),
        Value::Array(items) => {
            let choices: Option<BTreeSet<String>> = items
                .iter()
                .map(|item| item.as_str().map(str::to_owned))
                .collect();
            Ok(choices.map(|choices| CapabilityOffer::Enum { choices }))
        }
        _ => Ok(None),
    }
}

fn decode_range(items: &[Value]) -> std::result::Result<CapabilityOffer, String> {
    let [lo, hi] = items else {
        return Err(format!("range must have 2 elements, found {}", items.len()));
    };
    let (Some(min), Some(max)) = (lo.as_i64(), hi.as_i64()) else {
        return Err(format!("range bounds must be integers, found [{lo}, {hi}]"));
    };
    if min > max {
        return Err(format!("range lower bound {min} exceeds upper bound {max}"));
    }
    Ok(CapabilityOffer::NumericRange { min, max })
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a single attribute value.
pub fn decode_offer(name: &str, raw: &Value, mode: DecodeMode) -> Result<CapabilityOffer> {
    match classify(raw) {
        Ok(Some(offer)) => Ok(offer),
        Ok(None) => Ok(CapabilityOffer::Generic { raw: raw.clone() }),
        Err(reason) => match mode {
            DecodeMode::Strict => Err(PoolError::malformed(name, reason)),
            DecodeMode::Lenient => {
                debug!(attribute = name, %reason, "malformed attribute kept as generic offer");
                Ok(CapabilityOffer::Generic { raw: raw.clone() })
            }
        },
    }
}

/// Decode a raw attribute map into typed offers.
///
/// Fails with [`PoolError::DecodeFailure`] only when `raw` is not a JSON
/// object; per-attribute failures follow `mode`.
#[instrument(level = "debug", skip(raw))]
pub fn decode_offer_map(raw: &Value, mode: DecodeMode) -> Result<OfferMap> {
    let Value::Object(entries) = raw else {
        return Err(PoolError::DecodeFailure(format!(
            "attribute map must be a JSON object, found {}",
            json_kind(raw)
        )));
    };

    entries
        .iter()
        .map(|(name, value)| decode_offer(name, value, mode).map(|offer| (name.clone(), offer)))
        .collect()
}

/// Parse `json` and decode it with [`decode_offer_map`].
pub fn decode_offer_map_str(json: &str, mode: DecodeMode) -> Result<OfferMap> {
    let raw: Value = serde_json::from_str(json).map_err(PoolError::decode)?;
    decode_offer_map(&raw, mode)
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
