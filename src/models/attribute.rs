//! Typed attribute values as held by the metadata store.
//!
//! Items are stored in the DynamoDB JSON shape, a single-key object per
//! value such as `{"S": "hello"}` or `{"N": "42"}`. Numbers are kept as
//! arbitrary-precision decimals and only become `i64`/`f64` once they pass
//! through [`crate::services::numeric::normalize`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A metadata item: attribute name to typed value.
pub type Item = BTreeMap<String, AttrValue>;

/// A single typed attribute value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum AttrValue {
    /// String value.
    #[serde(rename = "S")]
    S(String),

    /// Number value (decimal, serialized as a string).
    #[serde(rename = "N")]
    N(Decimal),

    /// Boolean value.
    #[serde(rename = "BOOL")]
    Bool(bool),

    /// Null marker.
    #[serde(rename = "NULL")]
    Null(bool),

    /// Ordered list of values.
    #[serde(rename = "L")]
    L(Vec<AttrValue>),

    /// Nested map of values.
    #[serde(rename = "M")]
    M(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::S(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::S(value)
    }
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        Self::N(Decimal::from(value))
    }
}
