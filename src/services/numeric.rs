//! Conversion of stored items into plain JSON.
//!
//! The metadata store keeps numbers as decimals. JSON has no decimal type,
//! so whole numbers become integers and everything else becomes the nearest
//! `f64`.

use crate::models::attribute::{AttrValue, Item};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde_json::{Map, Number, Value};

/// Recursively convert an attribute value into JSON.
pub fn normalize(value: &AttrValue) -> Value {
    match value {
        AttrValue::L(items) => Value::Array(items.iter().map(normalize).collect()),
        AttrValue::M(map) => Value::Object(normalize_map(map)),
        AttrValue::N(number) => decimal_to_json(number),
        AttrValue::S(s) => Value::String(s.clone()),
        AttrValue::Bool(b) => Value::Bool(*b),
        AttrValue::Null(_) => Value::Null,
    }
}

/// Convert a whole item, keeping attribute names.
pub fn normalize_item(item: &Item) -> Value {
    Value::Object(normalize_map(item))
}

/// Convert a list of items, keeping their order.
pub fn normalize_items(items: &[Item]) -> Vec<Value> {
    items.iter().map(normalize_item).collect()
}

fn normalize_map<'a>(
    map: impl IntoIterator<Item = (&'a String, &'a AttrValue)>,
) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| (key.clone(), normalize(value)))
        .collect()
}

fn decimal_to_json(number: &Decimal) -> Value {
    if number.fract().is_zero() {
        if let Some(i) = number.to_i64() {
            return Value::Number(i.into());
        }
        if let Some(u) = number.to_u64() {
            return Value::Number(u.into());
        }
    }
    number
        .to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::{collections::BTreeMap, str::FromStr};

    fn n(raw: &str) -> AttrValue {
        AttrValue::N(Decimal::from_str(raw).unwrap())
    }

    #[test]
    fn test_should_turn_whole_decimals_into_integers() {
        assert_eq!(normalize(&n("42")), json!(42));
        assert_eq!(normalize(&n("42.000")), json!(42));
        assert_eq!(normalize(&n("-7")), json!(-7));
        assert_eq!(normalize(&n("0")), json!(0));
        assert!(normalize(&n("42.0")).is_i64());
    }

    #[test]
    fn test_should_keep_large_integers_exact() {
        assert_eq!(normalize(&n("9007199254740993")), json!(9007199254740993i64));
        assert_eq!(normalize(&n("18446744073709551615")), json!(u64::MAX));
    }

    #[test]
    fn test_should_turn_fractions_into_floats() {
        assert_eq!(normalize(&n("1.5")), json!(1.5));
        assert_eq!(normalize(&n("0.1")), json!(0.1));
        assert!(normalize(&n("-2.25")).is_f64());
    }

    #[test]
    fn test_should_recurse_into_lists_and_maps() {
        let value = AttrValue::L(vec![
            n("1"),
            AttrValue::M(BTreeMap::from([
                ("ratio".to_string(), n("0.5")),
                ("tags".to_string(), AttrValue::L(vec![n("3"), "x".into()])),
            ])),
            AttrValue::Bool(true),
            AttrValue::Null(true),
        ]);
        assert_eq!(
            normalize(&value),
            json!([1, {"ratio": 0.5, "tags": [3, "x"]}, true, null])
        );
    }

    #[test]
    fn test_should_normalize_items_in_order() {
        let first = Item::from([("size".to_string(), n("10"))]);
        let second = Item::from([("size".to_string(), n("2.5"))]);
        assert_eq!(
            normalize_items(&[first, second]),
            vec![json!({"size": 10}), json!({"size": 2.5})]
        );
    }
}
