use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A scalar cell value.
///
/// Values are hashable and totally ordered so they can be used directly as group-by key parts.
/// The ordering ranks kinds first (`Null < Boolean < Number < Text`) and then compares within a
/// kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(OrderedFloat<f64>),
    Text(Arc<str>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one.
    ///
    /// Booleans count as `1`/`0` and text is accepted when it parses as a float (surrounding
    /// whitespace is ignored). Nulls and other text have no numeric view.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Some(n.0),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Number(_) => 2,
            Value::Text(_) => 3,
        }
    }

    /// Compare two values as time periods.
    ///
    /// Periods are commonly stored either as numbers (`202501`) or as text (`"202501"`), so both
    /// sides are compared numerically whenever both have a numeric view and lexicographically
    /// otherwise. Returns `None` when either side is null.
    pub fn cmp_period(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => Some(OrderedFloat(a).cmp(&OrderedFloat(b))),
            _ => Some(self.to_string().cmp(&other.to_string())),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.as_ref().cmp(b.as_ref()),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", n.0),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(OrderedFloat(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(OrderedFloat(value as f64))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(OrderedFloat(value as f64))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(Arc::from(value))
    }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ordering_ranks_kinds_before_values() {
        let mut values = vec![
            Value::from("b"),
            Value::from(2.0),
            Value::Null,
            Value::from(true),
            Value::from("a"),
            Value::from(-1.0),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::from(true),
                Value::from(-1.0),
                Value::from(2.0),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn period_comparison_mixes_numbers_and_numeric_text() {
        assert_eq!(
            Value::from(202501).cmp_period(&Value::from("202412")),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::from("202501").cmp_period(&Value::from("202501")),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::Null.cmp_period(&Value::from(1)), None);
        assert_eq!(
            Value::from("2025-01").cmp_period(&Value::from("2025-02")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn numeric_view_accepts_booleans_and_numeric_text() {
        assert_eq!(Value::from(true).as_f64(), Some(1.0));
        assert_eq!(Value::from(" 4.5 ").as_f64(), Some(4.5));
        assert_eq!(Value::from("abc").as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn json_shape_is_untagged() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, 1, "x", false]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::from(1.0),
                Value::from("x"),
                Value::from(false)
            ]
        );
        assert_eq!(serde_json::to_string(&Value::from(2.5)).unwrap(), "2.5");
    }
}
