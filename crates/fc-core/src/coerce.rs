//! Coercion of form-style text input into typed values.
//!
//! Input fields deliver text even for numeric settings. A value containing a
//! decimal point or exponent is read as a float, otherwise as an integer;
//! anything that does not parse stays text. Lists coerce to a number list
//! only when every element is numeric.

use crate::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Integer(i64),
    Float(f64),
    Text(String),
    NumberList(Vec<f64>),
    TextList(Vec<String>),
}

impl Coerced {
    pub fn into_value(self) -> Value {
        match self {
            Self::Integer(i) => Value::Int(i),
            Self::Float(f) => Value::Float(f),
            Self::Text(s) => Value::Text(s),
            Self::NumberList(items) => Value::from(items),
            Self::TextList(items) => Value::from(items),
        }
    }
}

pub fn coerce_str(raw: &str) -> Coerced {
    let trimmed = raw.trim();
    let looks_fractional = trimmed.contains(['.', 'e', 'E']);
    if looks_fractional {
        if let Ok(f) = trimmed.parse::<f64>() {
            return Coerced::Float(f);
        }
    } else if let Ok(i) = trimmed.parse::<i64>() {
        return Coerced::Integer(i);
    }
    Coerced::Text(raw.to_string())
}

pub fn coerce_list<S: AsRef<str>>(items: &[S]) -> Coerced {
    let parsed: Option<Vec<f64>> = items
        .iter()
        .map(|item| item.as_ref().trim().parse::<f64>().ok())
        .collect();
    match parsed {
        Some(numbers) => Coerced::NumberList(numbers),
        None => Coerced::TextList(items.iter().map(|s| s.as_ref().to_string()).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_coercion() {
        assert_eq!(coerce_str("10"), Coerced::Integer(10));
        assert_eq!(coerce_str(" 0.5 "), Coerced::Float(0.5));
        assert_eq!(coerce_str("1e5"), Coerced::Float(1e5));
        assert_eq!(coerce_str("cathode"), Coerced::Text("cathode".to_string()));
        // "1.2.3" contains a dot but is no float
        assert_eq!(coerce_str("1.2.3"), Coerced::Text("1.2.3".to_string()));
    }

    #[test]
    fn list_coercion() {
        assert_eq!(coerce_list(&["1", "2.5"]), Coerced::NumberList(vec![1.0, 2.5]));
        assert!(matches!(coerce_list(&["1", "x"]), Coerced::TextList(_)));
        assert_eq!(coerce_list(&["3"]), Coerced::NumberList(vec![3.0]));
    }

    #[test]
    fn into_value_keeps_shape() {
        assert_eq!(Coerced::Integer(3).into_value(), Value::Int(3));
        assert_eq!(
            Coerced::NumberList(vec![1.0]).into_value(),
            Value::List(vec![Value::Float(1.0)])
        );
    }
}
