//! Stored values, host scalars, and the prefix codec between them.

use crate::error::{CodecError, CodecResult};
use std::collections::HashMap;
use std::fmt;

/// Prefix marking a stored string that carries an integer.
const NUM_PREFIX: &str = "num:";
/// Prefix marking a stored string that merely looks like an integer.
const STR_PREFIX: &str = "str:";

/// A stored (wire-level) scalar.
///
/// This is what actually lives in a table file: a string, a double, or a
/// boolean. The derived equality compares like kinds only, so a number
/// never equals a string even when their renderings coincide.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Text value (may carry a `num:` or `str:` prefix).
    Text(String),
    /// Floating-point value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
}

impl Value {
    /// Get this value as a string, if it is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a number, if it is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Decode this stored value back into a host scalar.
    ///
    /// Strips the `num:`/`str:` prefixes: `num:<decimal>` becomes an
    /// integer, `str:<text>` becomes the bare text, everything else is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if a `num:` payload does not parse as an `i64`.
    pub fn decode(&self) -> CodecResult<Scalar> {
        match self {
            Value::Text(s) => {
                if let Some(rest) = s.strip_prefix(NUM_PREFIX) {
                    let n = rest.parse::<i64>().map_err(|err| {
                        CodecError::decoding_failed(format!("bad integer payload '{rest}': {err}"))
                    })?;
                    Ok(Scalar::Int(n))
                } else if let Some(rest) = s.strip_prefix(STR_PREFIX) {
                    Ok(Scalar::Text(rest.to_string()))
                } else {
                    Ok(Scalar::Text(s.clone()))
                }
            }
            Value::Number(n) => Ok(Scalar::Float(*n)),
            Value::Bool(b) => Ok(Scalar::Bool(*b)),
        }
    }
}

/// A host-level scalar: what callers hand to and get back from a table.
///
/// Encoding to a [`Value`] applies the uniform storage rules, so an
/// integer survives the string-or-number wire union without collapsing
/// to a float.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Signed integer.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Text.
    Text(String),
}

impl Scalar {
    /// Encode this scalar into its stored form.
    ///
    /// | Host scalar | Stored as |
    /// |---|---|
    /// | integer | string `num:<decimal>` |
    /// | float | number |
    /// | boolean | boolean |
    /// | string matching `^-?[0-9]+$` | string `str:<input>` |
    /// | other string | string, unchanged |
    pub fn encode(&self) -> Value {
        match self {
            Scalar::Int(n) => Value::Text(format!("{NUM_PREFIX}{n}")),
            Scalar::Float(f) => Value::Number(*f),
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Text(s) => {
                if is_integer_literal(s) {
                    Value::Text(format!("{STR_PREFIX}{s}"))
                } else {
                    Value::Text(s.clone())
                }
            }
        }
    }

    /// Canonical string projection used as the records-map key.
    ///
    /// `Int(1)` and `Text("1")` both project to `"1"`, so integer and
    /// stringified lookups reach the same record.
    pub fn key_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Text(s) => write!(f, "{s}"),
        }
    }
}

// Only `i64` gets a `From` impl among the integer types: a second one
// would make bare integer literals ambiguous at call sites like
// `table.select(1)`.
impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Int(n)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Float(x)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

/// Matches `^-?[0-9]+$`: an optional minus followed by one or more digits.
fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// A stored record: a mapping from field name to stored value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    /// Field name to stored value.
    pub fields: HashMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Encodes a map of host scalars into a record.
    pub fn from_scalars(fields: &HashMap<String, Scalar>) -> Self {
        let fields = fields
            .iter()
            .map(|(name, scalar)| (name.clone(), scalar.encode()))
            .collect();
        Self { fields }
    }

    /// Decodes every field back into a host scalar.
    ///
    /// # Errors
    ///
    /// Returns an error if any stored value fails to decode.
    pub fn to_scalars(&self) -> CodecResult<HashMap<String, Scalar>> {
        self.fields
            .iter()
            .map(|(name, value)| Ok((name.clone(), value.decode()?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_round_trip_through_num_prefix() {
        for n in [0i64, 1, -1, 42, i64::MAX, i64::MIN] {
            let stored = Scalar::Int(n).encode();
            assert_eq!(stored, Value::Text(format!("num:{n}")));
            assert_eq!(stored.decode().unwrap(), Scalar::Int(n));
        }
    }

    #[test]
    fn digit_strings_are_disambiguated() {
        let stored = Scalar::from("123").encode();
        assert_eq!(stored, Value::Text("str:123".to_string()));
        assert_eq!(stored.decode().unwrap(), Scalar::Text("123".to_string()));

        let negative = Scalar::from("-7").encode();
        assert_eq!(negative, Value::Text("str:-7".to_string()));
        assert_eq!(negative.decode().unwrap(), Scalar::Text("-7".to_string()));
    }

    #[test]
    fn oversized_digit_strings_still_round_trip() {
        // Longer than any i64, but still matches the integer pattern.
        let big = "123456789012345678901234567890";
        let stored = Scalar::from(big).encode();
        assert_eq!(stored, Value::Text(format!("str:{big}")));
        assert_eq!(stored.decode().unwrap(), Scalar::Text(big.to_string()));
    }

    #[test]
    fn plain_strings_pass_through() {
        for s in ["Ada", "", "12a", "-", "num", "a123"] {
            let stored = Scalar::from(s).encode();
            assert_eq!(stored, Value::Text(s.to_string()));
            assert_eq!(stored.decode().unwrap(), Scalar::Text(s.to_string()));
        }
    }

    #[test]
    fn floats_and_bools_round_trip() {
        assert_eq!(
            Scalar::Float(2.5).encode().decode().unwrap(),
            Scalar::Float(2.5)
        );
        assert_eq!(
            Scalar::Bool(true).encode().decode().unwrap(),
            Scalar::Bool(true)
        );
    }

    #[test]
    fn bad_num_payload_fails_to_decode() {
        let value = Value::Text("num:not-a-number".to_string());
        assert!(value.decode().is_err());
    }

    #[test]
    fn cross_kind_equality_is_false() {
        assert_ne!(Value::Text("1".to_string()), Value::Number(1.0));
        assert_ne!(Value::Bool(true), Value::Number(1.0));
        assert_ne!(Value::Text("true".to_string()), Value::Bool(true));
    }

    #[test]
    fn key_projection_unifies_int_and_digit_string() {
        assert_eq!(Scalar::Int(1).key_string(), "1");
        assert_eq!(Scalar::from("1").key_string(), "1");
        assert_eq!(Scalar::Int(0).key_string(), "0");
        assert_eq!(Scalar::Float(2.5).key_string(), "2.5");
        assert_eq!(Scalar::Bool(true).key_string(), "true");
    }

    #[test]
    fn record_scalar_round_trip() {
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), Scalar::Int(7));
        fields.insert("name".to_string(), Scalar::from("Ada"));
        fields.insert("score".to_string(), Scalar::Float(9.5));
        fields.insert("active".to_string(), Scalar::Bool(true));

        let record = Record::from_scalars(&fields);
        assert_eq!(record.to_scalars().unwrap(), fields);
    }
}
