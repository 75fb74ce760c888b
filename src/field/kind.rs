//! Field kinds and their native/transport coercions.
//!
//! | Kind | native | transport |
//! |------|--------|-----------|
//! | String | identity | null → `""` |
//! | Integer | `trunc(float(x))`, falsy → 0 | as native |
//! | Increment | as Integer | native + 1 |
//! | Float | `float(x)`, falsy → 0.0 | null → `""` |
//! | Boolean | textual parse, failure → false | `"true"` / `"false"` |
//! | Map, List | JSON-decoded when stored as text | JSON text, null → `""` |
//! | DateTime, TimeStamp | milliseconds / 1000 | integer milliseconds, unset → `""` |
//! | Enum | identity | identity |

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::{PropertyMap, Value};
use crate::{Error, Result};

/// The ordered, non-empty set of values an `Enum` field accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allowed(Vec<Value>);

impl Allowed {
    /// Duplicates are dropped, keeping first occurrence order.
    pub fn new<I, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut allowed: Vec<Value> = Vec::new();
        for v in values {
            let v = v.into();
            if !allowed.contains(&v) {
                allowed.push(v);
            }
        }
        if allowed.is_empty() {
            return Err(Error::Configuration(
                "an enum field needs at least one allowed value".into(),
            ));
        }
        Ok(Self(allowed))
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.contains(value)
    }

    /// The first allowed value, which is also the enum's default.
    pub fn first(&self) -> &Value {
        // non-empty by construction
        &self.0[0]
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

/// Closed set of field types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    String,
    Integer,
    /// An integer whose transport rendering is one past its native value.
    Increment,
    Float,
    Boolean,
    Map,
    List,
    DateTime,
    TimeStamp,
    Enum(Allowed),
}

/// Current UTC time in milliseconds, the raw form of time fields.
pub fn current_date_time() -> Value {
    Value::Int(Utc::now().timestamp_millis())
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "String",
            FieldKind::Integer => "Integer",
            FieldKind::Increment => "Increment",
            FieldKind::Float => "Float",
            FieldKind::Boolean => "Boolean",
            FieldKind::Map => "Map",
            FieldKind::List => "List",
            FieldKind::DateTime => "DateTime",
            FieldKind::TimeStamp => "TimeStamp",
            FieldKind::Enum(_) => "Enum",
        }
    }

    /// The raw value a field of this kind starts with when constructed
    /// without a (truthy) initial value.
    pub fn default_value(&self) -> Value {
        match self {
            FieldKind::String => Value::String(String::new()),
            FieldKind::Integer | FieldKind::Increment => Value::Int(0),
            FieldKind::Float => Value::Float(0.0),
            FieldKind::Boolean => Value::Bool(false),
            FieldKind::Map => Value::Map(PropertyMap::new()),
            FieldKind::List => Value::List(Vec::new()),
            FieldKind::DateTime | FieldKind::TimeStamp => current_date_time(),
            FieldKind::Enum(allowed) => allowed.first().clone(),
        }
    }

    pub fn to_native(&self, raw: &Value) -> Result<Value> {
        match self {
            FieldKind::String => Ok(raw.clone()),
            FieldKind::Integer | FieldKind::Increment => self.integer(raw).map(Value::Int),
            FieldKind::Float => {
                if raw.is_truthy() {
                    self.number(raw).map(Value::Float)
                } else {
                    Ok(Value::Float(0.0))
                }
            }
            FieldKind::Boolean => Ok(Value::Bool(parse_bool(raw))),
            FieldKind::Map | FieldKind::List => match raw {
                Value::String(s) if !s.trim().is_empty() => {
                    Value::from_json_str(s).map_err(|e| self.coercion(e))
                }
                other => Ok(other.clone()),
            },
            FieldKind::DateTime | FieldKind::TimeStamp => {
                let millis = self.millis(raw)?.unwrap_or(0);
                Ok(Value::Int(millis.div_euclid(1000)))
            }
            FieldKind::Enum(_) => Ok(raw.clone()),
        }
    }

    pub fn to_transport(&self, raw: &Value) -> Result<Value> {
        match self {
            FieldKind::String | FieldKind::Float => Ok(blank_if_null(raw)),
            // text is taken as already encoded
            FieldKind::Map | FieldKind::List => Ok(match raw {
                Value::Null => Value::String(String::new()),
                Value::String(_) => raw.clone(),
                other => Value::String(other.to_json_string()),
            }),
            FieldKind::Integer => self.to_native(raw),
            FieldKind::Increment => {
                let current = self.integer(raw)?;
                Ok(Value::Int(current.saturating_add(1)))
            }
            FieldKind::Boolean => {
                let literal = if parse_bool(raw) { "true" } else { "false" };
                Ok(Value::String(literal.into()))
            }
            FieldKind::DateTime | FieldKind::TimeStamp => Ok(match self.millis(raw)? {
                Some(millis) => Value::Int(millis),
                None => Value::String(String::new()),
            }),
            FieldKind::Enum(_) => Ok(raw.clone()),
        }
    }

    fn integer(&self, raw: &Value) -> Result<i64> {
        if !raw.is_truthy() {
            return Ok(0);
        }
        self.number(raw).map(|f| f.trunc() as i64)
    }

    /// `None` for the unset forms (null or empty string).
    fn millis(&self, raw: &Value) -> Result<Option<i64>> {
        match raw {
            Value::Null => Ok(None),
            Value::String(s) if s.is_empty() => Ok(None),
            other => self.number(other).map(|f| Some(f.trunc() as i64)),
        }
    }

    fn number(&self, raw: &Value) -> Result<f64> {
        let n = match raw {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| self.coercion(format!("'{s}': {e}")))?,
            other => {
                return Err(self.coercion(format!("{} is not numeric", other.type_name())));
            }
        };
        if n.is_finite() {
            Ok(n)
        } else {
            Err(self.coercion(format!("{n} is not finite")))
        }
    }

    fn coercion(&self, message: impl ToString) -> Error {
        Error::Coercion { kind: self.name(), message: message.to_string() }
    }
}

fn blank_if_null(raw: &Value) -> Value {
    match raw {
        Value::Null => Value::String(String::new()),
        other => other.clone(),
    }
}

/// Booleans and numbers map directly. Text is trimmed, lowercased and read
/// as a JSON literal, so `"True"`, `" false "`, `"1"` and `"null"` all
/// parse; anything unparseable is false.
fn parse_bool(raw: &Value) -> bool {
    match raw {
        Value::String(s) => {
            let text = s.trim().to_lowercase();
            serde_json::from_str::<serde_json::Value>(&text)
                .map(|json| Value::from(json).is_truthy())
                .unwrap_or(false)
        }
        other => other.is_truthy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_truncates_text() {
        let k = FieldKind::Integer;
        assert_eq!(k.to_native(&Value::from("12.9")).unwrap(), Value::Int(12));
        assert_eq!(k.to_native(&Value::from(-3.7)).unwrap(), Value::Int(-3));
        assert_eq!(k.to_native(&Value::Null).unwrap(), Value::Int(0));
        assert_eq!(k.to_transport(&Value::from("7")).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_integer_rejects_garbage() {
        let err = FieldKind::Integer.to_native(&Value::from("seven")).unwrap_err();
        assert!(matches!(err, Error::Coercion { kind: "Integer", .. }));
    }

    #[test]
    fn test_increment_transport() {
        let k = FieldKind::Increment;
        assert_eq!(k.to_transport(&Value::Null).unwrap(), Value::Int(1));
        assert_eq!(k.to_transport(&Value::Int(5)).unwrap(), Value::Int(6));
        assert_eq!(k.to_native(&Value::Int(5)).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_float() {
        let k = FieldKind::Float;
        assert_eq!(k.to_native(&Value::from("2.5")).unwrap(), Value::Float(2.5));
        assert_eq!(k.to_native(&Value::Null).unwrap(), Value::Float(0.0));
        assert_eq!(k.to_transport(&Value::from("2.5")).unwrap(), Value::from("2.5"));
        assert_eq!(k.to_transport(&Value::Null).unwrap(), Value::from(""));
    }

    #[test]
    fn test_boolean_parsing() {
        let k = FieldKind::Boolean;
        for truthy in ["true", "TRUE", " True ", "1"] {
            assert_eq!(k.to_native(&Value::from(truthy)).unwrap(), Value::Bool(true), "{truthy}");
        }
        for falsy in ["false", "False", "0", "null", "", "yes please"] {
            assert_eq!(k.to_native(&Value::from(falsy)).unwrap(), Value::Bool(false), "{falsy}");
        }
        assert_eq!(k.to_native(&Value::Int(2)).unwrap(), Value::Bool(true));
        assert_eq!(k.to_transport(&Value::from("false")).unwrap(), Value::from("false"));
        assert_eq!(k.to_transport(&Value::Bool(true)).unwrap(), Value::from("true"));
    }

    #[test]
    fn test_structured_decodes_text() {
        let k = FieldKind::Map;
        let native = k.to_native(&Value::from(r#"{"a": 1}"#)).unwrap();
        assert_eq!(native, Value::from(vec![("a", 1)]));
        assert_eq!(k.to_native(&Value::from("   ")).unwrap(), Value::from("   "));
        assert!(k.to_native(&Value::from("{broken")).is_err());

        let list = FieldKind::List.to_native(&Value::from("[1, 2]")).unwrap();
        assert_eq!(list, Value::from(vec![1, 2]));
    }

    #[test]
    fn test_structured_transport_is_json_text() {
        let k = FieldKind::Map;
        let raw = Value::from(vec![("b", Value::from(vec![1, 2])), ("a", Value::Null)]);
        let wire = k.to_transport(&raw).unwrap();
        assert_eq!(wire, Value::from(r#"{"a":null,"b":[1,2]}"#));
        assert_eq!(k.to_native(&wire).unwrap(), raw);

        assert_eq!(k.to_transport(&Value::Null).unwrap(), Value::from(""));
        assert_eq!(k.to_transport(&Value::from(r#"{"a":1}"#)).unwrap(), Value::from(r#"{"a":1}"#));
        assert_eq!(FieldKind::List.to_transport(&Value::List(vec![])).unwrap(), Value::from("[]"));
    }

    #[test]
    fn test_string_native_is_identity() {
        let k = FieldKind::String;
        assert_eq!(k.to_native(&Value::Null).unwrap(), Value::Null);
        assert_eq!(k.to_native(&Value::from("ada")).unwrap(), Value::from("ada"));
        assert_eq!(k.to_transport(&Value::Null).unwrap(), Value::from(""));
    }

    #[test]
    fn test_datetime_scaling() {
        let k = FieldKind::DateTime;
        assert_eq!(k.to_native(&Value::Int(1_500_999)).unwrap(), Value::Int(1500));
        assert_eq!(k.to_native(&Value::from("")).unwrap(), Value::Int(0));
        assert_eq!(k.to_transport(&Value::from("1500999.0")).unwrap(), Value::Int(1_500_999));
        assert_eq!(k.to_transport(&Value::Null).unwrap(), Value::from(""));
    }

    #[test]
    fn test_allowed_dedupes_and_requires_values() {
        let allowed = Allowed::new(["a", "b", "a"]).unwrap();
        assert_eq!(allowed.values().len(), 2);
        assert_eq!(allowed.first(), &Value::from("a"));
        assert!(Allowed::new(Vec::<Value>::new()).is_err());
    }
}
