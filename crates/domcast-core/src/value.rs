use crate::command::CommandMap;
use crate::error::{DomcastError, DomcastResult};
use crate::function::JsFunction;
use crate::render::encode_commands;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fmt;
use std::rc::Rc;

/// Object-like argument. Objects reach the wire either through their text
/// form (when typecast asks for strings and one exists) or through a shallow
/// field map, reflected at render time.
pub trait ArgObject: fmt::Debug {
    fn to_text(&self) -> Option<String> {
        None
    }

    fn to_fields(&self) -> Result<Value, String>;
}

/// Wraps any `Serialize` type; its serde field map is the reflection.
#[derive(Debug, Clone)]
pub struct Fields<T>(pub T);

impl<T: Serialize + fmt::Debug> ArgObject for Fields<T> {
    fn to_fields(&self) -> Result<Value, String> {
        serde_json::to_value(&self.0).map_err(|e| e.to_string())
    }
}

/// A builder's resolved commands, captured when it was used as an argument.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub name: String,
    pub commands: CommandMap,
}

/// Argument tree accepted by every command.
///
/// Unlike `serde_json::Value` it can carry builders, deferred functions and
/// opaque objects until typecast resolves them, and non-finite floats that
/// only fail once rendered.
#[derive(Debug, Clone)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    /// Unsigned integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    Str(String),
    List(Vec<Arg>),
    Map(IndexMap<String, Arg>),
    Response(ResponseSnapshot),
    Commands(CommandMap),
    Function(JsFunction),
    Object(Rc<dyn ArgObject>),
}

impl Arg {
    pub fn object(value: impl ArgObject + 'static) -> Self {
        Arg::Object(Rc::new(value))
    }

    pub fn fields<T: Serialize + fmt::Debug + 'static>(value: T) -> Self {
        Arg::object(Fields(value))
    }

    pub fn tagged(tag: &str, inner: Arg) -> Self {
        let mut map = IndexMap::with_capacity(1);
        map.insert(tag.to_string(), inner);
        Arg::Map(map)
    }

    /// Emptiness in the loose sense: null, false, zero, `""`, `"0"` and empty
    /// containers. Builders, functions and objects are never empty.
    pub fn is_blank(&self) -> bool {
        match self {
            Arg::Null => true,
            Arg::Bool(b) => !*b,
            Arg::Int(n) => *n == 0,
            Arg::UInt(n) => *n == 0,
            Arg::Float(f) => *f == 0.0,
            Arg::Str(s) => s.is_empty() || s == "0",
            Arg::List(items) => items.is_empty(),
            Arg::Map(map) => map.is_empty(),
            Arg::Response(_) | Arg::Commands(_) | Arg::Function(_) | Arg::Object(_) => false,
        }
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_blank()
    }

    pub fn to_value(&self) -> DomcastResult<Value> {
        self.encode_at("$")
    }

    pub(crate) fn encode_at(&self, path: &str) -> DomcastResult<Value> {
        match self {
            Arg::Null => Ok(Value::Null),
            Arg::Bool(b) => Ok(Value::Bool(*b)),
            Arg::Int(n) => Ok(Value::from(*n)),
            Arg::UInt(n) => Ok(Value::from(*n)),
            Arg::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| DomcastError::serialization(path, format!("{f} is not a finite number"))),
            Arg::Str(s) => Ok(Value::String(s.clone())),
            Arg::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| item.encode_at(&format!("{path}[{i}]")))
                .collect::<DomcastResult<Vec<_>>>()
                .map(Value::Array),
            Arg::Map(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.encode_at(&format!("{path}.{k}"))?);
                }
                Ok(Value::Object(out))
            }
            Arg::Response(snapshot) => encode_commands(&snapshot.commands, path),
            Arg::Commands(commands) => encode_commands(commands, path),
            Arg::Function(func) => func.compile().map(Value::String),
            Arg::Object(obj) => obj
                .to_fields()
                .map_err(|reason| DomcastError::serialization(path, reason)),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Arg::Null,
            Value::Bool(b) => Arg::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Arg::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Arg::UInt(u)
                } else {
                    Arg::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Arg::Str(s),
            Value::Array(items) => Arg::List(items.into_iter().map(Arg::from).collect()),
            Value::Object(map) => Arg::Map(map.into_iter().map(|(k, v)| (k, Arg::from(v))).collect()),
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<u64> for Arg {
    fn from(value: u64) -> Self {
        i64::try_from(value).map(Arg::Int).unwrap_or(Arg::UInt(value))
    }
}

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::from(value as u64)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<JsFunction> for Arg {
    fn from(value: JsFunction) -> Self {
        Arg::Function(value)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Arg::Null)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(value: Vec<T>) -> Self {
        Arg::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Arg>> From<IndexMap<String, T>> for Arg {
    fn from(value: IndexMap<String, T>) -> Self {
        Arg::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[derive(Debug)]
    struct Broken;

    impl ArgObject for Broken {
        fn to_fields(&self) -> Result<Value, String> {
            Err("resource handle".to_string())
        }
    }

    #[test]
    fn blank_follows_loose_emptiness() {
        assert!(Arg::Null.is_blank());
        assert!(Arg::from("").is_blank());
        assert!(Arg::from("0").is_blank());
        assert!(Arg::from(0).is_blank());
        assert!(Arg::from(Vec::<Arg>::new()).is_blank());
        assert!(!Arg::from("00").is_blank());
        assert!(!Arg::from(" ").is_blank());
        assert!(!Arg::fields(Point { x: 0, y: 0 }).is_blank());
    }

    #[test]
    fn json_values_convert_both_ways() {
        let input = json!({"a": [1, 2.5, "x", null, true], "b": {"c": "d"}});
        let arg = Arg::from(input.clone());
        assert_eq!(arg.to_value().unwrap(), input);
    }

    #[test]
    fn large_unsigned_numbers_keep_full_precision() {
        let input = json!([18446744073709551615u64, 9223372036854775808u64]);
        let arg = Arg::from(input.clone());
        assert!(matches!(&arg, Arg::List(items) if matches!(items[0], Arg::UInt(u64::MAX))));
        assert_eq!(arg.to_value().unwrap(), input);
        assert_eq!(Arg::from(u64::MAX).to_value().unwrap(), json!(u64::MAX));
        assert!(matches!(Arg::from(7u64), Arg::Int(7)));
    }

    #[test]
    fn objects_reflect_their_fields() {
        let arg = Arg::fields(Point { x: 1, y: 2 });
        assert_eq!(arg.to_value().unwrap(), json!({"x": 1, "y": 2}));
    }

    #[test]
    fn unencodable_values_fail_with_path() {
        let arg = Arg::from(vec![Arg::Int(1), Arg::Float(f64::NAN)]);
        let err = arg.to_value().expect_err("NaN must not encode");
        assert_eq!(err.code(), "DOMCAST_E_SERIALIZE");
        assert!(err.to_string().contains("$[1]"));

        let err = Arg::tagged("k", Arg::object(Broken))
            .to_value()
            .expect_err("broken object must not encode");
        assert!(err.to_string().contains("$.k"));
        assert!(err.to_string().contains("resource handle"));
    }
}
