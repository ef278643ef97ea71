//! Parameter values and the kinds a schema assigns to them.

use serde::Serialize;
use std::fmt;

/// A runtime parameter value.
///
/// `None` and `List` are opaque: they merge through the config layer and
/// override rules, but no command-line flag is ever derived for them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    None,
    List(Vec<Value>),
}

/// Declared kind of a schema parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    String,
    Opaque,
}

impl ParamKind {
    /// Kind of a concrete value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ParamKind::Bool,
            Value::Int(_) => ParamKind::Int,
            Value::Float(_) => ParamKind::Float,
            Value::Str(_) => ParamKind::String,
            Value::None | Value::List(_) => ParamKind::Opaque,
        }
    }

    /// Check `value` against this kind, returning it in the declared kind.
    ///
    /// Ints widen to floats. Opaque parameters accept anything. On mismatch
    /// the value is handed back unchanged.
    pub fn coerce(self, value: Value) -> Result<Value, Value> {
        match (self, value) {
            (ParamKind::Opaque, v) => Ok(v),
            (ParamKind::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (kind, v) if ParamKind::of(&v) == kind => Ok(v),
            (_, v) => Err(v),
        }
    }

    /// Whether a command-line flag can be derived for this kind.
    pub fn is_scalar(self) -> bool {
        !matches!(self, ParamKind::Opaque)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::String => "string",
            ParamKind::Opaque => "opaque",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    pub fn kind(&self) -> ParamKind {
        ParamKind::of(self)
    }

    /// Equality used when comparing a trigger parameter against a rule's
    /// trigger value: ints and floats compare numerically.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
            }
            (a, b) => a == b,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::None => false,
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view of a numeric value (ints widen).
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Render as parameter-script source that evaluates back to this value.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i64::MIN) => format!("({} - 1)", i64::MIN + 1),
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.is_nan() => "float(\"nan\")".to_string(),
            Value::Float(f) if f.is_infinite() => {
                if *f > 0.0 {
                    "float(\"inf\")".to_string()
                } else {
                    "float(\"-inf\")".to_string()
                }
            }
            // Debug output always carries a decimal point or an exponent.
            Value::Float(f) => format!("{:?}", f),
            Value::Str(s) => literal_str(s),
            Value::None => "none".to_string(),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_literal).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::None => f.write_str("none"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.to_literal())?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

// Config text has this token substituted before evaluation, so a rendered
// string must never contain it verbatim.
const FILE_TOKEN: &str = "__FILE__";

fn literal_str(s: &str) -> String {
    if !s.contains(FILE_TOKEN) {
        return quote(s);
    }
    s.split(FILE_TOKEN)
        .map(quote)
        .collect::<Vec<_>>()
        .join(" + \"__FI\" + \"LE__\" + ")
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
