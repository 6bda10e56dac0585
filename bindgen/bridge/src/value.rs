use crate::packed::{PackedArray, PackedValue};
use std::fmt;
use std::rc::Rc;

/// A value on the interpreter side of the bridge.
#[derive(Debug, Clone)]
pub enum Value {
    Void,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Packed(Rc<PackedValue>),
    Array(Rc<PackedArray>),
}

impl Value {
    /// Integer view. Floats truncate toward zero, booleans are 0 or 1.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_packed(&self) -> Option<&Rc<PackedValue>> {
        match self {
            Value::Packed(p) => Some(p),
            _ => None,
        }
    }

    /// Truthiness as the native side sees it: non-zero numbers are true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Void => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Packed(_) | Value::Array(_) => true,
        }
    }

    /// Short name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "text",
            Value::Packed(_) => "struct",
            Value::Array(_) => "array",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Rc<PackedValue>> for Value {
    fn from(v: Rc<PackedValue>) -> Self {
        Value::Packed(v)
    }
}

impl From<Rc<PackedArray>> for Value {
    fn from(v: Rc<PackedArray>) -> Self {
        Value::Array(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Packed(p) => match p.fields() {
                Ok(fields) => {
                    write!(f, "{}(", p.name())?;
                    for (i, (name, value)) in fields.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{name}={value}")?;
                    }
                    write!(f, ")")
                }
                Err(_) => write!(f, "{}(<unreadable>)", p.name()),
            },
            Value::Array(a) => write!(f, "{}[{}]", a.element(), a.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_views_convert() {
        assert_eq!(Value::Float(-2.9).as_i64(), Some(-2));
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::from("x").as_i64(), None);
    }

    #[test]
    fn truthiness() {
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Void.is_truthy());
        assert!(Value::Bool(true).is_truthy());
    }

    #[test]
    fn display_scalars() {
        assert_eq!(Value::from("hi").to_string(), "\"hi\"");
        assert_eq!(Value::Int(-4).to_string(), "-4");
        assert_eq!(Value::Void.to_string(), "void");
    }
}
