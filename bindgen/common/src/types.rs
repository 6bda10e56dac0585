use serde::{Deserialize, Serialize};

/// Fixed-width scalars that can be stored in linear memory.
///
/// Widths follow the wasm32 C ABI: `long` is four bytes, pointers are four
/// bytes and are modelled as [`ScalarKind::U32`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool,
}

impl ScalarKind {
    /// Size in bytes.
    pub fn size(self) -> u32 {
        match self {
            ScalarKind::I8 | ScalarKind::U8 | ScalarKind::Bool => 1,
            ScalarKind::I16 | ScalarKind::U16 => 2,
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::F32 => 4,
            ScalarKind::I64 | ScalarKind::U64 | ScalarKind::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::F32 | ScalarKind::F64)
    }
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarKind::I8 => write!(f, "char"),
            ScalarKind::U8 => write!(f, "unsigned char"),
            ScalarKind::I16 => write!(f, "short"),
            ScalarKind::U16 => write!(f, "unsigned short"),
            ScalarKind::I32 => write!(f, "int"),
            ScalarKind::U32 => write!(f, "unsigned int"),
            ScalarKind::I64 => write!(f, "long long"),
            ScalarKind::U64 => write!(f, "unsigned long long"),
            ScalarKind::F32 => write!(f, "float"),
            ScalarKind::F64 => write!(f, "double"),
            ScalarKind::Bool => write!(f, "bool"),
        }
    }
}

/// A parsed C type, as written in an API description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CType {
    Void,
    Scalar(ScalarKind),
    /// A struct or alias name; resolved against the struct table later.
    Named(String),
    Pointer(Box<CType>),
    Array(Box<CType>, u32),
}

impl CType {
    /// `char *` and `const char *` carry text across the boundary.
    /// `unsigned char *` is a byte buffer, not text.
    pub fn is_text(&self) -> bool {
        matches!(self, CType::Pointer(inner) if matches!(**inner, CType::Scalar(ScalarKind::I8)))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, CType::Pointer(_))
    }
}

impl std::fmt::Display for CType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CType::Void => write!(f, "void"),
            CType::Scalar(kind) => write!(f, "{kind}"),
            CType::Named(name) => write!(f, "{name}"),
            CType::Pointer(inner) => write!(f, "{inner} *"),
            CType::Array(inner, len) => write!(f, "{inner}[{len}]"),
        }
    }
}

/// How an adapted binding converts one argument before the native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    Numeric,
    Boolean,
    /// Address of a packed value or packed array.
    Pointer,
    /// NUL-terminated UTF-8 buffer, scoped to the call.
    Text,
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamKind::Numeric => write!(f, "numeric"),
            ParamKind::Boolean => write!(f, "boolean"),
            ParamKind::Pointer => write!(f, "pointer"),
            ParamKind::Text => write!(f, "text"),
        }
    }
}
