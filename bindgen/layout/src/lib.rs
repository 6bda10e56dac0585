//! Declarative struct layouts and call signatures.
//!
//! A [`Layout`] is declared once (field name, kind, derived offset) and
//! both the allocation size and every accessor are derived from it. Layouts
//! are packed: members follow each other with no padding, so `Color` is 4
//! bytes and `Rectangle` is 16.

mod type_table;

use indexmap::IndexMap;
use raybridge_common::error::BridgeError;
use raybridge_common::types::{CType, ParamKind, ScalarKind};
use raybridge_parser::api::{ApiDescription, ApiFunction, DefineValue};
use raybridge_parser::parse_ctype;
use std::rc::Rc;

pub use type_table::TypeTable;

/// What a field stores.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Scalar(ScalarKind),
    /// A wasm32 address; read and written as an unsigned 32-bit integer.
    Pointer,
    Struct(Rc<Layout>),
    Array { element: Box<FieldKind>, len: u32 },
}

impl FieldKind {
    pub fn size(&self) -> u32 {
        match self {
            FieldKind::Scalar(kind) => kind.size(),
            FieldKind::Pointer => 4,
            FieldKind::Struct(layout) => layout.size,
            FieldKind::Array { element, len } => element.size().saturating_mul(*len),
        }
    }

    /// Size in bytes, or `None` if it does not fit a wasm32 address space.
    pub fn checked_size(&self) -> Option<u32> {
        match self {
            FieldKind::Array { element, len } => element.checked_size()?.checked_mul(*len),
            other => Some(other.size()),
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Scalar(kind) => write!(f, "{kind}"),
            FieldKind::Pointer => write!(f, "pointer"),
            FieldKind::Struct(layout) => write!(f, "{}", layout.name),
            FieldKind::Array { element, len } => write!(f, "{element}[{len}]"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub name: String,
    pub fields: Vec<Field>,
    pub size: u32,
}

impl Layout {
    /// Lay `fields` out back to back in declaration order.
    ///
    /// Sizes saturate; layouts read from an API description go through
    /// [`Layout::try_new`] instead.
    pub fn new(name: impl Into<String>, fields: Vec<(String, FieldKind)>) -> Self {
        let mut offset: u32 = 0;
        let fields = fields
            .into_iter()
            .map(|(name, kind)| {
                let field = Field { name, offset, kind };
                offset = offset.saturating_add(field.kind.size());
                field
            })
            .collect();
        Self {
            name: name.into(),
            fields,
            size: offset,
        }
    }

    /// Like [`Layout::new`], but a struct whose size overflows `u32` is an
    /// API error.
    pub fn try_new(
        name: impl Into<String>,
        fields: Vec<(String, FieldKind)>,
    ) -> Result<Self, BridgeError> {
        let name = name.into();
        let mut offset: u32 = 0;
        let mut laid_out = Vec::with_capacity(fields.len());
        for (field, kind) in fields {
            let end = kind
                .checked_size()
                .and_then(|size| offset.checked_add(size))
                .ok_or_else(|| BridgeError::Api {
                    message: format!("struct {name} is too large at field '{field}'"),
                })?;
            laid_out.push(Field {
                name: field,
                kind,
                offset,
            });
            offset = end;
        }
        Ok(Self {
            name,
            fields: laid_out,
            size: offset,
        })
    }

    /// The RGBA layout used for every color constant.
    pub fn color() -> Self {
        let channel = |n: &str| (n.to_string(), FieldKind::Scalar(ScalarKind::U8));
        Layout::new("Color", vec![channel("r"), channel("g"), channel("b"), channel("a")])
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// How an adapted call hands its result back.
#[derive(Debug, Clone)]
pub enum ReturnKind {
    Void,
    Numeric,
    Boolean,
    /// NUL-terminated string owned by the native side; copied out.
    Text,
    /// By-value struct return. The caller allocates the result and passes
    /// its address as a hidden first argument.
    Struct(Rc<Layout>),
}

impl std::fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReturnKind::Void => write!(f, "void"),
            ReturnKind::Numeric => write!(f, "numeric"),
            ReturnKind::Boolean => write!(f, "boolean"),
            ReturnKind::Text => write!(f, "text"),
            ReturnKind::Struct(layout) => write!(f, "{}", layout.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub params: Vec<ParamKind>,
    pub ret: ReturnKind,
}

impl Signature {
    pub fn new(params: Vec<ParamKind>, ret: ReturnKind) -> Self {
        Self { params, ret }
    }

    /// A function can be bound without adaptation when both sides already
    /// agree on every argument and the result. A `bool` result needs
    /// adapting: the native side hands back 0 or 1.
    pub fn is_raw(&self) -> bool {
        self.params
            .iter()
            .all(|p| matches!(p, ParamKind::Numeric | ParamKind::Boolean))
            && matches!(self.ret, ReturnKind::Void | ReturnKind::Numeric)
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub signature: Signature,
}

/// Everything the bridge needs from an API description.
#[derive(Debug, Default)]
pub struct ResolvedApi {
    pub types: TypeTable,
    pub functions: Vec<FunctionDef>,
    pub constants: IndexMap<String, DefineValue>,
    /// Functions left out because they mention types the bridge cannot
    /// marshal (callbacks, unknown typedefs).
    pub skipped: Vec<(String, BridgeError)>,
}

/// Resolve struct layouts, call signatures and constants.
///
/// Struct errors are fatal; function errors only drop that function.
pub fn resolve(api: &ApiDescription) -> Result<ResolvedApi, BridgeError> {
    let mut resolved = ResolvedApi::default();

    for s in &api.structs {
        let mut fields = Vec::with_capacity(s.fields.len());
        for field in &s.fields {
            let ty = parse_ctype(&field.ty)?;
            fields.push((field.name.clone(), field_kind(&resolved.types, &ty)?));
        }
        let layout = resolved.types.insert(Layout::try_new(s.name.clone(), fields)?);
        tracing::debug!(name = %layout.name, size = layout.size, "resolved struct layout");

        // Aliases may only name structs declared so far; raylib lists them
        // after the struct they rename, so register eagerly.
        for alias in api.aliases.iter().filter(|a| a.target == s.name) {
            resolved.types.alias(alias.name.clone(), alias.target.clone());
        }
    }
    for alias in &api.aliases {
        if resolved.types.lookup(&alias.name).is_none() {
            resolved.types.alias(alias.name.clone(), alias.target.clone());
        }
    }

    for function in &api.functions {
        match signature(&resolved.types, function) {
            Ok(signature) => resolved.functions.push(FunctionDef {
                name: function.name.clone(),
                signature,
            }),
            Err(err) => {
                tracing::debug!(function = %function.name, error = %err, "skipping function");
                resolved.skipped.push((function.name.clone(), err));
            }
        }
    }

    for define in &api.defines {
        if let Some(value) = define.decode()? {
            insert_constant(&mut resolved.constants, &define.name, value)?;
        }
    }
    for e in &api.enums {
        for v in &e.values {
            insert_constant(&mut resolved.constants, &v.name, DefineValue::Int(v.value))?;
        }
    }

    Ok(resolved)
}

/// Map a struct member type to its storage kind.
pub fn field_kind(types: &TypeTable, ty: &CType) -> Result<FieldKind, BridgeError> {
    match ty {
        CType::Void => Err(BridgeError::Api {
            message: "struct members cannot be void".into(),
        }),
        CType::Scalar(kind) => Ok(FieldKind::Scalar(*kind)),
        CType::Pointer(_) => Ok(FieldKind::Pointer),
        CType::Named(name) => types
            .lookup(name)
            .map(|layout| FieldKind::Struct(Rc::clone(layout)))
            .ok_or_else(|| BridgeError::UnknownType { name: name.clone() }),
        CType::Array(element, len) => {
            let kind = FieldKind::Array {
                element: Box::new(field_kind(types, element)?),
                len: *len,
            };
            match kind.checked_size() {
                Some(_) => Ok(kind),
                None => Err(BridgeError::Api {
                    message: format!("array type '{ty}' is too large"),
                }),
            }
        }
    }
}

/// Defines and enum values share one namespace; a name may appear once.
fn insert_constant(
    constants: &mut IndexMap<String, DefineValue>,
    name: &str,
    value: DefineValue,
) -> Result<(), BridgeError> {
    if constants.contains_key(name) {
        return Err(BridgeError::Api {
            message: format!("constant '{name}' is declared more than once"),
        });
    }
    constants.insert(name.to_string(), value);
    Ok(())
}

/// Map a parameter type to how it is marshalled.
///
/// Structs passed by value travel as a pointer to a copy under the wasm32
/// C ABI, so they are marshalled exactly like pointers.
pub fn param_kind(types: &TypeTable, ty: &CType) -> Result<ParamKind, BridgeError> {
    match ty {
        CType::Void => Err(BridgeError::Api {
            message: "parameters cannot be void".into(),
        }),
        CType::Scalar(ScalarKind::Bool) => Ok(ParamKind::Boolean),
        CType::Scalar(_) => Ok(ParamKind::Numeric),
        _ if ty.is_text() => Ok(ParamKind::Text),
        CType::Pointer(_) | CType::Array(..) => Ok(ParamKind::Pointer),
        CType::Named(name) => types
            .lookup(name)
            .map(|_| ParamKind::Pointer)
            .ok_or_else(|| BridgeError::UnknownType { name: name.clone() }),
    }
}

pub fn return_kind(types: &TypeTable, ty: &CType) -> Result<ReturnKind, BridgeError> {
    match ty {
        CType::Void => Ok(ReturnKind::Void),
        CType::Scalar(ScalarKind::Bool) => Ok(ReturnKind::Boolean),
        CType::Scalar(_) => Ok(ReturnKind::Numeric),
        _ if ty.is_text() => Ok(ReturnKind::Text),
        CType::Pointer(_) => Ok(ReturnKind::Numeric),
        CType::Named(name) => types
            .lookup(name)
            .map(|layout| ReturnKind::Struct(Rc::clone(layout)))
            .ok_or_else(|| BridgeError::UnknownType { name: name.clone() }),
        CType::Array(..) => Err(BridgeError::Api {
            message: format!("cannot return array type '{ty}'"),
        }),
    }
}

fn signature(types: &TypeTable, function: &ApiFunction) -> Result<Signature, BridgeError> {
    let params = function
        .params
        .iter()
        .map(|p| param_kind(types, &parse_ctype(&p.ty)?))
        .collect::<Result<Vec<_>, _>>()?;
    let ret = return_kind(types, &parse_ctype(&function.return_type)?)?;
    Ok(Signature::new(params, ret))
}
