//! Bound functions: native exports callable with interpreter values.

use crate::packed::PackedValue;
use crate::value::Value;
use raybridge_common::error::BridgeError;
use raybridge_common::native::{NativeValue, SharedModule};
use raybridge_common::types::ParamKind;
use raybridge_layout::{ReturnKind, Signature};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Arguments and result cross unchanged.
    Raw,
    /// Arguments are converted per an explicit signature.
    Adapted,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::Raw => write!(f, "raw"),
            BindingKind::Adapted => write!(f, "adapted"),
        }
    }
}

/// What happens when a name is bound twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    Overwrite,
}

pub struct BoundFunction {
    name: String,
    symbol: String,
    signature: Option<Signature>,
    module: SharedModule,
}

impl BoundFunction {
    pub(crate) fn raw(name: &str, symbol: &str, module: &SharedModule) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            signature: None,
            module: Rc::clone(module),
        }
    }

    pub(crate) fn adapted(
        name: &str,
        symbol: &str,
        signature: Signature,
        module: &SharedModule,
    ) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            signature: Some(signature),
            module: Rc::clone(module),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn kind(&self) -> BindingKind {
        match self.signature {
            Some(_) => BindingKind::Adapted,
            None => BindingKind::Raw,
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        match &self.signature {
            None => self.call_raw(args),
            Some(signature) => self.call_adapted(signature, args),
        }
    }

    fn call_raw(&self, args: &[Value]) -> Result<Value> {
        let native = args
            .iter()
            .enumerate()
            .map(|(i, arg)| match arg {
                Value::Int(v) => Ok(NativeValue::Int(*v)),
                Value::Bool(b) => Ok(NativeValue::Int(*b as i64)),
                Value::Float(v) => Ok(NativeValue::Float(*v)),
                other => Err(self.mismatch(format!(
                    "argument {}: raw bindings only take numbers, got {}",
                    i + 1,
                    other.kind_name()
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let result = self.module.borrow_mut().call(&self.symbol, &native)?;
        Ok(match result {
            None => Value::Void,
            Some(NativeValue::Int(v)) => Value::Int(v),
            Some(NativeValue::Float(v)) => Value::Float(v),
        })
    }

    fn call_adapted(&self, signature: &Signature, args: &[Value]) -> Result<Value> {
        if args.len() != signature.params.len() {
            return Err(self.mismatch(format!(
                "expected {} arguments, got {}",
                signature.params.len(),
                args.len()
            )));
        }

        // Text buffers live until the end of this function, whichever way
        // it returns.
        let mut texts = Vec::new();
        let mut native = Vec::with_capacity(args.len() + 1);

        let sret = match &signature.ret {
            ReturnKind::Struct(layout) => {
                let out = PackedValue::allocate(&self.module, layout)?;
                native.push(NativeValue::from(out.address()));
                Some(out)
            }
            _ => None,
        };

        for (i, (param, arg)) in signature.params.iter().zip(args).enumerate() {
            let value = match (param, arg) {
                (ParamKind::Numeric, Value::Float(v)) => NativeValue::Float(*v),
                (ParamKind::Numeric, Value::Int(v)) => NativeValue::Int(*v),
                (ParamKind::Numeric, Value::Bool(b)) => NativeValue::Int(*b as i64),
                (ParamKind::Boolean, Value::Bool(_) | Value::Int(_)) => {
                    NativeValue::Int(arg.is_truthy() as i64)
                }
                (ParamKind::Pointer, Value::Packed(p)) => NativeValue::from(p.address()),
                (ParamKind::Pointer, Value::Array(a)) => NativeValue::from(a.address()),
                (ParamKind::Pointer, Value::Void) => NativeValue::Int(0),
                (ParamKind::Text, Value::Str(s)) if s.contains('\0') => {
                    return Err(self.mismatch(format!(
                        "argument {}: text contains a NUL byte",
                        i + 1
                    )));
                }
                (ParamKind::Text, Value::Str(s)) => {
                    let text = TextArg::new(&self.module, s)?;
                    let address = text.address;
                    texts.push(text);
                    NativeValue::from(address)
                }
                _ => {
                    return Err(self.mismatch(format!(
                        "argument {}: expected {param}, got {}",
                        i + 1,
                        arg.kind_name()
                    )));
                }
            };
            native.push(value);
        }

        tracing::trace!(name = %self.name, ?native, "adapted call");
        let result = self.module.borrow_mut().call(&self.symbol, &native)?;

        let value = match (&signature.ret, result) {
            (ReturnKind::Struct(_), _) => sret.map(Value::Packed).unwrap_or(Value::Void),
            (ReturnKind::Void, _) | (_, None) => Value::Void,
            (ReturnKind::Numeric, Some(NativeValue::Float(v))) => Value::Float(v),
            (ReturnKind::Numeric, Some(v)) => Value::Int(v.as_i64()),
            (ReturnKind::Boolean, Some(v)) => Value::Bool(v.as_i64() != 0),
            (ReturnKind::Text, Some(v)) => match v.as_address() {
                0 => Value::Void,
                address => Value::Str(self.module.borrow().read_cstr(address)?),
            },
        };
        drop(texts);
        Ok(value)
    }

    fn mismatch(&self, message: String) -> BridgeError {
        BridgeError::SignatureMismatch {
            name: self.name.clone(),
            message,
        }
    }
}

impl fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFunction")
            .field("name", &self.name)
            .field("symbol", &self.symbol)
            .field("kind", &self.kind())
            .finish()
    }
}

/// A NUL-terminated copy of a string argument, freed when dropped.
struct TextArg {
    module: SharedModule,
    address: u32,
}

impl TextArg {
    fn new(module: &SharedModule, text: &str) -> Result<Self> {
        let address = module.borrow_mut().alloc_text(text)?;
        if address == 0 {
            return Err(BridgeError::AllocationFailed {
                size: text.len() as u32 + 1,
            });
        }
        Ok(Self {
            module: Rc::clone(module),
            address,
        })
    }
}

impl Drop for TextArg {
    fn drop(&mut self) {
        match self.module.try_borrow_mut() {
            Ok(mut m) => m.free(self.address),
            Err(_) => tracing::error!(address = self.address, "native module busy; text argument leaked"),
        }
    }
}
