use crate::native::NativeError;
use crate::span::Span;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Setup error: native module has not finished loading")]
    NotInitialized,

    #[error("Setup error: native module does not export '{symbol}'")]
    UnknownSymbol { symbol: String },

    #[error("Binding error: '{name}' is already bound")]
    DuplicateBinding { name: String },

    #[error("Allocation error: native heap could not provide {size} bytes")]
    AllocationFailed { size: u32 },

    #[error("Signature error: {name}: {message}")]
    SignatureMismatch { name: String, message: String },

    #[error("Name error: '{name}' is not defined")]
    UndefinedName { name: String },

    #[error("Field error: {layout} has no field '{field}'")]
    UnknownField { layout: String, field: String },

    #[error("Field error: {layout}.{field} is read-only")]
    FrozenValue { layout: String, field: String },

    #[error("Index error: index {index} is out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Type syntax error: {message}")]
    TypeSyntax {
        message: String,
        input: String,
        span: Span,
    },

    #[error("Type error: unknown type '{name}'")]
    UnknownType { name: String },

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Native error: {0}")]
    Native(#[from] NativeError),
}

impl BridgeError {
    pub fn span(&self) -> Option<Span> {
        match self {
            BridgeError::TypeSyntax { span, .. } => Some(*span),
            _ => None,
        }
    }

    /// Host-configuration errors abort setup; everything else only aborts
    /// the call that raised it.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            BridgeError::NotInitialized
                | BridgeError::UnknownSymbol { .. }
                | BridgeError::DuplicateBinding { .. }
                | BridgeError::TypeSyntax { .. }
                | BridgeError::UnknownType { .. }
                | BridgeError::Api { .. }
        )
    }
}
