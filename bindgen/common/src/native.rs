//! The contract a loaded native module must satisfy.
//!
//! A module owns one flat linear memory, an allocator inside it, and a table
//! of exported C-ABI functions that only traffic in numbers. Everything is
//! single-threaded: the bridge shares one module through [`SharedModule`]
//! and serializes every allocate/free in call order.

use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

/// A module shared between the bridge, its bindings and every packed value.
pub type SharedModule = Rc<RefCell<dyn NativeModule>>;

/// Longest string `read_cstr` will scan before giving up.
pub const MAX_CSTR_LEN: u32 = 64 * 1024;

/// A number crossing the native call boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeValue {
    Int(i64),
    Float(f64),
}

impl NativeValue {
    pub fn as_i64(self) -> i64 {
        match self {
            NativeValue::Int(v) => v,
            NativeValue::Float(v) => v as i64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            NativeValue::Int(v) => v as f64,
            NativeValue::Float(v) => v,
        }
    }

    /// Interpret as a wasm32 address.
    pub fn as_address(self) -> u32 {
        self.as_i64() as u32
    }
}

impl From<i64> for NativeValue {
    fn from(v: i64) -> Self {
        NativeValue::Int(v)
    }
}

impl From<u32> for NativeValue {
    fn from(v: u32) -> Self {
        NativeValue::Int(v as i64)
    }
}

impl From<f64> for NativeValue {
    fn from(v: f64) -> Self {
        NativeValue::Float(v)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NativeError {
    #[error("module has no export named '{name}'")]
    MissingExport { name: String },

    #[error("memory access out of bounds: {len} bytes at {address:#x}")]
    OutOfBounds { address: u32, len: u32 },

    #[error("'{name}' expects {expected} arguments, got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("string at {address:#x} is not terminated")]
    Unterminated { address: u32 },

    #[error("'{name}' trapped: {message}")]
    Trap { name: String, message: String },
}

pub trait NativeModule {
    /// False until the module has finished instantiating.
    fn is_ready(&self) -> bool;

    /// Allocate `size` bytes; returns 0 when the heap is exhausted.
    fn allocate(&mut self, size: u32) -> u32;

    fn free(&mut self, address: u32);

    fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), NativeError>;

    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), NativeError>;

    fn has_export(&self, name: &str) -> bool;

    /// Call an export. `None` is a void return.
    fn call(&mut self, name: &str, args: &[NativeValue]) -> Result<Option<NativeValue>, NativeError>;

    /// Copy `text` into fresh memory as NUL-terminated UTF-8.
    ///
    /// Returns 0 when the allocator is exhausted. The caller owns the buffer.
    fn alloc_text(&mut self, text: &str) -> Result<u32, NativeError> {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);

        let address = self.allocate(bytes.len() as u32);
        if address == 0 {
            return Ok(0);
        }
        if let Err(err) = self.write(address, &bytes) {
            self.free(address);
            return Err(err);
        }
        Ok(address)
    }

    /// Read a NUL-terminated string. Invalid UTF-8 is replaced, not rejected.
    fn read_cstr(&self, address: u32) -> Result<String, NativeError> {
        let mut bytes = Vec::new();
        let mut byte = [0u8; 1];
        for offset in 0..MAX_CSTR_LEN {
            self.read(address.wrapping_add(offset), &mut byte)?;
            if byte[0] == 0 {
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            bytes.push(byte[0]);
        }
        Err(NativeError::Unterminated { address })
    }
}
