//! Types shared by every raybridge crate: C types, the native module
//! contract, source spans and the error enum.

pub mod error;
pub mod native;
pub mod span;
pub mod types;
