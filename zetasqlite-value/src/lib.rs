//! Tagged value model and wire codec for zetasqlite (`C1`).
//!
//! This crate has no dependency on SQLite or any other host engine; it is
//! pure value-level logic so it can be exercised and tested independently
//! of the translator that calls into it.

pub mod codec;
pub mod error;
pub mod hash;
pub mod temporal;
pub mod value;

pub use codec::{encode_literal, encode_typed, value_of, EncodedLiteral, HostScalar, TypeTag};
pub use error::{Result, ValueError};
pub use value::Value;
