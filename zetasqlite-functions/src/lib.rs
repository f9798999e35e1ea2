//! Builtin scalar/aggregate/window function library (C2) and the
//! host-engine binding layer (C3).

pub mod aggregate;
pub mod bind;
pub mod error;
pub mod registry;
pub mod scalar;
pub mod window;

#[cfg(feature = "js")]
pub mod js;

pub use bind::register_all;
pub use error::{FunctionError, Result};
pub use registry::FunctionRegistry;
