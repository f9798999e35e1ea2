pub mod ast;
pub mod writer;

pub use ast::*;
pub use writer::{serialize, serialize_with, Writer};
