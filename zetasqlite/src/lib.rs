//! zetasqlite: a BigQuery-dialect (ZetaSQL) SQL translator that runs
//! resolved logical plans against an embedded SQLite database.
//!
//! The crate never parses or analyzes SQL itself — it consumes an already
//! resolved logical plan (produced by a ZetaSQL analyzer binding upstream)
//! and rewrites it into SQLite-executable SQL, backed by a library of
//! BigQuery-semantics scalar/aggregate/window functions.
//!
//! - [`raw`] / [`extract`] / [`plan`]: read the opaque resolved plan once
//!   into a neutral, serde-free data model (C4/C5).
//! - [`context`]: the per-query scope table threaded through every
//!   transformer call.
//! - [`coordinator`]: the stateless dispatch hub (C6).
//! - [`expr`] / [`scan`] / [`stmt`]: the expression, scan, and statement
//!   transformers (C7/C8/C9).
//! - [`sql`]: the SQL writer AST and its serializer (C10).
//! - [`driver`]: the synchronous connection surface (C5's consumer).

pub mod context;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod expr;
pub mod extract;
pub mod plan;
pub mod raw;
pub mod scan;
pub mod sql;
pub mod stmt;

pub use context::{CancellationToken, FragmentContext};
pub use driver::{ConnectOptions, Driver, QueryResult, Row};
pub use error::{Error, Result};
