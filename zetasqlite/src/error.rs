//! The five-layer error taxonomy of `spec.md §7`: extraction, transformation,
//! value, catalog, and host-engine errors, each wrapped with a context
//! phrase naming the operation that failed.

use thiserror::Error;

use zetasqlite_catalog::CatalogError;
use zetasqlite_value::ValueError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to extract {shape}: {message}")]
    Extraction { shape: String, message: String },

    #[error("failed to transform {operation}: {source}")]
    Transform {
        operation: String,
        #[source]
        source: Box<Error>,
    },

    #[error("unknown {kind} tag '{tag}'")]
    UnknownTag { kind: &'static str, tag: String },

    #[error("column validation failed for '{alias}': {reason}")]
    ColumnValidation { alias: String, reason: String },

    #[error("unresolved column id {0}")]
    UnresolvedColumn(i64),

    #[error("no column mapping recorded for CTE '{0}'")]
    MissingCteMapping(String),

    #[error("MERGE condition must be a simple equality of one source and one target column")]
    UnsupportedMergeCondition,

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("host engine failure while executing: {sql}\ncaused by: {source}")]
    HostEngine {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Function(#[from] zetasqlite_functions::FunctionError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Wraps an error with a context phrase naming the operation that failed,
/// mirroring `spec.md §7`'s "failed to transform filter scan: …" stacking.
pub trait Context<T> {
    fn context(self, operation: impl Into<String>) -> Result<T>;
}

impl<T> Context<T> for Result<T> {
    fn context(self, operation: impl Into<String>) -> Result<T> {
        self.map_err(|source| Error::Transform {
            operation: operation.into(),
            source: Box::new(source),
        })
    }
}
