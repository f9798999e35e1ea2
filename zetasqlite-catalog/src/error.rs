use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("table '{0}' already exists")]
    TableExists(String),

    #[error("function '{0}' already exists")]
    FunctionExists(String),

    #[error("table '{0}' not found")]
    TableNotFound(String),

    #[error("function '{0}' not found")]
    FunctionNotFound(String),

    #[error("failed to encode spec for '{name}': {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode spec for '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
