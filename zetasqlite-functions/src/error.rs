use thiserror::Error;

#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{name} expects {expected} argument(s), got {actual}")]
    Arity {
        name: &'static str,
        expected: String,
        actual: usize,
    },

    #[error(transparent)]
    Value(#[from] zetasqlite_value::ValueError),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0} cannot be inverted over a shrinking window frame")]
    UnsupportedWindowFrame(&'static str),
}

pub type Result<T> = std::result::Result<T, FunctionError>;
