use thiserror::Error;

/// Errors raised while constructing, converting, or encoding a [`crate::Value`].
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("cannot convert {from} to {to}")]
    Conversion { from: &'static str, to: &'static str },

    #[error("arithmetic overflow in {op}")]
    Overflow { op: &'static str },

    #[error("division by zero")]
    DivisionByZero,

    #[error("malformed wire value: {0}")]
    MalformedWire(String),

    #[error("unrecognized wire header: {0}")]
    UnknownHeader(String),

    #[error("could not parse '{input}' as {kind}")]
    TemporalParse { input: String, kind: &'static str },

    #[error("unknown format specifier '%{0}' in strftime pattern")]
    UnknownFormatSpecifier(char),

    #[error("invalid EXTRACT part '{0}'")]
    UnknownExtractPart(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Decimal(#[from] rust_decimal::Error),
}

pub type Result<T> = std::result::Result<T, ValueError>;
