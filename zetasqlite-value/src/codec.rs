//! The encoded wire format (`spec.md §3.2`, `§6.2`): every non-scalar value
//! is smuggled through a host engine that only knows four scalar kinds
//! (int, float, text, blob) as a tagged text of the form `<header><body>`.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValueError};
use crate::value::Value;

/// The four scalar kinds the host engine natively stores.
#[derive(Debug, Clone, PartialEq)]
pub enum HostScalar {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// The declared BigQuery type of a driver parameter or catalog column,
/// used to pick a converter in [`encode_typed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Int,
    Float,
    Bool,
    String,
    Bytes,
    Numeric,
    Json,
    Date,
    Datetime,
    Time,
    Timestamp,
    Array,
    Struct,
}

const HEADER_ARRAY: &str = "zetasqlitearray:";
const HEADER_STRUCT: &str = "zetasqlitestruct:";
const HEADER_DATE: &str = "zetasqlitedate:";
const HEADER_DATETIME: &str = "zetasqlitedatetime:";
const HEADER_TIME: &str = "zetasqlitetime:";
const HEADER_TIMESTAMP: &str = "zetasqlitetimestamp:";

/// Probe order for `valueOf`'s header detection. Longer/ more specific
/// headers are tried first; a plain string is the fallback.
const PROBE_ORDER: &[&str] = &[
    HEADER_DATETIME,
    HEADER_TIMESTAMP,
    HEADER_DATE,
    HEADER_TIME,
    HEADER_ARRAY,
    HEADER_STRUCT,
];

/// The recursive compound-payload shape carried inside `zetasqlitearray:`
/// and `zetasqlitestruct:` bodies, and inside the general analyzer-literal
/// form (`base64(JSON({header: TYPE_TAG, body: ...}))`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "header", content = "body")]
enum WirePayload {
    Int(i64),
    String(String),
    Bytes(String),
    Float(f64),
    Numeric(String),
    Bool(bool),
    Date(String),
    Datetime(String),
    Time(String),
    Timestamp(String),
    Interval(String),
    Json(String),
    Array(Vec<WirePayload>),
    Struct(Vec<(String, WirePayload)>),
}

impl WirePayload {
    fn from_value(value: &Value) -> Result<WirePayload> {
        Ok(match value {
            Value::Int(v) => WirePayload::Int(*v),
            Value::Float(v) => WirePayload::Float(*v),
            Value::Bool(v) => WirePayload::Bool(*v),
            Value::String(v) => WirePayload::String(v.clone()),
            Value::Bytes(v) => WirePayload::Bytes(
                base64::engine::general_purpose::STANDARD.encode(v),
            ),
            Value::Numeric(v) => WirePayload::Numeric(v.to_string()),
            Value::Json(v) => WirePayload::Json(v.to_string()),
            Value::Date(v) => WirePayload::Date(v.format("%Y-%m-%d").to_string()),
            Value::Datetime(v) => {
                WirePayload::Datetime(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            Value::Time(v) => WirePayload::Time(v.format("%H:%M:%S%.f").to_string()),
            Value::Timestamp(v) => WirePayload::Timestamp(v.to_rfc3339()),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(WirePayload::from_value(item)?);
                }
                WirePayload::Array(out)
            }
            Value::Struct(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    out.push((name.clone(), WirePayload::from_value(value)?));
                }
                WirePayload::Struct(out)
            }
            Value::Safe(inner) => return WirePayload::from_value(inner),
        })
    }

    fn into_value(self) -> Result<Value> {
        Ok(match self {
            WirePayload::Int(v) => Value::Int(v),
            WirePayload::Float(v) => Value::Float(v),
            WirePayload::Bool(v) => Value::Bool(v),
            WirePayload::String(v) => Value::String(v),
            WirePayload::Bytes(v) => Value::Bytes(
                base64::engine::general_purpose::STANDARD
                    .decode(v)
                    .map_err(ValueError::from)?,
            ),
            WirePayload::Numeric(v) => Value::Numeric(v.parse().map_err(ValueError::from)?),
            WirePayload::Json(v) => {
                Value::Json(serde_json::from_str(&v).map_err(ValueError::from)?)
            }
            WirePayload::Date(v) => Value::Date(crate::temporal::parse_date(&v)?),
            WirePayload::Datetime(v) => Value::Datetime(crate::temporal::parse_datetime(&v)?),
            WirePayload::Time(v) => Value::Time(crate::temporal::parse_time(&v)?),
            WirePayload::Timestamp(v) => Value::Timestamp(crate::temporal::parse_timestamp(&v)?),
            WirePayload::Interval(v) => Value::String(v),
            WirePayload::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.into_value()?);
                }
                Value::Array(out)
            }
            WirePayload::Struct(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    out.push((name, value.into_value()?));
                }
                Value::Struct(out)
            }
        })
    }
}

/// A literal suitable for pasting into emitted SQL text. `quoted` tells the
/// SQL writer (C10) whether this needs the host's string-literal quoting;
/// native numeric/boolean literals do not.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedLiteral {
    pub text: String,
    pub quoted: bool,
}

/// Reconstitutes a value from a host-returned scalar. Text values are
/// probed for each wire header in a fixed order; on no match, the text is
/// treated as a plain string.
pub fn value_of(scalar: &HostScalar) -> Result<Option<Value>> {
    Ok(match scalar {
        HostScalar::Null => None,
        HostScalar::Int(v) => Some(Value::Int(*v)),
        HostScalar::Float(v) => Some(Value::Float(*v)),
        HostScalar::Blob(v) => Some(Value::Bytes(v.clone())),
        HostScalar::Text(s) => Some(decode_tagged_or_plain(s)?),
    })
}

fn decode_tagged_or_plain(s: &str) -> Result<Value> {
    let unquoted = s.trim_matches('\'').trim_matches('"');
    for header in PROBE_ORDER {
        if let Some(body) = unquoted.strip_prefix(header) {
            return decode_body(*header, body);
        }
    }
    if let Some(body) = unquoted.strip_prefix("base64:") {
        return decode_general_literal(body);
    }
    Ok(Value::String(s.to_string()))
}

fn decode_body(header: &str, body: &str) -> Result<Value> {
    match header {
        HEADER_DATE => Ok(Value::Date(crate::temporal::parse_date(body)?)),
        HEADER_DATETIME => Ok(Value::Datetime(crate::temporal::parse_datetime(body)?)),
        HEADER_TIME => Ok(Value::Time(crate::temporal::parse_time(body)?)),
        HEADER_TIMESTAMP => Ok(Value::Timestamp(crate::temporal::parse_timestamp(body)?)),
        HEADER_ARRAY => decode_base64_json(body),
        HEADER_STRUCT => decode_base64_json(body),
        other => Err(ValueError::UnknownHeader(other.to_string())),
    }
}

fn decode_base64_json(body: &str) -> Result<Value> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(ValueError::from)?;
    let text = String::from_utf8(raw)
        .map_err(|e| ValueError::MalformedWire(e.to_string()))?;
    let payload: WirePayload = serde_json::from_str(&text).map_err(ValueError::from)?;
    payload.into_value()
}

fn decode_general_literal(body: &str) -> Result<Value> {
    decode_base64_json(body)
}

/// Produces a literal suitable for pasting into emitted SQL. Inverse of
/// [`value_of`] modulo quoting.
pub fn encode_literal(value: &Value) -> Result<EncodedLiteral> {
    Ok(match value {
        Value::Int(v) => EncodedLiteral {
            text: v.to_string(),
            quoted: false,
        },
        Value::Float(v) => EncodedLiteral {
            text: v.to_string(),
            quoted: false,
        },
        Value::Bool(v) => EncodedLiteral {
            text: if *v { "TRUE" } else { "FALSE" }.to_string(),
            quoted: false,
        },
        Value::String(v) => EncodedLiteral {
            text: v.clone(),
            quoted: true,
        },
        Value::Numeric(v) => EncodedLiteral {
            text: v.to_string(),
            quoted: false,
        },
        Value::Date(v) => EncodedLiteral {
            text: format!("{HEADER_DATE}{}", v.format("%Y-%m-%d")),
            quoted: true,
        },
        Value::Datetime(v) => EncodedLiteral {
            text: format!("{HEADER_DATETIME}{}", v.format("%Y-%m-%dT%H:%M:%S%.f")),
            quoted: true,
        },
        Value::Time(v) => EncodedLiteral {
            text: format!("{HEADER_TIME}{}", v.format("%H:%M:%S%.f")),
            quoted: true,
        },
        Value::Timestamp(v) => EncodedLiteral {
            text: format!("{HEADER_TIMESTAMP}{}", v.to_rfc3339()),
            quoted: true,
        },
        Value::Bytes(v) => EncodedLiteral {
            text: base64::engine::general_purpose::STANDARD.encode(v),
            quoted: true,
        },
        Value::Json(v) => EncodedLiteral {
            text: v.to_string(),
            quoted: true,
        },
        Value::Array(_) => {
            let payload = WirePayload::from_value(value)?;
            let json = serde_json::to_string(&payload).map_err(ValueError::from)?;
            EncodedLiteral {
                text: format!(
                    "{HEADER_ARRAY}{}",
                    base64::engine::general_purpose::STANDARD.encode(json)
                ),
                quoted: true,
            }
        }
        Value::Struct(_) => {
            let payload = WirePayload::from_value(value)?;
            let json = serde_json::to_string(&payload).map_err(ValueError::from)?;
            EncodedLiteral {
                text: format!(
                    "{HEADER_STRUCT}{}",
                    base64::engine::general_purpose::STANDARD.encode(json)
                ),
                quoted: true,
            }
        }
        Value::Safe(inner) => encode_literal(inner)?,
    })
}

/// Coerces/encodes a driver-bound host scalar given its declared BigQuery
/// type, e.g. a textual date becomes the tagged date wire form.
pub fn encode_typed(scalar: HostScalar, declared: TypeTag) -> Result<HostScalar> {
    let value = match (&scalar, declared) {
        (HostScalar::Null, _) => return Ok(HostScalar::Null),
        (HostScalar::Text(s), TypeTag::Date) => Value::Date(crate::temporal::parse_date(s)?),
        (HostScalar::Text(s), TypeTag::Datetime) => {
            Value::Datetime(crate::temporal::parse_datetime(s)?)
        }
        (HostScalar::Text(s), TypeTag::Time) => Value::Time(crate::temporal::parse_time(s)?),
        (HostScalar::Text(s), TypeTag::Timestamp) => {
            Value::Timestamp(crate::temporal::parse_timestamp(s)?)
        }
        (HostScalar::Text(s), TypeTag::Numeric) => {
            Value::Numeric(s.parse().map_err(ValueError::from)?)
        }
        (HostScalar::Int(v), TypeTag::Int) => return Ok(HostScalar::Int(*v)),
        (HostScalar::Float(v), TypeTag::Float) => return Ok(HostScalar::Float(*v)),
        (HostScalar::Text(s), TypeTag::String) => return Ok(HostScalar::Text(s.clone())),
        (HostScalar::Blob(b), TypeTag::Bytes) => return Ok(HostScalar::Blob(b.clone())),
        (HostScalar::Int(v), TypeTag::Bool) => return Ok(HostScalar::Int(*v)),
        (other, _) => return Ok(other.clone()),
    };
    let literal = encode_literal(&value)?;
    Ok(HostScalar::Text(literal.text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn round_trips_date() {
        let value = Value::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        let literal = encode_literal(&value).unwrap();
        assert_eq!(literal.text, "zetasqlitedate:2024-03-15");
        let decoded = value_of(&HostScalar::Text(literal.text)).unwrap().unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn round_trips_struct_with_nested_array() {
        let value = Value::Struct(vec![
            ("x".into(), Value::Int(1)),
            (
                "y".into(),
                Value::Array(vec![
                    Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
                    Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
                ]),
            ),
        ]);
        let literal = encode_literal(&value).unwrap();
        let decoded = value_of(&HostScalar::Text(literal.text)).unwrap().unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn plain_string_without_header_passes_through() {
        let decoded = value_of(&HostScalar::Text("hello".into())).unwrap().unwrap();
        assert_eq!(decoded, Value::String("hello".into()));
    }
}
