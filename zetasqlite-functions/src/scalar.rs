//! Pure scalar function implementations over [`Value`] (`spec.md §4.2`).
//!
//! NULL is represented as `None` at this layer, matching the value model's
//! "absence is NULL" convention. A function that receives a `None` operand
//! where BigQuery would itself propagate NULL returns `Ok(None)`; a
//! function that needs to distinguish NULL (e.g. `IFNULL`) inspects the
//! `Option` directly instead of delegating to a generic NULL-propagation
//! wrapper.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;

use zetasqlite_value::{Value, ValueError};

use crate::error::{FunctionError, Result};

pub type Args<'a> = &'a [Option<Value>];

fn arity(name: &'static str, args: Args, expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(FunctionError::Arity {
            name,
            expected: expected.to_string(),
            actual: args.len(),
        });
    }
    Ok(())
}

fn propagate2(args: Args) -> Option<(&Value, &Value)> {
    match (&args[0], &args[1]) {
        (Some(a), Some(b)) => Some((a, b)),
        _ => None,
    }
}

macro_rules! binary_arith {
    ($name:ident, $op:ident) => {
        pub fn $name(args: Args) -> Result<Option<Value>> {
            arity(stringify!($name), args, 2)?;
            Ok(match propagate2(args) {
                Some((a, b)) => Some(a.$op(b)?),
                None => None,
            })
        }
    };
}

binary_arith!(add, add);
binary_arith!(sub, sub);
binary_arith!(mul, mul);
binary_arith!(div, div);

pub fn safe_div(args: Args) -> Result<Option<Value>> {
    arity("safe_div", args, 2)?;
    match propagate2(args) {
        Some((a, b)) => Ok(a.div(b).ok()),
        None => Ok(None),
    }
}

pub fn modulo(args: Args) -> Result<Option<Value>> {
    arity("mod", args, 2)?;
    match propagate2(args) {
        Some((a, b)) => {
            let (x, y) = (a.to_int()?, b.to_int()?);
            if y == 0 {
                return Err(ValueError::DivisionByZero.into());
            }
            Ok(Some(Value::Int(x % y)))
        }
        None => Ok(None),
    }
}

pub fn div_int(args: Args) -> Result<Option<Value>> {
    arity("div_int", args, 2)?;
    match propagate2(args) {
        Some((a, b)) => {
            let (x, y) = (a.to_int()?, b.to_int()?);
            if y == 0 {
                return Err(ValueError::DivisionByZero.into());
            }
            Ok(Some(Value::Int(x / y)))
        }
        None => Ok(None),
    }
}

macro_rules! binary_cmp {
    ($name:ident, $op:ident) => {
        pub fn $name(args: Args) -> Result<Option<Value>> {
            arity(stringify!($name), args, 2)?;
            Ok(match propagate2(args) {
                Some((a, b)) => Some(Value::Bool(a.$op(b)?)),
                None => None,
            })
        }
    };
}

binary_cmp!(eq, eq_value);
binary_cmp!(ne, ne_value);
binary_cmp!(lt, lt_value);
binary_cmp!(lte, lte_value);
binary_cmp!(gt, gt_value);
binary_cmp!(gte, gte_value);

pub fn is_distinct_from(args: Args) -> Result<Option<Value>> {
    arity("is_distinct_from", args, 2)?;
    let result = match (&args[0], &args[1]) {
        (None, None) => false,
        (None, Some(_)) | (Some(_), None) => true,
        (Some(a), Some(b)) => !a.eq_value(b)?,
    };
    Ok(Some(Value::Bool(result)))
}

pub fn and(args: Args) -> Result<Option<Value>> {
    arity("and", args, 2)?;
    Ok(match (&args[0], &args[1]) {
        (Some(a), Some(b)) => Some(Value::Bool(a.to_bool()? && b.to_bool()?)),
        (Some(a), None) if !a.to_bool()? => Some(Value::Bool(false)),
        (None, Some(b)) if !b.to_bool()? => Some(Value::Bool(false)),
        _ => None,
    })
}

pub fn or(args: Args) -> Result<Option<Value>> {
    arity("or", args, 2)?;
    Ok(match (&args[0], &args[1]) {
        (Some(a), Some(b)) => Some(Value::Bool(a.to_bool()? || b.to_bool()?)),
        (Some(a), None) if a.to_bool()? => Some(Value::Bool(true)),
        (None, Some(b)) if b.to_bool()? => Some(Value::Bool(true)),
        _ => None,
    })
}

pub fn not(args: Args) -> Result<Option<Value>> {
    arity("not", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Bool(!v.to_bool()?)),
        None => None,
    })
}

pub fn if_(args: Args) -> Result<Option<Value>> {
    arity("if", args, 3)?;
    let cond = match &args[0] {
        Some(v) => v.to_bool()?,
        None => false,
    };
    Ok(if cond { args[1].clone() } else { args[2].clone() })
}

pub fn ifnull(args: Args) -> Result<Option<Value>> {
    arity("ifnull", args, 2)?;
    Ok(args[0].clone().or_else(|| args[1].clone()))
}

pub fn nullif(args: Args) -> Result<Option<Value>> {
    arity("nullif", args, 2)?;
    Ok(match (&args[0], &args[1]) {
        (Some(a), Some(b)) if a.eq_value(b)? => None,
        _ => args[0].clone(),
    })
}

pub fn coalesce(args: Args) -> Result<Option<Value>> {
    Ok(args.iter().find_map(|v| v.clone()))
}

pub fn is_null(args: Args) -> Result<Option<Value>> {
    arity("is_null", args, 1)?;
    Ok(Some(Value::Bool(args[0].is_none())))
}

pub fn is_true(args: Args) -> Result<Option<Value>> {
    arity("is_true", args, 1)?;
    Ok(Some(Value::Bool(matches!(&args[0], Some(v) if v.to_bool().unwrap_or(false)))))
}

pub fn is_false(args: Args) -> Result<Option<Value>> {
    arity("is_false", args, 1)?;
    Ok(Some(Value::Bool(matches!(&args[0], Some(v) if !v.to_bool().unwrap_or(true)))))
}

pub fn is_nan(args: Args) -> Result<Option<Value>> {
    arity("is_nan", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Bool(v.to_float()?.is_nan())),
        None => None,
    })
}

pub fn is_inf(args: Args) -> Result<Option<Value>> {
    arity("is_inf", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Bool(v.to_float()?.is_infinite())),
        None => None,
    })
}

pub fn concat(args: Args) -> Result<Option<Value>> {
    let mut out = String::new();
    for arg in args {
        match arg {
            Some(v) => out.push_str(&v.to_string_value()?),
            None => return Ok(None),
        }
    }
    Ok(Some(Value::String(out)))
}

/// BigQuery `LIKE`: `%` any run, `_` single char. Translated to a regex-free
/// scanner since the only metacharacters are `%` and `_`.
pub fn like(args: Args) -> Result<Option<Value>> {
    arity("like", args, 2)?;
    Ok(match propagate2(args) {
        Some((a, b)) => {
            let text = a.to_string_value()?;
            let pattern = b.to_string_value()?;
            Some(Value::Bool(like_match(&text, &pattern)))
        }
        None => None,
    })
}

fn like_match(text: &str, pattern: &str) -> bool {
    fn go(t: &[u8], p: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'%') => go(t, &p[1..]) || (!t.is_empty() && go(&t[1..], p)),
            Some(b'_') => !t.is_empty() && go(&t[1..], &p[1..]),
            Some(c) => !t.is_empty() && t[0] == *c && go(&t[1..], &p[1..]),
        }
    }
    go(text.as_bytes(), pattern.as_bytes())
}

pub fn length(args: Args) -> Result<Option<Value>> {
    arity("length", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Int(v.to_string_value()?.chars().count() as i64)),
        None => None,
    })
}

pub fn array_length(args: Args) -> Result<Option<Value>> {
    arity("array_length", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Int(v.to_array()?.len() as i64)),
        None => None,
    })
}

pub fn array_offset(args: Args) -> Result<Option<Value>> {
    arity("array_offset", args, 2)?;
    match propagate2(args) {
        Some((arr, idx)) => {
            let items = arr.to_array()?;
            let i = idx.to_int()? as usize;
            items
                .get(i)
                .cloned()
                .map(Some)
                .ok_or_else(|| FunctionError::Value(ValueError::Conversion {
                    from: "ARRAY",
                    to: "OFFSET out of range",
                }))
        }
        None => Ok(None),
    }
}

pub fn safe_array_offset(args: Args) -> Result<Option<Value>> {
    Ok(array_offset(args).unwrap_or(None))
}

pub fn array_ordinal(args: Args) -> Result<Option<Value>> {
    arity("array_ordinal", args, 2)?;
    match propagate2(args) {
        Some((arr, idx)) => {
            let items = arr.to_array()?;
            let i = idx.to_int()?;
            if i < 1 {
                return Err(FunctionError::Value(ValueError::Conversion {
                    from: "ARRAY",
                    to: "ORDINAL must be >= 1",
                }));
            }
            items
                .get((i - 1) as usize)
                .cloned()
                .map(Some)
                .ok_or_else(|| FunctionError::Value(ValueError::Conversion {
                    from: "ARRAY",
                    to: "ORDINAL out of range",
                }))
        }
        None => Ok(None),
    }
}

pub fn safe_array_ordinal(args: Args) -> Result<Option<Value>> {
    Ok(array_ordinal(args).unwrap_or(None))
}

pub fn array_in(args: Args) -> Result<Option<Value>> {
    arity("array_in", args, 2)?;
    match propagate2(args) {
        Some((needle, arr)) => {
            for item in arr.to_array()? {
                if item.eq_value(needle)? {
                    return Ok(Some(Value::Bool(true)));
                }
            }
            Ok(Some(Value::Bool(false)))
        }
        None => Ok(None),
    }
}

pub fn array_concat(args: Args) -> Result<Option<Value>> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Some(v) => out.extend(v.to_array()?.iter().cloned()),
            None => return Ok(None),
        }
    }
    Ok(Some(Value::Array(out)))
}

pub fn array_to_string(args: Args) -> Result<Option<Value>> {
    if args.len() < 2 {
        return Err(FunctionError::Arity {
            name: "array_to_string",
            expected: "2 or 3".to_string(),
            actual: args.len(),
        });
    }
    let arr = match &args[0] {
        Some(v) => v.to_array()?,
        None => return Ok(None),
    };
    let sep = match &args[1] {
        Some(v) => v.to_string_value()?,
        None => return Ok(None),
    };
    let mut parts = Vec::new();
    for item in arr {
        parts.push(item.to_string_value()?);
    }
    Ok(Some(Value::String(parts.join(&sep))))
}

pub fn array_reverse(args: Args) -> Result<Option<Value>> {
    arity("array_reverse", args, 1)?;
    Ok(match &args[0] {
        Some(v) => {
            let mut items = v.to_array()?.to_vec();
            items.reverse();
            Some(Value::Array(items))
        }
        None => None,
    })
}

/// Turns a wire-encoded array value into the plain JSON array text
/// SQLite's `json_each` table function can unnest (`spec.md §4.8`'s
/// `Array` scan).
pub fn decode_array(args: Args) -> Result<Option<Value>> {
    arity("decode_array", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Json(v.to_json()?)),
        None => None,
    })
}

/// Recovers a `Value` from one `json_each.value` cell. Scalar array
/// elements already arrive as a native host scalar (`value_of` decoded
/// them before this function ever runs); the one case left to handle here
/// is a nested array/struct element, which `json_each` hands back as a
/// JSON-text fragment rather than one of our own wire headers.
pub fn decode_json_value(args: Args) -> Result<Option<Value>> {
    arity("decode_json_value", args, 1)?;
    Ok(match &args[0] {
        Some(Value::String(s)) if matches!(s.trim_start().as_bytes().first(), Some(b'[') | Some(b'{')) => {
            Some(Value::Json(serde_json::from_str(s).map_err(ValueError::from)?))
        }
        Some(other) => Some(other.clone()),
        None => None,
    })
}

pub fn generate_array(args: Args) -> Result<Option<Value>> {
    if args.len() < 2 || args.len() > 3 {
        return Err(FunctionError::Arity {
            name: "generate_array",
            expected: "2 or 3".to_string(),
            actual: args.len(),
        });
    }
    let start = match &args[0] {
        Some(v) => v.to_int()?,
        None => return Ok(None),
    };
    let end = match &args[1] {
        Some(v) => v.to_int()?,
        None => return Ok(None),
    };
    let step = match args.get(2).and_then(|v| v.as_ref()) {
        Some(v) => v.to_int()?,
        None => 1,
    };
    if step == 0 {
        return Err(FunctionError::Value(ValueError::Conversion {
            from: "INT64",
            to: "GENERATE_ARRAY step must be nonzero",
        }));
    }
    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i <= end {
            out.push(Value::Int(i));
            i += step;
        }
    } else {
        while i >= end {
            out.push(Value::Int(i));
            i += step;
        }
    }
    Ok(Some(Value::Array(out)))
}

pub fn abs(args: Args) -> Result<Option<Value>> {
    arity("abs", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Float(v.to_float()?.abs())),
        None => None,
    })
}

pub fn sign(args: Args) -> Result<Option<Value>> {
    arity("sign", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Int(v.to_float()?.signum() as i64)),
        None => None,
    })
}

macro_rules! unary_math {
    ($name:ident, $f:expr) => {
        pub fn $name(args: Args) -> Result<Option<Value>> {
            arity(stringify!($name), args, 1)?;
            Ok(match &args[0] {
                Some(v) => Some(Value::Float(($f)(v.to_float()?))),
                None => None,
            })
        }
    };
}

unary_math!(sqrt, f64::sqrt);
unary_math!(exp, f64::exp);
unary_math!(ln, f64::ln);
unary_math!(log10, f64::log10);
unary_math!(ceil, f64::ceil);
unary_math!(floor, f64::floor);
unary_math!(cos, f64::cos);
unary_math!(sin, f64::sin);
unary_math!(tan, f64::tan);
unary_math!(acos, f64::acos);
unary_math!(asin, f64::asin);
unary_math!(atan, f64::atan);

pub fn pow(args: Args) -> Result<Option<Value>> {
    arity("pow", args, 2)?;
    Ok(match propagate2(args) {
        Some((a, b)) => Some(Value::Float(a.to_float()?.powf(b.to_float()?))),
        None => None,
    })
}

pub fn log(args: Args) -> Result<Option<Value>> {
    arity("log", args, 2)?;
    Ok(match propagate2(args) {
        Some((a, b)) => Some(Value::Float(a.to_float()?.log(b.to_float()?))),
        None => None,
    })
}

pub fn ieee_divide(args: Args) -> Result<Option<Value>> {
    arity("ieee_divide", args, 2)?;
    Ok(match propagate2(args) {
        Some((a, b)) => Some(Value::Float(a.to_float()? / b.to_float()?)),
        None => None,
    })
}

pub fn atan2(args: Args) -> Result<Option<Value>> {
    arity("atan2", args, 2)?;
    Ok(match propagate2(args) {
        Some((a, b)) => Some(Value::Float(a.to_float()?.atan2(b.to_float()?))),
        None => None,
    })
}

pub fn round(args: Args) -> Result<Option<Value>> {
    if args.is_empty() || args.len() > 2 {
        return Err(FunctionError::Arity {
            name: "round",
            expected: "1 or 2".to_string(),
            actual: args.len(),
        });
    }
    let value = match &args[0] {
        Some(v) => v.to_float()?,
        None => return Ok(None),
    };
    let digits = match args.get(1).and_then(|v| v.as_ref()) {
        Some(v) => v.to_int()?,
        None => 0,
    };
    let factor = 10f64.powi(digits as i32);
    Ok(Some(Value::Float((value * factor).round() / factor)))
}

pub fn trunc(args: Args) -> Result<Option<Value>> {
    arity("trunc", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Float(v.to_float()?.trunc())),
        None => None,
    })
}

pub fn range_bucket(args: Args) -> Result<Option<Value>> {
    arity("range_bucket", args, 2)?;
    match propagate2(args) {
        Some((point, boundaries)) => {
            let p = point.to_float()?;
            let bounds = boundaries.to_array()?;
            let mut bucket = 0i64;
            for b in bounds {
                if p >= b.to_float()? {
                    bucket += 1;
                } else {
                    break;
                }
            }
            Ok(Some(Value::Int(bucket)))
        }
        None => Ok(None),
    }
}

pub fn to_json(args: Args) -> Result<Option<Value>> {
    arity("to_json", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Json(v.to_json()?)),
        None => None,
    })
}

pub fn json_type(args: Args) -> Result<Option<Value>> {
    arity("json_type", args, 1)?;
    Ok(match &args[0] {
        Some(v) => {
            let json = v.to_json()?;
            let kind = match json {
                serde_json::Value::Null => "null",
                serde_json::Value::Bool(_) => "boolean",
                serde_json::Value::Number(_) => "number",
                serde_json::Value::String(_) => "string",
                serde_json::Value::Array(_) => "array",
                serde_json::Value::Object(_) => "object",
            };
            Some(Value::String(kind.to_string()))
        }
        None => None,
    })
}

pub fn farm_fingerprint(args: Args) -> Result<Option<Value>> {
    arity("farm_fingerprint", args, 1)?;
    Ok(match &args[0] {
        Some(v) => {
            let bytes = match v {
                Value::Bytes(b) => b.clone(),
                other => other.to_string_value()?.into_bytes(),
            };
            Some(Value::Int(zetasqlite_value::hash::farm_fingerprint(&bytes)))
        }
        None => None,
    })
}

macro_rules! hash_fn {
    ($name:ident, $hasher:path) => {
        pub fn $name(args: Args) -> Result<Option<Value>> {
            arity(stringify!($name), args, 1)?;
            Ok(match &args[0] {
                Some(v) => {
                    let bytes = match v {
                        Value::Bytes(b) => b.clone(),
                        other => other.to_string_value()?.into_bytes(),
                    };
                    Some(Value::Bytes($hasher(&bytes)))
                }
                None => None,
            })
        }
    };
}

hash_fn!(md5, zetasqlite_value::hash::md5);
hash_fn!(sha1, zetasqlite_value::hash::sha1);
hash_fn!(sha256, zetasqlite_value::hash::sha256);
hash_fn!(sha512, zetasqlite_value::hash::sha512);

fn base_type_tag(type_tag: &str) -> &str {
    type_tag.split('<').next().unwrap_or(type_tag).trim()
}

fn cast_to_bytes(value: &Value) -> std::result::Result<Vec<u8>, ValueError> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        Value::String(s) => Ok(s.clone().into_bytes()),
        other => Err(ValueError::Conversion { from: other.type_name(), to: "BYTES" }),
    }
}

fn cast_to_numeric(value: &Value) -> std::result::Result<Decimal, ValueError> {
    match value {
        Value::Numeric(d) => Ok(*d),
        Value::Int(v) => Ok(Decimal::from(*v)),
        Value::Float(v) => Decimal::try_from(*v).map_err(|_| ValueError::Conversion { from: "FLOAT64", to: "NUMERIC" }),
        Value::String(s) => {
            Decimal::from_str(s.trim()).map_err(|_| ValueError::Conversion { from: "STRING", to: "NUMERIC" })
        }
        other => Err(ValueError::Conversion { from: other.type_name(), to: "NUMERIC" }),
    }
}

/// Converts `value` to the BigQuery type named by `type_tag` (`spec.md
/// §4.1`'s CAST/SAFE_CAST). Direct variant-to-variant conversions are used
/// where BigQuery defines one (e.g. TIMESTAMP truncates to DATE rather than
/// round-tripping through its RFC3339 text form); everything else falls
/// back to the value's string form.
fn cast_to(value: &Value, type_tag: &str) -> std::result::Result<Value, ValueError> {
    match base_type_tag(type_tag).to_ascii_uppercase().as_str() {
        "INT64" | "INT" | "INTEGER" => Ok(Value::Int(value.to_int()?)),
        "FLOAT64" | "FLOAT" | "DOUBLE" => Ok(Value::Float(value.to_float()?)),
        "BOOL" | "BOOLEAN" => Ok(Value::Bool(value.to_bool()?)),
        "STRING" => Ok(Value::String(value.to_string_value()?)),
        "BYTES" => Ok(Value::Bytes(cast_to_bytes(value)?)),
        "NUMERIC" | "BIGNUMERIC" => Ok(Value::Numeric(cast_to_numeric(value)?)),
        "JSON" => Ok(Value::Json(value.to_json()?)),
        "DATE" => Ok(Value::Date(match value {
            Value::Date(d) => *d,
            Value::Datetime(dt) => dt.date(),
            Value::Timestamp(ts) => ts.naive_utc().date(),
            other => zetasqlite_value::temporal::parse_date(other.to_string_value()?.trim())?,
        })),
        "DATETIME" => Ok(Value::Datetime(match value {
            Value::Datetime(dt) => *dt,
            Value::Date(d) => d.and_hms_opt(0, 0, 0).expect("midnight is always a valid time"),
            Value::Timestamp(ts) => ts.naive_utc(),
            other => zetasqlite_value::temporal::parse_datetime(other.to_string_value()?.trim())?,
        })),
        "TIME" => Ok(Value::Time(match value {
            Value::Time(t) => *t,
            Value::Datetime(dt) => dt.time(),
            Value::Timestamp(ts) => ts.naive_utc().time(),
            other => zetasqlite_value::temporal::parse_time(other.to_string_value()?.trim())?,
        })),
        "TIMESTAMP" => Ok(Value::Timestamp(match value {
            Value::Timestamp(ts) => *ts,
            Value::Date(d) => Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).expect("midnight is always a valid time")),
            Value::Datetime(dt) => Utc.from_utc_datetime(dt),
            other => zetasqlite_value::temporal::parse_timestamp(other.to_string_value()?.trim())?,
        })),
        "ARRAY" => {
            value.to_array()?;
            Ok(value.clone())
        }
        "STRUCT" => {
            value.to_struct()?;
            Ok(value.clone())
        }
        _ => Err(ValueError::Conversion { from: value.type_name(), to: "CAST target type" }),
    }
}

/// `CAST`/`SAFE_CAST(expr, type_tag, safe)`: the SQL writer (C10) always
/// emits the three-argument form, with `safe` literally `TRUE`/`FALSE`
/// depending on whether the source expression was written as `SAFE_CAST`.
pub fn cast(args: Args) -> Result<Option<Value>> {
    arity("cast", args, 3)?;
    let value = match &args[0] {
        Some(v) => v,
        None => return Ok(None),
    };
    let type_tag = match &args[1] {
        Some(v) => v.to_string_value()?,
        None => {
            return Err(FunctionError::Value(ValueError::MalformedWire(
                "CAST requires a target type".to_string(),
            )))
        }
    };
    let safe = match &args[2] {
        Some(v) => v.to_bool()?,
        None => false,
    };
    match cast_to(value, &type_tag) {
        Ok(cast_value) => Ok(Some(cast_value)),
        Err(_) if safe => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// `GROUP_BY` marker (`spec.md §6.3`): a pass-through wrapping every
/// GROUP BY/ROLLUP/CUBE column so the host engine sees a uniform TEXT
/// value to compare under `zetasqlite_collate` regardless of the grouped
/// expression's real type.
pub fn group_by(args: Args) -> Result<Option<Value>> {
    arity("group_by", args, 1)?;
    Ok(args[0].clone())
}

/// `MAKE_STRUCT(name1, value1, name2, value2, ...)`: field names travel as
/// string-literal arguments interleaved with their values, the same
/// trailing-positional-arg convention CAST uses for its type tag.
pub fn make_struct(args: Args) -> Result<Option<Value>> {
    if args.len() % 2 != 0 {
        return Err(FunctionError::Arity {
            name: "make_struct",
            expected: "an even number of name/value pairs".to_string(),
            actual: args.len(),
        });
    }
    let mut fields = Vec::with_capacity(args.len() / 2);
    for pair in args.chunks(2) {
        let name = match &pair[0] {
            Some(v) => v.to_string_value()?,
            None => {
                return Err(FunctionError::Value(ValueError::MalformedWire(
                    "MAKE_STRUCT field name must not be null".to_string(),
                )))
            }
        };
        match &pair[1] {
            Some(v) => fields.push((name, v.clone())),
            None => return Ok(None),
        }
    }
    Ok(Some(Value::Struct(fields)))
}

pub fn struct_field(args: Args) -> Result<Option<Value>> {
    arity("struct_field", args, 2)?;
    let field_name = match &args[1] {
        Some(v) => v.to_string_value()?,
        None => return Ok(None),
    };
    Ok(match &args[0] {
        Some(v) => Some(v.struct_field(&field_name)?.clone()),
        None => None,
    })
}

macro_rules! safe_arith {
    ($name:ident, $inner:ident) => {
        pub fn $name(args: Args) -> Result<Option<Value>> {
            arity(stringify!($name), args, 2)?;
            match propagate2(args) {
                Some((a, b)) => Ok(a.$inner(b).ok()),
                None => Ok(None),
            }
        }
    };
}

safe_arith!(safe_add, add);
safe_arith!(safe_sub, sub);
safe_arith!(safe_mul, mul);

pub fn safe_mod(args: Args) -> Result<Option<Value>> {
    Ok(modulo(args).unwrap_or(None))
}

pub fn safe_div_int(args: Args) -> Result<Option<Value>> {
    Ok(div_int(args).unwrap_or(None))
}

macro_rules! bitwise_binary {
    ($name:ident, $op:tt) => {
        pub fn $name(args: Args) -> Result<Option<Value>> {
            arity(stringify!($name), args, 2)?;
            Ok(match propagate2(args) {
                Some((a, b)) => Some(Value::Int(a.to_int()? $op b.to_int()?)),
                None => None,
            })
        }
    };
}

bitwise_binary!(bitwise_and, &);
bitwise_binary!(bitwise_or, |);
bitwise_binary!(bitwise_xor, ^);

pub fn bitwise_not(args: Args) -> Result<Option<Value>> {
    arity("bitwise_not", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Int(!v.to_int()?)),
        None => None,
    })
}

fn shift(value: i64, amount: i64, left: bool) -> Result<i64> {
    if !(0..64).contains(&amount) {
        return Err(FunctionError::Value(ValueError::Conversion {
            from: "INT64",
            to: "shift amount must be in [0, 63]",
        }));
    }
    Ok(if left {
        value.wrapping_shl(amount as u32)
    } else {
        value.wrapping_shr(amount as u32)
    })
}

pub fn bitwise_left_shift(args: Args) -> Result<Option<Value>> {
    arity("bitwise_left_shift", args, 2)?;
    Ok(match propagate2(args) {
        Some((a, b)) => Some(Value::Int(shift(a.to_int()?, b.to_int()?, true)?)),
        None => None,
    })
}

pub fn bitwise_right_shift(args: Args) -> Result<Option<Value>> {
    arity("bitwise_right_shift", args, 2)?;
    Ok(match propagate2(args) {
        Some((a, b)) => Some(Value::Int(shift(a.to_int()?, b.to_int()?, false)?)),
        None => None,
    })
}

/// `CASE_NO_VALUE(cond1, result1, cond2, result2, ..., [else])`, the
/// function-call shape a `CASE WHEN ... END` takes when the analyzer hands
/// it down as a plain call rather than through the expression tree's own
/// `Case` node.
pub fn case_no_value(args: Args) -> Result<Option<Value>> {
    if args.len() < 2 {
        return Err(FunctionError::Arity {
            name: "case_no_value",
            expected: "at least 2".to_string(),
            actual: args.len(),
        });
    }
    let mut branches = args;
    let else_value = if branches.len() % 2 == 1 {
        let (last, rest) = branches.split_last().expect("non-empty checked above");
        branches = rest;
        last.clone()
    } else {
        None
    };
    for pair in branches.chunks(2) {
        let matched = match &pair[0] {
            Some(v) => v.to_bool()?,
            None => false,
        };
        if matched {
            return Ok(pair[1].clone());
        }
    }
    Ok(else_value)
}

/// `CASE_WITH_VALUE(expr, v1, r1, v2, r2, ..., [else])`. `expr` is compared
/// to each `vN` with the same NULL-never-matches semantics as `WHEN`.
pub fn case_with_value(args: Args) -> Result<Option<Value>> {
    if args.len() < 3 {
        return Err(FunctionError::Arity {
            name: "case_with_value",
            expected: "at least 3".to_string(),
            actual: args.len(),
        });
    }
    let operand = &args[0];
    let mut branches = &args[1..];
    let else_value = if branches.len() % 2 == 1 {
        let (last, rest) = branches.split_last().expect("non-empty checked above");
        branches = rest;
        last.clone()
    } else {
        None
    };
    for pair in branches.chunks(2) {
        let matched = match (operand, &pair[0]) {
            (Some(a), Some(b)) => a.eq_value(b)?,
            _ => false,
        };
        if matched {
            return Ok(pair[1].clone());
        }
    }
    Ok(else_value)
}

/// `RAND()`: uniform `[0, 1)`. Registered with `deterministic: false` so the
/// binding layer (C3) does not tag it `SQLITE_DETERMINISTIC`.
pub fn rand(args: Args) -> Result<Option<Value>> {
    arity("rand", args, 0)?;
    Ok(Some(Value::Float(rand::random::<f64>())))
}

/// `FORMAT(format_string, ...args)`: a small printf subset — `%s`, `%d`/
/// `%i`, `%f` (default 6 decimals, `%.Nf` for N), and `%%` — walked the same
/// way `like_match` walks its pattern, one directive at a time.
pub fn format(args: Args) -> Result<Option<Value>> {
    if args.is_empty() {
        return Err(FunctionError::Arity {
            name: "format",
            expected: "at least 1".to_string(),
            actual: args.len(),
        });
    }
    let fmt = match &args[0] {
        Some(v) => v.to_string_value()?,
        None => return Ok(None),
    };
    let mut rest = args[1..].iter();
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut precision: Option<usize> = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                digits.push(chars.next().expect("peeked digit exists"));
            }
            precision = digits.parse().ok();
        }
        let directive = chars.next().ok_or_else(|| {
            FunctionError::Value(ValueError::MalformedWire("trailing '%' in FORMAT string".to_string()))
        })?;
        match directive {
            '%' => out.push('%'),
            's' => {
                let arg = rest.next().ok_or_else(|| FunctionError::Arity {
                    name: "format",
                    expected: "one argument per directive".to_string(),
                    actual: args.len(),
                })?;
                out.push_str(&match arg {
                    Some(v) => v.to_string_value()?,
                    None => "NULL".to_string(),
                });
            }
            'd' | 'i' => {
                let arg = rest.next().ok_or_else(|| FunctionError::Arity {
                    name: "format",
                    expected: "one argument per directive".to_string(),
                    actual: args.len(),
                })?;
                out.push_str(&match arg {
                    Some(v) => v.to_int()?.to_string(),
                    None => "NULL".to_string(),
                });
            }
            'f' => {
                let arg = rest.next().ok_or_else(|| FunctionError::Arity {
                    name: "format",
                    expected: "one argument per directive".to_string(),
                    actual: args.len(),
                })?;
                out.push_str(&match arg {
                    Some(v) => format!("{:.*}", precision.unwrap_or(6), v.to_float()?),
                    None => "NULL".to_string(),
                });
            }
            other => {
                return Err(FunctionError::Value(ValueError::UnknownFormatSpecifier(other)));
            }
        }
    }
    Ok(Some(Value::String(out)))
}

fn ip_bytes(v: &Value) -> Result<Vec<u8>> {
    match v {
        Value::Bytes(b) => Ok(b.clone()),
        other => Err(FunctionError::Value(ValueError::Conversion { from: other.type_name(), to: "IP bytes" })),
    }
}

fn ip_addr_to_bytes(ip: IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

fn bytes_to_ip_addr(bytes: &[u8]) -> Result<IpAddr> {
    match bytes.len() {
        4 => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(bytes);
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => Err(FunctionError::Value(ValueError::MalformedWire("IP address must be 4 or 16 bytes".to_string()))),
    }
}

/// `NET.IP_FROM_STRING(addr)`: dotted-quad or colon-hex text to its
/// network-order byte representation.
pub fn net_ip_from_string(args: Args) -> Result<Option<Value>> {
    arity("net_ip_from_string", args, 1)?;
    Ok(match &args[0] {
        Some(v) => {
            let text = v.to_string_value()?;
            let addr = IpAddr::from_str(text.trim())
                .map_err(|_| FunctionError::Value(ValueError::Conversion { from: "STRING", to: "IP address" }))?;
            Some(Value::Bytes(ip_addr_to_bytes(addr)))
        }
        None => None,
    })
}

pub fn net_safe_ip_from_string(args: Args) -> Result<Option<Value>> {
    Ok(net_ip_from_string(args).unwrap_or(None))
}

pub fn net_ip_to_string(args: Args) -> Result<Option<Value>> {
    arity("net_ip_to_string", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::String(bytes_to_ip_addr(&ip_bytes(v)?)?.to_string())),
        None => None,
    })
}

/// `NET.IP_TRUNC(addr, length)`: zeroes every bit past the `length`-bit
/// network prefix.
pub fn net_ip_trunc(args: Args) -> Result<Option<Value>> {
    arity("net_ip_trunc", args, 2)?;
    match propagate2(args) {
        Some((addr, length)) => {
            let mut bytes = ip_bytes(addr)?;
            let prefix = length.to_int()?;
            if prefix < 0 || prefix as usize > bytes.len() * 8 {
                return Err(FunctionError::Value(ValueError::Conversion {
                    from: "INT64",
                    to: "IP_TRUNC prefix length",
                }));
            }
            let full_bytes = prefix as usize / 8;
            let remaining_bits = prefix as usize % 8;
            for byte in bytes.iter_mut().skip(full_bytes + usize::from(remaining_bits > 0)) {
                *byte = 0;
            }
            if remaining_bits > 0 {
                let mask = 0xFFu8 << (8 - remaining_bits);
                bytes[full_bytes] &= mask;
            }
            Ok(Some(Value::Bytes(bytes)))
        }
        None => Ok(None),
    }
}

pub fn net_ipv4_from_int64(args: Args) -> Result<Option<Value>> {
    arity("net_ipv4_from_int64", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Bytes(Ipv4Addr::from(v.to_int()? as u32).octets().to_vec())),
        None => None,
    })
}

pub fn net_ipv4_to_int64(args: Args) -> Result<Option<Value>> {
    arity("net_ipv4_to_int64", args, 1)?;
    Ok(match &args[0] {
        Some(v) => {
            let bytes = ip_bytes(v)?;
            if bytes.len() != 4 {
                return Err(FunctionError::Value(ValueError::Conversion { from: "BYTES", to: "IPV4" }));
            }
            let mut octets = [0u8; 4];
            octets.copy_from_slice(&bytes);
            Some(Value::Int(u32::from_be_bytes(octets) as i64))
        }
        None => None,
    })
}

/// `NET.IP_NET_MASK(num_output_bytes, prefix_length)`: the subnet mask for a
/// prefix of that length, `num_output_bytes` long (4 for IPv4, 16 for IPv6).
pub fn net_ip_net_mask(args: Args) -> Result<Option<Value>> {
    arity("net_ip_net_mask", args, 2)?;
    match propagate2(args) {
        Some((num_bytes, prefix)) => {
            let len = num_bytes.to_int()? as usize;
            let prefix = prefix.to_int()?;
            if prefix < 0 || prefix as usize > len * 8 {
                return Err(FunctionError::Value(ValueError::Conversion {
                    from: "INT64",
                    to: "IP_NET_MASK prefix length",
                }));
            }
            let mut mask = vec![0u8; len];
            let full_bytes = prefix as usize / 8;
            let remaining_bits = prefix as usize % 8;
            for byte in mask.iter_mut().take(full_bytes) {
                *byte = 0xFF;
            }
            if remaining_bits > 0 {
                mask[full_bytes] = 0xFFu8 << (8 - remaining_bits);
            }
            Ok(Some(Value::Bytes(mask)))
        }
        None => Ok(None),
    }
}

fn url_host(text: &str) -> &str {
    let without_scheme = text.split_once("://").map(|(_, rest)| rest).unwrap_or(text);
    let host_and_port = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);
    host_and_port.rsplit_once('@').map(|(_, h)| h).unwrap_or(host_and_port)
}

/// `NET.HOST(url)`: the host (and port, if present) portion of a URL.
pub fn net_host(args: Args) -> Result<Option<Value>> {
    arity("net_host", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::String(url_host(&v.to_string_value()?).to_string())),
        None => None,
    })
}

fn host_without_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.split_once(']').map(|(h, _)| h).unwrap_or(host);
    }
    host.split_once(':').map(|(h, _)| h).unwrap_or(host)
}

/// `NET.REG_DOMAIN(url)`: the registrable domain — the public suffix plus
/// one label. No public-suffix list is bundled, so multi-label suffixes
/// (e.g. `co.uk`) are not special-cased; this treats the suffix as the
/// final label, matching ordinary gTLD-only domains.
pub fn net_reg_domain(args: Args) -> Result<Option<Value>> {
    arity("net_reg_domain", args, 1)?;
    Ok(match &args[0] {
        Some(v) => {
            let string_value = v.to_string_value()?;
            let host = host_without_port(url_host(&string_value));
            let labels: Vec<&str> = host.split('.').collect();
            if labels.len() < 2 {
                None
            } else {
                Some(Value::String(labels[labels.len() - 2..].join(".")))
            }
        }
        None => None,
    })
}

pub fn net_public_suffix(args: Args) -> Result<Option<Value>> {
    arity("net_public_suffix", args, 1)?;
    Ok(match &args[0] {
        Some(v) => {
            let string_value = v.to_string_value()?;
            let host = host_without_port(url_host(&string_value));
            host.rsplit_once('.').map(|(_, suffix)| Value::String(suffix.to_string()))
        }
        None => None,
    })
}

fn as_date_time(v: &Value) -> Result<NaiveDateTime> {
    Ok(match v {
        Value::Date(d) => d.and_hms_opt(0, 0, 0).expect("midnight is always a valid time"),
        Value::Datetime(dt) => *dt,
        Value::Timestamp(ts) => ts.naive_utc(),
        other => zetasqlite_value::temporal::parse_datetime(other.to_string_value()?.trim())?,
    })
}

fn as_date(v: &Value) -> Result<NaiveDate> {
    Ok(match v {
        Value::Date(d) => *d,
        Value::Datetime(dt) => dt.date(),
        Value::Timestamp(ts) => ts.naive_utc().date(),
        other => zetasqlite_value::temporal::parse_date(other.to_string_value()?.trim())?,
    })
}

fn as_time(v: &Value) -> Result<NaiveTime> {
    Ok(match v {
        Value::Time(t) => *t,
        Value::Datetime(dt) => dt.time(),
        Value::Timestamp(ts) => ts.naive_utc().time(),
        other => zetasqlite_value::temporal::parse_time(other.to_string_value()?.trim())?,
    })
}

fn as_timestamp(v: &Value) -> Result<chrono::DateTime<Utc>> {
    Ok(match v {
        Value::Timestamp(ts) => *ts,
        Value::Date(d) => Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).expect("midnight is always a valid time")),
        Value::Datetime(dt) => Utc.from_utc_datetime(dt),
        other => zetasqlite_value::temporal::parse_timestamp(other.to_string_value()?.trim())?,
    })
}

pub fn current_date(args: Args) -> Result<Option<Value>> {
    arity("current_date", args, 0)?;
    Ok(Some(Value::Date(Utc::now().date_naive())))
}

pub fn current_datetime(args: Args) -> Result<Option<Value>> {
    arity("current_datetime", args, 0)?;
    Ok(Some(Value::Datetime(Utc::now().naive_utc())))
}

pub fn current_time(args: Args) -> Result<Option<Value>> {
    arity("current_time", args, 0)?;
    Ok(Some(Value::Time(Utc::now().naive_utc().time())))
}

pub fn current_timestamp(args: Args) -> Result<Option<Value>> {
    arity("current_timestamp", args, 0)?;
    Ok(Some(Value::Timestamp(Utc::now())))
}

/// `DATE(year, month, day)` / `DATE(datetime_or_timestamp_expr)`: BigQuery
/// overloads this constructor on argument count rather than type.
pub fn date(args: Args) -> Result<Option<Value>> {
    match args.len() {
        1 => Ok(match &args[0] {
            Some(v) => Some(Value::Date(as_date(v)?)),
            None => None,
        }),
        3 => {
            let (y, m, d) = match (&args[0], &args[1], &args[2]) {
                (Some(y), Some(m), Some(d)) => (y.to_int()?, m.to_int()?, d.to_int()?),
                _ => return Ok(None),
            };
            let date = NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32)
                .ok_or_else(|| FunctionError::Value(ValueError::Conversion { from: "INT64", to: "DATE" }))?;
            Ok(Some(Value::Date(date)))
        }
        n => Err(FunctionError::Arity { name: "date", expected: "1 or 3".to_string(), actual: n }),
    }
}

/// `DATETIME(...)`: the 1-arg cast form, the 2-arg `(date, time)` form, or
/// the 6-arg `(year, month, day, hour, minute, second)` form.
pub fn datetime(args: Args) -> Result<Option<Value>> {
    match args.len() {
        1 => Ok(match &args[0] {
            Some(v) => Some(Value::Datetime(as_date_time(v)?)),
            None => None,
        }),
        2 => match (&args[0], &args[1]) {
            (Some(d), Some(t)) => Ok(Some(Value::Datetime(as_date(d)?.and_time(as_time(t)?)))),
            _ => Ok(None),
        },
        6 => {
            let values: Vec<i64> = {
                let mut out = Vec::with_capacity(6);
                for a in args {
                    match a {
                        Some(v) => out.push(v.to_int()?),
                        None => return Ok(None),
                    }
                }
                out
            };
            let date = NaiveDate::from_ymd_opt(values[0] as i32, values[1] as u32, values[2] as u32)
                .ok_or_else(|| FunctionError::Value(ValueError::Conversion { from: "INT64", to: "DATETIME" }))?;
            let time = NaiveTime::from_hms_opt(values[3] as u32, values[4] as u32, values[5] as u32)
                .ok_or_else(|| FunctionError::Value(ValueError::Conversion { from: "INT64", to: "DATETIME" }))?;
            Ok(Some(Value::Datetime(date.and_time(time))))
        }
        n => Err(FunctionError::Arity { name: "datetime", expected: "1, 2, or 6".to_string(), actual: n }),
    }
}

/// `TIME(...)`: the 1-arg cast form or the 3-arg `(hour, minute, second)`
/// form.
pub fn time(args: Args) -> Result<Option<Value>> {
    match args.len() {
        1 => Ok(match &args[0] {
            Some(v) => Some(Value::Time(as_time(v)?)),
            None => None,
        }),
        3 => {
            let (h, m, s) = match (&args[0], &args[1], &args[2]) {
                (Some(h), Some(m), Some(s)) => (h.to_int()?, m.to_int()?, s.to_int()?),
                _ => return Ok(None),
            };
            let time = NaiveTime::from_hms_opt(h as u32, m as u32, s as u32)
                .ok_or_else(|| FunctionError::Value(ValueError::Conversion { from: "INT64", to: "TIME" }))?;
            Ok(Some(Value::Time(time)))
        }
        n => Err(FunctionError::Arity { name: "time", expected: "1 or 3".to_string(), actual: n }),
    }
}

/// `TIMESTAMP(expr[, tz])`. The host has no timezone database of its own
/// (`spec.md §4.1`), so a second argument is accepted and ignored rather
/// than rejected outright.
pub fn timestamp(args: Args) -> Result<Option<Value>> {
    if args.is_empty() || args.len() > 2 {
        return Err(FunctionError::Arity { name: "timestamp", expected: "1 or 2".to_string(), actual: args.len() });
    }
    Ok(match &args[0] {
        Some(v) => Some(Value::Timestamp(as_timestamp(v)?)),
        None => None,
    })
}

fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .ok_or(FunctionError::Value(ValueError::Overflow { op: "date interval" }))
}

/// Shifts by whole months, clamping the day to the last valid day of the
/// target month rather than erroring — `2024-01-31 + 1 MONTH` is
/// `2024-02-29`, matching BigQuery's month-interval semantics.
fn shift_months(dt: NaiveDateTime, n: i64) -> Result<NaiveDateTime> {
    let total_months = dt.year() as i64 * 12 + dt.month0() as i64 + n;
    let year = total_months.div_euclid(12) as i32;
    let month = total_months.rem_euclid(12) as u32 + 1;
    let day = dt.day().min(days_in_month(year, month)?);
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(FunctionError::Value(ValueError::Overflow { op: "date interval" }))?;
    Ok(date.and_time(dt.time()))
}

fn shift_datetime(dt: NaiveDateTime, part: &str, n: i64) -> Result<NaiveDateTime> {
    Ok(match part {
        "YEAR" => shift_months(dt, n * 12)?,
        "QUARTER" => shift_months(dt, n * 3)?,
        "MONTH" => shift_months(dt, n)?,
        "WEEK" => dt + Duration::weeks(n),
        "DAY" => dt + Duration::days(n),
        "HOUR" => dt + Duration::hours(n),
        "MINUTE" => dt + Duration::minutes(n),
        "SECOND" => dt + Duration::seconds(n),
        "MILLISECOND" => dt + Duration::milliseconds(n),
        "MICROSECOND" => dt + Duration::microseconds(n),
        other => return Err(FunctionError::Value(ValueError::UnknownExtractPart(other.to_string()))),
    })
}

fn part_of(v: &Value) -> Result<String> {
    Ok(v.to_string_value()?.to_ascii_uppercase())
}

macro_rules! temporal_add_sub {
    ($add_name:ident, $sub_name:ident, $as_fn:ident, $wrap:expr, $unwrap:expr) => {
        pub fn $add_name(args: Args) -> Result<Option<Value>> {
            arity(stringify!($add_name), args, 3)?;
            match (&args[0], &args[1], &args[2]) {
                (Some(v), Some(n), Some(part)) => {
                    let base: NaiveDateTime = $unwrap($as_fn(v)?);
                    let shifted = shift_datetime(base, &part_of(part)?, n.to_int()?)?;
                    Ok(Some($wrap(shifted)))
                }
                _ => Ok(None),
            }
        }

        pub fn $sub_name(args: Args) -> Result<Option<Value>> {
            arity(stringify!($sub_name), args, 3)?;
            match (&args[0], &args[1], &args[2]) {
                (Some(v), Some(n), Some(part)) => {
                    let base: NaiveDateTime = $unwrap($as_fn(v)?);
                    let shifted = shift_datetime(base, &part_of(part)?, -n.to_int()?)?;
                    Ok(Some($wrap(shifted)))
                }
                _ => Ok(None),
            }
        }
    };
}

temporal_add_sub!(
    date_add,
    date_sub,
    as_date,
    |dt: NaiveDateTime| Value::Date(dt.date()),
    |d: NaiveDate| d.and_hms_opt(0, 0, 0).expect("midnight is always a valid time")
);
temporal_add_sub!(
    datetime_add,
    datetime_sub,
    as_date_time,
    Value::Datetime,
    |dt: NaiveDateTime| dt
);
temporal_add_sub!(
    timestamp_add,
    timestamp_sub,
    as_date_time,
    |dt: NaiveDateTime| Value::Timestamp(Utc.from_utc_datetime(&dt)),
    |dt: NaiveDateTime| dt
);

/// `TIME_ADD`/`TIME_SUB`: wraps at the day boundary rather than erroring,
/// matching BigQuery's time-of-day arithmetic.
pub fn time_add(args: Args) -> Result<Option<Value>> {
    arity("time_add", args, 3)?;
    match (&args[0], &args[1], &args[2]) {
        (Some(v), Some(n), Some(part)) => {
            let base = as_time(v)?.overflowing_add_signed(part_duration(&part_of(part)?, n.to_int()?)?).0;
            Ok(Some(Value::Time(base)))
        }
        _ => Ok(None),
    }
}

pub fn time_sub(args: Args) -> Result<Option<Value>> {
    arity("time_sub", args, 3)?;
    match (&args[0], &args[1], &args[2]) {
        (Some(v), Some(n), Some(part)) => {
            let base = as_time(v)?.overflowing_sub_signed(part_duration(&part_of(part)?, n.to_int()?)?).0;
            Ok(Some(Value::Time(base)))
        }
        _ => Ok(None),
    }
}

fn part_duration(part: &str, n: i64) -> Result<Duration> {
    Ok(match part {
        "HOUR" => Duration::hours(n),
        "MINUTE" => Duration::minutes(n),
        "SECOND" => Duration::seconds(n),
        "MILLISECOND" => Duration::milliseconds(n),
        "MICROSECOND" => Duration::microseconds(n),
        other => return Err(FunctionError::Value(ValueError::UnknownExtractPart(other.to_string()))),
    })
}

fn months_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (a.year() as i64 - b.year() as i64) * 12 + (a.month() as i64 - b.month() as i64)
}

fn diff_datetime(a: NaiveDateTime, b: NaiveDateTime, part: &str) -> Result<i64> {
    Ok(match part {
        "MICROSECOND" => (a - b)
            .num_microseconds()
            .ok_or(ValueError::Overflow { op: "datetime diff" })?,
        "MILLISECOND" => (a - b).num_milliseconds(),
        "SECOND" => (a - b).num_seconds(),
        "MINUTE" => (a - b).num_minutes(),
        "HOUR" => (a - b).num_hours(),
        "DAY" => (a.date() - b.date()).num_days(),
        "WEEK" => (a.date() - b.date()).num_days() / 7,
        "MONTH" => months_between(a.date(), b.date()),
        "QUARTER" => months_between(a.date(), b.date()) / 3,
        "YEAR" => months_between(a.date(), b.date()) / 12,
        other => return Err(FunctionError::Value(ValueError::UnknownExtractPart(other.to_string()))),
    })
}

macro_rules! temporal_diff {
    ($name:ident, $as_fn:ident, $unwrap:expr) => {
        pub fn $name(args: Args) -> Result<Option<Value>> {
            arity(stringify!($name), args, 3)?;
            match (&args[0], &args[1], &args[2]) {
                (Some(a), Some(b), Some(part)) => {
                    let diff = diff_datetime($unwrap($as_fn(a)?), $unwrap($as_fn(b)?), &part_of(part)?)?;
                    Ok(Some(Value::Int(diff)))
                }
                _ => Ok(None),
            }
        }
    };
}

temporal_diff!(date_diff, as_date, |d: NaiveDate| d
    .and_hms_opt(0, 0, 0)
    .expect("midnight is always a valid time"));
temporal_diff!(datetime_diff, as_date_time, |dt: NaiveDateTime| dt);
temporal_diff!(timestamp_diff, as_date_time, |dt: NaiveDateTime| dt);

pub fn time_diff(args: Args) -> Result<Option<Value>> {
    arity("time_diff", args, 3)?;
    match (&args[0], &args[1], &args[2]) {
        (Some(a), Some(b), Some(part)) => {
            let delta = as_time(a)? - as_time(b)?;
            Ok(Some(Value::Int(match part_of(part)?.as_str() {
                "HOUR" => delta.num_hours(),
                "MINUTE" => delta.num_minutes(),
                "SECOND" => delta.num_seconds(),
                "MILLISECOND" => delta.num_milliseconds(),
                "MICROSECOND" => delta.num_microseconds().ok_or(ValueError::Overflow { op: "time diff" })?,
                other => return Err(FunctionError::Value(ValueError::UnknownExtractPart(other.to_string()))),
            })))
        }
        _ => Ok(None),
    }
}

fn truncate_date(d: NaiveDate, part: &str) -> Result<NaiveDate> {
    Ok(match part {
        "DAY" => d,
        "WEEK" => d - Duration::days(d.weekday().num_days_from_sunday() as i64),
        "ISOWEEK" => d - Duration::days(d.weekday().num_days_from_monday() as i64),
        "MONTH" => NaiveDate::from_ymd_opt(d.year(), d.month(), 1).expect("valid year/month/1"),
        "QUARTER" => {
            let quarter_month = (d.month0() / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(d.year(), quarter_month, 1).expect("valid year/month/1")
        }
        "YEAR" => NaiveDate::from_ymd_opt(d.year(), 1, 1).expect("valid year/1/1"),
        other => return Err(FunctionError::Value(ValueError::UnknownExtractPart(other.to_string()))),
    })
}

fn truncate_datetime(dt: NaiveDateTime, part: &str) -> Result<NaiveDateTime> {
    Ok(match part {
        "HOUR" => dt.date().and_hms_opt(dt.hour(), 0, 0).expect("valid hms"),
        "MINUTE" => dt.date().and_hms_opt(dt.hour(), dt.minute(), 0).expect("valid hms"),
        "SECOND" => dt.date().and_hms_opt(dt.hour(), dt.minute(), dt.second()).expect("valid hms"),
        other => truncate_date(dt.date(), other)?
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time"),
    })
}

pub fn date_trunc(args: Args) -> Result<Option<Value>> {
    arity("date_trunc", args, 2)?;
    match propagate2(args) {
        Some((v, part)) => Ok(Some(Value::Date(truncate_date(as_date(v)?, &part_of(part)?)?))),
        None => Ok(None),
    }
}

pub fn datetime_trunc(args: Args) -> Result<Option<Value>> {
    arity("datetime_trunc", args, 2)?;
    match propagate2(args) {
        Some((v, part)) => Ok(Some(Value::Datetime(truncate_datetime(as_date_time(v)?, &part_of(part)?)?))),
        None => Ok(None),
    }
}

pub fn timestamp_trunc(args: Args) -> Result<Option<Value>> {
    arity("timestamp_trunc", args, 2)?;
    match propagate2(args) {
        Some((v, part)) => {
            let truncated = truncate_datetime(as_date_time(v)?, &part_of(part)?)?;
            Ok(Some(Value::Timestamp(Utc.from_utc_datetime(&truncated))))
        }
        None => Ok(None),
    }
}

fn accumulator_to_date(acc: &zetasqlite_value::temporal::TimeAccumulator, kind: &'static str) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(acc.year, acc.month.max(1), acc.day.max(1))
        .ok_or_else(|| FunctionError::Value(ValueError::TemporalParse { input: format!("{acc:?}"), kind }))
}

pub fn parse_date(args: Args) -> Result<Option<Value>> {
    arity("parse_date", args, 2)?;
    match propagate2(args) {
        Some((fmt, target)) => {
            let acc = zetasqlite_value::temporal::strptime(&fmt.to_string_value()?, &target.to_string_value()?)?;
            Ok(Some(Value::Date(accumulator_to_date(&acc, "DATE")?)))
        }
        None => Ok(None),
    }
}

pub fn parse_time(args: Args) -> Result<Option<Value>> {
    arity("parse_time", args, 2)?;
    match propagate2(args) {
        Some((fmt, target)) => {
            let acc = zetasqlite_value::temporal::strptime(&fmt.to_string_value()?, &target.to_string_value()?)?;
            let time = NaiveTime::from_hms_opt(acc.hour, acc.minute, acc.second)
                .ok_or_else(|| FunctionError::Value(ValueError::TemporalParse { input: format!("{acc:?}"), kind: "TIME" }))?;
            Ok(Some(Value::Time(time)))
        }
        None => Ok(None),
    }
}

pub fn parse_datetime(args: Args) -> Result<Option<Value>> {
    arity("parse_datetime", args, 2)?;
    match propagate2(args) {
        Some((fmt, target)) => {
            let acc = zetasqlite_value::temporal::strptime(&fmt.to_string_value()?, &target.to_string_value()?)?;
            let date = accumulator_to_date(&acc, "DATETIME")?;
            let time = NaiveTime::from_hms_opt(acc.hour, acc.minute, acc.second)
                .ok_or_else(|| FunctionError::Value(ValueError::TemporalParse { input: format!("{acc:?}"), kind: "DATETIME" }))?;
            Ok(Some(Value::Datetime(date.and_time(time))))
        }
        None => Ok(None),
    }
}

pub fn parse_timestamp(args: Args) -> Result<Option<Value>> {
    arity("parse_timestamp", args, 2)?;
    match propagate2(args) {
        Some((fmt, target)) => {
            let acc = zetasqlite_value::temporal::strptime(&fmt.to_string_value()?, &target.to_string_value()?)?;
            let date = accumulator_to_date(&acc, "TIMESTAMP")?;
            let time = NaiveTime::from_hms_opt(acc.hour, acc.minute, acc.second)
                .ok_or_else(|| FunctionError::Value(ValueError::TemporalParse { input: format!("{acc:?}"), kind: "TIMESTAMP" }))?;
            Ok(Some(Value::Timestamp(Utc.from_utc_datetime(&date.and_time(time)))))
        }
        None => Ok(None),
    }
}

macro_rules! unix_extract {
    ($name:ident, $divisor_to_micros:expr) => {
        pub fn $name(args: Args) -> Result<Option<Value>> {
            arity(stringify!($name), args, 1)?;
            Ok(match &args[0] {
                Some(v) => {
                    let micros = as_timestamp(v)?
                        .timestamp_micros();
                    Some(Value::Int(micros / ($divisor_to_micros)))
                }
                None => None,
            })
        }
    };
}

unix_extract!(unix_seconds, 1_000_000);
unix_extract!(unix_millis, 1_000);

pub fn unix_micros(args: Args) -> Result<Option<Value>> {
    arity("unix_micros", args, 1)?;
    Ok(match &args[0] {
        Some(v) => Some(Value::Int(as_timestamp(v)?.timestamp_micros())),
        None => None,
    })
}

macro_rules! timestamp_from_unix {
    ($name:ident, $to_timestamp:expr) => {
        pub fn $name(args: Args) -> Result<Option<Value>> {
            arity(stringify!($name), args, 1)?;
            Ok(match &args[0] {
                Some(v) => Some(Value::Timestamp($to_timestamp(v.to_int()?)?)),
                None => None,
            })
        }
    };
}

fn timestamp_from_micros(micros: i64) -> Result<chrono::DateTime<Utc>> {
    chrono::DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| FunctionError::Value(ValueError::Conversion { from: "INT64", to: "TIMESTAMP" }))
}

timestamp_from_unix!(timestamp_seconds, |s: i64| timestamp_from_micros(s * 1_000_000));
timestamp_from_unix!(timestamp_millis, |ms: i64| timestamp_from_micros(ms * 1_000));
timestamp_from_unix!(timestamp_micros, timestamp_from_micros);

/// `EXTRACT(part FROM expr)`: the part/timestamp pair the SQL writer emits
/// for every `EXTRACT`, regardless of which temporal type `expr` is —
/// everything widens to `TIMESTAMP` before delegating to the shared
/// part-switch.
pub fn extract(args: Args) -> Result<Option<Value>> {
    arity("extract", args, 2)?;
    match propagate2(args) {
        Some((part, v)) => {
            let ts = as_timestamp(v)?;
            Ok(Some(Value::Int(zetasqlite_value::temporal::extract_part(&part.to_string_value()?, &ts)?)))
        }
        None => Ok(None),
    }
}

/// `LAST_DAY(date[, date_part])`: the last day of the month (default) or
/// other calendar period containing `date`.
pub fn last_day(args: Args) -> Result<Option<Value>> {
    if args.is_empty() || args.len() > 2 {
        return Err(FunctionError::Arity { name: "last_day", expected: "1 or 2".to_string(), actual: args.len() });
    }
    let date = match &args[0] {
        Some(v) => as_date(v)?,
        None => return Ok(None),
    };
    let part = match args.get(1).and_then(|v| v.as_ref()) {
        Some(v) => part_of(v)?,
        None => "MONTH".to_string(),
    };
    let start = truncate_date(date, &part)?;
    let next_period_start = shift_months(
        start.and_hms_opt(0, 0, 0).expect("midnight is always a valid time"),
        match part.as_str() {
            "YEAR" => 12,
            "QUARTER" => 3,
            "WEEK" | "ISOWEEK" => {
                return Ok(Some(Value::Date(start + Duration::days(6))));
            }
            _ => 1,
        },
    )?
    .date();
    Ok(Some(Value::Date(next_period_start - Duration::days(1))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesce_picks_first_non_null() {
        let args = vec![None, None, Some(Value::Int(3))];
        assert_eq!(coalesce(&args).unwrap(), Some(Value::Int(3)));
    }

    #[test]
    fn like_handles_percent_and_underscore() {
        assert!(like_match("hello world", "hello%"));
        assert!(like_match("cat", "c_t"));
        assert!(!like_match("cot", "ca%"));
    }

    #[test]
    fn generate_array_respects_step() {
        let args = vec![Some(Value::Int(1)), Some(Value::Int(5)), Some(Value::Int(2))];
        let result = generate_array(&args).unwrap().unwrap();
        assert_eq!(
            result,
            Value::Array(vec![Value::Int(1), Value::Int(3), Value::Int(5)])
        );
    }

    #[test]
    fn array_offset_out_of_range_errors() {
        let args = vec![
            Some(Value::Array(vec![Value::Int(1)])),
            Some(Value::Int(5)),
        ];
        assert!(array_offset(&args).is_err());
        assert_eq!(safe_array_offset(&args).unwrap(), None);
    }

    #[test]
    fn cast_converts_string_to_int64() {
        let args = vec![
            Some(Value::String("42".to_string())),
            Some(Value::String("INT64".to_string())),
            Some(Value::Bool(false)),
        ];
        assert_eq!(cast(&args).unwrap(), Some(Value::Int(42)));
    }

    #[test]
    fn safe_cast_returns_null_instead_of_erroring() {
        let args = vec![
            Some(Value::String("not a number".to_string())),
            Some(Value::String("INT64".to_string())),
            Some(Value::Bool(true)),
        ];
        assert_eq!(cast(&args).unwrap(), None);
        let unsafe_args = vec![
            Some(Value::String("not a number".to_string())),
            Some(Value::String("INT64".to_string())),
            Some(Value::Bool(false)),
        ];
        assert!(cast(&unsafe_args).is_err());
    }

    #[test]
    fn cast_truncates_timestamp_to_date() {
        let ts = zetasqlite_value::temporal::parse_timestamp("2024-03-15T12:30:00Z").unwrap();
        let args = vec![
            Some(Value::Timestamp(ts)),
            Some(Value::String("DATE".to_string())),
            Some(Value::Bool(false)),
        ];
        assert_eq!(
            cast(&args).unwrap(),
            Some(Value::Date(zetasqlite_value::temporal::parse_date("2024-03-15").unwrap()))
        );
    }

    #[test]
    fn make_struct_then_struct_field_round_trips() {
        let make_args = vec![
            Some(Value::String("x".to_string())),
            Some(Value::Int(1)),
            Some(Value::String("y".to_string())),
            Some(Value::Int(2)),
        ];
        let s = make_struct(&make_args).unwrap().unwrap();
        let field_args = vec![Some(s), Some(Value::String("y".to_string()))];
        assert_eq!(struct_field(&field_args).unwrap(), Some(Value::Int(2)));
    }

    #[test]
    fn group_by_passes_value_through_unchanged() {
        let args = vec![Some(Value::Int(7))];
        assert_eq!(group_by(&args).unwrap(), Some(Value::Int(7)));
    }

    #[test]
    fn safe_add_returns_null_on_overflow_instead_of_erroring() {
        let args = vec![Some(Value::Int(i64::MAX)), Some(Value::Int(1))];
        assert_eq!(safe_add(&args).unwrap(), None);
        let args = vec![Some(Value::Int(1)), Some(Value::Int(2))];
        assert_eq!(safe_add(&args).unwrap(), Some(Value::Int(3)));
    }

    #[test]
    fn safe_div_int_returns_null_on_division_by_zero() {
        let args = vec![Some(Value::Int(10)), Some(Value::Int(0))];
        assert_eq!(safe_div_int(&args).unwrap(), None);
    }

    #[test]
    fn bitwise_ops_match_native_integer_semantics() {
        let args = vec![Some(Value::Int(0b1010)), Some(Value::Int(0b0110))];
        assert_eq!(bitwise_and(&args).unwrap(), Some(Value::Int(0b0010)));
        assert_eq!(bitwise_or(&args).unwrap(), Some(Value::Int(0b1110)));
        assert_eq!(bitwise_xor(&args).unwrap(), Some(Value::Int(0b1100)));
        assert_eq!(bitwise_not(&[Some(Value::Int(0))]).unwrap(), Some(Value::Int(-1)));
        let shift_args = vec![Some(Value::Int(1)), Some(Value::Int(4))];
        assert_eq!(bitwise_left_shift(&shift_args).unwrap(), Some(Value::Int(16)));
        assert_eq!(bitwise_right_shift(&shift_args).unwrap(), Some(Value::Int(0)));
    }

    #[test]
    fn case_no_value_returns_first_matching_branch_else_falls_through() {
        let args = vec![
            Some(Value::Bool(false)),
            Some(Value::String("a".to_string())),
            Some(Value::Bool(true)),
            Some(Value::String("b".to_string())),
            Some(Value::String("else".to_string())),
        ];
        assert_eq!(case_no_value(&args).unwrap(), Some(Value::String("b".to_string())));
        let no_match = vec![
            Some(Value::Bool(false)),
            Some(Value::String("a".to_string())),
            Some(Value::String("else".to_string())),
        ];
        assert_eq!(case_no_value(&no_match).unwrap(), Some(Value::String("else".to_string())));
    }

    #[test]
    fn case_with_value_compares_operand_against_each_branch() {
        let args = vec![
            Some(Value::Int(2)),
            Some(Value::Int(1)),
            Some(Value::String("one".to_string())),
            Some(Value::Int(2)),
            Some(Value::String("two".to_string())),
            Some(Value::String("other".to_string())),
        ];
        assert_eq!(case_with_value(&args).unwrap(), Some(Value::String("two".to_string())));
    }

    #[test]
    fn format_renders_string_int_and_float_directives() {
        let args = vec![
            Some(Value::String("%s has %d apples (%.1f%%)".to_string())),
            Some(Value::String("Al".to_string())),
            Some(Value::Int(3)),
            Some(Value::Float(12.34)),
        ];
        assert_eq!(
            format(&args).unwrap(),
            Some(Value::String("Al has 3 apples (12.3%)".to_string()))
        );
    }

    #[test]
    fn net_ip_from_string_and_back_round_trips_ipv4() {
        let args = vec![Some(Value::String("192.168.0.1".to_string()))];
        let bytes = net_ip_from_string(&args).unwrap().unwrap();
        assert_eq!(bytes, Value::Bytes(vec![192, 168, 0, 1]));
        let back = net_ip_to_string(&[Some(bytes)]).unwrap();
        assert_eq!(back, Some(Value::String("192.168.0.1".to_string())));
    }

    #[test]
    fn net_safe_ip_from_string_returns_null_for_garbage_instead_of_erroring() {
        let args = vec![Some(Value::String("not an address".to_string()))];
        assert_eq!(net_safe_ip_from_string(&args).unwrap(), None);
        assert!(net_ip_from_string(&args).is_err());
    }

    #[test]
    fn net_host_strips_scheme_path_and_userinfo() {
        let args = vec![Some(Value::String("https://user@example.com:8080/path?x=1".to_string()))];
        assert_eq!(net_host(&args).unwrap(), Some(Value::String("example.com:8080".to_string())));
    }

    #[test]
    fn net_reg_domain_takes_last_two_labels() {
        let args = vec![Some(Value::String("https://www.example.com/path".to_string()))];
        assert_eq!(net_reg_domain(&args).unwrap(), Some(Value::String("example.com".to_string())));
    }

    #[test]
    fn date_add_and_date_diff_are_inverses() {
        let start = Value::Date(zetasqlite_value::temporal::parse_date("2024-01-31").unwrap());
        let add_args = vec![
            Some(start.clone()),
            Some(Value::Int(1)),
            Some(Value::String("MONTH".to_string())),
        ];
        let shifted = date_add(&add_args).unwrap().unwrap();
        assert_eq!(shifted, Value::Date(zetasqlite_value::temporal::parse_date("2024-02-29").unwrap()));
        let diff_args = vec![Some(shifted), Some(start), Some(Value::String("DAY".to_string()))];
        assert_eq!(date_diff(&diff_args).unwrap(), Some(Value::Int(29)));
    }

    #[test]
    fn extract_pulls_calendar_parts_from_a_timestamp() {
        let ts = Value::Timestamp(zetasqlite_value::temporal::parse_timestamp("2024-03-15T12:30:45Z").unwrap());
        let args = vec![Some(Value::String("YEAR".to_string())), Some(ts.clone())];
        assert_eq!(extract(&args).unwrap(), Some(Value::Int(2024)));
        let args = vec![Some(Value::String("HOUR".to_string())), Some(ts)];
        assert_eq!(extract(&args).unwrap(), Some(Value::Int(12)));
    }

    #[test]
    fn last_day_defaults_to_end_of_month() {
        let date = Value::Date(zetasqlite_value::temporal::parse_date("2024-02-10").unwrap());
        let args = vec![Some(date)];
        assert_eq!(
            last_day(&args).unwrap(),
            Some(Value::Date(zetasqlite_value::temporal::parse_date("2024-02-29").unwrap()))
        );
    }

    #[test]
    fn parse_date_follows_the_given_format() {
        let args = vec![
            Some(Value::String("%Y/%m/%d".to_string())),
            Some(Value::String("2024/03/15".to_string())),
        ];
        assert_eq!(
            parse_date(&args).unwrap(),
            Some(Value::Date(zetasqlite_value::temporal::parse_date("2024-03-15").unwrap()))
        );
    }

    #[test]
    fn rand_produces_a_value_in_the_unit_interval() {
        let v = rand(&[]).unwrap().unwrap();
        let Value::Float(f) = v else { panic!("expected a float") };
        assert!((0.0..1.0).contains(&f));
    }
}
