use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as Json;

use crate::error::{Result, ValueError};

/// A BigQuery-typed runtime value. NULL is represented by the absence of a
/// `Value` at use sites (`Option<Value>`), never by a variant here.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Numeric(Decimal),
    Json(Json),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    Time(NaiveTime),
    Timestamp(DateTime<Utc>),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
    /// Wraps an expression evaluated under `SAFE.`; any error raised while
    /// producing the inner value is converted to NULL by the caller instead
    /// of propagating.
    Safe(Box<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "INT64",
            Value::Float(_) => "FLOAT64",
            Value::Bool(_) => "BOOL",
            Value::String(_) => "STRING",
            Value::Bytes(_) => "BYTES",
            Value::Numeric(_) => "NUMERIC",
            Value::Json(_) => "JSON",
            Value::Date(_) => "DATE",
            Value::Datetime(_) => "DATETIME",
            Value::Time(_) => "TIME",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::Array(_) => "ARRAY",
            Value::Struct(_) => "STRUCT",
            Value::Safe(inner) => inner.type_name(),
        }
    }

    /// Unwraps a `Safe` wrapper, running `f` and converting any error into
    /// `Ok(None)` rather than propagating it.
    pub fn eval_safe<F>(&self, f: F) -> Result<Option<Value>>
    where
        F: FnOnce(&Value) -> Result<Value>,
    {
        match self {
            Value::Safe(inner) => match f(inner) {
                Ok(v) => Ok(Some(v)),
                Err(_) => Ok(None),
            },
            other => f(other).map(Some),
        }
    }

    fn numeric_rank(&self) -> Option<u8> {
        match self {
            Value::Int(_) => Some(0),
            Value::Float(_) => Some(1),
            Value::Numeric(_) => Some(2),
            _ => None,
        }
    }

    pub fn to_int(&self) -> Result<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::Float(v) => Ok(*v as i64),
            Value::Bool(v) => Ok(*v as i64),
            Value::Numeric(v) => v
                .to_string()
                .parse::<f64>()
                .map(|f| f as i64)
                .map_err(|_| conv_err(self, "INT64")),
            Value::String(s) => s.trim().parse::<i64>().map_err(|_| conv_err(self, "INT64")),
            _ => Err(conv_err(self, "INT64")),
        }
    }

    pub fn to_float(&self) -> Result<f64> {
        match self {
            Value::Int(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v),
            Value::Numeric(v) => v
                .to_string()
                .parse::<f64>()
                .map_err(|_| conv_err(self, "FLOAT64")),
            Value::String(s) => s.trim().parse::<f64>().map_err(|_| conv_err(self, "FLOAT64")),
            Value::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            _ => Err(conv_err(self, "FLOAT64")),
        }
    }

    pub fn to_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            Value::Int(v) => Ok(*v != 0),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(conv_err(self, "BOOL")),
            },
            _ => Err(conv_err(self, "BOOL")),
        }
    }

    pub fn to_string_value(&self) -> Result<String> {
        Ok(match self {
            Value::String(s) => s.clone(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => format_float(*v),
            Value::Bool(v) => v.to_string(),
            Value::Numeric(v) => v.to_string(),
            Value::Bytes(b) => base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b),
            Value::Json(j) => j.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Datetime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::Timestamp(ts) => ts.to_rfc3339(),
            Value::Array(_) | Value::Struct(_) => return Err(conv_err(self, "STRING")),
            Value::Safe(inner) => return inner.to_string_value(),
        })
    }

    pub fn to_array(&self) -> Result<&[Value]> {
        match self {
            Value::Array(items) => Ok(items),
            _ => Err(conv_err(self, "ARRAY")),
        }
    }

    pub fn to_struct(&self) -> Result<&[(String, Value)]> {
        match self {
            Value::Struct(fields) => Ok(fields),
            _ => Err(conv_err(self, "STRUCT")),
        }
    }

    pub fn struct_field(&self, name: &str) -> Result<&Value> {
        self.to_struct()?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| ValueError::Conversion {
                from: "STRUCT",
                to: "field",
            })
    }

    pub fn to_json(&self) -> Result<Json> {
        Ok(match self {
            Value::Json(j) => j.clone(),
            Value::Int(v) => Json::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Bool(v) => Json::Bool(*v),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.to_json()?);
                }
                Json::Array(out)
            }
            Value::Struct(fields) => {
                let mut map = serde_json::Map::new();
                for (name, value) in fields {
                    map.insert(name.clone(), value.to_json()?);
                }
                Json::Object(map)
            }
            other => Json::String(other.to_string_value()?),
        })
    }

    pub fn eq_value(&self, other: &Value) -> Result<bool> {
        Ok(self.compare(other)? == Ordering::Equal)
    }

    pub fn lt_value(&self, other: &Value) -> Result<bool> {
        Ok(self.compare(other)? == Ordering::Less)
    }

    pub fn gt_value(&self, other: &Value) -> Result<bool> {
        Ok(self.compare(other)? == Ordering::Greater)
    }

    pub fn ne_value(&self, other: &Value) -> Result<bool> {
        Ok(!self.eq_value(other)?)
    }

    pub fn lte_value(&self, other: &Value) -> Result<bool> {
        Ok(self.compare(other)? != Ordering::Greater)
    }

    pub fn gte_value(&self, other: &Value) -> Result<bool> {
        Ok(self.compare(other)? != Ordering::Less)
    }

    /// BigQuery-style coercing comparison. Arrays compare element-wise
    /// (equal length required); structs compare by key.
    fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                if a.len() != b.len() {
                    return Err(incomparable(self, other));
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y)?;
                    if ord != Ordering::Equal {
                        return Ok(ord);
                    }
                }
                Ok(Ordering::Equal)
            }
            (Value::Struct(a), Value::Struct(b)) => {
                if a.len() != b.len() {
                    return Err(incomparable(self, other));
                }
                for (name, x) in a {
                    let y = b
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, v)| v)
                        .ok_or_else(|| incomparable(self, other))?;
                    let ord = x.compare(y)?;
                    if ord != Ordering::Equal {
                        return Ok(ord);
                    }
                }
                Ok(Ordering::Equal)
            }
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Ok(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Ok(a.cmp(b)),
            (Value::Datetime(a), Value::Datetime(b)) => Ok(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
            (a, b) if a.numeric_rank().is_some() && b.numeric_rank().is_some() => {
                let x = a.to_numeric()?;
                let y = b.to_numeric()?;
                x.partial_cmp(&y).ok_or_else(|| incomparable(a, b))
            }
            (Value::Safe(a), b) => a.compare(b),
            (a, Value::Safe(b)) => a.compare(b),
            _ => Err(incomparable(self, other)),
        }
    }

    fn to_numeric(&self) -> Result<Decimal> {
        match self {
            Value::Int(v) => Ok(Decimal::from(*v)),
            Value::Numeric(v) => Ok(*v),
            Value::Float(v) => Decimal::try_from(*v).map_err(|_| conv_err(self, "NUMERIC")),
            _ => Err(conv_err(self, "NUMERIC")),
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value> {
        self.numeric_op(other, "add", |a, b| a.checked_add(b), |a, b| Some(a + b), |a, b| {
            a.checked_add(b)
        })
    }

    pub fn sub(&self, other: &Value) -> Result<Value> {
        self.numeric_op(other, "sub", |a, b| a.checked_sub(b), |a, b| Some(a - b), |a, b| {
            a.checked_sub(b)
        })
    }

    pub fn mul(&self, other: &Value) -> Result<Value> {
        self.numeric_op(other, "mul", |a, b| a.checked_mul(b), |a, b| Some(a * b), |a, b| {
            a.checked_mul(b)
        })
    }

    pub fn div(&self, other: &Value) -> Result<Value> {
        let rank = self.widen_rank(other)?;
        match rank {
            0 => {
                let a = self.to_int()?;
                let b = other.to_int()?;
                if b == 0 {
                    return Err(ValueError::DivisionByZero);
                }
                Ok(Value::Float(a as f64 / b as f64))
            }
            1 => {
                let a = self.to_float()?;
                let b = other.to_float()?;
                if b == 0.0 {
                    return Err(ValueError::DivisionByZero);
                }
                Ok(Value::Float(a / b))
            }
            _ => {
                let a = self.to_numeric()?;
                let b = other.to_numeric()?;
                if b.is_zero() {
                    return Err(ValueError::DivisionByZero);
                }
                Ok(Value::Numeric(a / b))
            }
        }
    }

    fn widen_rank(&self, other: &Value) -> Result<u8> {
        let a = self.numeric_rank().ok_or_else(|| conv_err(self, "numeric"))?;
        let b = other.numeric_rank().ok_or_else(|| conv_err(other, "numeric"))?;
        Ok(a.max(b))
    }

    fn numeric_op(
        &self,
        other: &Value,
        op: &'static str,
        int_op: impl Fn(i64, i64) -> Option<i64>,
        float_op: impl Fn(f64, f64) -> Option<f64>,
        dec_op: impl Fn(Decimal, Decimal) -> Option<Decimal>,
    ) -> Result<Value> {
        match self.widen_rank(other)? {
            0 => {
                let a = self.to_int()?;
                let b = other.to_int()?;
                int_op(a, b)
                    .map(Value::Int)
                    .ok_or(ValueError::Overflow { op })
            }
            1 => {
                let a = self.to_float()?;
                let b = other.to_float()?;
                float_op(a, b)
                    .map(Value::Float)
                    .ok_or(ValueError::Overflow { op })
            }
            _ => {
                let a = self.to_numeric()?;
                let b = other.to_numeric()?;
                dec_op(a, b)
                    .map(Value::Numeric)
                    .ok_or(ValueError::Overflow { op })
            }
        }
    }
}

fn conv_err(value: &Value, to: &'static str) -> ValueError {
    ValueError::Conversion {
        from: value.type_name(),
        to,
    }
}

fn incomparable(a: &Value, b: &Value) -> ValueError {
    ValueError::Conversion {
        from: a.type_name(),
        to: b.type_name(),
    }
}

fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_precedence() {
        let sum = Value::Int(1).add(&Value::Float(2.5)).unwrap();
        assert_eq!(sum, Value::Float(3.5));
        let sum = Value::Float(1.0)
            .add(&Value::Numeric(Decimal::new(25, 1)))
            .unwrap();
        assert_eq!(sum, Value::Numeric(Decimal::new(35, 1)));
    }

    #[test]
    fn division_by_zero_errors() {
        assert!(matches!(
            Value::Int(1).div(&Value::Int(0)),
            Err(ValueError::DivisionByZero)
        ));
    }

    #[test]
    fn array_eq_requires_equal_length() {
        let a = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::Array(vec![Value::Int(1)]);
        assert!(a.eq_value(&b).is_err());
    }

    #[test]
    fn struct_eq_is_by_key() {
        let a = Value::Struct(vec![("x".into(), Value::Int(1)), ("y".into(), Value::Int(2))]);
        let b = Value::Struct(vec![("y".into(), Value::Int(2)), ("x".into(), Value::Int(1))]);
        assert!(a.eq_value(&b).unwrap());
    }

    #[test]
    fn safe_wrapper_converts_errors_to_none() {
        let safe = Value::Safe(Box::new(Value::Int(1)));
        let result = safe.eval_safe(|v| v.div(&Value::Int(0))).unwrap();
        assert_eq!(result, None);
    }
}
