//! `EVAL_JAVASCRIPT(code, returnType, argNames, …args)` (`spec.md §4.2`),
//! feature-gated behind `js` since it is the one builtin this translator's
//! dependency stack does not otherwise need.

use boa_engine::{Context, JsValue, Source};

use zetasqlite_value::Value;

use crate::error::{FunctionError, Result};
use crate::scalar::Args;

pub fn eval_javascript(args: Args) -> Result<Option<Value>> {
    if args.len() < 2 {
        return Err(FunctionError::Arity {
            name: "eval_javascript",
            expected: "at least 2".to_string(),
            actual: args.len(),
        });
    }
    let code = match &args[0] {
        Some(v) => v.to_string_value()?,
        None => return Ok(None),
    };
    let arg_names = match &args[1] {
        Some(v) => v.to_string_value()?,
        None => String::new(),
    };
    let names: Vec<&str> = arg_names.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let call_args = &args[2..];

    let mut context = Context::default();
    let wrapped = format!("(function({}) {{ {} }})", names.join(","), code);
    let func = context
        .eval(Source::from_bytes(wrapped.as_bytes()))
        .map_err(|e| FunctionError::Value(zetasqlite_value::ValueError::MalformedWire(e.to_string())))?;

    let this = JsValue::undefined();
    let mut js_args = Vec::with_capacity(call_args.len());
    for arg in call_args {
        js_args.push(match arg {
            Some(Value::Int(v)) => JsValue::from(*v),
            Some(Value::Float(v)) => JsValue::from(*v),
            Some(Value::Bool(v)) => JsValue::from(*v),
            Some(other) => JsValue::from(
                other
                    .to_string_value()
                    .map_err(FunctionError::Value)?,
            ),
            None => JsValue::null(),
        });
    }

    let callable = func
        .as_callable()
        .ok_or_else(|| FunctionError::Value(zetasqlite_value::ValueError::MalformedWire(
            "EVAL_JAVASCRIPT code did not evaluate to a function".to_string(),
        )))?;
    let result = callable
        .call(&this, &js_args, &mut context)
        .map_err(|e| FunctionError::Value(zetasqlite_value::ValueError::MalformedWire(e.to_string())))?;

    Ok(match result {
        JsValue::Null | JsValue::Undefined => None,
        JsValue::Boolean(b) => Some(Value::Bool(b)),
        JsValue::Integer(i) => Some(Value::Int(i as i64)),
        JsValue::Rational(f) => Some(Value::Float(f)),
        other => Some(Value::String(
            other
                .to_string(&mut context)
                .map(|s| s.to_std_string_escaped())
                .unwrap_or_default(),
        )),
    })
}
