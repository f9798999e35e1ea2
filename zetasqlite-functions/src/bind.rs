//! The function binding layer (C3, `spec.md §4.3`): adapts value-level
//! functions from [`crate::registry::FunctionRegistry`] into `rusqlite`'s
//! scalar/aggregate/window function registration contract.

use std::cmp::Ordering;

use rusqlite::functions::{Aggregate, Context, FunctionFlags, WindowAggregate};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::Connection;

use zetasqlite_value::{value_of, HostScalar, TypeTag, Value};

use crate::aggregate::{Aggregator, StepOptions};
use crate::registry::FunctionRegistry;

fn host_scalar_of(v: ValueRef<'_>) -> HostScalar {
    match v {
        ValueRef::Null => HostScalar::Null,
        ValueRef::Integer(i) => HostScalar::Int(i),
        ValueRef::Real(f) => HostScalar::Float(f),
        ValueRef::Text(t) => HostScalar::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => HostScalar::Blob(b.to_vec()),
    }
}

fn sqlite_err<E: std::error::Error + Send + Sync + 'static>(err: E) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(Box::new(err))
}

/// A bare SQL function-call token can't contain a `.`, which rules out a
/// registry name straight off — namespaced builtins like `NET.HOST` need
/// their dot folded into the identifier before it reaches `create_scalar_function`.
fn sql_name(name: &str) -> String {
    name.replace('.', "_").to_ascii_lowercase()
}

fn decode_args(ctx: &Context<'_>) -> rusqlite::Result<Vec<Option<Value>>> {
    let mut out = Vec::with_capacity(ctx.len());
    for i in 0..ctx.len() {
        let scalar = host_scalar_of(ctx.get_raw(i));
        out.push(value_of(&scalar).map_err(sqlite_err)?);
    }
    Ok(out)
}

/// Routes a result value through the return-type-specific converter
/// (`spec.md §4.3` step 4): int→int, float→float, bool→bool, everything
/// else → the encoded wire-form string.
fn encode_result(result: Option<Value>, return_type: TypeTag) -> rusqlite::Result<ToSqlOutput<'static>> {
    let Some(value) = result else {
        return Ok(ToSqlOutput::from(rusqlite::types::Null));
    };
    Ok(match return_type {
        TypeTag::Int => ToSqlOutput::from(value.to_int().map_err(sqlite_err)?),
        TypeTag::Float => ToSqlOutput::from(value.to_float().map_err(sqlite_err)?),
        TypeTag::Bool => ToSqlOutput::from(value.to_bool().map_err(sqlite_err)? as i64),
        _ => {
            let literal = zetasqlite_value::encode_literal(&value).map_err(sqlite_err)?;
            ToSqlOutput::from(literal.text)
        }
    })
}

/// Parses the trailing `{distinct?, ignoreNulls?}` options a call site
/// appends after its real arguments (`spec.md §4.2` step 2); the binding
/// layer strips them before decoding the remaining positional arguments.
/// Represented here as two boolean sentinel arguments emitted by the SQL
/// writer (C10) as literal `TRUE`/`FALSE` host scalars.
fn split_step_options(mut args: Vec<Option<Value>>) -> (Vec<Option<Value>>, StepOptions) {
    let mut opts = StepOptions::default();
    if let Some(Some(Value::Bool(ignore_nulls))) = args.last() {
        opts.ignore_nulls = *ignore_nulls;
        args.pop();
    }
    if let Some(Some(Value::Bool(distinct))) = args.last() {
        opts.distinct = *distinct;
        args.pop();
    }
    (args, opts)
}

/// Orders two `zetasqlite_group_by`-wrapped, wire-encoded text values by
/// the value they represent rather than their raw bytes — SQLite never
/// invokes a collation to compare against a NULL, so this only ever sees
/// two non-null group-by cells. Plain numeric literals have no wire header
/// (`spec.md §4.1`'s int/float encoding is just `to_string()`), so those
/// are detected by parsing first; everything else goes through the wire
/// decoder for the typed literals that do carry a header (dates, structs,
/// arrays, ...), falling back to a byte comparison for plain strings.
fn collate_group_by(a: &str, b: &str) -> Ordering {
    if let (Ok(x), Ok(y)) = (a.parse::<f64>(), b.parse::<f64>()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    match (value_of(&HostScalar::Text(a.to_string())), value_of(&HostScalar::Text(b.to_string()))) {
        (Ok(Some(av)), Ok(Some(bv))) => {
            if av.lt_value(&bv).unwrap_or(false) {
                Ordering::Less
            } else if av.gt_value(&bv).unwrap_or(false) {
                Ordering::Greater
            } else {
                a.cmp(b)
            }
        }
        _ => a.cmp(b),
    }
}

/// Registers every scalar, aggregate, and window-aggregate entry of
/// `registry` against `conn` using the host engine's function-registration
/// interface, plus the `zetasqlite_collate` collation ROLLUP/CUBE output
/// ordering and general `ORDER BY` NULL-handling rely on.
pub fn register_all(conn: &Connection, registry: &FunctionRegistry) -> rusqlite::Result<()> {
    conn.create_collation("zetasqlite_collate", collate_group_by)?;

    for entry in registry.scalars() {
        let func = entry.func;
        let return_type = entry.return_type;
        let mut flags = FunctionFlags::SQLITE_UTF8;
        if entry.deterministic {
            flags |= FunctionFlags::SQLITE_DETERMINISTIC;
        }
        conn.create_scalar_function(
            &format!("zetasqlite_{}", sql_name(entry.name)),
            -1,
            flags,
            move |ctx| {
                let args = decode_args(ctx)?;
                let result = func(&args).map_err(sqlite_err)?;
                encode_result(result, return_type)
            },
        )?;
    }

    for entry in registry.aggregates() {
        let ctor = entry.ctor;
        let return_type = entry.return_type;
        conn.create_aggregate_function(
            &format!("zetasqlite_{}", sql_name(entry.name)),
            -1,
            FunctionFlags::SQLITE_UTF8,
            AggregateShim { ctor, return_type },
        )?;
    }

    for entry in registry.window_aggregates() {
        let ctor = entry.ctor;
        let return_type = entry.return_type;
        conn.create_window_function(
            &format!("zetasqlite_window_{}", sql_name(entry.name)),
            -1,
            FunctionFlags::SQLITE_UTF8,
            AggregateShim { ctor, return_type },
        )?;
    }

    Ok(())
}

/// A per-call-site accumulator: the boxed [`Aggregator`] plus the options
/// parsed from the first `step`. `Aggregator` is `Send` but not provably
/// `UnwindSafe`; these queries never unwind across an aggregate step, so
/// asserting it here is sound.
struct AggState {
    inner: Box<dyn Aggregator>,
    opts: StepOptions,
}

impl std::panic::RefUnwindSafe for AggState {}
impl std::panic::UnwindSafe for AggState {}

struct AggregateShim {
    ctor: crate::registry::AggregatorCtor,
    return_type: TypeTag,
}

impl Aggregate<AggState, ToSqlOutput<'static>> for AggregateShim {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<AggState> {
        Ok(AggState {
            inner: (self.ctor)(),
            opts: StepOptions::default(),
        })
    }

    fn step(&self, ctx: &mut Context<'_>, state: &mut AggState) -> rusqlite::Result<()> {
        let raw_args = decode_args(ctx)?;
        let (args, opts) = split_step_options(raw_args);
        state.opts = opts;
        state.inner.step(&args, &state.opts).map_err(sqlite_err)
    }

    fn finalize(
        &self,
        _ctx: &mut Context<'_>,
        state: Option<AggState>,
    ) -> rusqlite::Result<ToSqlOutput<'static>> {
        let result = match state {
            Some(s) => s.inner.done().map_err(sqlite_err)?,
            None => None,
        };
        encode_result(result, self.return_type)
    }
}

impl WindowAggregate<AggState, ToSqlOutput<'static>> for AggregateShim {
    fn value(&self, state: Option<&mut AggState>) -> rusqlite::Result<ToSqlOutput<'static>> {
        let result = match state {
            Some(s) => s.inner.done().map_err(sqlite_err)?,
            None => None,
        };
        encode_result(result, self.return_type)
    }

    fn inverse(&self, ctx: &mut Context<'_>, state: &mut AggState) -> rusqlite::Result<()> {
        let raw_args = decode_args(ctx)?;
        let (args, opts) = split_step_options(raw_args);
        state.inner.inverse(&args, &opts).map_err(sqlite_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FunctionRegistry;

    #[test]
    fn registers_without_error() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = FunctionRegistry::new();
        register_all(&conn, &registry).unwrap();
    }

    #[test]
    fn scalar_add_round_trips_through_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = FunctionRegistry::new();
        register_all(&conn, &registry).unwrap();
        let result: i64 = conn
            .query_row("SELECT zetasqlite_add(1, 2)", [], |row| row.get(0))
            .unwrap();
        assert_eq!(result, 3);
    }

    #[test]
    fn group_by_collation_orders_numerically_not_lexicographically() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = FunctionRegistry::new();
        register_all(&conn, &registry).unwrap();
        conn.execute_batch("CREATE TABLE t(v INTEGER); INSERT INTO t VALUES (2),(10),(1);")
            .unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT zetasqlite_group_by(v) FROM t ORDER BY zetasqlite_group_by(v) COLLATE zetasqlite_collate",
            )
            .unwrap();
        let ordered: Vec<i64> = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .map(|s| s.unwrap().parse().unwrap())
            .collect();
        assert_eq!(ordered, vec![1, 2, 10]);
    }

    #[test]
    fn window_sum_over_bounded_sliding_frame_inverts_correctly() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = FunctionRegistry::new();
        register_all(&conn, &registry).unwrap();
        conn.execute_batch("CREATE TABLE t(v INTEGER); INSERT INTO t VALUES (1),(2),(3),(4);")
            .unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT zetasqlite_window_sum(v) OVER (ORDER BY v ROWS BETWEEN 1 PRECEDING AND CURRENT ROW) FROM t",
            )
            .unwrap();
        let sums: Vec<f64> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(sums, vec![1.0, 3.0, 5.0, 7.0]);
    }

    #[test]
    fn aggregate_sum_over_rows() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = FunctionRegistry::new();
        register_all(&conn, &registry).unwrap();
        conn.execute_batch("CREATE TABLE t(v INTEGER); INSERT INTO t VALUES (1),(2),(3);")
            .unwrap();
        let result: f64 = conn
            .query_row("SELECT zetasqlite_sum(v) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(result, 6.0);
    }
}
