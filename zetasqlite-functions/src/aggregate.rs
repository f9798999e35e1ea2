//! Aggregator state machine (`spec.md §4.2`): construct, `step` per input
//! row (after DISTINCT/IGNORE_NULLS filtering), `done` to finalize.

use std::collections::HashSet;

use zetasqlite_value::Value;

use crate::error::{FunctionError, Result};

/// Per-row options trailing the aggregate's own arguments, parsed once by
/// the binding layer (C3) and threaded into every `step` call.
#[derive(Debug, Clone, Default)]
pub struct StepOptions {
    pub distinct: bool,
    pub ignore_nulls: bool,
}

pub trait Aggregator: Send {
    fn step(&mut self, args: &[Option<Value>], opts: &StepOptions) -> Result<()>;
    fn done(&self) -> Result<Option<Value>>;

    /// Reverses a `step` for the row leaving a sliding window frame
    /// (`xInverse`). Only called when a frame actually shrinks (bounded or
    /// sliding `ROWS`/`RANGE` clauses); growing frames such as the default
    /// `UNBOUNDED PRECEDING AND CURRENT ROW` never reach this. Aggregators
    /// that cannot un-accumulate their history (DISTINCT dedup state,
    /// rankings) return `UnsupportedWindowFrame` instead of guessing.
    fn inverse(&mut self, _args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        Err(FunctionError::UnsupportedWindowFrame("this aggregate"))
    }
}

/// Shared DISTINCT/IGNORE_NULLS gate: drops nulls when requested, then
/// dedupes by the first argument's string form (a null first argument
/// under DISTINCT is silently dropped, per `spec.md §4.2` step 3).
fn admit(args: &[Option<Value>], opts: &StepOptions, seen: &mut HashSet<String>) -> Result<bool> {
    if opts.ignore_nulls && args.first().map(|v| v.is_none()).unwrap_or(false) {
        return Ok(false);
    }
    if opts.distinct {
        let key = match args.first() {
            Some(Some(v)) => v.to_string_value()?,
            _ => return Ok(false),
        };
        if !seen.insert(key) {
            return Ok(false);
        }
    }
    Ok(true)
}

#[derive(Default)]
pub struct Sum {
    total: Option<Value>,
    count: i64,
    seen: HashSet<String>,
}

impl Aggregator for Sum {
    fn step(&mut self, args: &[Option<Value>], opts: &StepOptions) -> Result<()> {
        if !admit(args, opts, &mut self.seen)? {
            return Ok(());
        }
        if let Some(Some(v)) = args.first() {
            self.total = Some(match &self.total {
                Some(t) => t.add(v)?,
                None => v.clone(),
            });
            self.count += 1;
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(self.total.clone())
    }

    fn inverse(&mut self, args: &[Option<Value>], opts: &StepOptions) -> Result<()> {
        if opts.distinct {
            return Err(FunctionError::UnsupportedWindowFrame("SUM DISTINCT"));
        }
        if opts.ignore_nulls && args.first().map(Option::is_none).unwrap_or(false) {
            return Ok(());
        }
        if let Some(Some(v)) = args.first() {
            self.count -= 1;
            self.total = if self.count <= 0 {
                None
            } else {
                match &self.total {
                    Some(t) => Some(t.sub(v)?),
                    None => None,
                }
            };
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Avg {
    sum: Sum,
    count: i64,
}

impl Aggregator for Avg {
    fn step(&mut self, args: &[Option<Value>], opts: &StepOptions) -> Result<()> {
        if let Some(Some(_)) = args.first() {
            self.sum.step(args, opts)?;
            self.count += 1;
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        match self.sum.done()? {
            Some(total) if self.count > 0 => Ok(Some(Value::Float(total.to_float()? / self.count as f64))),
            _ => Ok(None),
        }
    }

    fn inverse(&mut self, args: &[Option<Value>], opts: &StepOptions) -> Result<()> {
        if let Some(Some(_)) = args.first() {
            self.sum.inverse(args, opts)?;
            self.count -= 1;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Count {
    seen: HashSet<String>,
    count: i64,
}

impl Aggregator for Count {
    fn step(&mut self, args: &[Option<Value>], opts: &StepOptions) -> Result<()> {
        if admit(args, opts, &mut self.seen)? {
            self.count += 1;
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(Some(Value::Int(self.count)))
    }

    fn inverse(&mut self, args: &[Option<Value>], opts: &StepOptions) -> Result<()> {
        if opts.distinct {
            return Err(FunctionError::UnsupportedWindowFrame("COUNT DISTINCT"));
        }
        if opts.ignore_nulls && args.first().map(Option::is_none).unwrap_or(false) {
            return Ok(());
        }
        self.count -= 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct CountStar {
    count: i64,
}

impl Aggregator for CountStar {
    fn step(&mut self, _args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        self.count += 1;
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(Some(Value::Int(self.count)))
    }
}

#[derive(Default)]
pub struct CountIf {
    count: i64,
}

impl Aggregator for CountIf {
    fn step(&mut self, args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        if let Some(Some(v)) = args.first() {
            if v.to_bool()? {
                self.count += 1;
            }
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(Some(Value::Int(self.count)))
    }
}

/// Keeps every value currently in the frame rather than just the running
/// extreme, since a sliding window can remove any one of them again via
/// `inverse` and min/max has no subtractive update.
pub struct MinMax {
    values: Vec<Value>,
    want_min: bool,
}

impl MinMax {
    pub fn min() -> Self {
        Self { values: Vec::new(), want_min: true }
    }

    pub fn max() -> Self {
        Self { values: Vec::new(), want_min: false }
    }
}

impl Aggregator for MinMax {
    fn step(&mut self, args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        if let Some(Some(v)) = args.first() {
            self.values.push(v.clone());
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        let mut iter = self.values.iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        let mut best = first.clone();
        for v in iter {
            let replace = if self.want_min { v.lt_value(&best)? } else { v.gt_value(&best)? };
            if replace {
                best = v.clone();
            }
        }
        Ok(Some(best))
    }

    fn inverse(&mut self, args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        if let Some(Some(v)) = args.first() {
            if let Some(pos) = self.values.iter().position(|x| x.eq_value(v).unwrap_or(false)) {
                self.values.remove(pos);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct StringAgg {
    parts: Vec<String>,
    separator: Option<String>,
}

impl Aggregator for StringAgg {
    fn step(&mut self, args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        if let Some(Some(v)) = args.first() {
            self.parts.push(v.to_string_value()?);
        }
        if self.separator.is_none() {
            if let Some(Some(sep)) = args.get(1) {
                self.separator = Some(sep.to_string_value()?);
            }
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        if self.parts.is_empty() {
            return Ok(None);
        }
        let sep = self.separator.as_deref().unwrap_or(",");
        Ok(Some(Value::String(self.parts.join(sep))))
    }
}

#[derive(Default)]
pub struct ArrayAgg {
    items: Vec<Value>,
}

impl Aggregator for ArrayAgg {
    fn step(&mut self, args: &[Option<Value>], opts: &StepOptions) -> Result<()> {
        match args.first() {
            Some(Some(v)) => self.items.push(v.clone()),
            Some(None) if !opts.ignore_nulls => {
                return Ok(());
            }
            _ => {}
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(Some(Value::Array(self.items.clone())))
    }
}

#[derive(Default)]
pub struct ArrayConcatAgg {
    items: Vec<Value>,
}

impl Aggregator for ArrayConcatAgg {
    fn step(&mut self, args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        if let Some(Some(v)) = args.first() {
            self.items.extend(v.to_array()?.iter().cloned());
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(Some(Value::Array(self.items.clone())))
    }
}

pub struct LogicalAnd {
    value: bool,
}

impl Default for LogicalAnd {
    fn default() -> Self {
        Self { value: true }
    }
}

impl Aggregator for LogicalAnd {
    fn step(&mut self, args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        if let Some(Some(v)) = args.first() {
            self.value &= v.to_bool()?;
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(Some(Value::Bool(self.value)))
    }
}

#[derive(Default)]
pub struct LogicalOr {
    value: bool,
}

impl Aggregator for LogicalOr {
    fn step(&mut self, args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        if let Some(Some(v)) = args.first() {
            self.value |= v.to_bool()?;
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(Some(Value::Bool(self.value)))
    }
}

pub struct BitAgg {
    value: i64,
    op: BitOp,
    touched: bool,
}

#[derive(Clone, Copy)]
pub enum BitOp {
    And,
    Or,
    Xor,
}

impl BitAgg {
    pub fn new(op: BitOp) -> Self {
        Self {
            value: match op {
                BitOp::And => -1,
                BitOp::Or | BitOp::Xor => 0,
            },
            op,
            touched: false,
        }
    }
}

impl Aggregator for BitAgg {
    fn step(&mut self, args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        if let Some(Some(v)) = args.first() {
            let n = v.to_int()?;
            self.value = match self.op {
                BitOp::And => self.value & n,
                BitOp::Or => self.value | n,
                BitOp::Xor => self.value ^ n,
            };
            self.touched = true;
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(self.touched.then_some(Value::Int(self.value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(agg: &mut dyn Aggregator, rows: &[Option<Value>], opts: &StepOptions) -> Option<Value> {
        for row in rows {
            agg.step(std::slice::from_ref(row), opts).unwrap();
        }
        agg.done().unwrap()
    }

    #[test]
    fn sum_ignores_nulls_by_default() {
        let mut sum = Sum::default();
        let rows = vec![Some(Value::Int(1)), None, Some(Value::Int(2))];
        assert_eq!(run(&mut sum, &rows, &StepOptions::default()), Some(Value::Int(3)));
    }

    #[test]
    fn count_distinct_dedupes_by_first_arg() {
        let mut count = Count::default();
        let rows = vec![Some(Value::Int(1)), Some(Value::Int(1)), Some(Value::Int(2))];
        let opts = StepOptions { distinct: true, ignore_nulls: false };
        assert_eq!(run(&mut count, &rows, &opts), Some(Value::Int(2)));
    }

    #[test]
    fn min_max_track_extremes() {
        let mut min = MinMax::min();
        let rows = vec![Some(Value::Int(3)), Some(Value::Int(1)), Some(Value::Int(2))];
        assert_eq!(run(&mut min, &rows, &StepOptions::default()), Some(Value::Int(1)));
    }
}
