//! Navigation and ranking window functions (`spec.md §4.2`), wired through
//! the same `Aggregator` step/done/inverse protocol the binding layer (C3)
//! drives for every other window aggregate — SQLite's own window-function
//! machinery resolves partitions and frames and calls into these in row
//! order, so there is no separate buffering layer to maintain here.

use std::collections::VecDeque;

use zetasqlite_value::Value;

use crate::aggregate::{Aggregator, StepOptions};
use crate::error::{FunctionError, Result};

fn keys_equal(a: &[Option<Value>], b: &[Option<Value>]) -> Result<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b.iter()) {
        match (x, y) {
            (None, None) => {}
            (Some(x), Some(y)) if x.eq_value(y)? => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// `ROW_NUMBER()`: takes no arguments of its own, just counts steps. Always
/// runs over the default growing frame, so `inverse` is never reachable.
#[derive(Default)]
pub struct RowNumberAgg {
    count: i64,
}

impl Aggregator for RowNumberAgg {
    fn step(&mut self, _args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        self.count += 1;
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(Some(Value::Int(self.count)))
    }
}

/// `RANK()`: the SQL writer (C10) appends the window's `ORDER BY` key
/// expressions as this call's arguments (`spec.md §4.2` step 2's trailing
/// positional args convention), so `step` sees the new row's order key on
/// every call and can detect a tie without access to the whole partition.
#[derive(Default)]
pub struct RankAgg {
    row_count: i64,
    current_rank: i64,
    last_key: Option<Vec<Option<Value>>>,
}

impl Aggregator for RankAgg {
    fn step(&mut self, args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        self.row_count += 1;
        let tied = match &self.last_key {
            Some(prev) => keys_equal(prev, args)?,
            None => false,
        };
        if !tied {
            self.current_rank = self.row_count;
            self.last_key = Some(args.to_vec());
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(Some(Value::Int(self.current_rank)))
    }
}

/// `DENSE_RANK()`: same trailing-order-key convention as [`RankAgg`], but
/// the rank only counts distinct keys seen so far rather than rows.
#[derive(Default)]
pub struct DenseRankAgg {
    current_rank: i64,
    last_key: Option<Vec<Option<Value>>>,
}

impl Aggregator for DenseRankAgg {
    fn step(&mut self, args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        let tied = match &self.last_key {
            Some(prev) => keys_equal(prev, args)?,
            None => false,
        };
        if !tied {
            self.current_rank += 1;
            self.last_key = Some(args.to_vec());
        }
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(Some(Value::Int(self.current_rank)))
    }
}

/// `LAG(value[, offset[, default]])`: offset and default are read off the
/// first step and held fixed, since BigQuery requires them to be constant
/// per call site. Always runs over the whole partition up to the current
/// row, so `inverse` is never reachable.
pub struct LagAgg {
    values: Vec<Option<Value>>,
    offset: i64,
    default: Option<Value>,
    configured: bool,
}

impl Default for LagAgg {
    fn default() -> Self {
        Self { values: Vec::new(), offset: 1, default: None, configured: false }
    }
}

impl Aggregator for LagAgg {
    fn step(&mut self, args: &[Option<Value>], _opts: &StepOptions) -> Result<()> {
        if !self.configured {
            if let Some(Some(v)) = args.get(1) {
                self.offset = v.to_int()?;
            }
            if let Some(Some(v)) = args.get(2) {
                self.default = Some(v.clone());
            }
            self.configured = true;
        }
        self.values.push(args.first().cloned().flatten());
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        if self.offset < 0 {
            return Ok(self.default.clone());
        }
        let target = self.values.len() as i64 - 1 - self.offset;
        if target < 0 {
            return Ok(self.default.clone());
        }
        Ok(self.values[target as usize].clone().or_else(|| self.default.clone()))
    }
}

/// `LAST_VALUE(value)`: a FIFO buffer of the frame's values, invertible
/// because the row leaving a shrinking frame is always the oldest one
/// still held.
#[derive(Default)]
pub struct LastValueAgg {
    values: VecDeque<Option<Value>>,
}

impl Aggregator for LastValueAgg {
    fn step(&mut self, args: &[Option<Value>], opts: &StepOptions) -> Result<()> {
        let v = args.first().cloned().flatten();
        if opts.ignore_nulls && v.is_none() {
            return Ok(());
        }
        self.values.push_back(v);
        Ok(())
    }

    fn done(&self) -> Result<Option<Value>> {
        Ok(self.values.back().cloned().flatten())
    }

    fn inverse(&mut self, args: &[Option<Value>], opts: &StepOptions) -> Result<()> {
        let v = args.first().cloned().flatten();
        if opts.ignore_nulls && v.is_none() {
            return Ok(());
        }
        if self.values.pop_front().is_none() {
            return Err(FunctionError::UnsupportedWindowFrame("LAST_VALUE"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> StepOptions {
        StepOptions::default()
    }

    #[test]
    fn row_number_counts_steps() {
        let mut agg = RowNumberAgg::default();
        agg.step(&[], &opts()).unwrap();
        agg.step(&[], &opts()).unwrap();
        assert_eq!(agg.done().unwrap(), Some(Value::Int(2)));
    }

    #[test]
    fn rank_skips_over_ties_dense_rank_does_not() {
        let mut rank = RankAgg::default();
        let mut dense = DenseRankAgg::default();
        let rows = [Some(Value::Int(1)), Some(Value::Int(1)), Some(Value::Int(2))];
        let mut ranks = Vec::new();
        let mut dense_ranks = Vec::new();
        for row in rows {
            rank.step(&[row.clone()], &opts()).unwrap();
            dense.step(&[row], &opts()).unwrap();
            ranks.push(rank.done().unwrap());
            dense_ranks.push(dense.done().unwrap());
        }
        assert_eq!(ranks, vec![Some(Value::Int(1)), Some(Value::Int(1)), Some(Value::Int(3))]);
        assert_eq!(dense_ranks, vec![Some(Value::Int(1)), Some(Value::Int(1)), Some(Value::Int(2))]);
    }

    #[test]
    fn lag_looks_back_by_offset_and_falls_back_to_default() {
        let mut agg = LagAgg::default();
        for v in [10, 20, 30] {
            agg.step(&[Some(Value::Int(v)), Some(Value::Int(1)), Some(Value::Int(-1))], &opts())
                .unwrap();
        }
        assert_eq!(agg.done().unwrap(), Some(Value::Int(20)));

        let mut first_row = LagAgg::default();
        first_row
            .step(&[Some(Value::Int(10)), Some(Value::Int(1)), Some(Value::Int(-1))], &opts())
            .unwrap();
        assert_eq!(first_row.done().unwrap(), Some(Value::Int(-1)));
    }

    #[test]
    fn last_value_tracks_frame_tail_and_inverts() {
        let mut agg = LastValueAgg::default();
        agg.step(&[Some(Value::Int(1))], &opts()).unwrap();
        agg.step(&[Some(Value::Int(2))], &opts()).unwrap();
        agg.step(&[Some(Value::Int(3))], &opts()).unwrap();
        assert_eq!(agg.done().unwrap(), Some(Value::Int(3)));
        agg.inverse(&[Some(Value::Int(1))], &opts()).unwrap();
        assert_eq!(agg.done().unwrap(), Some(Value::Int(3)));
    }
}
