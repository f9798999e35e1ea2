//! Per-query fragment context (`spec.md §3.4`): the mutable scope table
//! threaded through every transformer call. Never shared across queries or
//! threads — one instance lives for the lifetime of a single `prepare`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub expression: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    available_columns: HashMap<i64, ColumnInfo>,
    column_scope: HashMap<i64, String>,
}

/// Opaque handle returned by `enter_scope`; must be passed back to
/// `exit_scope` to release the corresponding frame. Holding one across a
/// query boundary is a caller bug (`spec.md §9`).
#[derive(Debug)]
pub struct ScopeToken(usize);

/// Cooperative cancellation token (`spec.md §5`): an `AtomicBool`-backed
/// flag, the simplest shape that lets host-engine calls check for
/// cancellation without pulling in an async runtime.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct FragmentContext {
    available_columns: HashMap<i64, ColumnInfo>,
    column_scope: HashMap<i64, String>,
    scope_stack: Vec<Snapshot>,
    id_counter: i64,
    with_entry_mappings: HashMap<String, Vec<String>>,
    recursive_cte_name: Option<String>,
    cancellation: Option<CancellationToken>,
}

impl FragmentContext {
    pub fn new() -> Self {
        FragmentContext {
            available_columns: HashMap::new(),
            column_scope: HashMap::new(),
            scope_stack: Vec::new(),
            id_counter: 0,
            with_entry_mappings: HashMap::new(),
            recursive_cte_name: None,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Mints the next id used for a synthesized subquery alias
    /// (`table_scan_7`, `filter_scan_8`, …).
    pub fn next_id(&mut self) -> i64 {
        self.id_counter += 1;
        self.id_counter
    }

    pub fn register_column(&mut self, id: i64, info: ColumnInfo, table_alias: impl Into<String>) {
        self.available_columns.insert(id, info);
        self.column_scope.insert(id, table_alias.into());
    }

    pub fn column_info(&self, id: i64) -> Result<&ColumnInfo> {
        self.available_columns.get(&id).ok_or(Error::UnresolvedColumn(id))
    }

    pub fn table_alias(&self, id: i64) -> Result<&str> {
        self.column_scope
            .get(&id)
            .map(String::as_str)
            .ok_or(Error::UnresolvedColumn(id))
    }

    pub fn enter_scope(&mut self) -> ScopeToken {
        self.scope_stack.push(Snapshot {
            available_columns: self.available_columns.clone(),
            column_scope: self.column_scope.clone(),
        });
        ScopeToken(self.scope_stack.len() - 1)
    }

    /// Restores `available_columns`/`column_scope` to their value at the
    /// matching `enter_scope` (`spec.md §8`'s scope-stack invariant).
    pub fn exit_scope(&mut self, token: ScopeToken) {
        if let Some(snapshot) = self.scope_stack.drain(token.0..).next() {
            self.available_columns = snapshot.available_columns;
            self.column_scope = snapshot.column_scope;
        }
    }

    pub fn record_with_entry_mapping(&mut self, cte_name: impl Into<String>, aliases: Vec<String>) {
        self.with_entry_mappings.insert(cte_name.into(), aliases);
    }

    pub fn with_entry_mapping(&self, cte_name: &str) -> Result<&[String]> {
        self.with_entry_mappings
            .get(cte_name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::MissingCteMapping(cte_name.to_string()))
    }

    pub fn set_recursive_cte_name(&mut self, name: Option<String>) {
        self.recursive_cte_name = name;
    }

    pub fn recursive_cte_name(&self) -> Option<&str> {
        self.recursive_cte_name.as_deref()
    }
}

impl Default for FragmentContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_scope_restores_prior_available_columns() {
        let mut ctx = FragmentContext::new();
        ctx.register_column(1, ColumnInfo { name: "a".into(), expression: None }, "t1");
        let token = ctx.enter_scope();
        ctx.register_column(2, ColumnInfo { name: "b".into(), expression: None }, "t2");
        assert!(ctx.column_info(2).is_ok());
        ctx.exit_scope(token);
        assert!(ctx.column_info(2).is_err());
        assert!(ctx.column_info(1).is_ok());
    }

    #[test]
    fn next_id_is_monotonic() {
        let mut ctx = FragmentContext::new();
        assert_eq!(ctx.next_id(), 1);
        assert_eq!(ctx.next_id(), 2);
    }

    #[test]
    fn missing_with_entry_mapping_is_an_error() {
        let ctx = FragmentContext::new();
        assert!(ctx.with_entry_mapping("r").is_err());
    }
}
