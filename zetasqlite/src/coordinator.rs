//! Transformer coordinator (`spec.md §4.6`): the dispatch hub. Owns no
//! mutable state of its own — all per-query state lives in the
//! `FragmentContext` passed to every call — so a single instance is shared
//! process-wide via `global()`.

use std::sync::OnceLock;

use crate::context::{ColumnInfo as CtxColumnInfo, FragmentContext};
use crate::error::{Context, Error, Result};
use crate::expr::id_alias;
use crate::plan::{ColumnList, ExpressionData, ScanData, StatementData};
use crate::raw::RawNode;
use crate::sql::{FromItem, PlainSelect, SelectBody, SelectItem, SqlExpression, Statement, WithEntry};
use crate::{expr, extract, scan, stmt};

/// Stateless dispatch hub (`spec.md §4.6`). Transformers are plain
/// functions rather than trait objects since every `ExpressionData`/
/// `ScanData`/`StatementData` case is already a closed, known set — the
/// tagged union itself is the "registry".
#[derive(Default)]
pub struct Coordinator {
    _private: (),
}

static GLOBAL: OnceLock<Coordinator> = OnceLock::new();

/// The process-wide singleton coordinator (`spec.md §4.6`, §9's "thread-local
/// singleton... replaced by a process-wide immutable service with explicit
/// construction on first use").
pub fn global() -> &'static Coordinator {
    GLOBAL.get_or_init(Coordinator::default)
}

impl Coordinator {
    pub fn transform_statement_node(&self, node: &RawNode, ctx: &mut FragmentContext) -> Result<Statement> {
        let data = extract::extract_statement(node).context("extracting resolved statement")?;
        self.transform_statement(&data, ctx)
    }

    pub fn transform_statement(&self, data: &StatementData, ctx: &mut FragmentContext) -> Result<Statement> {
        stmt::transform(self, data, ctx)
    }

    pub fn transform_expression(&self, data: &ExpressionData, ctx: &mut FragmentContext) -> Result<SqlExpression> {
        expr::transform(self, data, ctx)
    }

    fn scan_kind_name(data: &ScanData) -> &'static str {
        match data {
            ScanData::Table(_) => "table_scan",
            ScanData::Join(_) => "join_scan",
            ScanData::Filter(_) => "filter_scan",
            ScanData::Project(_) => "project_scan",
            ScanData::Aggregate(_) => "aggregate_scan",
            ScanData::OrderBy(_) => "order_by_scan",
            ScanData::Limit(_) => "limit_scan",
            ScanData::SetOp(_) => "set_op_scan",
            ScanData::SingleRow(_) => "single_row_scan",
            ScanData::With(_) => "with_scan",
            ScanData::WithRef(_) => "with_ref_scan",
            ScanData::WithEntry(_) => "with_entry",
            ScanData::Array(_) => "array_scan",
            ScanData::Analytic(_) => "analytic_scan",
            ScanData::Recursive(_) => "recursive_scan",
            ScanData::RecursiveRef(_) => "rrs",
        }
    }

    /// Transforms a scan node (`spec.md §4.8`). After delegating to the
    /// per-kind transformer, mints the subquery alias, validates the output
    /// column shape, and registers every output column in the fragment
    /// context (`spec.md §4.6`'s three-step contract).
    pub fn transform_scan(&self, data: &ScanData, ctx: &mut FragmentContext) -> Result<FromItem> {
        let kind_name = Self::scan_kind_name(data);
        let id = ctx.next_id();
        let alias = format!("{kind_name}_{id}");

        let from_item = scan::transform(self, data, ctx, &alias).context(format!("{kind_name}"))?;
        self.validate_column_data(&from_item, data.columns())?;
        self.register_columns(data.columns(), &alias, ctx);
        Ok(from_item)
    }

    /// WITH entries are not used as FROM items, so they get their own entry
    /// point (`spec.md §4.6`).
    pub fn transform_with_entry(
        &self,
        data: &crate::plan::WithEntryScanData,
        ctx: &mut FragmentContext,
    ) -> Result<WithEntry> {
        scan::transform_with_entry(self, data, ctx)
    }

    fn register_columns(&self, columns: &ColumnList, alias: &str, ctx: &mut FragmentContext) {
        for column in columns {
            ctx.register_column(
                column.id,
                CtxColumnInfo {
                    name: column.name.clone(),
                    expression: None,
                },
                alias,
            );
        }
    }

    /// `validateColumnData` (`spec.md §4.6`): for subquery-shaped
    /// `FromItem`s, checks that the select list's aliases exactly match the
    /// id-based aliases computed from `columns`. For `SELECT *` shapes,
    /// recurses into the underlying subquery/join.
    fn validate_column_data(&self, from_item: &FromItem, columns: &ColumnList) -> Result<()> {
        let FromItem::Subquery { query, alias } = from_item else {
            return Ok(());
        };
        match &query.body {
            SelectBody::Select(select) => self.validate_plain_select(select, alias, columns),
            SelectBody::SetOp(set_op) => self.validate_set_op(set_op, alias, columns),
        }
    }

    /// A set operation's output shape is governed by its first (leftmost)
    /// operand; every other operand is required by the host engine to have
    /// the same column count, so only the first needs checking here.
    fn validate_set_op(&self, set_op: &crate::sql::SetOperation, alias: &str, columns: &ColumnList) -> Result<()> {
        let Some(first) = set_op.operands.first() else {
            return Ok(());
        };
        match &first.body {
            SelectBody::Select(select) => self.validate_plain_select(select, alias, columns),
            SelectBody::SetOp(inner) => self.validate_set_op(inner, alias, columns),
        }
    }

    fn validate_plain_select(&self, select: &PlainSelect, alias: &str, columns: &ColumnList) -> Result<()> {
        let has_star = select
            .select_list
            .iter()
            .any(|item| matches!(item, SelectItem::Star | SelectItem::QualifiedStar(_)));
        if has_star {
            if let Some(inner) = &select.from {
                return self.validate_column_data(inner, columns);
            }
            return Ok(());
        }

        let expected: Vec<String> = columns.iter().map(|c| id_alias(&c.name, c.id)).collect();
        if select.select_list.len() != expected.len() {
            return Err(Error::ColumnValidation {
                alias: alias.to_string(),
                reason: format!(
                    "select list has {} items, expected {}",
                    select.select_list.len(),
                    expected.len()
                ),
            });
        }
        for (item, expected_alias) in select.select_list.iter().zip(expected.iter()) {
            let SelectItem::Expr { alias: actual, .. } = item else {
                return Err(Error::ColumnValidation {
                    alias: alias.to_string(),
                    reason: "expected an aliased expression, found a star".to_string(),
                });
            };
            if actual.is_empty() {
                return Err(Error::ColumnValidation {
                    alias: alias.to_string(),
                    reason: "empty column alias".to_string(),
                });
            }
            if actual != expected_alias {
                return Err(Error::ColumnValidation {
                    alias: alias.to_string(),
                    reason: format!("column alias '{actual}' not in expected set (wanted '{expected_alias}')"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ColumnInfo, SingleRowScanData};
    use crate::sql::{PlainSelect, SelectStatement};

    #[test]
    fn validate_column_data_accepts_matching_aliases() {
        let coord = global();
        let columns = vec![ColumnInfo { id: 1, name: "a".into() }];
        let select = SelectStatement::simple(PlainSelect {
            select_list: vec![SelectItem::Expr {
                expr: SqlExpression::Literal("1".into()),
                alias: "a#1".into(),
            }],
            from: None,
            where_clause: None,
            group_by: vec![],
            having: None,
        });
        let from_item = FromItem::Subquery {
            query: Box::new(select),
            alias: "table_scan_1".into(),
        };
        assert!(coord.validate_column_data(&from_item, &columns).is_ok());
    }

    #[test]
    fn validate_column_data_rejects_wrong_alias() {
        let coord = global();
        let columns = vec![ColumnInfo { id: 1, name: "a".into() }];
        let select = SelectStatement::simple(PlainSelect {
            select_list: vec![SelectItem::Expr {
                expr: SqlExpression::Literal("1".into()),
                alias: "wrong".into(),
            }],
            from: None,
            where_clause: None,
            group_by: vec![],
            having: None,
        });
        let from_item = FromItem::Subquery {
            query: Box::new(select),
            alias: "table_scan_1".into(),
        };
        assert!(coord.validate_column_data(&from_item, &columns).is_err());
    }

    #[test]
    fn single_row_scan_has_no_columns_to_validate() {
        let coord = global();
        let mut ctx = FragmentContext::new();
        let data = ScanData::SingleRow(SingleRowScanData { columns: vec![] });
        let from_item = coord.transform_scan(&data, &mut ctx).unwrap();
        assert!(matches!(from_item, FromItem::SingleRow));
    }
}
