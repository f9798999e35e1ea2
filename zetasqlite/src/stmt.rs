//! Statement transformers (`spec.md §4.9`): one rule per `StatementData`
//! variant, each producing a top-level `sql::Statement`. MERGE is the one
//! non-uniform case — it lowers into a fixed three-statement sequence
//! (`Statement::Compound`) rather than a single host-engine statement,
//! since SQLite has no native `MERGE`.

use zetasqlite_catalog::format_path;

use crate::context::FragmentContext;
use crate::coordinator::Coordinator;
use crate::error::{Context, Error, Result};
use crate::plan::*;
use crate::scan::wrap_as_select;
use crate::sql::{
    CreateTable, CreateView, DeleteStatement, DropObjectType as SqlDropObjectType, DropStatement,
    FromItem, InsertStatement, PlainSelect, SelectItem, SelectStatement, SqlExpression, Statement,
    UpdateStatement,
};

fn drop_object_type(t: DropObjectType) -> SqlDropObjectType {
    match t {
        DropObjectType::Table => SqlDropObjectType::Table,
        DropObjectType::View => SqlDropObjectType::View,
        DropObjectType::Function => SqlDropObjectType::Function,
        DropObjectType::Index => SqlDropObjectType::Index,
        DropObjectType::Schema => SqlDropObjectType::Schema,
    }
}

pub fn transform(coord: &Coordinator, data: &StatementData, ctx: &mut FragmentContext) -> Result<Statement> {
    match data {
        StatementData::Select(d) => transform_select(coord, d, ctx),
        StatementData::CreateTable(d) => transform_create_table(coord, d, ctx),
        StatementData::CreateView(d) => transform_create_view(coord, d, ctx),
        StatementData::Drop(d) => transform_drop(d),
        StatementData::Insert(d) => transform_insert(coord, d, ctx),
        StatementData::Update(d) => transform_update(coord, d, ctx),
        StatementData::Delete(d) => transform_delete(coord, d, ctx),
        StatementData::Merge(d) => transform_merge(coord, d, ctx),
    }
}

/// `spec.md §4.9`'s Select transformer: the query's scan, re-projected
/// through its final output-column list so user-facing aliases (not id
/// aliases) reach the host engine.
fn transform_select(coord: &Coordinator, data: &SelectStatementData, ctx: &mut FragmentContext) -> Result<Statement> {
    let from_item = coord.transform_scan(&data.input, ctx).context("query statement")?;
    let select_list = data
        .output
        .iter()
        .map(|c| -> Result<SelectItem> {
            Ok(SelectItem::Expr {
                expr: coord.transform_expression(&c.expr, ctx)?,
                alias: c.name.clone(),
            })
        })
        .collect::<Result<_>>()
        .context("query statement output columns")?;
    let select = SelectStatement::simple(PlainSelect {
        select_list,
        from: Some(from_item),
        where_clause: None,
        group_by: vec![],
        having: None,
    });
    Ok(Statement::Select(Box::new(select)))
}

fn transform_create_table(coord: &Coordinator, data: &CreateTableStatementData, ctx: &mut FragmentContext) -> Result<Statement> {
    let as_select = data
        .as_select
        .as_ref()
        .map(|scan| -> Result<Box<SelectStatement>> {
            let from_item = coord.transform_scan(scan, ctx).context("create table as select")?;
            Ok(Box::new(wrap_as_select(from_item)))
        })
        .transpose()?;
    Ok(Statement::CreateTable(CreateTable {
        name: format_path(&data.name_path),
        if_not_exists: data.if_not_exists,
        or_replace: data.or_replace,
        columns: data.columns.clone(),
        as_select,
    }))
}

fn transform_create_view(coord: &Coordinator, data: &CreateViewStatementData, ctx: &mut FragmentContext) -> Result<Statement> {
    let from_item = coord.transform_scan(&data.query, ctx).context("create view query")?;
    Ok(Statement::CreateView(CreateView {
        name: format_path(&data.name_path),
        or_replace: data.or_replace,
        query: Box::new(wrap_as_select(from_item)),
    }))
}

fn transform_drop(data: &DropStatementData) -> Result<Statement> {
    Ok(Statement::Drop(DropStatement {
        object_type: drop_object_type(data.object_type),
        name: format_path(&data.name_path),
        if_exists: data.if_exists,
    }))
}

fn transform_insert(coord: &Coordinator, data: &InsertStatementData, ctx: &mut FragmentContext) -> Result<Statement> {
    let from_item = coord.transform_scan(&data.input, ctx).context("insert source")?;
    Ok(Statement::Insert(InsertStatement {
        target: format_path(&data.target_name_path),
        columns: data.columns.clone(),
        source: Box::new(wrap_as_select(from_item)),
    }))
}

fn transform_update(coord: &Coordinator, data: &UpdateStatementData, ctx: &mut FragmentContext) -> Result<Statement> {
    let from = data
        .from
        .as_ref()
        .map(|scan| coord.transform_scan(scan, ctx))
        .transpose()
        .context("update from-clause")?;
    let assignments = assignment_list(coord, &data.assignments, ctx)?;
    let where_clause = data
        .condition
        .as_ref()
        .map(|c| coord.transform_expression(c, ctx))
        .transpose()
        .context("update condition")?;
    Ok(Statement::Update(UpdateStatement {
        target: format_path(&data.target_name_path),
        assignments,
        from,
        where_clause,
    }))
}

fn assignment_list(
    coord: &Coordinator,
    assignments: &[UpdateAssignment],
    ctx: &mut FragmentContext,
) -> Result<Vec<(String, SqlExpression)>> {
    assignments
        .iter()
        .map(|a| -> Result<(String, SqlExpression)> {
            Ok((a.target_column.clone(), coord.transform_expression(&a.value, ctx)?))
        })
        .collect::<Result<_>>()
        .context("update assignments")
}

fn transform_delete(coord: &Coordinator, data: &DeleteStatementData, ctx: &mut FragmentContext) -> Result<Statement> {
    let where_clause = data
        .condition
        .as_ref()
        .map(|c| coord.transform_expression(c, ctx))
        .transpose()
        .context("delete condition")?;
    Ok(Statement::Delete(DeleteStatement {
        target: format_path(&data.target_name_path),
        where_clause,
    }))
}

/// `spec.md §6.6`'s MERGE lowering: since SQLite has no native `MERGE`, the
/// statement is lowered into a fixed three-phase sequence —
/// `CREATE TEMP TABLE AS SELECT <source>`, then one `INSERT`/`UPDATE`/
/// `DELETE` per `WHEN` clause keyed off the temp table, then `DROP TABLE`.
/// The join key must be a simple equality of one source and one target
/// column (`spec.md §9`'s resolved Open Question; anything richer is
/// rejected with `Error::UnsupportedMergeCondition`).
fn transform_merge(coord: &Coordinator, data: &MergeStatementData, ctx: &mut FragmentContext) -> Result<Statement> {
    if data.source_key_column.is_empty() || data.target_key_column.is_empty() {
        return Err(Error::UnsupportedMergeCondition);
    }

    let source_columns = data.source.columns().clone();
    let source_from = coord.transform_scan(&data.source, ctx).context("merge source")?;
    let temp_table = format!("zetasqlite_merge_source_{}", ctx.next_id());
    let target = format_path(&data.target_name_path);

    let create_temp = Statement::CreateTable(CreateTable {
        name: temp_table.clone(),
        if_not_exists: false,
        or_replace: false,
        columns: vec![],
        as_select: Some(Box::new(wrap_as_select(source_from))),
    });

    // `CREATE TABLE ... AS SELECT *` carries the source scan's id-aliased
    // column names (e.g. `k#1`) into the temp table's own schema, so every
    // WHEN clause below must resolve source columns against the temp
    // table's alias, not the scan's original one.
    for column in &source_columns {
        ctx.register_column(
            column.id,
            crate::context::ColumnInfo { name: column.name.clone(), expression: None },
            temp_table.clone(),
        );
    }
    let source_key_id = source_columns
        .iter()
        .find(|c| c.name == data.source_key_column)
        .map(|c| c.id)
        .ok_or(Error::UnsupportedMergeCondition)?;

    let mut phases = vec![create_temp];
    for when in &data.whens {
        phases.push(transform_merge_when(coord, data, when, &temp_table, &target, source_key_id, ctx)?);
    }
    phases.push(Statement::Drop(DropStatement {
        object_type: SqlDropObjectType::Table,
        name: temp_table,
        if_exists: true,
    }));

    Ok(Statement::Compound(phases))
}

fn transform_merge_when(
    coord: &Coordinator,
    data: &MergeStatementData,
    when: &MergeWhenClause,
    temp_table: &str,
    target: &str,
    source_key_id: i64,
    ctx: &mut FragmentContext,
) -> Result<Statement> {
    match when.action {
        MergeAction::InsertNotMatchedByTarget => {
            let select_list = when
                .insert_values
                .iter()
                .map(|v| -> Result<SelectItem> {
                    Ok(SelectItem::Expr {
                        expr: coord.transform_expression(v, ctx)?,
                        alias: "value".to_string(),
                    })
                })
                .collect::<Result<_>>()
                .context("merge INSERT values")?;
            let source = SelectStatement::simple(PlainSelect {
                select_list,
                from: Some(FromItem::Table {
                    name: temp_table.to_string(),
                    alias: None,
                }),
                where_clause: Some(not_matched_by_target(temp_table, target, data, source_key_id)),
                group_by: vec![],
                having: None,
            });
            Ok(Statement::Insert(InsertStatement {
                target: target.to_string(),
                columns: when.insert_columns.clone(),
                source: Box::new(source),
            }))
        }
        MergeAction::UpdateMatched => {
            let assignments = assignment_list(coord, &when.update_assignments, ctx)?;
            let where_clause = matched_filter(temp_table, target, data, when, source_key_id, coord, ctx)?;
            Ok(Statement::Update(UpdateStatement {
                target: target.to_string(),
                assignments,
                from: Some(FromItem::Table {
                    name: temp_table.to_string(),
                    alias: None,
                }),
                where_clause,
            }))
        }
        MergeAction::DeleteMatched => {
            let where_clause = matched_filter(temp_table, target, data, when, source_key_id, coord, ctx)?;
            Ok(Statement::Delete(DeleteStatement {
                target: target.to_string(),
                where_clause,
            }))
        }
    }
}

fn key_equality(temp_table: &str, target: &str, data: &MergeStatementData, source_key_id: i64) -> SqlExpression {
    SqlExpression::FunctionCall(crate::sql::FunctionCall {
        name: "zetasqlite_eq".to_string(),
        args: vec![
            SqlExpression::Column {
                table_alias: Some(temp_table.to_string()),
                name: crate::expr::id_alias(&data.source_key_column, source_key_id),
            },
            SqlExpression::Column {
                table_alias: Some(target.to_string()),
                name: data.target_key_column.clone(),
            },
        ],
        distinct: false,
        window: None,
    })
}

fn matched_filter(
    temp_table: &str,
    target: &str,
    data: &MergeStatementData,
    when: &MergeWhenClause,
    source_key_id: i64,
    coord: &Coordinator,
    ctx: &mut FragmentContext,
) -> Result<Option<SqlExpression>> {
    let key_eq = key_equality(temp_table, target, data, source_key_id);
    match &when.extra_condition {
        None => Ok(Some(key_eq)),
        Some(extra) => {
            let extra_sql = coord.transform_expression(extra, ctx).context("merge extra condition")?;
            Ok(Some(SqlExpression::FunctionCall(crate::sql::FunctionCall {
                name: "zetasqlite_and".to_string(),
                args: vec![key_eq, extra_sql],
                distinct: false,
                window: None,
            })))
        }
    }
}

/// `NOT EXISTS (SELECT 1 FROM target WHERE target.key = temp.key)`, scoped
/// to the row currently being considered in the outer `INSERT ... SELECT`.
fn not_matched_by_target(temp_table: &str, target: &str, data: &MergeStatementData, source_key_id: i64) -> SqlExpression {
    let inner = SelectStatement::simple(PlainSelect {
        select_list: vec![SelectItem::Expr {
            expr: SqlExpression::Literal("1".to_string()),
            alias: "one".to_string(),
        }],
        from: Some(FromItem::Table {
            name: target.to_string(),
            alias: None,
        }),
        where_clause: Some(key_equality(temp_table, target, data, source_key_id)),
        group_by: vec![],
        having: None,
    });
    SqlExpression::Exists(crate::sql::ExistsExpression {
        subquery: Box::new(inner),
        negated: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_requires_a_key_column_on_both_sides() {
        let data = MergeStatementData {
            target_name_path: vec!["t".into()],
            source: Box::new(ScanData::SingleRow(SingleRowScanData { columns: vec![] })),
            source_key_column: String::new(),
            target_key_column: "id".into(),
            whens: vec![],
        };
        let mut ctx = FragmentContext::new();
        let err = transform_merge(crate::coordinator::global(), &data, &mut ctx).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMergeCondition));
    }

    #[test]
    fn merge_lowers_to_a_compound_statement_with_temp_table_bookends() {
        let data = MergeStatementData {
            target_name_path: vec!["t".into()],
            source: Box::new(ScanData::Table(TableScanData {
                columns: vec![ColumnInfo { id: 1, name: "id".into() }],
                table_name: "s".into(),
                column_source_names: vec!["id".into()],
            })),
            source_key_column: "id".into(),
            target_key_column: "id".into(),
            whens: vec![MergeWhenClause {
                action: MergeAction::DeleteMatched,
                extra_condition: None,
                insert_columns: vec![],
                insert_values: vec![],
                update_assignments: vec![],
            }],
        };
        let mut ctx = FragmentContext::new();
        let stmt = transform_merge(crate::coordinator::global(), &data, &mut ctx).unwrap();
        let Statement::Compound(phases) = stmt else {
            panic!("expected a compound statement");
        };
        assert_eq!(phases.len(), 3);
        assert!(matches!(phases[0], Statement::CreateTable(_)));
        assert!(matches!(phases[1], Statement::Delete(_)));
        assert!(matches!(phases[2], Statement::Drop(_)));
    }
}
