//! Scan transformers (`spec.md §4.8`): one rule per `ScanData` variant.
//! Every transformer returns a finished `sql::FromItem` under the alias its
//! caller (`coordinator::transform_scan`) already minted — structurally
//! uniform bottom-up composition, with two deliberate exceptions:
//!
//! - `Array` mints a second, inner alias (`$array_<id>`) for the
//!   `json_each` table function it unnests, distinct from its own outer
//!   subquery alias.
//! - `RecursiveRef` returns a bare `FromItem::WithRef` rather than wrapping
//!   it in a `Subquery`, since the recursive term's self-reference must sit
//!   at the top level of its `FROM` clause for SQLite's `WITH RECURSIVE` to
//!   accept it — wrapping it would defeat the whole point of flattening.

use crate::context::FragmentContext;
use crate::coordinator::Coordinator;
use crate::error::{Context, Result};
use crate::expr::id_alias;
use crate::plan::*;
use crate::sql::{
    FromItem, FunctionCall, JoinClause, JoinKind as SqlJoinKind, OrderByItem, PlainSelect,
    SelectBody, SelectItem, SelectStatement, SetOpKind as SqlSetOpKind,
    SetOpModifier as SqlSetOpModifier, SetOperation, SqlExpression, WithEntry,
};

/// Name of the collation registered by `zetasqlite-functions::bind` for
/// `ORDER BY` over `zetasqlite_group_by`-wrapped columns (`spec.md §6.3`'s
/// BigQuery NULL-ordering rules, rather than SQLite's default TEXT
/// collation).
const GROUP_BY_COLLATION: &str = "zetasqlite_collate";

/// Wraps a group-by expression in the BigQuery null-collation sentinel
/// (`spec.md §6.3`) so every grouping set's output for that column — real
/// value or the `NULL` ROLLUP/CUBE pads in — shares one consistent
/// wire-encoded representation `ORDER BY ... COLLATE zetasqlite_collate`
/// can sort uniformly.
fn group_by_sentinel(expr: SqlExpression) -> SqlExpression {
    SqlExpression::FunctionCall(FunctionCall {
        name: "zetasqlite_group_by".to_string(),
        args: vec![expr],
        distinct: false,
        window: None,
    })
}

/// `SELECT * FROM <from_item>` (`spec.md §4.7`'s `Scalar → (SELECT * FROM
/// inner)`).
pub fn wrap_as_select(from_item: FromItem) -> SelectStatement {
    SelectStatement::simple(PlainSelect {
        select_list: vec![SelectItem::Star],
        from: Some(from_item),
        where_clause: None,
        group_by: vec![],
        having: None,
    })
}

/// `SELECT <expr> AS <alias> FROM <from_item>` (`spec.md §4.7`'s ARRAY
/// subquery shape: `(SELECT zetasqlite_array(<col>) FROM inner)`).
pub fn wrap_as_single_expr_select(from_item: FromItem, expr: SqlExpression, alias: &str) -> SelectStatement {
    SelectStatement::simple(PlainSelect {
        select_list: vec![SelectItem::Expr {
            expr,
            alias: alias.to_string(),
        }],
        from: Some(from_item),
        where_clause: None,
        group_by: vec![],
        having: None,
    })
}

fn select_list_for(columns: &ColumnList, ctx: &FragmentContext) -> Result<Vec<SelectItem>> {
    columns
        .iter()
        .map(|c| -> Result<SelectItem> {
            Ok(SelectItem::Expr {
                expr: crate::expr::column_reference(ctx, c.id)?,
                alias: id_alias(&c.name, c.id),
            })
        })
        .collect()
}

fn subquery(select: SelectStatement, alias: &str) -> FromItem {
    FromItem::Subquery {
        query: Box::new(select),
        alias: alias.to_string(),
    }
}

fn join_kind(kind: JoinKind) -> SqlJoinKind {
    match kind {
        JoinKind::Inner => SqlJoinKind::Inner,
        JoinKind::Left => SqlJoinKind::Left,
        JoinKind::Right => SqlJoinKind::Right,
        JoinKind::FullOuter => SqlJoinKind::FullOuter,
        JoinKind::Cross => SqlJoinKind::Cross,
    }
}

fn set_op_kind(op: SetOpKind) -> SqlSetOpKind {
    match op {
        SetOpKind::Union => SqlSetOpKind::Union,
        SetOpKind::Intersect => SqlSetOpKind::Intersect,
        SetOpKind::Except => SqlSetOpKind::Except,
    }
}

fn set_op_modifier(modifier: SetOpModifier) -> SqlSetOpModifier {
    match modifier {
        SetOpModifier::All => SqlSetOpModifier::All,
        SetOpModifier::Distinct => SqlSetOpModifier::Distinct,
    }
}

pub fn transform(coord: &Coordinator, data: &ScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    match data {
        ScanData::Table(d) => transform_table(d, alias),
        ScanData::Join(d) => transform_join(coord, d, ctx, alias),
        ScanData::Filter(d) => transform_filter(coord, d, ctx, alias),
        ScanData::Project(d) => transform_project(coord, d, ctx, alias),
        ScanData::Aggregate(d) => transform_aggregate(coord, d, ctx, alias),
        ScanData::OrderBy(d) => transform_order_by(coord, d, ctx, alias),
        ScanData::Limit(d) => transform_limit(coord, d, ctx, alias),
        ScanData::SetOp(d) => transform_set_op(coord, d, ctx, alias),
        ScanData::SingleRow(_) => Ok(FromItem::SingleRow),
        ScanData::With(d) => transform_with(coord, d, ctx, alias),
        ScanData::WithRef(d) => transform_with_ref(coord, d, ctx, alias),
        ScanData::WithEntry(d) => {
            let entry = transform_with_entry(coord, d, ctx)?;
            Ok(FromItem::WithRef {
                name: entry.name,
                alias: alias.to_string(),
            })
        }
        ScanData::Array(d) => transform_array(coord, d, ctx, alias),
        ScanData::Analytic(d) => transform_analytic(coord, d, ctx, alias),
        ScanData::Recursive(d) => transform_recursive(coord, d, ctx, alias),
        ScanData::RecursiveRef(d) => transform_recursive_ref(d, alias),
    }
}

/// `spec.md §4.8`'s Table scan: a raw table reference under the minted
/// alias, with each output column re-exposed as `<name>#<id>` so downstream
/// consumers never see the table's native column names.
fn transform_table(data: &TableScanData, alias: &str) -> Result<FromItem> {
    let select_list = data
        .columns
        .iter()
        .zip(data.column_source_names.iter())
        .map(|(c, source_name)| SelectItem::Expr {
            expr: SqlExpression::Column {
                table_alias: Some(format!("{alias}_raw")),
                name: source_name.clone(),
            },
            alias: id_alias(&c.name, c.id),
        })
        .collect();
    let inner = FromItem::Table {
        name: data.table_name.clone(),
        alias: Some(format!("{alias}_raw")),
    };
    let select = SelectStatement::simple(PlainSelect {
        select_list,
        from: Some(inner),
        where_clause: None,
        group_by: vec![],
        having: None,
    });
    Ok(subquery(select, alias))
}

fn transform_join(coord: &Coordinator, data: &JoinScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    let left = coord.transform_scan(&data.left, ctx).context("join scan (left)")?;
    let right = coord.transform_scan(&data.right, ctx).context("join scan (right)")?;
    let condition = data
        .condition
        .as_ref()
        .map(|c| coord.transform_expression(c, ctx))
        .transpose()
        .context("join scan condition")?;

    let join = FromItem::Join(Box::new(JoinClause {
        left,
        right,
        kind: join_kind(data.kind),
        condition,
        using: data.using.clone(),
    }));
    let select_list = select_list_for(&data.columns, ctx)?;
    let select = SelectStatement::simple(PlainSelect {
        select_list,
        from: Some(join),
        where_clause: None,
        group_by: vec![],
        having: None,
    });
    Ok(subquery(select, alias))
}

fn transform_filter(coord: &Coordinator, data: &FilterScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    let input = coord.transform_scan(&data.input, ctx).context("filter scan input")?;
    let condition = coord.transform_expression(&data.condition, ctx).context("filter scan condition")?;
    let select = SelectStatement::simple(PlainSelect {
        select_list: vec![SelectItem::Star],
        from: Some(input),
        where_clause: Some(condition),
        group_by: vec![],
        having: None,
    });
    let _ = &data.columns;
    Ok(subquery(select, alias))
}

fn transform_project(coord: &Coordinator, data: &ProjectScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    let input = coord.transform_scan(&data.input, ctx).context("project scan input")?;
    let select_list = data
        .expressions
        .iter()
        .map(|c| -> Result<SelectItem> {
            Ok(SelectItem::Expr {
                expr: coord.transform_expression(&c.expr, ctx)?,
                alias: id_alias(&c.name, c.id),
            })
        })
        .collect::<Result<_>>()
        .context("project scan expressions")?;
    let select = SelectStatement::simple(PlainSelect {
        select_list,
        from: Some(input),
        where_clause: None,
        group_by: vec![],
        having: None,
    });
    Ok(subquery(select, alias))
}

fn transform_aggregate(coord: &Coordinator, data: &AggregateScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    let input = coord.transform_scan(&data.input, ctx).context("aggregate scan input")?;

    if data.grouping_sets.len() > 1 {
        return transform_rollup(coord, data, input, ctx, alias);
    }

    let mut select_list = Vec::with_capacity(data.group_by.len() + data.aggregates.len());
    let mut group_by = Vec::with_capacity(data.group_by.len());
    for c in &data.group_by {
        let expr = group_by_sentinel(coord.transform_expression(&c.expr, ctx)?);
        group_by.push(expr.clone());
        select_list.push(SelectItem::Expr {
            expr,
            alias: id_alias(&c.name, c.id),
        });
    }
    for c in &data.aggregates {
        select_list.push(SelectItem::Expr {
            expr: coord.transform_expression(&c.expr, ctx)?,
            alias: id_alias(&c.name, c.id),
        });
    }

    let select = SelectStatement::simple(PlainSelect {
        select_list,
        from: Some(input),
        where_clause: None,
        group_by,
        having: None,
    });
    Ok(subquery(select, alias))
}

/// ROLLUP/CUBE/GROUPING SETS (`spec.md §6.3`): one `SELECT` per grouping
/// set, NULL-padding the columns it omits, unioned with `UNION ALL`. The
/// union is re-projected through an outer subquery ordered by the group-by
/// columns under the BigQuery null-collation sentinel, since `UNION ALL`
/// gives no guarantee about which grouping set's rows come first and
/// BigQuery's own ROLLUP output is grouping-set-ordered.
fn transform_rollup(
    coord: &Coordinator,
    data: &AggregateScanData,
    input: FromItem,
    ctx: &mut FragmentContext,
    alias: &str,
) -> Result<FromItem> {
    let mut operands = Vec::with_capacity(data.grouping_sets.len());
    for set in &data.grouping_sets {
        let mut select_list = Vec::with_capacity(data.group_by.len() + data.aggregates.len());
        let mut group_by = Vec::new();
        for c in &data.group_by {
            let item_alias = id_alias(&c.name, c.id);
            let raw = if set.contains(&c.id) {
                coord.transform_expression(&c.expr, ctx)?
            } else {
                SqlExpression::Literal("NULL".to_string())
            };
            let wrapped = group_by_sentinel(raw);
            if set.contains(&c.id) {
                group_by.push(wrapped.clone());
            }
            select_list.push(SelectItem::Expr { expr: wrapped, alias: item_alias });
        }
        for c in &data.aggregates {
            select_list.push(SelectItem::Expr {
                expr: coord.transform_expression(&c.expr, ctx)?,
                alias: id_alias(&c.name, c.id),
            });
        }
        operands.push(SelectStatement::simple(PlainSelect {
            select_list,
            from: Some(input.clone()),
            where_clause: None,
            group_by,
            having: None,
        }));
    }

    let union_alias = format!("{alias}_rollup");
    let union_select = SelectStatement {
        with: None,
        body: SelectBody::SetOp(SetOperation {
            kind: SqlSetOpKind::Union,
            modifier: SqlSetOpModifier::All,
            operands,
        }),
        order_by: vec![],
        limit: None,
        offset: None,
    };
    let union_from = subquery(union_select, &union_alias);

    let order_by = data
        .group_by
        .iter()
        .map(|c| OrderByItem {
            expr: SqlExpression::Column {
                table_alias: Some(union_alias.clone()),
                name: id_alias(&c.name, c.id),
            },
            desc: false,
            nulls_first: false,
            collate: Some(GROUP_BY_COLLATION.to_string()),
        })
        .collect();

    let outer = SelectStatement {
        with: None,
        body: SelectBody::Select(PlainSelect {
            select_list: vec![SelectItem::Star],
            from: Some(union_from),
            where_clause: None,
            group_by: vec![],
            having: None,
        }),
        order_by,
        limit: None,
        offset: None,
    };
    Ok(subquery(outer, alias))
}

fn transform_order_by(coord: &Coordinator, data: &OrderByScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    let input = coord.transform_scan(&data.input, ctx).context("order by scan input")?;
    let order_by = order_keys(coord, &data.keys, ctx)?;
    let select = SelectStatement {
        with: None,
        body: SelectBody::Select(PlainSelect {
            select_list: vec![SelectItem::Star],
            from: Some(input),
            where_clause: None,
            group_by: vec![],
            having: None,
        }),
        order_by,
        limit: None,
        offset: None,
    };
    let _ = &data.columns;
    Ok(subquery(select, alias))
}

fn order_keys(coord: &Coordinator, keys: &[OrderKey], ctx: &mut FragmentContext) -> Result<Vec<OrderByItem>> {
    keys.iter()
        .map(|k| -> Result<OrderByItem> {
            Ok(OrderByItem {
                expr: coord.transform_expression(&k.expr, ctx)?,
                desc: matches!(k.direction, SortDirection::Desc),
                nulls_first: k.nulls_first,
                collate: Some(GROUP_BY_COLLATION.to_string()),
            })
        })
        .collect()
}

fn transform_limit(coord: &Coordinator, data: &LimitScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    let input = coord.transform_scan(&data.input, ctx).context("limit scan input")?;
    let limit = coord.transform_expression(&data.count, ctx).context("limit scan count")?;
    let offset = data
        .offset
        .as_ref()
        .map(|o| coord.transform_expression(o, ctx))
        .transpose()
        .context("limit scan offset")?;
    let select = SelectStatement {
        with: None,
        body: SelectBody::Select(PlainSelect {
            select_list: vec![SelectItem::Star],
            from: Some(input),
            where_clause: None,
            group_by: vec![],
            having: None,
        }),
        order_by: vec![],
        limit: Some(limit),
        offset,
    };
    let _ = &data.columns;
    Ok(subquery(select, alias))
}

fn transform_set_op(coord: &Coordinator, data: &SetOpScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    let operands = data
        .inputs
        .iter()
        .map(|input_scan| -> Result<SelectStatement> {
            let from_item = coord.transform_scan(input_scan, ctx)?;
            Ok(wrap_as_select(from_item))
        })
        .collect::<Result<_>>()
        .context("set operation operand")?;

    let select = SelectStatement {
        with: None,
        body: SelectBody::SetOp(SetOperation {
            kind: set_op_kind(data.op),
            modifier: set_op_modifier(data.modifier),
            operands,
        }),
        order_by: vec![],
        limit: None,
        offset: None,
    };
    Ok(subquery(select, alias))
}

/// `spec.md §4.8`'s WITH scan: registers each entry's output columns under
/// a fresh alias before transforming the body, then prepends the entries as
/// a `WITH` clause on the body's own select (mirroring `spec.md §6.4`'s
/// recursive-CTE handling for the non-recursive case too).
fn transform_with(coord: &Coordinator, data: &WithScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    let mut entries = Vec::with_capacity(data.entries.len());
    for entry_data in &data.entries {
        entries.push(coord.transform_with_entry(entry_data, ctx).context("with entry")?);
    }

    let input_from = coord.transform_scan(&data.input, ctx).context("with scan body")?;
    let mut select = wrap_as_select(input_from);
    select.with = Some(crate::sql::WithClause { entries });
    Ok(subquery(select, alias))
}

/// `spec.md §4.8`'s WithRef scan: projects each output column through the
/// recorded mapping rather than exposing the CTE's raw column names, since
/// each reference to the same CTE carries its own fresh column ids.
fn transform_with_ref(_coord: &Coordinator, data: &WithRefScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    let mapping = ctx.with_entry_mapping(&data.name)?.to_vec();
    let ref_alias = format!("{alias}_ref");
    let select_list = data
        .columns
        .iter()
        .zip(mapping.iter())
        .map(|(c, mapped_alias)| SelectItem::Expr {
            expr: SqlExpression::Column {
                table_alias: Some(ref_alias.clone()),
                name: mapped_alias.clone(),
            },
            alias: id_alias(&c.name, c.id),
        })
        .collect();
    let inner = FromItem::WithRef {
        name: data.name.clone(),
        alias: ref_alias,
    };
    let select = SelectStatement::simple(PlainSelect {
        select_list,
        from: Some(inner),
        where_clause: None,
        group_by: vec![],
        having: None,
    });
    Ok(subquery(select, alias))
}

/// Transforms a CTE definition into a `sql::WithEntry`. Records the column
/// mapping under the CTE's name (`spec.md §3.4`) so later `WithRef`/
/// `RecursiveRef` scans know which raw column maps to which output id.
pub fn transform_with_entry(coord: &Coordinator, data: &WithEntryScanData, ctx: &mut FragmentContext) -> Result<WithEntry> {
    let column_aliases: Vec<String> = data.columns.iter().map(|c| id_alias(&c.name, c.id)).collect();
    ctx.record_with_entry_mapping(data.name.clone(), column_aliases.clone());

    let previous_recursive_name = ctx.recursive_cte_name().map(str::to_string);
    if data.recursive {
        ctx.set_recursive_cte_name(Some(data.name.clone()));
    }
    let query = match data.query.as_ref() {
        ScanData::Recursive(recursive_data) => transform_recursive_body(coord, recursive_data, ctx)?,
        other => {
            let from_item = coord.transform_scan(other, ctx).context("with entry body")?;
            wrap_as_select(from_item)
        }
    };
    ctx.set_recursive_cte_name(previous_recursive_name);

    Ok(WithEntry {
        name: data.name.clone(),
        column_aliases,
        query: Box::new(query),
        recursive: data.recursive,
        // SQLite won't run a recursive CTE unless it's materialized
        // (`spec.md §8` scenario 3); non-recursive entries don't need it.
        materialized: data.recursive,
    })
}

/// `spec.md §6.4`'s recursive CTE lowering: `non_recursive UNION [ALL]
/// recursive`, with the recursive term flattened so its `RecursiveRef`
/// appears at the top level of its own `FROM` clause.
fn transform_recursive(coord: &Coordinator, data: &RecursiveScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    let select = transform_recursive_body(coord, data, ctx)?;
    Ok(subquery(select, alias))
}

fn transform_recursive_body(coord: &Coordinator, data: &RecursiveScanData, ctx: &mut FragmentContext) -> Result<SelectStatement> {
    let non_recursive_from = coord.transform_scan(&data.non_recursive, ctx).context("recursive scan (base term)")?;
    let recursive_from = coord.transform_scan(&data.recursive, ctx).context("recursive scan (step term)")?;
    let _ = &data.columns;
    let _ = &data.name;

    Ok(SelectStatement {
        with: None,
        body: SelectBody::SetOp(SetOperation {
            kind: SqlSetOpKind::Union,
            modifier: set_op_modifier(data.op),
            operands: vec![wrap_as_select(non_recursive_from), wrap_as_select(recursive_from)],
        }),
        order_by: vec![],
        limit: None,
        offset: None,
    })
}

/// The recursive self-reference (`spec.md §6.4`): emitted directly as a
/// `FromItem::WithRef` under the `rrs_<id>`-style alias the caller minted,
/// with no enclosing subquery — its columns reuse the defining CTE's own
/// ids, so no re-projection is needed either.
fn transform_recursive_ref(data: &RecursiveRefScanData, alias: &str) -> Result<FromItem> {
    let _ = &data.columns;
    Ok(FromItem::WithRef {
        name: data.name.clone(),
        alias: alias.to_string(),
    })
}

/// `spec.md §6.5`'s `UNNEST`: a `json_each` table function call over the
/// encoded array, inner-aliased with a `$array_`-prefixed id distinct from
/// the scan's own outer alias, joined (or left-joined, for `is_outer`)
/// against the input scan when present.
fn transform_array(coord: &Coordinator, data: &ArrayScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    let array_expr = coord.transform_expression(&data.array_expr, ctx).context("array scan expression")?;
    let inner_id = ctx.next_id();
    let inner_alias = format!("$array_{inner_id}");
    let table_function = FromItem::TableFunction {
        name: "json_each".to_string(),
        args: vec![SqlExpression::FunctionCall(crate::sql::FunctionCall {
            name: "zetasqlite_decode_array".to_string(),
            args: vec![array_expr],
            distinct: false,
            window: None,
        })],
        alias: inner_alias.clone(),
    };

    let element_alias = data
        .columns
        .iter()
        .find(|c| c.id == data.element_column_id)
        .map(|c| id_alias(&c.name, c.id))
        .unwrap_or_else(|| id_alias("value", data.element_column_id));
    let mut select_list = vec![SelectItem::Expr {
        expr: SqlExpression::FunctionCall(crate::sql::FunctionCall {
            name: "zetasqlite_decode_json_value".to_string(),
            args: vec![SqlExpression::Column {
                table_alias: Some(inner_alias.clone()),
                name: "value".to_string(),
            }],
            distinct: false,
            window: None,
        }),
        alias: element_alias,
    }];
    if let Some(offset_id) = data.offset_column_id {
        let offset_alias = data
            .columns
            .iter()
            .find(|c| c.id == offset_id)
            .map(|c| id_alias(&c.name, c.id))
            .unwrap_or_else(|| id_alias("offset", offset_id));
        select_list.push(SelectItem::Expr {
            expr: SqlExpression::Column {
                table_alias: Some(inner_alias.clone()),
                name: "key".to_string(),
            },
            alias: offset_alias,
        });
    }

    let from_item = match &data.input {
        None => table_function,
        Some(input_scan) => {
            let input_from = coord.transform_scan(input_scan, ctx).context("array scan input")?;
            let condition = data
                .join_expr
                .as_ref()
                .map(|e| coord.transform_expression(e, ctx))
                .transpose()
                .context("array scan join condition")?;
            for c in input_scan.columns() {
                select_list.push(SelectItem::Expr {
                    expr: crate::expr::column_reference(ctx, c.id)?,
                    alias: id_alias(&c.name, c.id),
                });
            }
            FromItem::Join(Box::new(JoinClause {
                left: input_from,
                right: table_function,
                kind: if data.is_outer { SqlJoinKind::Left } else { SqlJoinKind::Cross },
                condition,
                using: vec![],
            }))
        }
    };

    let select = SelectStatement::simple(PlainSelect {
        select_list,
        from: Some(from_item),
        where_clause: None,
        group_by: vec![],
        having: None,
    });
    Ok(subquery(select, alias))
}

fn transform_analytic(coord: &Coordinator, data: &AnalyticScanData, ctx: &mut FragmentContext, alias: &str) -> Result<FromItem> {
    let input = coord.transform_scan(&data.input, ctx).context("analytic scan input")?;
    let mut select_list = Vec::with_capacity(data.input.columns().len() + data.functions.len());
    for c in data.input.columns() {
        select_list.push(SelectItem::Expr {
            expr: crate::expr::column_reference(ctx, c.id)?,
            alias: id_alias(&c.name, c.id),
        });
    }
    for c in &data.functions {
        select_list.push(SelectItem::Expr {
            expr: coord.transform_expression(&c.expr, ctx)?,
            alias: id_alias(&c.name, c.id),
        });
    }
    let select = SelectStatement::simple(PlainSelect {
        select_list,
        from: Some(input),
        where_clause: None,
        group_by: vec![],
        having: None,
    });
    Ok(subquery(select, alias))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ColumnInfo;

    #[test]
    fn wrap_as_select_produces_star_over_from_item() {
        let select = wrap_as_select(FromItem::SingleRow);
        match select.body {
            SelectBody::Select(plain) => {
                assert!(matches!(plain.select_list.as_slice(), [SelectItem::Star]));
                assert!(matches!(plain.from, Some(FromItem::SingleRow)));
            }
            _ => panic!("expected a plain select"),
        }
    }

    #[test]
    fn table_scan_aliases_columns_by_id() {
        let data = TableScanData {
            columns: vec![ColumnInfo { id: 5, name: "x".into() }],
            table_name: "orders".into(),
            column_source_names: vec!["x".into()],
        };
        let from_item = transform_table(&data, "table_scan_1").unwrap();
        let FromItem::Subquery { query, alias } = from_item else {
            panic!("expected a subquery");
        };
        assert_eq!(alias, "table_scan_1");
        let SelectBody::Select(plain) = query.body else {
            panic!("expected a plain select");
        };
        match &plain.select_list[0] {
            SelectItem::Expr { alias, .. } => assert_eq!(alias, "x#5"),
            _ => panic!("expected an aliased expression"),
        }
    }

    #[test]
    fn recursive_ref_scan_is_not_wrapped_in_a_subquery() {
        let data = RecursiveRefScanData {
            columns: vec![ColumnInfo { id: 1, name: "n".into() }],
            name: "r".into(),
        };
        let from_item = transform_recursive_ref(&data, "rrs_1").unwrap();
        assert!(matches!(from_item, FromItem::WithRef { name, alias } if name == "r" && alias == "rrs_1"));
    }

    #[test]
    fn single_row_scan_is_the_bare_placeholder() {
        let mut ctx = FragmentContext::new();
        let data = ScanData::SingleRow(SingleRowScanData { columns: vec![] });
        let from_item = transform(crate::coordinator::global(), &data, &mut ctx, "single_row_scan_1").unwrap();
        assert!(matches!(from_item, FromItem::SingleRow));
    }
}
