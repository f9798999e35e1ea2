//! Expression transformers (`spec.md §4.7`): one rule per `ExpressionData`
//! variant. Every transformer returns a `sql::SqlExpression`; none produce
//! raw text directly (`zetasqlite_cast`/`Raw` aside, which only ever wrap
//! already-serialized sub-expressions).

use zetasqlite_value::encode_literal;

use crate::context::{ColumnInfo, FragmentContext};
use crate::coordinator::Coordinator;
use crate::error::{Context, Error, Result};
use crate::plan::*;
use crate::plan::FrameUnit as FrameUnitPlan;
use crate::sql::{
    CaseExpression, ExistsExpression, FrameBound, FrameUnit, FunctionCall, OrderByItem,
    SqlExpression, WindowSpecification,
};

pub fn literal_sql(value: &zetasqlite_value::Value) -> Result<String> {
    let encoded = encode_literal(value)?;
    Ok(if encoded.quoted {
        format!("'{}'", encoded.text.replace('\'', "''"))
    } else {
        encoded.text
    })
}

fn sort_direction(dir: SortDirection) -> bool {
    matches!(dir, SortDirection::Desc)
}

/// Mirrors the binding layer's own sanitization (`zetasqlite-functions`'s
/// `bind::sql_name`): a bare function-call token can't contain a `.`, which
/// namespaced builtins like `NET.HOST` need folded into the identifier.
fn sql_function_name(name: &str) -> String {
    name.replace('.', "_").to_ascii_lowercase()
}

fn frame_bound(bound: &crate::plan::FrameBound) -> FrameBound {
    match bound {
        crate::plan::FrameBound::UnboundedPreceding => FrameBound::UnboundedPreceding,
        crate::plan::FrameBound::Preceding(n) => FrameBound::Preceding(*n),
        crate::plan::FrameBound::CurrentRow => FrameBound::CurrentRow,
        crate::plan::FrameBound::Following(n) => FrameBound::Following(*n),
        crate::plan::FrameBound::UnboundedFollowing => FrameBound::UnboundedFollowing,
    }
}

fn frame_unit(unit: FrameUnitPlan) -> FrameUnit {
    match unit {
        FrameUnitPlan::Rows => FrameUnit::Rows,
        FrameUnitPlan::Range => FrameUnit::Range,
        FrameUnitPlan::Groups => FrameUnit::Groups,
    }
}

fn transform_window(
    coord: &Coordinator,
    spec: &WindowSpec,
    ctx: &mut FragmentContext,
) -> Result<WindowSpecification> {
    let partition_by = spec
        .partition_by
        .iter()
        .map(|e| coord.transform_expression(e, ctx))
        .collect::<Result<_>>()?;
    let order_by = spec
        .order_by
        .iter()
        .map(|k| -> Result<OrderByItem> {
            Ok(OrderByItem {
                expr: coord.transform_expression(&k.expr, ctx)?,
                desc: sort_direction(k.direction),
                nulls_first: k.nulls_first,
                collate: Some("zetasqlite_collate".to_string()),
            })
        })
        .collect::<Result<_>>()?;
    let frame = spec
        .frame
        .as_ref()
        .map(|f| (frame_unit(f.unit), frame_bound(&f.start), frame_bound(&f.end)));
    Ok(WindowSpecification {
        partition_by,
        order_by,
        frame,
    })
}

pub fn transform(coord: &Coordinator, data: &ExpressionData, ctx: &mut FragmentContext) -> Result<SqlExpression> {
    match data {
        ExpressionData::Literal(value) => Ok(SqlExpression::Literal(literal_sql(value)?)),
        ExpressionData::Parameter { name } => Ok(SqlExpression::Parameter(name.clone())),
        ExpressionData::Column { id } => column_reference(ctx, *id),
        ExpressionData::Cast { expr, type_tag, safe } => {
            let inner = transform(coord, expr, ctx).context("cast expression")?;
            Ok(SqlExpression::FunctionCall(FunctionCall {
                name: "zetasqlite_cast".to_string(),
                args: vec![
                    inner,
                    SqlExpression::Literal(format!("'{type_tag}'")),
                    SqlExpression::Literal(if *safe { "TRUE".into() } else { "FALSE".into() }),
                ],
                distinct: false,
                window: None,
            }))
        }
        ExpressionData::Function { name, args, distinct, window } => {
            let mut translated_args: Vec<SqlExpression> = args
                .iter()
                .map(|a| transform(coord, a, ctx))
                .collect::<Result<_>>()
                .context(format!("function call '{name}'"))?;
            // RANK/DENSE_RANK have no arguments of their own in BigQuery;
            // the binding layer's aggregators need the window's ORDER BY
            // key to detect ties, so it is smuggled in as trailing args the
            // same way CAST and DISTINCT/IGNORE_NULLS pass extra state.
            if let Some(w) = window {
                if matches!(name.to_ascii_uppercase().as_str(), "RANK" | "DENSE_RANK") {
                    for key in &w.order_by {
                        translated_args.push(transform(coord, &key.expr, ctx).context("rank order key")?);
                    }
                }
            }
            let window_spec = window
                .as_ref()
                .map(|w| transform_window(coord, w, ctx))
                .transpose()?;
            let prefix = if window_spec.is_some() { "zetasqlite_window_" } else { "zetasqlite_" };
            Ok(SqlExpression::FunctionCall(FunctionCall {
                name: format!("{prefix}{}", sql_function_name(name)),
                args: translated_args,
                distinct: *distinct,
                window: window_spec,
            }))
        }
        ExpressionData::Binary { op, left, right } => {
            let l = transform(coord, left, ctx)?;
            let r = transform(coord, right, ctx)?;
            Ok(SqlExpression::FunctionCall(FunctionCall {
                name: format!("zetasqlite_{}", sql_function_name(op)),
                args: vec![l, r],
                distinct: false,
                window: None,
            }))
        }
        ExpressionData::Case { operand, whens, else_result } => {
            let operand = operand
                .as_ref()
                .map(|o| transform(coord, o, ctx))
                .transpose()?
                .map(Box::new);
            let whens = whens
                .iter()
                .map(|(w, t)| -> Result<(SqlExpression, SqlExpression)> {
                    Ok((transform(coord, w, ctx)?, transform(coord, t, ctx)?))
                })
                .collect::<Result<_>>()?;
            let else_result = else_result
                .as_ref()
                .map(|e| transform(coord, e, ctx))
                .transpose()?
                .map(Box::new);
            Ok(SqlExpression::Case(CaseExpression { operand, whens, else_result }))
        }
        ExpressionData::Subquery { kind, scan, in_expr } => {
            let token = ctx.enter_scope();
            let first_column_id = scan.columns().first().map(|c| c.id);
            let from_item = coord.transform_scan(scan, ctx).context("subquery")?;

            let result = match kind {
                SubqueryKind::Scalar => {
                    let select = crate::scan::wrap_as_select(from_item);
                    Ok(SqlExpression::ScalarSubquery(Box::new(select)))
                }
                SubqueryKind::Array => {
                    let id = first_column_id.ok_or_else(|| Error::Extraction {
                        shape: "SubqueryExpr".to_string(),
                        message: "ARRAY subquery has no columns".to_string(),
                    })?;
                    let column_expr = column_reference(ctx, id)?;
                    let select = crate::scan::wrap_as_single_expr_select(
                        from_item,
                        SqlExpression::FunctionCall(FunctionCall {
                            name: "zetasqlite_array".to_string(),
                            args: vec![column_expr],
                            distinct: false,
                            window: None,
                        }),
                        "value",
                    );
                    Ok(SqlExpression::ScalarSubquery(Box::new(select)))
                }
                SubqueryKind::Exists => {
                    let select = crate::scan::wrap_as_select(from_item);
                    Ok(SqlExpression::Exists(ExistsExpression {
                        subquery: Box::new(select),
                        negated: false,
                    }))
                }
                SubqueryKind::In => {
                    let select = crate::scan::wrap_as_select(from_item);
                    let outer = in_expr.as_ref().ok_or_else(|| Error::Extraction {
                        shape: "SubqueryExpr".to_string(),
                        message: "IN subquery missing left-hand expression".to_string(),
                    })?;
                    let outer = transform(coord, outer, ctx)?;
                    Ok(SqlExpression::InSubquery {
                        expr: Box::new(outer),
                        negated: false,
                        subquery: Box::new(select),
                    })
                }
            };
            ctx.exit_scope(token);
            result
        }
    }
}

pub(crate) fn column_reference(ctx: &FragmentContext, id: i64) -> Result<SqlExpression> {
    let info = ctx.column_info(id)?.clone();
    let table_alias = ctx.table_alias(id)?.to_string();
    Ok(SqlExpression::Column {
        table_alias: Some(table_alias),
        name: info_alias(&info, id),
    })
}

fn info_alias(info: &ColumnInfo, id: i64) -> String {
    format!("{}#{id}", info.name)
}

pub fn id_alias(name: &str, id: i64) -> String {
    format!("{name}#{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ColumnInfo as CtxColumnInfo;
    use crate::coordinator::global;
    use zetasqlite_value::Value;

    #[test]
    fn literal_sql_quotes_strings_but_not_ints() {
        assert_eq!(literal_sql(&Value::Int(3)).unwrap(), "3");
        assert_eq!(literal_sql(&Value::String("a'b".into())).unwrap(), "'a''b'");
    }

    #[test]
    fn binary_expression_lowercases_op_into_function_name() {
        let mut ctx = FragmentContext::new();
        let data = ExpressionData::Binary {
            op: "GT".to_string(),
            left: Box::new(ExpressionData::Literal(Value::Int(1))),
            right: Box::new(ExpressionData::Literal(Value::Int(2))),
        };
        let result = transform(global(), &data, &mut ctx).unwrap();
        let SqlExpression::FunctionCall(call) = result else {
            panic!("expected a function call");
        };
        assert_eq!(call.name, "zetasqlite_gt");
        assert_eq!(call.args.len(), 2);
    }

    #[test]
    fn column_reference_uses_id_alias_and_registered_table_alias() {
        let mut ctx = FragmentContext::new();
        ctx.register_column(1, CtxColumnInfo { name: "a".into(), expression: None }, "table_scan_1");
        let expr = column_reference(&ctx, 1).unwrap();
        let SqlExpression::Column { table_alias, name } = expr else {
            panic!("expected a column reference");
        };
        assert_eq!(table_alias.as_deref(), Some("table_scan_1"));
        assert_eq!(name, "a#1");
    }

    #[test]
    fn column_reference_fails_for_unregistered_id() {
        let ctx = FragmentContext::new();
        assert!(column_reference(&ctx, 99).is_err());
    }

    #[test]
    fn cast_wraps_inner_expression_with_type_tag_and_safe_flag() {
        let mut ctx = FragmentContext::new();
        let data = ExpressionData::Cast {
            expr: Box::new(ExpressionData::Literal(Value::Int(1))),
            type_tag: "INT64".to_string(),
            safe: true,
        };
        let result = transform(global(), &data, &mut ctx).unwrap();
        let SqlExpression::FunctionCall(call) = result else {
            panic!("expected a function call");
        };
        assert_eq!(call.name, "zetasqlite_cast");
        let SqlExpression::Literal(type_tag) = &call.args[1] else {
            panic!("expected a literal type tag");
        };
        assert_eq!(type_tag, "'INT64'");
        let SqlExpression::Literal(safe_flag) = &call.args[2] else {
            panic!("expected a literal safe flag");
        };
        assert_eq!(safe_flag, "TRUE");
    }
}
