//! Walks the opaque resolved-plan tree once (`spec.md §4.5`). This module is
//! the **only** code in the crate allowed to read `raw::RawNode`; everything
//! downstream consumes `plan::{StatementData, ScanData, ExpressionData}`.

use zetasqlite_value::{HostScalar, Value};

use crate::error::{Error, Result};
use crate::plan::*;
use crate::raw::RawNode;

fn extraction_err(node: &RawNode, message: impl Into<String>) -> Error {
    Error::Extraction {
        shape: node.kind.clone(),
        message: message.into(),
    }
}

fn extract_column_list(node: &RawNode) -> Result<ColumnList> {
    node.node_list_field("columns")?
        .into_iter()
        .map(|c| {
            Ok(ColumnInfo {
                id: c.int_field("id")?,
                name: c.str_field("name")?,
            })
        })
        .collect()
}

fn extract_name_path(node: &RawNode, field: &str) -> Result<Vec<String>> {
    let raw = node
        .raw_field(field)
        .ok_or_else(|| extraction_err(node, format!("missing field '{field}'")))?;
    let parts: Vec<String> = serde_json::from_value(raw.clone())
        .map_err(|e| extraction_err(node, format!("field '{field}' is not a name path: {e}")))?;
    Ok(parts)
}

pub fn extract_literal(node: &RawNode) -> Result<Value> {
    if let Some(encoded) = node.opt_str_field("encoded") {
        return zetasqlite_value::value_of(&HostScalar::Text(encoded))?
            .ok_or_else(|| extraction_err(node, "literal decoded to NULL, expected a value"));
    }
    if let Some(v) = node.opt_int_field("int") {
        return Ok(Value::Int(v));
    }
    if let Some(v) = node.fields.get("float").and_then(|j| j.as_f64()) {
        return Ok(Value::Float(v));
    }
    if let Some(v) = node.fields.get("bool").and_then(|j| j.as_bool()) {
        return Ok(Value::Bool(v));
    }
    if let Some(v) = node.opt_str_field("string") {
        return Ok(Value::String(v));
    }
    Err(extraction_err(node, "literal carries no recognized value field"))
}

pub fn extract_expression(node: &RawNode) -> Result<ExpressionData> {
    match node.kind.as_str() {
        "Literal" => Ok(ExpressionData::Literal(extract_literal(node)?)),
        "Parameter" => Ok(ExpressionData::Parameter {
            name: node.str_field("name")?,
        }),
        "ColumnRef" => Ok(ExpressionData::Column {
            id: node.int_field("id")?,
        }),
        "Cast" => Ok(ExpressionData::Cast {
            expr: Box::new(extract_expression(&node.node_field("expr")?)?),
            type_tag: node.str_field("type")?,
            safe: node.bool_field("safe"),
        }),
        "FunctionCall" => Ok(ExpressionData::Function {
            name: node.str_field("name")?,
            args: node
                .node_list_field("args")?
                .iter()
                .map(extract_expression)
                .collect::<Result<_>>()?,
            distinct: node.bool_field("distinct"),
            window: node.opt_node_field("window")?.map(|w| extract_window(&w)).transpose()?,
        }),
        "Binary" => Ok(ExpressionData::Binary {
            op: node.str_field("op")?,
            left: Box::new(extract_expression(&node.node_field("left")?)?),
            right: Box::new(extract_expression(&node.node_field("right")?)?),
        }),
        "Case" => {
            let operand = node
                .opt_node_field("operand")?
                .map(|n| extract_expression(&n))
                .transpose()?
                .map(Box::new);
            let whens = node
                .node_list_field("whens")?
                .iter()
                .map(|w| -> Result<(ExpressionData, ExpressionData)> {
                    Ok((
                        extract_expression(&w.node_field("when")?)?,
                        extract_expression(&w.node_field("then")?)?,
                    ))
                })
                .collect::<Result<_>>()?;
            let else_result = node
                .opt_node_field("else")?
                .map(|n| extract_expression(&n))
                .transpose()?
                .map(Box::new);
            Ok(ExpressionData::Case {
                operand,
                whens,
                else_result,
            })
        }
        "SubqueryExpr" => {
            let kind = match node.str_field("subquery_kind")?.as_str() {
                "scalar" => SubqueryKind::Scalar,
                "array" => SubqueryKind::Array,
                "exists" => SubqueryKind::Exists,
                "in" => SubqueryKind::In,
                other => return Err(extraction_err(node, format!("unknown subquery kind '{other}'"))),
            };
            let scan = Box::new(extract_scan(&node.node_field("scan")?)?);
            let in_expr = node
                .opt_node_field("in_expr")?
                .map(|n| extract_expression(&n))
                .transpose()?
                .map(Box::new);
            Ok(ExpressionData::Subquery { kind, scan, in_expr })
        }
        other => Err(extraction_err(node, format!("unsupported expression kind '{other}'"))),
    }
}

fn extract_order_keys(node: &RawNode, field: &str) -> Result<Vec<OrderKey>> {
    node.node_list_field(field)?
        .iter()
        .map(|k| {
            Ok(OrderKey {
                expr: extract_expression(&k.node_field("expr")?)?,
                direction: if k.str_field("direction").unwrap_or_else(|_| "asc".into()) == "desc" {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                },
                nulls_first: k.bool_field("nulls_first"),
            })
        })
        .collect()
}

fn extract_window(node: &RawNode) -> Result<WindowSpec> {
    let partition_by = node
        .node_list_field("partition_by")?
        .iter()
        .map(extract_expression)
        .collect::<Result<_>>()?;
    let order_by = extract_order_keys(node, "order_by")?;
    let frame = node
        .opt_node_field("frame")?
        .map(|f| -> Result<WindowFrame> {
            Ok(WindowFrame {
                unit: match f.str_field("unit")?.as_str() {
                    "rows" => FrameUnit::Rows,
                    "range" => FrameUnit::Range,
                    "groups" => FrameUnit::Groups,
                    other => return Err(extraction_err(&f, format!("unknown frame unit '{other}'"))),
                },
                start: extract_bound(&f, "start")?,
                end: extract_bound(&f, "end")?,
            })
        })
        .transpose()?;
    Ok(WindowSpec {
        partition_by,
        order_by,
        frame,
    })
}

fn extract_bound(node: &RawNode, field: &str) -> Result<FrameBound> {
    let bound = node.node_field(field)?;
    Ok(match bound.str_field("kind")?.as_str() {
        "unbounded_preceding" => FrameBound::UnboundedPreceding,
        "preceding" => FrameBound::Preceding(bound.int_field("n")?),
        "current_row" => FrameBound::CurrentRow,
        "following" => FrameBound::Following(bound.int_field("n")?),
        "unbounded_following" => FrameBound::UnboundedFollowing,
        other => return Err(extraction_err(&bound, format!("unknown frame bound '{other}'"))),
    })
}

fn extract_computed_columns(node: &RawNode, field: &str) -> Result<Vec<ComputedColumn>> {
    node.node_list_field(field)?
        .iter()
        .map(|c| {
            Ok(ComputedColumn {
                id: c.int_field("id")?,
                name: c.str_field("name")?,
                expr: extract_expression(&c.node_field("expr")?)?,
            })
        })
        .collect()
}

pub fn extract_scan(node: &RawNode) -> Result<ScanData> {
    match node.kind.as_str() {
        "TableScan" => Ok(ScanData::Table(TableScanData {
            columns: extract_column_list(node)?,
            table_name: node.str_field("table")?,
            column_source_names: node
                .node_list_field("columns")?
                .iter()
                .map(|c| c.opt_str_field("source_name").unwrap_or_else(|| c.str_field("name").unwrap_or_default()))
                .collect(),
        })),
        "JoinScan" => Ok(ScanData::Join(JoinScanData {
            columns: extract_column_list(node)?,
            kind: match node.str_field("join_kind")?.as_str() {
                "inner" => JoinKind::Inner,
                "left" => JoinKind::Left,
                "right" => JoinKind::Right,
                "full_outer" => JoinKind::FullOuter,
                "cross" => JoinKind::Cross,
                other => return Err(extraction_err(node, format!("unknown join kind '{other}'"))),
            },
            left: Box::new(extract_scan(&node.node_field("left")?)?),
            right: Box::new(extract_scan(&node.node_field("right")?)?),
            condition: node
                .opt_node_field("condition")?
                .map(|n| extract_expression(&n))
                .transpose()?,
            using: node
                .raw_field("using")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
        })),
        "FilterScan" => Ok(ScanData::Filter(FilterScanData {
            columns: extract_column_list(node)?,
            input: Box::new(extract_scan(&node.node_field("input")?)?),
            condition: extract_expression(&node.node_field("condition")?)?,
        })),
        "ProjectScan" => Ok(ScanData::Project(ProjectScanData {
            columns: extract_column_list(node)?,
            input: Box::new(extract_scan(&node.node_field("input")?)?),
            expressions: extract_computed_columns(node, "expr_list")?,
        })),
        "AggregateScan" => {
            let grouping_sets = node
                .raw_field("grouping_sets")
                .and_then(|v| serde_json::from_value::<Vec<Vec<i64>>>(v.clone()).ok())
                .unwrap_or_default();
            Ok(ScanData::Aggregate(AggregateScanData {
                columns: extract_column_list(node)?,
                input: Box::new(extract_scan(&node.node_field("input")?)?),
                group_by: extract_computed_columns(node, "group_by")?,
                aggregates: extract_computed_columns(node, "aggregates")?,
                grouping_sets,
            }))
        }
        "OrderByScan" => Ok(ScanData::OrderBy(OrderByScanData {
            columns: extract_column_list(node)?,
            input: Box::new(extract_scan(&node.node_field("input")?)?),
            keys: extract_order_keys(node, "keys")?,
        })),
        "LimitOffsetScan" => Ok(ScanData::Limit(LimitScanData {
            columns: extract_column_list(node)?,
            input: Box::new(extract_scan(&node.node_field("input")?)?),
            count: extract_expression(&node.node_field("count")?)?,
            offset: node
                .opt_node_field("offset")?
                .map(|n| extract_expression(&n))
                .transpose()?,
        })),
        "SetOperationScan" => Ok(ScanData::SetOp(SetOpScanData {
            columns: extract_column_list(node)?,
            op: match node.str_field("op")?.as_str() {
                "union" => SetOpKind::Union,
                "intersect" => SetOpKind::Intersect,
                "except" => SetOpKind::Except,
                other => return Err(extraction_err(node, format!("unknown set op '{other}'"))),
            },
            modifier: if node.str_field("modifier")? == "distinct" {
                SetOpModifier::Distinct
            } else {
                SetOpModifier::All
            },
            inputs: node
                .node_list_field("inputs")?
                .iter()
                .map(extract_scan)
                .collect::<Result<_>>()?,
        })),
        "SingleRowScan" => Ok(ScanData::SingleRow(SingleRowScanData {
            columns: extract_column_list(node)?,
        })),
        "WithScan" => Ok(ScanData::With(WithScanData {
            columns: extract_column_list(node)?,
            entries: node
                .node_list_field("entries")?
                .iter()
                .map(|e| extract_with_entry(e))
                .collect::<Result<_>>()?,
            input: Box::new(extract_scan(&node.node_field("input")?)?),
        })),
        "WithRefScan" => Ok(ScanData::WithRef(WithRefScanData {
            columns: extract_column_list(node)?,
            name: node.str_field("name")?,
        })),
        "WithEntry" => Ok(ScanData::WithEntry(extract_with_entry(node)?)),
        "ArrayScan" => Ok(ScanData::Array(ArrayScanData {
            columns: extract_column_list(node)?,
            array_expr: extract_expression(&node.node_field("array_expr")?)?,
            element_column_id: node.int_field("element_column_id")?,
            offset_column_id: node.opt_int_field("offset_column_id"),
            input: node
                .opt_node_field("input")?
                .map(|n| extract_scan(&n))
                .transpose()?
                .map(Box::new),
            join_expr: node
                .opt_node_field("join_expr")?
                .map(|n| extract_expression(&n))
                .transpose()?,
            is_outer: node.bool_field("is_outer"),
        })),
        "AnalyticScan" => Ok(ScanData::Analytic(AnalyticScanData {
            columns: extract_column_list(node)?,
            input: Box::new(extract_scan(&node.node_field("input")?)?),
            functions: extract_computed_columns(node, "functions")?,
        })),
        "RecursiveScan" => Ok(ScanData::Recursive(RecursiveScanData {
            columns: extract_column_list(node)?,
            name: node.str_field("name")?,
            non_recursive: Box::new(extract_scan(&node.node_field("non_recursive")?)?),
            recursive: Box::new(extract_scan(&node.node_field("recursive")?)?),
            op: if node.str_field("op")? == "distinct" {
                SetOpModifier::Distinct
            } else {
                SetOpModifier::All
            },
        })),
        "RecursiveRefScan" => Ok(ScanData::RecursiveRef(RecursiveRefScanData {
            columns: extract_column_list(node)?,
            name: node.str_field("name")?,
        })),
        other => Err(extraction_err(node, format!("unsupported scan kind '{other}'"))),
    }
}

fn extract_with_entry(node: &RawNode) -> Result<WithEntryScanData> {
    Ok(WithEntryScanData {
        columns: extract_column_list(node)?,
        name: node.str_field("name")?,
        query: Box::new(extract_scan(&node.node_field("query")?)?),
        recursive: node.bool_field("recursive"),
    })
}

fn extract_update_assignments(node: &RawNode, field: &str) -> Result<Vec<UpdateAssignment>> {
    node.node_list_field(field)?
        .iter()
        .map(|a| {
            Ok(UpdateAssignment {
                target_column: a.str_field("target_column")?,
                value: extract_expression(&a.node_field("value")?)?,
            })
        })
        .collect()
}

pub fn extract_statement(node: &RawNode) -> Result<StatementData> {
    match node.kind.as_str() {
        "QueryStmt" => Ok(StatementData::Select(SelectStatementData {
            input: Box::new(extract_scan(&node.node_field("query")?)?),
            output: extract_computed_columns(node, "output_columns")?,
        })),
        "CreateTableStmt" | "CreateTableAsSelectStmt" => Ok(StatementData::CreateTable(CreateTableStatementData {
            name_path: extract_name_path(node, "name_path")?,
            columns: node
                .node_list_field("columns")?
                .iter()
                .map(|c| Ok((c.str_field("name")?, c.str_field("type")?)))
                .collect::<Result<_>>()?,
            or_replace: node.bool_field("or_replace"),
            if_not_exists: node.bool_field("if_not_exists"),
            is_temp: node.bool_field("is_temp"),
            as_select: node
                .opt_node_field("query")?
                .map(|n| extract_scan(&n))
                .transpose()?
                .map(Box::new),
        })),
        "CreateViewStmt" => Ok(StatementData::CreateView(CreateViewStatementData {
            name_path: extract_name_path(node, "name_path")?,
            or_replace: node.bool_field("or_replace"),
            query: Box::new(extract_scan(&node.node_field("query")?)?),
        })),
        "DropStmt" => Ok(StatementData::Drop(DropStatementData {
            object_type: match node.str_field("object_type")?.as_str() {
                "table" => DropObjectType::Table,
                "view" => DropObjectType::View,
                "function" => DropObjectType::Function,
                "index" => DropObjectType::Index,
                "schema" => DropObjectType::Schema,
                other => return Err(extraction_err(node, format!("unknown drop object type '{other}'"))),
            },
            name_path: extract_name_path(node, "name_path")?,
            if_exists: node.bool_field("if_exists"),
        })),
        "InsertStmt" => Ok(StatementData::Insert(InsertStatementData {
            target_name_path: extract_name_path(node, "target_name_path")?,
            columns: node
                .raw_field("columns")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
            input: Box::new(extract_scan(&node.node_field("input")?)?),
        })),
        "UpdateStmt" => Ok(StatementData::Update(UpdateStatementData {
            target_name_path: extract_name_path(node, "target_name_path")?,
            assignments: extract_update_assignments(node, "assignments")?,
            from: node
                .opt_node_field("from")?
                .map(|n| extract_scan(&n))
                .transpose()?
                .map(Box::new),
            condition: node
                .opt_node_field("condition")?
                .map(|n| extract_expression(&n))
                .transpose()?,
        })),
        "DeleteStmt" => Ok(StatementData::Delete(DeleteStatementData {
            target_name_path: extract_name_path(node, "target_name_path")?,
            condition: node
                .opt_node_field("condition")?
                .map(|n| extract_expression(&n))
                .transpose()?,
        })),
        "MergeStmt" => Ok(StatementData::Merge(MergeStatementData {
            target_name_path: extract_name_path(node, "target_name_path")?,
            source: Box::new(extract_scan(&node.node_field("source")?)?),
            source_key_column: node.str_field("source_key_column")?,
            target_key_column: node.str_field("target_key_column")?,
            whens: node
                .node_list_field("whens")?
                .iter()
                .map(extract_merge_when)
                .collect::<Result<_>>()?,
        })),
        other => Err(extraction_err(node, format!("unsupported statement kind '{other}'"))),
    }
}

fn extract_merge_when(node: &RawNode) -> Result<MergeWhenClause> {
    Ok(MergeWhenClause {
        action: match node.str_field("action")?.as_str() {
            "insert_not_matched" => MergeAction::InsertNotMatchedByTarget,
            "update_matched" => MergeAction::UpdateMatched,
            "delete_matched" => MergeAction::DeleteMatched,
            other => return Err(extraction_err(node, format!("unknown merge action '{other}'"))),
        },
        extra_condition: node
            .opt_node_field("extra_condition")?
            .map(|n| extract_expression(&n))
            .transpose()?,
        insert_columns: node
            .raw_field("insert_columns")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        insert_values: node
            .node_list_field("insert_values")?
            .iter()
            .map(extract_expression)
            .collect::<Result<_>>()?,
        update_assignments: extract_update_assignments(node, "update_assignments")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node_from(value: serde_json::Value) -> RawNode {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn extracts_int_literal() {
        let node = node_from(json!({"kind": "Literal", "int": 5}));
        let value = extract_literal(&node).unwrap();
        assert_eq!(value, Value::Int(5));
    }

    #[test]
    fn extracts_table_scan_with_columns() {
        let node = node_from(json!({
            "kind": "TableScan",
            "table": "t",
            "columns": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}],
        }));
        let scan = extract_scan(&node).unwrap();
        assert_eq!(scan.columns().len(), 2);
    }

    #[test]
    fn unsupported_scan_kind_is_an_extraction_error() {
        let node = node_from(json!({"kind": "SomethingUnknown"}));
        let err = extract_scan(&node).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }
}
