//! Language-neutral tagged data structures produced by `extract` (`spec.md
//! §4.5`). Every transformer downstream of extraction consumes only these
//! types, never `raw::RawNode`.

use zetasqlite_value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub id: i64,
    pub name: String,
}

pub type ColumnList = Vec<ColumnInfo>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    FullOuter,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOpKind {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOpModifier {
    All,
    Distinct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryKind {
    Scalar,
    Array,
    Exists,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct OrderKey {
    pub expr: ExpressionData,
    pub direction: SortDirection,
    pub nulls_first: bool,
}

#[derive(Debug, Clone)]
pub struct WindowSpec {
    pub partition_by: Vec<ExpressionData>,
    pub order_by: Vec<OrderKey>,
    pub frame: Option<WindowFrame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUnit {
    Rows,
    Range,
    Groups,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(i64),
    CurrentRow,
    Following(i64),
    UnboundedFollowing,
}

#[derive(Debug, Clone)]
pub struct WindowFrame {
    pub unit: FrameUnit,
    pub start: FrameBound,
    pub end: FrameBound,
}

/// A computed output column: an id, its expression, and the user-facing
/// alias (`spec.md §4.9`'s Select transformer projects these).
#[derive(Debug, Clone)]
pub struct ComputedColumn {
    pub id: i64,
    pub name: String,
    pub expr: ExpressionData,
}

#[derive(Debug, Clone)]
pub enum ExpressionData {
    Literal(Value),
    Parameter {
        name: String,
    },
    Column {
        id: i64,
    },
    Cast {
        expr: Box<ExpressionData>,
        type_tag: String,
        safe: bool,
    },
    Function {
        name: String,
        args: Vec<ExpressionData>,
        distinct: bool,
        window: Option<WindowSpec>,
    },
    Binary {
        op: String,
        left: Box<ExpressionData>,
        right: Box<ExpressionData>,
    },
    Case {
        operand: Option<Box<ExpressionData>>,
        whens: Vec<(ExpressionData, ExpressionData)>,
        else_result: Option<Box<ExpressionData>>,
    },
    Subquery {
        kind: SubqueryKind,
        scan: Box<ScanData>,
        in_expr: Option<Box<ExpressionData>>,
    },
}

#[derive(Debug, Clone)]
pub struct TableScanData {
    pub columns: ColumnList,
    pub table_name: String,
    pub column_source_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct JoinScanData {
    pub columns: ColumnList,
    pub kind: JoinKind,
    pub left: Box<ScanData>,
    pub right: Box<ScanData>,
    pub condition: Option<ExpressionData>,
    pub using: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FilterScanData {
    pub columns: ColumnList,
    pub input: Box<ScanData>,
    pub condition: ExpressionData,
}

#[derive(Debug, Clone)]
pub struct ProjectScanData {
    pub columns: ColumnList,
    pub input: Box<ScanData>,
    pub expressions: Vec<ComputedColumn>,
}

#[derive(Debug, Clone)]
pub struct AggregateScanData {
    pub columns: ColumnList,
    pub input: Box<ScanData>,
    pub group_by: Vec<ComputedColumn>,
    pub aggregates: Vec<ComputedColumn>,
    /// Each inner vec names the `group_by` column ids present in that
    /// grouping set; more than one entry means ROLLUP/CUBE/GROUPING SETS.
    pub grouping_sets: Vec<Vec<i64>>,
}

#[derive(Debug, Clone)]
pub struct OrderByScanData {
    pub columns: ColumnList,
    pub input: Box<ScanData>,
    pub keys: Vec<OrderKey>,
}

#[derive(Debug, Clone)]
pub struct LimitScanData {
    pub columns: ColumnList,
    pub input: Box<ScanData>,
    pub count: ExpressionData,
    pub offset: Option<ExpressionData>,
}

#[derive(Debug, Clone)]
pub struct SetOpScanData {
    pub columns: ColumnList,
    pub op: SetOpKind,
    pub modifier: SetOpModifier,
    pub inputs: Vec<ScanData>,
}

#[derive(Debug, Clone)]
pub struct SingleRowScanData {
    pub columns: ColumnList,
}

#[derive(Debug, Clone)]
pub struct WithEntryScanData {
    pub columns: ColumnList,
    pub name: String,
    pub query: Box<ScanData>,
    pub recursive: bool,
}

#[derive(Debug, Clone)]
pub struct WithScanData {
    pub columns: ColumnList,
    pub entries: Vec<WithEntryScanData>,
    pub input: Box<ScanData>,
}

#[derive(Debug, Clone)]
pub struct WithRefScanData {
    pub columns: ColumnList,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ArrayScanData {
    pub columns: ColumnList,
    pub array_expr: ExpressionData,
    pub element_column_id: i64,
    pub offset_column_id: Option<i64>,
    pub input: Option<Box<ScanData>>,
    pub join_expr: Option<ExpressionData>,
    pub is_outer: bool,
}

#[derive(Debug, Clone)]
pub struct AnalyticScanData {
    pub columns: ColumnList,
    pub input: Box<ScanData>,
    pub functions: Vec<ComputedColumn>,
}

#[derive(Debug, Clone)]
pub struct RecursiveScanData {
    pub columns: ColumnList,
    pub name: String,
    pub non_recursive: Box<ScanData>,
    pub recursive: Box<ScanData>,
    pub op: SetOpModifier,
}

#[derive(Debug, Clone)]
pub struct RecursiveRefScanData {
    pub columns: ColumnList,
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum ScanData {
    Table(TableScanData),
    Join(JoinScanData),
    Filter(FilterScanData),
    Project(ProjectScanData),
    Aggregate(AggregateScanData),
    OrderBy(OrderByScanData),
    Limit(LimitScanData),
    SetOp(SetOpScanData),
    SingleRow(SingleRowScanData),
    With(WithScanData),
    WithRef(WithRefScanData),
    WithEntry(WithEntryScanData),
    Array(ArrayScanData),
    Analytic(AnalyticScanData),
    Recursive(RecursiveScanData),
    RecursiveRef(RecursiveRefScanData),
}

impl ScanData {
    pub fn columns(&self) -> &ColumnList {
        match self {
            ScanData::Table(d) => &d.columns,
            ScanData::Join(d) => &d.columns,
            ScanData::Filter(d) => &d.columns,
            ScanData::Project(d) => &d.columns,
            ScanData::Aggregate(d) => &d.columns,
            ScanData::OrderBy(d) => &d.columns,
            ScanData::Limit(d) => &d.columns,
            ScanData::SetOp(d) => &d.columns,
            ScanData::SingleRow(d) => &d.columns,
            ScanData::With(d) => &d.columns,
            ScanData::WithRef(d) => &d.columns,
            ScanData::WithEntry(d) => &d.columns,
            ScanData::Array(d) => &d.columns,
            ScanData::Analytic(d) => &d.columns,
            ScanData::Recursive(d) => &d.columns,
            ScanData::RecursiveRef(d) => &d.columns,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectStatementData {
    pub input: Box<ScanData>,
    pub output: Vec<ComputedColumn>,
}

#[derive(Debug, Clone)]
pub struct CreateTableStatementData {
    pub name_path: Vec<String>,
    pub columns: Vec<(String, String)>,
    pub or_replace: bool,
    pub if_not_exists: bool,
    pub is_temp: bool,
    pub as_select: Option<Box<ScanData>>,
}

#[derive(Debug, Clone)]
pub struct CreateViewStatementData {
    pub name_path: Vec<String>,
    pub or_replace: bool,
    pub query: Box<ScanData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropObjectType {
    Table,
    View,
    Function,
    Index,
    Schema,
}

#[derive(Debug, Clone)]
pub struct DropStatementData {
    pub object_type: DropObjectType,
    pub name_path: Vec<String>,
    pub if_exists: bool,
}

#[derive(Debug, Clone)]
pub struct InsertStatementData {
    pub target_name_path: Vec<String>,
    pub columns: Vec<String>,
    pub input: Box<ScanData>,
}

#[derive(Debug, Clone)]
pub struct UpdateAssignment {
    pub target_column: String,
    pub value: ExpressionData,
}

#[derive(Debug, Clone)]
pub struct UpdateStatementData {
    pub target_name_path: Vec<String>,
    pub assignments: Vec<UpdateAssignment>,
    pub from: Option<Box<ScanData>>,
    pub condition: Option<ExpressionData>,
}

#[derive(Debug, Clone)]
pub struct DeleteStatementData {
    pub target_name_path: Vec<String>,
    pub condition: Option<ExpressionData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    InsertNotMatchedByTarget,
    UpdateMatched,
    DeleteMatched,
}

#[derive(Debug, Clone)]
pub struct MergeWhenClause {
    pub action: MergeAction,
    pub extra_condition: Option<ExpressionData>,
    pub insert_columns: Vec<String>,
    pub insert_values: Vec<ExpressionData>,
    pub update_assignments: Vec<UpdateAssignment>,
}

#[derive(Debug, Clone)]
pub struct MergeStatementData {
    pub target_name_path: Vec<String>,
    pub source: Box<ScanData>,
    pub source_key_column: String,
    pub target_key_column: String,
    pub whens: Vec<MergeWhenClause>,
}

#[derive(Debug, Clone)]
pub enum StatementData {
    Select(SelectStatementData),
    CreateTable(CreateTableStatementData),
    CreateView(CreateViewStatementData),
    Drop(DropStatementData),
    Insert(InsertStatementData),
    Update(UpdateStatementData),
    Delete(DeleteStatementData),
    Merge(MergeStatementData),
}
