//! The typed SQL writer AST (`spec.md §4.10`): the subset of host SQL the
//! translator emits. Node shapes are grounded on `sqlparser::ast` (the crate
//! `datafusion` itself depends on) but kept local and minimal rather than
//! reusing `sqlparser`'s AST directly, since the translator only ever
//! produces — never parses — this shape.

#[derive(Debug, Clone)]
pub enum SqlExpression {
    Column {
        table_alias: Option<String>,
        name: String,
    },
    /// Already-quoted/encoded literal text, ready to paste into SQL
    /// (`spec.md §4.1`'s `encodeLiteral`).
    Literal(String),
    Parameter(String),
    Star,
    FunctionCall(FunctionCall),
    Case(CaseExpression),
    Exists(ExistsExpression),
    InSubquery {
        expr: Box<SqlExpression>,
        negated: bool,
        subquery: Box<SelectStatement>,
    },
    /// A parenthesized `SELECT` used in scalar position (`spec.md §4.7`'s
    /// `Scalar → (SELECT * FROM inner)`).
    ScalarSubquery(Box<SelectStatement>),
    Raw(String),
}

#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<SqlExpression>,
    pub distinct: bool,
    pub window: Option<WindowSpecification>,
}

#[derive(Debug, Clone)]
pub struct OrderByItem {
    pub expr: SqlExpression,
    pub desc: bool,
    pub nulls_first: bool,
    pub collate: Option<String>,
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
pub struct WindowSpecification {
    pub partition_by: Vec<SqlExpression>,
    pub order_by: Vec<OrderByItem>,
    pub frame: Option<(FrameUnit, FrameBound, FrameBound)>,
}

#[derive(Debug, Clone)]
pub struct CaseExpression {
    pub operand: Option<Box<SqlExpression>>,
    pub whens: Vec<(SqlExpression, SqlExpression)>,
    pub else_result: Option<Box<SqlExpression>>,
}

#[derive(Debug, Clone)]
pub struct ExistsExpression {
    pub subquery: Box<SelectStatement>,
    pub negated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    FullOuter,
    Cross,
}

#[derive(Debug, Clone)]
pub struct JoinClause {
    pub left: FromItem,
    pub right: FromItem,
    pub kind: JoinKind,
    pub condition: Option<SqlExpression>,
    pub using: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum FromItem {
    Table {
        name: String,
        alias: Option<String>,
    },
    Subquery {
        query: Box<SelectStatement>,
        alias: String,
    },
    Join(Box<JoinClause>),
    WithRef {
        name: String,
        alias: String,
    },
    TableFunction {
        name: String,
        args: Vec<SqlExpression>,
        alias: String,
    },
    /// The zero-row placeholder (`spec.md §4.8`'s SingleRow) recognized by
    /// the serializer to omit the `FROM` clause entirely.
    SingleRow,
}

#[derive(Debug, Clone)]
pub enum SelectItem {
    Expr { expr: SqlExpression, alias: String },
    Star,
    QualifiedStar(String),
}

#[derive(Debug, Clone)]
pub struct PlainSelect {
    pub select_list: Vec<SelectItem>,
    pub from: Option<FromItem>,
    pub where_clause: Option<SqlExpression>,
    pub group_by: Vec<SqlExpression>,
    pub having: Option<SqlExpression>,
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

#[derive(Debug, Clone)]
pub struct SetOperation {
    pub kind: SetOpKind,
    pub modifier: SetOpModifier,
    pub operands: Vec<SelectStatement>,
}

#[derive(Debug, Clone)]
pub enum SelectBody {
    Select(PlainSelect),
    SetOp(SetOperation),
}

#[derive(Debug, Clone)]
pub struct WithEntry {
    pub name: String,
    pub column_aliases: Vec<String>,
    pub query: Box<SelectStatement>,
    pub recursive: bool,
    pub materialized: bool,
}

#[derive(Debug, Clone)]
pub struct WithClause {
    pub entries: Vec<WithEntry>,
}

impl WithClause {
    /// `spec.md §6.4`: `WITH RECURSIVE` iff at least one entry is recursive.
    pub fn is_recursive(&self) -> bool {
        self.entries.iter().any(|e| e.recursive)
    }
}

#[derive(Debug, Clone)]
pub struct SelectStatement {
    pub with: Option<WithClause>,
    pub body: SelectBody,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<SqlExpression>,
    pub offset: Option<SqlExpression>,
}

impl SelectStatement {
    pub fn simple(select: PlainSelect) -> Self {
        SelectStatement {
            with: None,
            body: SelectBody::Select(select),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }
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
pub struct CreateTable {
    pub name: String,
    pub if_not_exists: bool,
    pub or_replace: bool,
    pub columns: Vec<(String, String)>,
    pub as_select: Option<Box<SelectStatement>>,
}

#[derive(Debug, Clone)]
pub struct CreateView {
    pub name: String,
    pub or_replace: bool,
    pub query: Box<SelectStatement>,
}

#[derive(Debug, Clone)]
pub struct DropStatement {
    pub object_type: DropObjectType,
    pub name: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone)]
pub struct InsertStatement {
    pub target: String,
    pub columns: Vec<String>,
    pub source: Box<SelectStatement>,
}

#[derive(Debug, Clone)]
pub struct UpdateStatement {
    pub target: String,
    pub assignments: Vec<(String, SqlExpression)>,
    pub from: Option<FromItem>,
    pub where_clause: Option<SqlExpression>,
}

#[derive(Debug, Clone)]
pub struct DeleteStatement {
    pub target: String,
    pub where_clause: Option<SqlExpression>,
}

#[derive(Debug, Clone)]
pub struct TruncateStatement {
    pub target: String,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Select(Box<SelectStatement>),
    CreateTable(CreateTable),
    CreateView(CreateView),
    Drop(DropStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Truncate(TruncateStatement),
    /// A fixed sequence of statements executed in order (MERGE's three-phase
    /// lowering, `spec.md §4.9`).
    Compound(Vec<Statement>),
}
