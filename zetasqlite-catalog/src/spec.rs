//! Table and function spec shapes (`spec.md §3.5`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateMode {
    Default,
    OrReplace,
    IfNotExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub not_null: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name_path: Vec<String>,
    pub columns: Vec<ColumnSpec>,
    pub primary_key: Option<Vec<String>>,
    pub create_mode: CreateMode,
    pub is_view: bool,
    /// Raw SQL for a view or CREATE-TABLE-AS-SELECT.
    pub query: Option<String>,
    pub is_temp: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TableSpec {
    pub fn qualified_name(&self) -> String {
        format_path(&self.name_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Sql,
    Js,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name_path: Vec<String>,
    pub language: Language,
    pub args: Vec<ArgSpec>,
    pub return_type: String,
    /// SQL expression AST body, serialized by C10 (SQL-language functions).
    pub body: Option<String>,
    /// Raw JS source (`language == Js`).
    pub code: Option<String>,
    pub is_aggregate: bool,
    pub is_temp: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl FunctionSpec {
    pub fn qualified_name(&self) -> String {
        format_path(&self.name_path)
    }
}

/// The canonical catalog key: a dot-joined, lowercased path
/// (`spec.md §9`'s Open Question — resolved to this single form; see
/// `DESIGN.md`).
pub fn format_path(path: &[String]) -> String {
    path.iter()
        .map(|s| s.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(".")
}
