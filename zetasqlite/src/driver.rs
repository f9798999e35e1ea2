//! Synchronous connection surface (`spec.md §5`): opens the host SQLite
//! connection, registers the builtin function library, brings up the
//! declaration catalog, and exposes `prepare`/`execute`/`query` over a
//! resolved-plan JSON payload.

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use zetasqlite_catalog::{format_path, Catalog, CreateMode, TableSpec};
use zetasqlite_functions::FunctionRegistry;
use zetasqlite_value::{value_of, HostScalar, Value};

use crate::context::{CancellationToken, FragmentContext};
use crate::coordinator;
use crate::error::{Context, Error, Result};
use crate::plan::{DropObjectType, StatementData};
use crate::raw::RawNode;
use crate::sql::{self, Statement};

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// `None` opens an in-memory database (`spec.md §5`'s default).
    pub path: Option<String>,
    pub pretty_sql: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            path: None,
            pretty_sql: false,
        }
    }
}

/// One row of a query result: column name paired with its decoded value
/// (`None` for SQL `NULL`).
pub type Row = Vec<(String, Option<Value>)>;

pub struct QueryResult {
    pub rows: Vec<Row>,
}

/// Owns the host SQLite connection and the declaration catalog for one
/// logical session. Not `Sync` — `rusqlite::Connection` isn't either — so a
/// caller serving multiple concurrent queries holds one `Driver` per
/// connection, same as the host engine itself requires.
pub struct Driver {
    conn: Connection,
    catalog: Catalog,
    pretty_sql: bool,
}

impl Driver {
    pub fn open(options: &ConnectOptions) -> Result<Self> {
        let conn = match &options.path {
            Some(path) => Connection::open(Path::new(path)).map_err(|source| Error::HostEngine {
                sql: format!("open {path}"),
                source,
            })?,
            None => Connection::open_in_memory().map_err(|source| Error::HostEngine {
                sql: "open :memory:".to_string(),
                source,
            })?,
        };

        let registry = FunctionRegistry::new();
        zetasqlite_functions::register_all(&conn, &registry).map_err(|source| Error::HostEngine {
            sql: "register_all".to_string(),
            source,
        })?;

        let catalog = Catalog::new();
        catalog.sync(&conn)?;

        Ok(Driver {
            conn,
            catalog,
            pretty_sql: options.pretty_sql,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Translates a resolved-plan JSON payload into host SQL without
    /// executing it (`spec.md §5`'s `prepare`).
    pub fn prepare(&self, resolved_plan_json: &str) -> Result<String> {
        let statement = self.translate(resolved_plan_json, None)?;
        Ok(sql::serialize_with(&statement, self.pretty_sql))
    }

    /// Translates and runs a resolved-plan JSON payload, returning decoded
    /// rows for `SELECT`s and an empty result otherwise.
    pub fn execute(&self, resolved_plan_json: &str, cancellation: Option<CancellationToken>) -> Result<QueryResult> {
        let data = self.parse_statement_data(resolved_plan_json)?;
        let statement = self.translate_data(&data, cancellation)?;
        self.run_statement(&statement)?;
        self.apply_catalog_effects(&data)?;
        Ok(QueryResult { rows: Vec::new() })
    }

    /// Like `execute`, but always runs the statement as a query and
    /// collects its result rows (`spec.md §5`'s `query`).
    pub fn query(&self, resolved_plan_json: &str, cancellation: Option<CancellationToken>) -> Result<QueryResult> {
        let statement = self.translate(resolved_plan_json, cancellation)?;
        let sql_text = sql::serialize(&statement);
        let rows = self.query_rows(&sql_text)?;
        Ok(QueryResult { rows })
    }

    fn parse_statement_data(&self, resolved_plan_json: &str) -> Result<StatementData> {
        let node: RawNode = serde_json::from_str(resolved_plan_json).map_err(|e| Error::Extraction {
            shape: "ResolvedStatement".to_string(),
            message: format!("invalid resolved-plan JSON: {e}"),
        })?;
        crate::extract::extract_statement(&node).context("extracting resolved statement")
    }

    fn translate(&self, resolved_plan_json: &str, cancellation: Option<CancellationToken>) -> Result<Statement> {
        let data = self.parse_statement_data(resolved_plan_json)?;
        self.translate_data(&data, cancellation)
    }

    fn translate_data(&self, data: &StatementData, cancellation: Option<CancellationToken>) -> Result<Statement> {
        let mut ctx = FragmentContext::new();
        if let Some(token) = cancellation {
            ctx = ctx.with_cancellation(token);
        }
        coordinator::global().transform_statement(data, &mut ctx)
    }

    fn run_statement(&self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Compound(phases) => {
                for phase in phases {
                    self.run_statement(phase)?;
                }
                Ok(())
            }
            Statement::Select(_) => {
                self.query_rows(&sql::serialize(statement))?;
                Ok(())
            }
            other => {
                let sql_text = sql::serialize(other);
                self.conn.execute(&sql_text, []).map_err(|source| Error::HostEngine {
                    sql: sql_text.clone(),
                    source,
                })?;
                Ok(())
            }
        }
    }

    fn query_rows(&self, sql_text: &str) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql_text).map_err(|source| Error::HostEngine {
            sql: sql_text.to_string(),
            source,
        })?;
        let column_names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();

        let mut rows_out = Vec::new();
        let mut rows = stmt.query([]).map_err(|source| Error::HostEngine {
            sql: sql_text.to_string(),
            source,
        })?;
        while let Some(row) = rows.next().map_err(|source| Error::HostEngine {
            sql: sql_text.to_string(),
            source,
        })? {
            let mut decoded = Vec::with_capacity(column_names.len());
            for (i, name) in column_names.iter().enumerate() {
                let raw: ValueRef = row.get_ref(i).map_err(|source| Error::HostEngine {
                    sql: sql_text.to_string(),
                    source,
                })?;
                let value = value_of(&host_scalar_of(raw))?;
                decoded.push((name.clone(), value));
            }
            rows_out.push(decoded);
        }
        Ok(rows_out)
    }

    /// Keeps the declaration catalog in step with DDL that just ran
    /// (`spec.md §4.4`): `CREATE TABLE`/`CREATE VIEW` register a spec row,
    /// `DROP` removes one.
    fn apply_catalog_effects(&self, data: &StatementData) -> Result<()> {
        match data {
            StatementData::CreateTable(d) => {
                let now = String::new();
                let spec = TableSpec {
                    name_path: d.name_path.clone(),
                    columns: d
                        .columns
                        .iter()
                        .map(|(name, type_name)| zetasqlite_catalog::ColumnSpec {
                            name: name.clone(),
                            type_name: type_name.clone(),
                            not_null: false,
                        })
                        .collect(),
                    primary_key: None,
                    create_mode: if d.or_replace {
                        CreateMode::OrReplace
                    } else if d.if_not_exists {
                        CreateMode::IfNotExists
                    } else {
                        CreateMode::Default
                    },
                    is_view: false,
                    query: None,
                    is_temp: d.is_temp,
                    created_at: now.clone(),
                    updated_at: now,
                };
                self.catalog.add_table(&self.conn, spec)
            }
            StatementData::CreateView(d) => {
                let now = String::new();
                let spec = TableSpec {
                    name_path: d.name_path.clone(),
                    columns: Vec::new(),
                    primary_key: None,
                    create_mode: if d.or_replace {
                        CreateMode::OrReplace
                    } else {
                        CreateMode::Default
                    },
                    is_view: true,
                    query: None,
                    is_temp: false,
                    created_at: now.clone(),
                    updated_at: now,
                };
                self.catalog.add_table(&self.conn, spec)
            }
            StatementData::Drop(d) => match d.object_type {
                DropObjectType::Table | DropObjectType::View => self.catalog.delete_table(&self.conn, &d.name_path),
                DropObjectType::Function => self.catalog.delete_function(&self.conn, &d.name_path),
                DropObjectType::Index | DropObjectType::Schema => Ok(()),
            },
            _ => Ok(()),
        }
        .map_err(Error::from)
    }
}

impl Drop for Driver {
    /// Drops every catalog entry recorded as temporary (`spec.md §5`):
    /// `CREATE TEMP TABLE`/`CREATE TEMP FUNCTION` specs don't outlive the
    /// connection that created them.
    fn drop(&mut self) {
        for name_path in self.catalog.temp_table_paths() {
            let _ = self.catalog.delete_table(&self.conn, &name_path);
            let _ = self.conn.execute(&format!("DROP TABLE IF EXISTS `{}`", format_path(&name_path)), []);
        }
    }
}

fn host_scalar_of(raw: ValueRef<'_>) -> HostScalar {
    match raw {
        ValueRef::Null => HostScalar::Null,
        ValueRef::Integer(i) => HostScalar::Int(i),
        ValueRef::Real(f) => HostScalar::Float(f),
        ValueRef::Text(t) => HostScalar::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => HostScalar::Blob(b.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_an_in_memory_database_by_default() {
        let driver = Driver::open(&ConnectOptions::default()).unwrap();
        let rows = driver.query_rows("SELECT 1 AS one").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].0, "one");
    }

    #[test]
    fn query_decodes_null_as_none() {
        let driver = Driver::open(&ConnectOptions::default()).unwrap();
        let rows = driver.query_rows("SELECT NULL AS n").unwrap();
        assert_eq!(rows[0][0].1, None);
    }
}
