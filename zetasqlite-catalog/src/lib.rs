//! The declaration catalog (`spec.md` C4): tables and functions keyed by
//! `project.dataset.name`, synced against a backing SQLite connection.

pub mod error;
pub mod persist;
pub mod spec;

use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::Connection;

pub use error::{CatalogError, Result};
pub use spec::{format_path, ArgSpec, ColumnSpec, CreateMode, FunctionSpec, Language, TableSpec};

struct Inner {
    tables: HashMap<String, TableSpec>,
    functions: HashMap<String, FunctionSpec>,
    watermark: String,
}

/// In-memory view of the declaration catalog, periodically synced from its
/// backing SQLite table. Guarded by a single mutex: lookups and mutations are
/// infrequent relative to query execution, so a coarse lock is the simplest
/// thing that is still correct.
pub struct Catalog {
    inner: Mutex<Inner>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            inner: Mutex::new(Inner {
                tables: HashMap::new(),
                functions: HashMap::new(),
                watermark: String::new(),
            }),
        }
    }

    /// Loads every catalog row updated since the last sync. Callers should
    /// invoke this after any DDL statement that may have been issued by a
    /// concurrent connection.
    pub fn sync(&self, conn: &Connection) -> Result<()> {
        persist::ensure_table(conn)?;
        let mut guard = self.inner.lock().unwrap();
        let watermark = guard.watermark.clone();
        let rows = persist::load_since(conn, &watermark)?;
        for (name, row) in rows {
            match row {
                persist::SpecRow::Table(spec) => {
                    if spec.updated_at.as_str() > guard.watermark.as_str() {
                        guard.watermark = spec.updated_at.clone();
                    }
                    guard.tables.insert(name, spec);
                }
                persist::SpecRow::Function(spec) => {
                    if spec.updated_at.as_str() > guard.watermark.as_str() {
                        guard.watermark = spec.updated_at.clone();
                    }
                    guard.functions.insert(name, spec);
                }
            }
        }
        Ok(())
    }

    pub fn add_table(&self, conn: &Connection, spec: TableSpec) -> Result<()> {
        let key = spec.qualified_name();
        let mut guard = self.inner.lock().unwrap();
        let exists = guard.tables.contains_key(&key);
        match spec.create_mode {
            CreateMode::Default if exists => return Err(CatalogError::TableExists(key)),
            CreateMode::IfNotExists if exists => return Ok(()),
            _ => {}
        }
        persist::upsert_table(conn, &key, &spec)?;
        guard.tables.insert(key, spec);
        Ok(())
    }

    pub fn add_function(&self, conn: &Connection, spec: FunctionSpec) -> Result<()> {
        let key = spec.qualified_name();
        let mut guard = self.inner.lock().unwrap();
        if guard.functions.contains_key(&key) {
            return Err(CatalogError::FunctionExists(key));
        }
        persist::upsert_function(conn, &key, &spec)?;
        guard.functions.insert(key, spec);
        Ok(())
    }

    pub fn delete_table(&self, conn: &Connection, path: &[String]) -> Result<()> {
        let key = format_path(path);
        let mut guard = self.inner.lock().unwrap();
        if guard.tables.remove(&key).is_none() {
            return Err(CatalogError::TableNotFound(key));
        }
        persist::delete(conn, &key)?;
        Ok(())
    }

    pub fn delete_function(&self, conn: &Connection, path: &[String]) -> Result<()> {
        let key = format_path(path);
        let mut guard = self.inner.lock().unwrap();
        if guard.functions.remove(&key).is_none() {
            return Err(CatalogError::FunctionNotFound(key));
        }
        persist::delete(conn, &key)?;
        Ok(())
    }

    pub fn find_table(&self, path: &[String]) -> Result<TableSpec> {
        let key = format_path(path);
        let guard = self.inner.lock().unwrap();
        guard
            .tables
            .get(&key)
            .cloned()
            .ok_or(CatalogError::TableNotFound(key))
    }

    pub fn find_function(&self, path: &[String]) -> Result<FunctionSpec> {
        let key = format_path(path);
        let guard = self.inner.lock().unwrap();
        guard
            .functions
            .get(&key)
            .cloned()
            .ok_or(CatalogError::FunctionNotFound(key))
    }

    /// Every table/view currently recorded as temporary, for connection-close
    /// cleanup (`spec.md §5`).
    pub fn temp_table_paths(&self) -> Vec<Vec<String>> {
        let guard = self.inner.lock().unwrap();
        guard
            .tables
            .values()
            .filter(|t| t.is_temp)
            .map(|t| t.name_path.clone())
            .collect()
    }

    /// Resolves a `project.dataset.*` wildcard table reference: the union of
    /// every table in the matched dataset, plus a synthetic `_TABLE_SUFFIX`
    /// column holding the part of each table's name past the dataset prefix.
    pub fn wildcard_table(&self, path: &[String]) -> Result<TableSpec> {
        let (prefix, last) = path.split_at(path.len() - 1);
        if last.first().map(|s| s.as_str()) != Some("*") {
            return Err(CatalogError::TableNotFound(format_path(path)));
        }
        let prefix_key = format_path(prefix);
        let guard = self.inner.lock().unwrap();
        let mut matches: Vec<&TableSpec> = guard
            .tables
            .values()
            .filter(|t| {
                let table_key = format_path(&t.name_path);
                table_key.starts_with(&format!("{prefix_key}."))
            })
            .collect();
        matches.sort_by(|a, b| a.qualified_name().cmp(&b.qualified_name()));

        let first = matches
            .first()
            .ok_or_else(|| CatalogError::TableNotFound(format_path(path)))?;
        let mut columns = first.columns.clone();
        columns.push(ColumnSpec {
            name: "_TABLE_SUFFIX".to_string(),
            type_name: "STRING".to_string(),
            not_null: false,
        });

        Ok(TableSpec {
            name_path: path.to_vec(),
            columns,
            primary_key: None,
            create_mode: CreateMode::Default,
            is_view: true,
            query: None,
            is_temp: false,
            created_at: first.created_at.clone(),
            updated_at: first.updated_at.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(path: &[&str]) -> TableSpec {
        let now = "2024-01-01T00:00:00Z".to_string();
        TableSpec {
            name_path: path.iter().map(|s| s.to_string()).collect(),
            columns: vec![ColumnSpec {
                name: "a".into(),
                type_name: "INT64".into(),
                not_null: false,
            }],
            primary_key: None,
            create_mode: CreateMode::Default,
            is_view: false,
            query: None,
            is_temp: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn add_then_find_table_round_trips() {
        let conn = Connection::open_in_memory().unwrap();
        let catalog = Catalog::new();
        catalog
            .add_table(&conn, sample(&["proj", "ds", "t"]))
            .unwrap();
        let found = catalog
            .find_table(&["proj".into(), "ds".into(), "t".into()])
            .unwrap();
        assert_eq!(found.name_path, vec!["proj", "ds", "t"]);
    }

    #[test]
    fn add_table_default_mode_rejects_duplicate() {
        let conn = Connection::open_in_memory().unwrap();
        let catalog = Catalog::new();
        catalog.add_table(&conn, sample(&["p", "d", "t"])).unwrap();
        let err = catalog.add_table(&conn, sample(&["p", "d", "t"])).unwrap_err();
        assert!(matches!(err, CatalogError::TableExists(_)));
    }

    #[test]
    fn wildcard_table_unions_matching_tables_with_suffix_column() {
        let conn = Connection::open_in_memory().unwrap();
        let catalog = Catalog::new();
        catalog
            .add_table(&conn, sample(&["p", "d", "events_20240101"]))
            .unwrap();
        catalog
            .add_table(&conn, sample(&["p", "d", "events_20240102"]))
            .unwrap();
        let wildcard = catalog
            .wildcard_table(&["p".into(), "d".into(), "*".into()])
            .unwrap();
        assert!(wildcard
            .columns
            .iter()
            .any(|c| c.name == "_TABLE_SUFFIX"));
    }

    #[test]
    fn sync_pulls_rows_written_directly_to_backing_table() {
        let conn = Connection::open_in_memory().unwrap();
        persist::ensure_table(&conn).unwrap();
        let spec = sample(&["p", "d", "t"]);
        persist::upsert_table(&conn, "p.d.t", &spec).unwrap();

        let catalog = Catalog::new();
        catalog.sync(&conn).unwrap();
        let found = catalog
            .find_table(&["p".into(), "d".into(), "t".into()])
            .unwrap();
        assert_eq!(found, spec);
    }
}
