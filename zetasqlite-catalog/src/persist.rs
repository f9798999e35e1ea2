//! Backing SQLite persistence for the catalog (`spec.md §6.3`).

use rusqlite::{params, Connection};

use crate::error::{CatalogError, Result};
use crate::spec::{FunctionSpec, TableSpec};

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS zetasqlite_catalog (
    name TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    spec TEXT NOT NULL,
    updatedAt TEXT NOT NULL,
    createdAt TEXT NOT NULL
)";

pub fn ensure_table(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_TABLE_SQL, [])?;
    Ok(())
}

pub enum SpecRow {
    Table(TableSpec),
    Function(FunctionSpec),
}

/// Reads every row whose `updatedAt >= watermark`.
pub fn load_since(conn: &Connection, watermark: &str) -> Result<Vec<(String, SpecRow)>> {
    let mut stmt =
        conn.prepare("SELECT name, kind, spec FROM zetasqlite_catalog WHERE updatedAt >= ?1")?;
    let rows = stmt.query_map(params![watermark], |row| {
        let name: String = row.get(0)?;
        let kind: String = row.get(1)?;
        let spec: String = row.get(2)?;
        Ok((name, kind, spec))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (name, kind, spec_json) = row?;
        let parsed = match kind.as_str() {
            "table" => SpecRow::Table(
                serde_json::from_str(&spec_json).map_err(|source| CatalogError::Decode {
                    name: name.clone(),
                    source,
                })?,
            ),
            "function" => SpecRow::Function(
                serde_json::from_str(&spec_json).map_err(|source| CatalogError::Decode {
                    name: name.clone(),
                    source,
                })?,
            ),
            other => {
                log::warn!("skipping catalog row '{name}' with unknown kind '{other}'");
                continue;
            }
        };
        out.push((name, parsed));
    }
    Ok(out)
}

pub fn upsert_table(conn: &Connection, name: &str, spec: &TableSpec) -> Result<()> {
    let json = serde_json::to_string(spec).map_err(|source| CatalogError::Encode {
        name: name.to_string(),
        source,
    })?;
    conn.execute(
        "INSERT INTO zetasqlite_catalog (name, kind, spec, updatedAt, createdAt)
         VALUES (?1, 'table', ?2, ?3, ?4)
         ON CONFLICT(name) DO UPDATE SET kind='table', spec=excluded.spec, updatedAt=excluded.updatedAt",
        params![name, json, spec.updated_at, spec.created_at],
    )?;
    Ok(())
}

pub fn upsert_function(conn: &Connection, name: &str, spec: &FunctionSpec) -> Result<()> {
    let json = serde_json::to_string(spec).map_err(|source| CatalogError::Encode {
        name: name.to_string(),
        source,
    })?;
    conn.execute(
        "INSERT INTO zetasqlite_catalog (name, kind, spec, updatedAt, createdAt)
         VALUES (?1, 'function', ?2, ?3, ?4)
         ON CONFLICT(name) DO UPDATE SET kind='function', spec=excluded.spec, updatedAt=excluded.updatedAt",
        params![name, json, spec.updated_at, spec.created_at],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, name: &str) -> Result<()> {
    conn.execute("DELETE FROM zetasqlite_catalog WHERE name = ?1", params![name])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ColumnSpec, CreateMode};

    fn sample_table() -> TableSpec {
        TableSpec {
            name_path: vec!["t".into()],
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
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn upsert_then_load_since_roundtrips() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn).unwrap();
        let spec = sample_table();
        upsert_table(&conn, "t", &spec).unwrap();
        let rows = load_since(&conn, "2023-01-01T00:00:00Z").unwrap();
        assert_eq!(rows.len(), 1);
        match &rows[0].1 {
            SpecRow::Table(loaded) => assert_eq!(loaded, &spec),
            _ => panic!("expected table row"),
        }
    }
}
