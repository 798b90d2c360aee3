use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info};

use crate::error::{StoreError, SyncListError};
use crate::types::{
    Category, Checklist, DeleteOutcome, EntityKind, FieldValue, Item, NewRecord, Record,
    RecordChanges, RecordFilter, RecordId, StoreStats,
};

use super::RecordStore;
use super::relations::relations_of;
use super::schema;

/// SQLite-backed implementation of `RecordStore`.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> crate::error::Result<Self> {
        let conn = Connection::open(path).map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        info!(path = %path.display(), "Opened SQLite store");
        Ok(store)
    }

    /// Create an in-memory store (for testing and throwaway servers).
    pub fn in_memory() -> crate::error::Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Path of the backing file; `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> crate::error::Result<()> {
        let conn = self.conn.lock().expect("synclist store mutex poisoned");

        // WAL only applies to file-backed stores
        if self.db_path.is_some() {
            conn.execute_batch(schema::PRAGMAS_SQL)
                .map_err(StoreError::Sqlite)?;
        }

        conn.execute_batch(schema::SCHEMA_SQL)
            .map_err(StoreError::Sqlite)?;

        conn.execute(
            "INSERT OR IGNORE INTO synclist_meta (key, value) VALUES ('schema_version', ?1)",
            params![schema::SCHEMA_VERSION],
        )
        .map_err(StoreError::Sqlite)?;

        let version: String = conn
            .query_row(
                "SELECT value FROM synclist_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .map_err(StoreError::Sqlite)?;
        if version != schema::SCHEMA_VERSION {
            return Err(StoreError::Migration(format!(
                "database schema version {version} does not match supported version {}",
                schema::SCHEMA_VERSION
            ))
            .into());
        }

        Ok(())
    }

    /// `SELECT <columns> FROM <table>` for a kind, columns in `EntityKind::columns` order.
    fn select_sql(kind: EntityKind) -> String {
        let columns: Vec<&str> = kind.columns().iter().map(|c| c.as_sql()).collect();
        format!("SELECT {} FROM {}", columns.join(", "), kind.table())
    }

    /// Helper: parse an RFC 3339 timestamp column.
    fn parse_timestamp(row: &rusqlite::Row<'_>, name: &str) -> rusqlite::Result<DateTime<Utc>> {
        let raw: String = row.get(name)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                let idx = row.as_ref().column_index(name).unwrap_or_default();
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
            })
    }

    /// Helper: read a full record of `kind` from a row.
    fn row_to_record(kind: EntityKind, row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
        let id = RecordId(row.get("id")?);
        let created_at = Self::parse_timestamp(row, "created_at")?;
        let updated_at = Self::parse_timestamp(row, "updated_at")?;

        Ok(match kind {
            EntityKind::Category => Record::Category(Category {
                id,
                name: row.get("name")?,
                created_at,
                updated_at,
            }),
            EntityKind::Checklist => Record::Checklist(Checklist {
                id,
                title: row.get("title")?,
                category_id: row.get::<_, Option<i64>>("category_id")?.map(RecordId),
                created_at,
                updated_at,
            }),
            EntityKind::Item => Record::Item(Item {
                id,
                task_name: row.get("task_name")?,
                is_completed: row.get("is_completed")?,
                checklist_id: RecordId(row.get("checklist_id")?),
                created_at,
                updated_at,
            }),
        })
    }

    fn fetch(
        conn: &Connection,
        kind: EntityKind,
        id: RecordId,
    ) -> rusqlite::Result<Option<Record>> {
        let sql = format!("{} WHERE id = ?1", Self::select_sql(kind));
        conn.query_row(&sql, params![id.0], |row| Self::row_to_record(kind, row))
            .optional()
    }

    fn sql_value(value: &FieldValue) -> Value {
        match value {
            FieldValue::Id(id) => Value::Integer(id.0),
            FieldValue::Text(s) => Value::Text(s.clone()),
            FieldValue::Bool(b) => Value::Integer(i64::from(*b)),
        }
    }

    /// Render a filter as a WHERE clause, appending its bound values to `values`.
    fn where_clause(
        kind: EntityKind,
        filter: &RecordFilter,
        values: &mut Vec<Value>,
    ) -> Result<String, StoreError> {
        let column = filter.column();
        if !kind.has_column(column) {
            return Err(StoreError::InvalidFilter(format!(
                "{} has no column {}",
                kind.table(),
                column.as_sql()
            )));
        }
        let name = column.as_sql();

        let clause = match filter {
            RecordFilter::Eq(_, value) => {
                values.push(Self::sql_value(value));
                format!("{name} = ?{}", values.len())
            }
            RecordFilter::IsNull(_) => format!("{name} IS NULL"),
            RecordFilter::In(_, ids) if ids.is_empty() => "1 = 0".to_string(),
            RecordFilter::In(_, ids) => {
                let mut placeholders = String::new();
                for (i, id) in ids.iter().enumerate() {
                    values.push(Value::Integer(id.0));
                    if i > 0 {
                        placeholders.push_str(", ");
                    }
                    let _ = write!(placeholders, "?{}", values.len());
                }
                format!("{name} IN ({placeholders})")
            }
        };
        Ok(clause)
    }

    fn query_records(
        conn: &Connection,
        kind: EntityKind,
        sql: &str,
        values: &[Value],
    ) -> rusqlite::Result<Vec<Record>> {
        let mut stmt = conn.prepare(sql)?;
        let records = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Self::row_to_record(kind, row)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Column assignments for an update, not counting `updated_at`.
    fn assignments(changes: &RecordChanges) -> Vec<(&'static str, Value)> {
        let mut sets = Vec::new();
        match changes {
            RecordChanges::Checklist(patch) => {
                if let Some(title) = &patch.title {
                    sets.push(("title", Value::Text(title.clone())));
                }
                if let Some(category_id) = patch.category_id {
                    sets.push((
                        "category_id",
                        category_id.map_or(Value::Null, |id| Value::Integer(id.0)),
                    ));
                }
            }
            RecordChanges::Item(patch) => {
                if let Some(task_name) = &patch.task_name {
                    sets.push(("task_name", Value::Text(task_name.clone())));
                }
                if let Some(done) = patch.is_completed {
                    sets.push(("is_completed", Value::Integer(i64::from(done))));
                }
                if let Some(checklist_id) = patch.checklist_id {
                    sets.push(("checklist_id", Value::Integer(checklist_id.0)));
                }
            }
        }
        sets
    }
}

#[async_trait::async_trait]
impl RecordStore for SqliteStore {
    // ── Reads ──────────────────────────────────────────────────────

    async fn find_all(&self, kind: EntityKind) -> crate::error::Result<Vec<Record>> {
        let conn = self.conn.lock().expect("synclist store mutex poisoned");
        let sql = format!("{} ORDER BY id", Self::select_sql(kind));
        Self::query_records(&conn, kind, &sql, &[])
            .map_err(StoreError::Sqlite)
            .map_err(SyncListError::Store)
    }

    async fn find_by_pk(
        &self,
        kind: EntityKind,
        id: RecordId,
    ) -> crate::error::Result<Option<Record>> {
        let conn = self.conn.lock().expect("synclist store mutex poisoned");
        Self::fetch(&conn, kind, id)
            .map_err(StoreError::Sqlite)
            .map_err(SyncListError::Store)
    }

    async fn find_where(
        &self,
        kind: EntityKind,
        filter: &RecordFilter,
    ) -> crate::error::Result<Vec<Record>> {
        let conn = self.conn.lock().expect("synclist store mutex poisoned");
        let mut values = Vec::new();
        let clause = Self::where_clause(kind, filter, &mut values)?;
        let sql = format!("{} WHERE {clause} ORDER BY id", Self::select_sql(kind));
        Self::query_records(&conn, kind, &sql, &values)
            .map_err(StoreError::Sqlite)
            .map_err(SyncListError::Store)
    }

    // ── Writes ─────────────────────────────────────────────────────

    async fn create(&self, new: &NewRecord) -> crate::error::Result<Record> {
        let conn = self.conn.lock().expect("synclist store mutex poisoned");
        let now = Utc::now().to_rfc3339();

        match new {
            NewRecord::Category(c) => conn.execute(
                "INSERT INTO categories (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
                params![c.name, now],
            ),
            NewRecord::Checklist(c) => conn.execute(
                "INSERT INTO checklists (title, category_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![c.title, c.category_id.map(|id| id.0), now],
            ),
            NewRecord::Item(i) => conn.execute(
                "INSERT INTO items (task_name, is_completed, checklist_id, created_at, updated_at)
                 VALUES (?1, 0, ?2, ?3, ?3)",
                params![i.task_name, i.checklist_id.0, now],
            ),
        }
        .map_err(StoreError::classify)?;

        let kind = new.kind();
        let id = RecordId(conn.last_insert_rowid());
        debug!(%kind, %id, "Created record");

        Self::fetch(&conn, kind, id)
            .map_err(StoreError::Sqlite)?
            .ok_or_else(|| StoreError::RecordNotFound { kind, id }.into())
    }

    async fn update(
        &self,
        id: RecordId,
        changes: &RecordChanges,
    ) -> crate::error::Result<Record> {
        let conn = self.conn.lock().expect("synclist store mutex poisoned");
        let kind = changes.kind();

        let mut sql = format!("UPDATE {} SET ", kind.table());
        let mut values: Vec<Value> = Vec::new();
        for (column, value) in Self::assignments(changes) {
            values.push(value);
            let _ = write!(sql, "{column} = ?{}, ", values.len());
        }
        values.push(Value::Text(Utc::now().to_rfc3339()));
        let _ = write!(sql, "updated_at = ?{}", values.len());
        values.push(Value::Integer(id.0));
        let _ = write!(sql, " WHERE id = ?{}", values.len());

        let changed = conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(StoreError::classify)?;
        if changed == 0 {
            return Err(StoreError::RecordNotFound { kind, id }.into());
        }
        debug!(%kind, %id, "Updated record");

        Self::fetch(&conn, kind, id)
            .map_err(StoreError::Sqlite)?
            .ok_or_else(|| StoreError::RecordNotFound { kind, id }.into())
    }

    async fn destroy(&self, kind: EntityKind, id: RecordId) -> crate::error::Result<u64> {
        let conn = self.conn.lock().expect("synclist store mutex poisoned");
        let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table());
        let count = conn
            .execute(&sql, params![id.0])
            .map_err(StoreError::Sqlite)?;
        debug!(%kind, %id, count, "Destroyed record");
        Ok(count as u64)
    }

    async fn destroy_where(
        &self,
        kind: EntityKind,
        filter: &RecordFilter,
    ) -> crate::error::Result<u64> {
        let conn = self.conn.lock().expect("synclist store mutex poisoned");
        let mut values = Vec::new();
        let clause = Self::where_clause(kind, filter, &mut values)?;
        let sql = format!("DELETE FROM {} WHERE {clause}", kind.table());
        let count = conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(StoreError::Sqlite)?;
        debug!(%kind, count, "Destroyed matching records");
        Ok(count as u64)
    }

    /// Children and parent are removed inside one transaction.
    async fn destroy_cascade(
        &self,
        kind: EntityKind,
        id: RecordId,
    ) -> crate::error::Result<DeleteOutcome> {
        let conn = self.conn.lock().expect("synclist store mutex poisoned");
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;

        let mut dependents = 0;
        for relation in relations_of(kind).filter(|r| r.cascades()) {
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?1",
                relation.target.table(),
                relation.foreign_key.as_sql()
            );
            dependents += tx
                .execute(&sql, params![id.0])
                .map_err(StoreError::Sqlite)? as u64;
        }
        let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table());
        let removed = tx
            .execute(&sql, params![id.0])
            .map_err(StoreError::Sqlite)? as u64;

        tx.commit().map_err(StoreError::Sqlite)?;
        debug!(%kind, %id, removed, dependents, "Cascade delete committed");
        Ok(DeleteOutcome {
            removed,
            dependents,
        })
    }

    // ── Metrics ────────────────────────────────────────────────────

    async fn stats(&self) -> crate::error::Result<StoreStats> {
        let conn = self.conn.lock().expect("synclist store mutex poisoned");
        let count = |sql: &str| -> crate::error::Result<u64> {
            conn.query_row(sql, [], |row| row.get(0))
                .map_err(StoreError::Sqlite)
                .map_err(SyncListError::Store)
        };

        let categories = count("SELECT COUNT(*) FROM categories")?;
        let checklists = count("SELECT COUNT(*) FROM checklists")?;
        let items = count("SELECT COUNT(*) FROM items")?;
        let completed_items = count("SELECT COUNT(*) FROM items WHERE is_completed = 1")?;

        let db_size_bytes = self
            .db_path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map_or(0, |m| m.len());

        Ok(StoreStats {
            categories,
            checklists,
            items,
            completed_items,
            db_size_bytes,
        })
    }
}
