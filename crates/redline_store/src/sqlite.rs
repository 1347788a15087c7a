//! SQLite storage engine.
//!
//! - `records` holds one row per identity; `seq` keeps insertion order
//! - `record_values` holds one typed row per attribute
//! - `memberships` is the join table behind every many-to-many relation
//!
//! Filters, ordering and limits are compiled to SQL. A single connection
//! behind a mutex serialises writers within a process; SQLite's own file
//! lock (with a busy timeout) serialises processes.

use crate::error::{Result, StoreError};
use crate::query::{Filter, Query, RelationKey};
use crate::value::{Record, Value};
use crate::Store;
use chrono::{DateTime, SecondsFormat, Utc};
use redline_ids::RecordId;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug_span, info};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    seq     INTEGER PRIMARY KEY AUTOINCREMENT,
    entity  TEXT NOT NULL,
    id      TEXT NOT NULL,
    UNIQUE (entity, id)
);

CREATE TABLE IF NOT EXISTS record_values (
    record_seq  INTEGER NOT NULL REFERENCES records(seq) ON DELETE CASCADE,
    attribute   TEXT NOT NULL,
    kind        TEXT NOT NULL,
    sort_rank   INTEGER NOT NULL,
    datum,
    PRIMARY KEY (record_seq, attribute)
);

CREATE INDEX IF NOT EXISTS idx_record_values_match
    ON record_values(attribute, kind, datum);

CREATE TABLE IF NOT EXISTS memberships (
    entity    TEXT NOT NULL,
    relation  TEXT NOT NULL,
    owner     TEXT NOT NULL,
    member    TEXT NOT NULL,
    position  INTEGER NOT NULL,
    PRIMARY KEY (entity, relation, owner, member)
);
"#;

/// [`Store`] backed by a SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish()
    }
}

impl SqliteStore {
    /// Open (or create) a database file, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self::init(conn, Some(path.to_path_buf()))?;
        info!("Opened SQLite store: {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::poisoned("sqlite connection"))
    }
}

impl Store for SqliteStore {
    fn insert(&self, record: Record) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if record_seq(&tx, &record.entity, &record.id)?.is_some() {
            return Err(StoreError::duplicate(format!("{} {}", record.entity, record.id)));
        }
        let seq = insert_row(&tx, &record)?;
        write_values(&tx, seq, &record)?;
        tx.commit()?;
        Ok(())
    }

    fn save(&self, record: &Record) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let seq = match record_seq(&tx, &record.entity, &record.id)? {
            Some(seq) => {
                tx.prepare_cached("DELETE FROM record_values WHERE record_seq = ?1")?
                    .execute(params![seq])?;
                seq
            }
            None => insert_row(&tx, record)?,
        };
        write_values(&tx, seq, record)?;
        tx.commit()?;
        Ok(())
    }

    fn get(&self, entity: &str, id: &RecordId) -> Result<Option<Record>> {
        let conn = self.lock()?;
        match record_seq(&conn, entity, id)? {
            Some(seq) => Ok(Some(read_record(&conn, seq, entity, id.clone())?)),
            None => Ok(None),
        }
    }

    fn delete(&self, entity: &str, id: &RecordId) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let Some(seq) = record_seq(&tx, entity, id)? else {
            return Ok(false);
        };
        delete_row(&tx, seq, entity, id)?;
        tx.commit()?;
        Ok(true)
    }

    fn query(&self, entity: &str, query: &Query) -> Result<Vec<Record>> {
        let conn = self.lock()?;
        timed("query", entity, || {
            let (sql, params) = compile_select(entity, query);
            let keys = select_keys(&conn, &sql, params)?;
            keys.into_iter()
                .map(|(seq, id)| read_record(&conn, seq, entity, id))
                .collect()
        })
    }

    fn count(&self, entity: &str, filter: &Filter) -> Result<usize> {
        let conn = self.lock()?;
        timed("count", entity, || {
            let mut params = Vec::new();
            let sql = format!(
                "SELECT COUNT(*) FROM records r WHERE {}",
                compile_where(entity, filter, &mut params)
            );
            let count: i64 = conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    fn delete_where(&self, entity: &str, filter: &Filter) -> Result<usize> {
        let mut conn = self.lock()?;
        timed("delete_where", entity, || {
            let tx = conn.transaction()?;
            let (sql, params) = compile_select(entity, &Query::from(filter.clone()));
            let keys = select_keys(&tx, &sql, params)?;
            for (seq, id) in &keys {
                delete_row(&tx, *seq, entity, id)?;
            }
            tx.commit()?;
            Ok(keys.len())
        })
    }

    fn members(&self, relation: &RelationKey, owner: &RecordId) -> Result<Vec<RecordId>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT member FROM memberships
             WHERE entity = ?1 AND relation = ?2 AND owner = ?3
             ORDER BY position",
        )?;
        let rows = stmt.query_map(
            params![relation.entity, relation.relation, owner.as_str()],
            |row| row.get::<_, String>(0),
        )?;
        let members = rows.map(|raw| parse_id(&raw?)).collect::<Result<Vec<_>>>()?;
        Ok(members)
    }

    fn add_members(&self, relation: &RelationKey, owner: &RecordId, members: &[RecordId]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM memberships
             WHERE entity = ?1 AND relation = ?2 AND owner = ?3",
            params![relation.entity, relation.relation, owner.as_str()],
            |row| row.get(0),
        )?;
        insert_members(&tx, relation, owner, members, next)?;
        tx.commit()?;
        Ok(())
    }

    fn remove_members(&self, relation: &RelationKey, owner: &RecordId, members: &[RecordId]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "DELETE FROM memberships
                 WHERE entity = ?1 AND relation = ?2 AND owner = ?3 AND member = ?4",
            )?;
            for member in members {
                stmt.execute(params![
                    relation.entity,
                    relation.relation,
                    owner.as_str(),
                    member.as_str()
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn set_members(&self, relation: &RelationKey, owner: &RecordId, members: &[RecordId]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.prepare_cached("DELETE FROM memberships WHERE entity = ?1 AND relation = ?2 AND owner = ?3")?
            .execute(params![relation.entity, relation.relation, owner.as_str()])?;
        insert_members(&tx, relation, owner, members, 0)?;
        tx.commit()?;
        Ok(())
    }
}

fn timed<T>(op: &'static str, entity: &str, run: impl FnOnce() -> Result<T>) -> Result<T> {
    let span = debug_span!(
        "store.sql",
        op = op,
        entity = entity,
        duration_ms = tracing::field::Empty
    );
    let _guard = span.enter();
    let start = Instant::now();
    let result = run();
    span.record("duration_ms", start.elapsed().as_millis() as u64);
    result
}

// ============================================================================
// Row helpers
// ============================================================================

fn record_seq(conn: &Connection, entity: &str, id: &RecordId) -> Result<Option<i64>> {
    let seq = conn
        .prepare_cached("SELECT seq FROM records WHERE entity = ?1 AND id = ?2")?
        .query_row(params![entity, id.as_str()], |row| row.get::<_, i64>(0))
        .optional()?;
    Ok(seq)
}

fn insert_row(conn: &Connection, record: &Record) -> Result<i64> {
    conn.prepare_cached("INSERT INTO records (entity, id) VALUES (?1, ?2)")?
        .execute(params![record.entity, record.id.as_str()])?;
    Ok(conn.last_insert_rowid())
}

fn write_values(conn: &Connection, seq: i64, record: &Record) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO record_values (record_seq, attribute, kind, sort_rank, datum)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (attribute, value) in &record.values {
        let (kind, datum) = encode(value);
        stmt.execute(params![seq, attribute, kind, value.rank(), datum])?;
    }
    Ok(())
}

fn read_record(conn: &Connection, seq: i64, entity: &str, id: RecordId) -> Result<Record> {
    let mut stmt =
        conn.prepare_cached("SELECT attribute, kind, datum FROM record_values WHERE record_seq = ?1")?;
    let rows = stmt.query_map(params![seq], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, SqlValue>(2)?,
        ))
    })?;

    let mut record = Record::with_id(entity, id);
    for row in rows {
        let (attribute, kind, datum) = row?;
        let value = decode(&kind, datum)?;
        record.values.insert(attribute, value);
    }
    Ok(record)
}

/// Delete one record row (values cascade) and the memberships it owns.
fn delete_row(conn: &Connection, seq: i64, entity: &str, id: &RecordId) -> Result<()> {
    conn.prepare_cached("DELETE FROM records WHERE seq = ?1")?
        .execute(params![seq])?;
    conn.prepare_cached("DELETE FROM memberships WHERE entity = ?1 AND owner = ?2")?
        .execute(params![entity, id.as_str()])?;
    Ok(())
}

fn insert_members(
    conn: &Connection,
    relation: &RelationKey,
    owner: &RecordId,
    members: &[RecordId],
    mut position: i64,
) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO memberships (entity, relation, owner, member, position)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for member in members {
        let inserted = stmt.execute(params![
            relation.entity,
            relation.relation,
            owner.as_str(),
            member.as_str(),
            position
        ])?;
        if inserted > 0 {
            position += 1;
        }
    }
    Ok(())
}

fn select_keys(conn: &Connection, sql: &str, params: Vec<SqlValue>) -> Result<Vec<(i64, RecordId)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    let keys = rows
        .map(|row| {
            let (seq, raw) = row?;
            Ok((seq, parse_id(&raw)?))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(keys)
}

fn parse_id(raw: &str) -> Result<RecordId> {
    RecordId::parse(raw).map_err(|e| StoreError::decode(e.to_string()))
}

// ============================================================================
// Value encoding
// ============================================================================

/// Storage kind tag and SQL datum of a value.
///
/// Timestamps are fixed-width RFC 3339 text so they compare in time order.
fn encode(value: &Value) -> (&'static str, SqlValue) {
    match value {
        Value::Null => ("null", SqlValue::Null),
        Value::Bool(b) => ("bool", SqlValue::Integer(i64::from(*b))),
        Value::Integer(i) => ("integer", SqlValue::Integer(*i)),
        Value::Real(r) => ("real", SqlValue::Real(*r)),
        Value::Text(s) => ("text", SqlValue::Text(s.clone())),
        Value::Timestamp(ts) => (
            "timestamp",
            SqlValue::Text(ts.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        ),
        Value::Ref(id) => ("ref", SqlValue::Text(id.to_string())),
    }
}

fn decode(kind: &str, datum: SqlValue) -> Result<Value> {
    match (kind, datum) {
        ("null", _) => Ok(Value::Null),
        ("bool", SqlValue::Integer(i)) => Ok(Value::Bool(i != 0)),
        ("integer", SqlValue::Integer(i)) => Ok(Value::Integer(i)),
        ("real", SqlValue::Real(r)) => Ok(Value::Real(r)),
        ("real", SqlValue::Integer(i)) => Ok(Value::Real(i as f64)),
        // SQLite stores NaN as NULL.
        ("real", SqlValue::Null) => Ok(Value::Real(f64::NAN)),
        ("text", SqlValue::Text(s)) => Ok(Value::Text(s)),
        ("timestamp", SqlValue::Text(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
            .map_err(|e| StoreError::decode(format!("Invalid timestamp '{}': {}", s, e))),
        ("ref", SqlValue::Text(s)) => parse_id(&s).map(Value::Ref),
        (kind, other) => Err(StoreError::decode(format!(
            "Unexpected {:?} for a {} value",
            other.data_type(),
            kind
        ))),
    }
}

// ============================================================================
// Query compilation
// ============================================================================

/// `WHERE` body over `records r`, pushing bind values in placeholder order.
fn compile_where(entity: &str, filter: &Filter, params: &mut Vec<SqlValue>) -> String {
    let mut clauses = vec!["r.entity = ?".to_string()];
    params.push(SqlValue::Text(entity.to_string()));

    for (attribute, value) in filter.predicates() {
        params.push(SqlValue::Text(attribute.to_string()));
        if value.is_null() {
            // Missing attributes read as null.
            clauses.push(
                "NOT EXISTS (SELECT 1 FROM record_values v
                 WHERE v.record_seq = r.seq AND v.attribute = ? AND v.kind <> 'null')"
                    .to_string(),
            );
        } else {
            let (kind, datum) = encode(value);
            params.push(SqlValue::Text(kind.to_string()));
            params.push(datum);
            clauses.push(
                "EXISTS (SELECT 1 FROM record_values v
                 WHERE v.record_seq = r.seq AND v.attribute = ? AND v.kind = ? AND v.datum = ?)"
                    .to_string(),
            );
        }
    }
    clauses.join(" AND ")
}

/// `SELECT seq, id` for a query. Ties on every order key keep insertion order.
fn compile_select(entity: &str, query: &Query) -> (String, Vec<SqlValue>) {
    let mut params = Vec::new();
    let mut sql = String::from("SELECT r.seq, r.id FROM records r");
    let mut order_terms = Vec::with_capacity(query.order.len() + 1);

    for (i, order) in query.order.iter().enumerate() {
        sql.push_str(&format!(
            " LEFT JOIN record_values o{i} ON o{i}.record_seq = r.seq AND o{i}.attribute = ?"
        ));
        params.push(SqlValue::Text(order.attribute.clone()));
        let direction = if order.descending { "DESC" } else { "ASC" };
        order_terms.push(format!(
            "COALESCE(o{i}.sort_rank, 0) {direction}, o{i}.datum {direction}"
        ));
    }
    order_terms.push("r.seq ASC".to_string());

    sql.push_str(" WHERE ");
    sql.push_str(&compile_where(entity, &query.filter, &mut params));
    sql.push_str(" ORDER BY ");
    sql.push_str(&order_terms.join(", "));

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        params.push(SqlValue::Integer(limit as i64));
    }
    (sql, params)
}
