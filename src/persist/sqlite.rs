//! SQLite-backed canvas table with a trigger-synchronized FTS5 name index.

use std::{path::Path, time::Duration};

use chrono::DateTime;
use r2d2::{CustomizeConnection, Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tracing::{debug, info};

use crate::{canvas::Canvas, types::Resolution};

use super::{BulkReport, CanvasStore, PageQuery, PersistError, PersistResult};

const SELECT_COLUMNS: &str = "c.name, c.created_ms, c.hd, c.image, c.shade";

const INSERT_SQL: &str =
    "INSERT INTO canvases(name, created_ms, hd, image, shade) VALUES (?1, ?2, ?3, ?4, ?5)";

/// Search words handed to FTS5 as operators.
const FTS_OPERATORS: [&str; 3] = ["AND", "OR", "NOT"];

type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Connection settings for [`SqliteCanvasStore::open_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// How long a connection waits on another writer's lock.
    pub busy_timeout: Duration,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5_000),
            max_connections: 8,
        }
    }
}

/// Applied to every connection the pool hands out.
#[derive(Debug)]
struct ConnectionSetup {
    busy_timeout: Duration,
}

impl CustomizeConnection<Connection, rusqlite::Error> for ConnectionSetup {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(())
    }
}

/// SQLite implementation of [`crate::persist::CanvasStore`].
///
/// Each call checks a connection out of a pool, so readers proceed under
/// WAL while a writer holds its transaction.
pub struct SqliteCanvasStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteCanvasStore {
    /// Opens or creates a store at `path`, creating the schema if absent.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    /// Like [`SqliteCanvasStore::open`] with explicit connection settings.
    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> PersistResult<Self> {
        let path = path.as_ref();

        // Schema and journal mode are set up once, before the pool exists.
        let conn = Connection::open(path)?;
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        drop(conn);

        let pool = Pool::builder()
            .max_size(options.max_connections.max(1))
            .min_idle(Some(1))
            .connection_customizer(Box::new(ConnectionSetup {
                busy_timeout: options.busy_timeout,
            }))
            .build(SqliteConnectionManager::file(path))?;

        info!(
            path = %path.display(),
            max_connections = options.max_connections,
            "opened canvas store"
        );
        Ok(Self { pool })
    }

    /// Opens a private in-memory store.
    ///
    /// The database lives in a single connection that is never recycled, so
    /// calls are serialized.
    pub fn open_in_memory() -> PersistResult<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .max_lifetime(None)
            .idle_timeout(None)
            .connection_customizer(Box::new(ConnectionSetup {
                busy_timeout: StoreOptions::default().busy_timeout,
            }))
            .build(SqliteConnectionManager::memory())?;
        pool.get()?.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { pool })
    }

    fn conn(&self) -> PersistResult<PooledConn> {
        Ok(self.pool.get()?)
    }

    fn query_one(&self, sql: &str, name: Option<&str>) -> PersistResult<Option<Canvas>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let row = match name {
            Some(name) => stmt.query_row(params![name], canvas_from_row),
            None => stmt.query_row([], canvas_from_row),
        };
        Ok(row.optional()?)
    }
}

impl CanvasStore for SqliteCanvasStore {
    fn insert(&self, canvas: &Canvas) -> PersistResult<()> {
        let conn = self.conn()?;
        match conn.execute(INSERT_SQL, params![
            canvas.name,
            canvas.created.timestamp_millis(),
            canvas.resolution.is_hd(),
            canvas.pixels,
            canvas.shade,
        ]) {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(PersistError::Conflict {
                name: canvas.name.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn bulk_insert(&self, canvases: &[Canvas]) -> PersistResult<BulkReport> {
        let mut report = BulkReport::default();
        if canvases.is_empty() {
            return Ok(report);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(INSERT_SQL)?;
            for canvas in canvases {
                match stmt.execute(params![
                    canvas.name,
                    canvas.created.timestamp_millis(),
                    canvas.resolution.is_hd(),
                    canvas.pixels,
                    canvas.shade,
                ]) {
                    Ok(_) => report.inserted += 1,
                    Err(err) if is_unique_violation(&err) => {
                        debug!(name = %canvas.name, "skipping canvas that already exists");
                        report.skipped.push(canvas.name.clone());
                    }
                    // Dropping `tx` on the way out rolls the batch back.
                    Err(err) => return Err(err.into()),
                }
            }
        }
        tx.commit()?;

        info!(
            inserted = report.inserted,
            skipped = report.skipped.len(),
            "bulk insert committed"
        );
        Ok(report)
    }

    fn get_by_name(&self, name: &str) -> PersistResult<Option<Canvas>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM canvases c WHERE c.name = ?1");
        self.query_one(&sql, Some(name))
    }

    fn get_random(&self) -> PersistResult<Option<Canvas>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM canvases c ORDER BY RANDOM() LIMIT 1");
        self.query_one(&sql, None)
    }

    fn get_latest(&self) -> PersistResult<Option<Canvas>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM canvases c ORDER BY c.created_ms DESC, c.id DESC LIMIT 1"
        );
        self.query_one(&sql, None)
    }

    fn get_page(&self, query: &PageQuery) -> PersistResult<Vec<Canvas>> {
        let dir = query.order.as_sql();
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
        let search = query.search.as_deref().map(fts_query).filter(|q| !q.is_empty());
        let conn = self.conn()?;

        let rows = match search {
            Some(fts) => {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM canvases_fts \
                     JOIN canvases c ON c.id = canvases_fts.rowid \
                     WHERE canvases_fts MATCH ?1 \
                     ORDER BY canvases_fts.rank, c.created_ms {dir}, c.id {dir} \
                     LIMIT ?2 OFFSET ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![fts, limit, offset], canvas_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM canvases c \
                     ORDER BY c.created_ms {dir}, c.id {dir} \
                     LIMIT ?1 OFFSET ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![limit, offset], canvas_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }

    fn delete(&self, name: &str) -> PersistResult<bool> {
        let removed = self
            .conn()?
            .execute("DELETE FROM canvases WHERE name = ?1", params![name])?;
        Ok(removed > 0)
    }

    fn count(&self) -> PersistResult<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM canvases", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// Builds an FTS5 MATCH expression from free text.
///
/// Every word becomes a quoted phrase so search syntax in user input is
/// inert. Boolean operators pass through only between two words; leading,
/// trailing and repeated operators are dropped.
pub fn fts_query(search: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in search.split_whitespace() {
        if FTS_OPERATORS.contains(&token) {
            if !parts.is_empty() && pending_op.is_none() {
                pending_op = Some(token);
            }
            continue;
        }
        if let Some(op) = pending_op.take() {
            parts.push(op.to_string());
        }
        parts.push(format!("\"{}\"", token.replace('"', "\"\"")));
    }
    parts.join(" ")
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn canvas_from_row(row: &Row<'_>) -> rusqlite::Result<Canvas> {
    let created_ms: i64 = row.get(1)?;
    let created = DateTime::from_timestamp_millis(created_ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Integer,
            Box::new(std::io::Error::other(format!("timestamp out of range: {created_ms}"))),
        )
    })?;
    let hd: bool = row.get(2)?;
    Ok(Canvas {
        name: row.get(0)?,
        created,
        resolution: Resolution::from_hd(hd),
        pixels: row.get(3)?,
        shade: row.get(4)?,
    })
}
