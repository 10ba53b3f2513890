//! Database Connection Management
//!
//! This module provides the database connection, schema initialization and
//! the SQL primitives of the nested-set engine, using libsql/Turso.
//!
//! # Architecture
//!
//! - **Table per kind**: every `HierarchyKind` has its own table and therefore
//!   its own boundary numbering space
//! - **WAL mode**: readers keep a consistent snapshot while a writer renumbers
//! - **Explicit transactions**: structural mutations run inside
//!   `BEGIN IMMEDIATE`, which takes SQLite's writer lock up front
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions** to avoid SQLite
//! thread-safety violations when the Tokio runtime moves futures between
//! threads. The busy timeout lets a second writer wait for the first instead
//! of failing immediately with `SQLITE_BUSY`.
//!
//! ```no_run
//! # use canopy_core::db::DatabaseService;
//! # use canopy_core::config::HierarchyConfig;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabaseService::new(&HierarchyConfig::with_database_path("./data/tree.db")).await?;
//! let conn = db.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # SQL Primitives
//!
//! The `db_*` methods take an open connection so the caller decides the
//! transaction boundary. They never commit or roll back on their own.

use crate::config::HierarchyConfig;
use crate::db::error::DatabaseError;
use crate::db::intervals::Span;
use crate::models::{HierarchyKind, Node, NodeId};
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Builder, Connection, Database, Row, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Column list shared by every node SELECT (order matters for `row_to_node`)
const NODE_COLUMNS: &str =
    "id, parent_id, lft, rgt, depth, ordering, attributes, created_at, modified_at";

/// Database service for managing the libsql connection and schema
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    busy_timeout_ms: u64,
}

/// Parameters for a node row insertion (avoids too-many-arguments lint)
pub struct DbInsertNodeParams<'a> {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub left: i64,
    pub right: i64,
    pub depth: i64,
    pub attributes: &'a str,
}

/// New numbering for one row, written by rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbNumbering {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub left: i64,
    pub right: i64,
    pub depth: i64,
    pub ordering: i64,
}

impl DatabaseService {
    /// Open (or create) the database described by `config`
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Create one table and its indexes per hierarchy kind
    /// 4. Enable WAL mode and the configured busy timeout
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(config: &HierarchyConfig) -> Result<Self, DatabaseError> {
        let db_path = config.database_path.clone();
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms: config.busy_timeout_ms,
        };

        service.initialize_schema(is_new_database).await?;

        tracing::debug!(path = %service.db_path.display(), "Hierarchy database ready");
        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Idempotent: every statement uses `IF NOT EXISTS`.
    ///
    /// `lft`/`rgt` deliberately carry no UNIQUE constraint: range shifts update
    /// rows one at a time, so boundaries collide transiently inside a statement.
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        for kind in HierarchyKind::ALL {
            let table = kind.table_name();
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        id TEXT PRIMARY KEY,
                        parent_id TEXT,
                        lft INTEGER NOT NULL,
                        rgt INTEGER NOT NULL,
                        depth INTEGER NOT NULL DEFAULT 0,
                        ordering INTEGER NOT NULL DEFAULT 0,
                        attributes JSON NOT NULL DEFAULT '{{}}',
                        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                        modified_at DATETIME DEFAULT CURRENT_TIMESTAMP
                    )"
                ),
                (),
            )
            .await
            .map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create table '{}': {}",
                    table, e
                ))
            })?;

            self.create_kind_indexes(&conn, kind).await?;
        }

        // Flush the fresh schema out of the WAL so a second handle on the same
        // file never sees a database without tables.
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Create the boundary and parent indexes for one kind
    ///
    /// `lft` and `rgt` serve the range scans of descendants/ancestors and the
    /// shift statements; `(parent_id, ordering)` serves children/siblings.
    async fn create_kind_indexes(
        &self,
        conn: &Connection,
        kind: HierarchyKind,
    ) -> Result<(), DatabaseError> {
        let table = kind.table_name();
        let indexes = [
            (format!("idx_{table}_lft"), "lft"),
            (format!("idx_{table}_rgt"), "rgt"),
            (format!("idx_{table}_parent"), "parent_id, ordering"),
        ];

        for (name, columns) in indexes {
            conn.execute(
                &format!("CREATE INDEX IF NOT EXISTS {name} ON {table}({columns})"),
                (),
            )
            .await
            .map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create index '{}': {}",
                    name, e
                ))
            })?;
        }

        Ok(())
    }

    /// Get a synchronous connection to the database
    ///
    /// **⚠️ WARNING**: Only use this in synchronous, single-threaded contexts.
    /// In async functions use `connect_with_timeout()` instead.
    pub fn connect(&self) -> Result<Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout configured
    ///
    /// **✅ RECOMMENDED** for all async code. The busy timeout makes a second
    /// writer wait for `BEGIN IMMEDIATE` instead of failing immediately.
    pub async fn connect_with_timeout(&self) -> Result<Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(
            &conn,
            &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms),
        )
        .await?;
        Ok(conn)
    }

    //
    // TRANSACTION CONTROL
    //

    /// Start a write transaction holding SQLite's reserved (writer) lock
    pub async fn begin_write(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|e| DatabaseError::from_libsql("Failed to begin write transaction", e))?;
        Ok(())
    }

    /// Start a read transaction; the snapshot is fixed by the first SELECT
    pub async fn begin_read(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute("BEGIN DEFERRED", ())
            .await
            .map_err(|e| DatabaseError::from_libsql("Failed to begin read transaction", e))?;
        Ok(())
    }

    pub async fn commit(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute("COMMIT", ())
            .await
            .map_err(|e| DatabaseError::from_libsql("Failed to commit transaction", e))?;
        Ok(())
    }

    /// Roll back the open transaction
    ///
    /// Failures are logged rather than returned: rollback runs on error paths
    /// where the original error is the one the caller needs.
    pub async fn rollback(conn: &Connection) {
        if let Err(e) = conn.execute("ROLLBACK", ()).await {
            tracing::warn!("Rollback failed: {}", e);
        }
    }

    //
    // NODE READS
    //

    /// Fetch nodes of `kind` matching a WHERE/ORDER BY tail
    ///
    /// `tail` is engine-authored SQL (never caller input); values travel as
    /// positional parameters.
    async fn db_select_nodes(
        conn: &Connection,
        kind: HierarchyKind,
        tail: &str,
        params: Vec<Value>,
    ) -> Result<Vec<Node>, DatabaseError> {
        let sql = format!("SELECT {} FROM {} {}", NODE_COLUMNS, kind.table_name(), tail);
        let mut rows = conn
            .query(&sql, params)
            .await
            .map_err(|e| DatabaseError::from_libsql(format!("Failed to query {}", kind), e))?;

        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::from_libsql("Failed to read row", e))?
        {
            nodes.push(row_to_node(kind, &row)?);
        }
        Ok(nodes)
    }

    /// Retrieve a single node by ID
    pub async fn db_get_node(
        conn: &Connection,
        kind: HierarchyKind,
        id: NodeId,
    ) -> Result<Option<Node>, DatabaseError> {
        let mut nodes =
            Self::db_select_nodes(conn, kind, "WHERE id = ?", vec![uuid_value(id)]).await?;
        Ok(nodes.pop())
    }

    /// Direct children, by sibling order
    pub async fn db_get_children(
        conn: &Connection,
        kind: HierarchyKind,
        parent_id: NodeId,
    ) -> Result<Vec<Node>, DatabaseError> {
        Self::db_select_nodes(
            conn,
            kind,
            "WHERE parent_id = ? ORDER BY ordering, lft",
            vec![uuid_value(parent_id)],
        )
        .await
    }

    /// Root nodes, by sibling order
    pub async fn db_get_roots(
        conn: &Connection,
        kind: HierarchyKind,
    ) -> Result<Vec<Node>, DatabaseError> {
        Self::db_select_nodes(
            conn,
            kind,
            "WHERE parent_id IS NULL ORDER BY ordering, lft",
            Vec::new(),
        )
        .await
    }

    /// Nodes sharing `parent_id` (NULL = roots) other than `exclude`
    pub async fn db_get_siblings(
        conn: &Connection,
        kind: HierarchyKind,
        parent_id: Option<NodeId>,
        exclude: NodeId,
    ) -> Result<Vec<Node>, DatabaseError> {
        Self::db_select_nodes(
            conn,
            kind,
            "WHERE parent_id IS ? AND id <> ? ORDER BY ordering, lft",
            vec![optional_uuid_value(parent_id), uuid_value(exclude)],
        )
        .await
    }

    /// Nodes strictly inside `span`, in pre-order
    pub async fn db_get_descendants(
        conn: &Connection,
        kind: HierarchyKind,
        span: Span,
    ) -> Result<Vec<Node>, DatabaseError> {
        Self::db_select_nodes(
            conn,
            kind,
            "WHERE lft > ? AND rgt < ? ORDER BY lft",
            vec![Value::Integer(span.left), Value::Integer(span.right)],
        )
        .await
    }

    /// Nodes whose interval strictly contains `span`, root first
    pub async fn db_get_ancestors(
        conn: &Connection,
        kind: HierarchyKind,
        span: Span,
    ) -> Result<Vec<Node>, DatabaseError> {
        Self::db_select_nodes(
            conn,
            kind,
            "WHERE lft < ? AND rgt > ? ORDER BY lft",
            vec![Value::Integer(span.left), Value::Integer(span.right)],
        )
        .await
    }

    /// Nodes inside `span` inclusive, in pre-order
    pub async fn db_get_span(
        conn: &Connection,
        kind: HierarchyKind,
        span: Span,
    ) -> Result<Vec<Node>, DatabaseError> {
        Self::db_select_nodes(
            conn,
            kind,
            "WHERE lft >= ? AND rgt <= ? ORDER BY lft",
            vec![Value::Integer(span.left), Value::Integer(span.right)],
        )
        .await
    }

    /// Every node of a kind ordered by `lft` (ties broken by id for determinism)
    pub async fn db_get_all(
        conn: &Connection,
        kind: HierarchyKind,
    ) -> Result<Vec<Node>, DatabaseError> {
        Self::db_select_nodes(conn, kind, "ORDER BY lft, id", Vec::new()).await
    }

    /// Largest boundary in the kind (0 when empty)
    pub async fn db_max_right(
        conn: &Connection,
        kind: HierarchyKind,
    ) -> Result<i64, DatabaseError> {
        Self::db_scalar(
            conn,
            &format!("SELECT COALESCE(MAX(rgt), 0) FROM {}", kind.table_name()),
        )
        .await
    }

    /// Number of rows in the kind
    pub async fn db_count(conn: &Connection, kind: HierarchyKind) -> Result<i64, DatabaseError> {
        Self::db_scalar(conn, &format!("SELECT COUNT(*) FROM {}", kind.table_name())).await
    }

    async fn db_scalar(conn: &Connection, sql: &str) -> Result<i64, DatabaseError> {
        let mut rows = conn
            .query(sql, ())
            .await
            .map_err(|e| DatabaseError::from_libsql(format!("Failed to execute '{}'", sql), e))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::from_libsql("Failed to read row", e))?
            .ok_or_else(|| DatabaseError::sql_execution(format!("No row returned by '{}'", sql)))?;
        row.get::<i64>(0)
            .map_err(|e| DatabaseError::malformed_row(format!("scalar: {}", e)))
    }

    //
    // NODE WRITES (caller owns the transaction)
    //

    /// Insert one node row with ordering 0; ordering is densified afterwards
    pub async fn db_insert_node(
        conn: &Connection,
        kind: HierarchyKind,
        params: DbInsertNodeParams<'_>,
    ) -> Result<(), DatabaseError> {
        conn.execute(
            &format!(
                "INSERT INTO {} (id, parent_id, lft, rgt, depth, ordering, attributes)
                 VALUES (?, ?, ?, ?, ?, 0, ?)",
                kind.table_name()
            ),
            vec![
                uuid_value(params.id),
                optional_uuid_value(params.parent_id),
                Value::Integer(params.left),
                Value::Integer(params.right),
                Value::Integer(params.depth),
                Value::Text(params.attributes.to_string()),
            ],
        )
        .await
        .map_err(|e| {
            DatabaseError::from_libsql(format!("Failed to insert node {}", params.id), e)
        })?;
        Ok(())
    }

    /// Add `delta` to every positive boundary `>= from`
    ///
    /// With positive `delta` this opens a gap at `from`; with `from = r + 1`
    /// and negative `delta` it closes the gap left by a removed span. Parked
    /// (negated) rows are never touched.
    pub async fn db_shift_boundaries(
        conn: &Connection,
        kind: HierarchyKind,
        from: i64,
        delta: i64,
    ) -> Result<u64, DatabaseError> {
        let table = kind.table_name();
        let mut touched = 0;
        for column in ["lft", "rgt"] {
            touched += conn
                .execute(
                    &format!(
                        "UPDATE {table} SET {column} = {column} + ?, modified_at = CURRENT_TIMESTAMP
                         WHERE {column} >= ? AND lft > 0"
                    ),
                    vec![Value::Integer(delta), Value::Integer(from)],
                )
                .await
                .map_err(|e| {
                    DatabaseError::from_libsql(format!("Failed to shift {} in {}", column, kind), e)
                })?;
        }
        Ok(touched)
    }

    /// Delete every row inside `span`, returning the number removed
    pub async fn db_delete_span(
        conn: &Connection,
        kind: HierarchyKind,
        span: Span,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE lft >= ? AND rgt <= ?",
                kind.table_name()
            ),
            vec![Value::Integer(span.left), Value::Integer(span.right)],
        )
        .await
        .map_err(|e| DatabaseError::from_libsql(format!("Failed to delete span in {}", kind), e))
    }

    /// Park a subtree on negated boundaries and apply its depth change
    pub async fn db_park_span(
        conn: &Connection,
        kind: HierarchyKind,
        span: Span,
        depth_delta: i64,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            &format!(
                "UPDATE {} SET lft = -lft, rgt = -rgt, depth = depth + ?,
                     modified_at = CURRENT_TIMESTAMP
                 WHERE lft >= ? AND rgt <= ?",
                kind.table_name()
            ),
            vec![
                Value::Integer(depth_delta),
                Value::Integer(span.left),
                Value::Integer(span.right),
            ],
        )
        .await
        .map_err(|e| DatabaseError::from_libsql(format!("Failed to park subtree in {}", kind), e))
    }

    /// Restore parked rows to positive boundaries shifted by `offset`
    pub async fn db_unpark(
        conn: &Connection,
        kind: HierarchyKind,
        offset: i64,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            &format!(
                "UPDATE {} SET lft = -lft + ?, rgt = -rgt + ? WHERE lft < 0",
                kind.table_name()
            ),
            vec![Value::Integer(offset), Value::Integer(offset)],
        )
        .await
        .map_err(|e| {
            DatabaseError::from_libsql(format!("Failed to restore subtree in {}", kind), e)
        })
    }

    /// Point a node at a new parent (NULL makes it a root)
    pub async fn db_set_parent(
        conn: &Connection,
        kind: HierarchyKind,
        id: NodeId,
        parent_id: Option<NodeId>,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            &format!(
                "UPDATE {} SET parent_id = ?, modified_at = CURRENT_TIMESTAMP WHERE id = ?",
                kind.table_name()
            ),
            vec![optional_uuid_value(parent_id), uuid_value(id)],
        )
        .await
        .map_err(|e| DatabaseError::from_libsql(format!("Failed to re-parent node {}", id), e))
    }

    /// Rewrite sibling `ordering` under `parent_id` as `0..n-1` in `lft` order
    pub async fn db_densify_ordering(
        conn: &Connection,
        kind: HierarchyKind,
        parent_id: Option<NodeId>,
    ) -> Result<u64, DatabaseError> {
        let table = kind.table_name();
        let parent = optional_uuid_value(parent_id);
        conn.execute(
            &format!(
                "UPDATE {table} SET ordering = (
                    SELECT COUNT(*) FROM {table} AS s
                    WHERE s.parent_id IS ? AND s.lft < {table}.lft
                 )
                 WHERE parent_id IS ?"
            ),
            vec![parent.clone(), parent],
        )
        .await
        .map_err(|e| {
            DatabaseError::from_libsql(format!("Failed to reorder siblings in {}", kind), e)
        })
    }

    /// Overwrite the structural columns of one row
    pub async fn db_write_numbering(
        conn: &Connection,
        kind: HierarchyKind,
        numbering: DbNumbering,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            &format!(
                "UPDATE {} SET parent_id = ?, lft = ?, rgt = ?, depth = ?, ordering = ?,
                        modified_at = CURRENT_TIMESTAMP
                 WHERE id = ?",
                kind.table_name()
            ),
            vec![
                optional_uuid_value(numbering.parent_id),
                Value::Integer(numbering.left),
                Value::Integer(numbering.right),
                Value::Integer(numbering.depth),
                Value::Integer(numbering.ordering),
                uuid_value(numbering.id),
            ],
        )
        .await
        .map_err(|e| {
            DatabaseError::from_libsql(format!("Failed to renumber node {}", numbering.id), e)
        })
    }

    /// Execute a raw statement (diagnostics and tests only)
    pub async fn db_execute_raw(&self, sql: &str) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(sql, ())
            .await
            .map_err(|e| DatabaseError::from_libsql(format!("Failed to execute '{}'", sql), e))
    }
}

fn uuid_value(id: NodeId) -> Value {
    Value::Text(id.to_string())
}

fn optional_uuid_value(id: Option<NodeId>) -> Value {
    match id {
        Some(id) => uuid_value(id),
        None => Value::Null,
    }
}

/// Parse timestamp from database - handles both SQLite and RFC3339 formats
///
/// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    Err(DatabaseError::malformed_row(format!(
        "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
        s
    )))
}

fn parse_uuid(column: &str, s: &str) -> Result<NodeId, DatabaseError> {
    NodeId::parse_str(s)
        .map_err(|e| DatabaseError::malformed_row(format!("{} '{}': {}", column, s, e)))
}

/// Convert libsql::Row to Node model
///
/// # Row Format
///
/// Expected columns (in order, see `NODE_COLUMNS`):
/// id, parent_id, lft, rgt, depth, ordering, attributes, created_at, modified_at
fn row_to_node(kind: HierarchyKind, row: &Row) -> Result<Node, DatabaseError> {
    let column = |name: &str, e: libsql::Error| {
        DatabaseError::malformed_row(format!("Failed to get {}: {}", name, e))
    };

    let id: String = row.get(0).map_err(|e| column("id", e))?;
    let parent_id: Option<String> = row.get(1).map_err(|e| column("parent_id", e))?;
    let left: i64 = row.get(2).map_err(|e| column("lft", e))?;
    let right: i64 = row.get(3).map_err(|e| column("rgt", e))?;
    let depth: i64 = row.get(4).map_err(|e| column("depth", e))?;
    let ordering: i64 = row.get(5).map_err(|e| column("ordering", e))?;
    let attributes_json: String = row.get(6).map_err(|e| column("attributes", e))?;
    let created_at: String = row.get(7).map_err(|e| column("created_at", e))?;
    let modified_at: String = row.get(8).map_err(|e| column("modified_at", e))?;

    let attributes = serde_json::from_str(&attributes_json).map_err(|e| {
        DatabaseError::malformed_row(format!("Failed to parse attributes JSON: {}", e))
    })?;

    Ok(Node {
        id: parse_uuid("id", &id)?,
        kind,
        parent_id: parent_id
            .as_deref()
            .map(|p| parse_uuid("parent_id", p))
            .transpose()?,
        left,
        right,
        depth,
        ordering,
        attributes,
        created_at: parse_timestamp(&created_at)?,
        modified_at: parse_timestamp(&modified_at)?,
    })
}
