//! libSQL backend: async `RegistrationStore` implementation.
//!
//! Supports local file and in-memory databases. Uniqueness per user is
//! enforced by the `registrations.user_id` primary key, so duplicate records
//! are impossible even across processes sharing one database file.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::dialog::UserId;
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{RegistrationRecord, RegistrationStore};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Map a libsql Row to a RegistrationRecord.
///
/// Column order matches REGISTRATION_COLUMNS.
fn row_to_registration(row: &libsql::Row) -> Result<RegistrationRecord, libsql::Error> {
    let registered_str: String = row.get(3)?;
    Ok(RegistrationRecord {
        user_id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        registered_at: parse_datetime(&registered_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const REGISTRATION_COLUMNS: &str = "user_id, name, phone, registered_at";

#[async_trait]
impl RegistrationStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn registration_exists(&self, user_id: UserId) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT 1 FROM registrations WHERE user_id = ?1 LIMIT 1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("registration_exists: {e}")))?;

        match rows.next().await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(e) => Err(DatabaseError::Query(format!("registration_exists: {e}"))),
        }
    }

    async fn register_if_absent(&self, record: &RegistrationRecord) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let affected = conn
            .execute(
                "INSERT INTO registrations (user_id, name, phone, registered_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id) DO NOTHING",
                params![
                    record.user_id,
                    record.name.as_str(),
                    record.phone.as_str(),
                    record.registered_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("register_if_absent: {e}")))?;

        let inserted = affected > 0;
        debug!(user_id = record.user_id, inserted, "register_if_absent");
        Ok(inserted)
    }

    async fn list_registrations(&self) -> Result<Vec<RegistrationRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {REGISTRATION_COLUMNS} FROM registrations ORDER BY registered_at ASC, user_id ASC"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_registrations: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_registrations: {e}")))?
        {
            records.push(
                row_to_registration(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_registrations row: {e}")))?,
            );
        }
        Ok(records)
    }

    async fn count_registrations(&self) -> Result<usize, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query("SELECT COUNT(*) FROM registrations", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_registrations: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("count_registrations row: {e}")))?;
                Ok(count as usize)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_registrations: {e}"))),
        }
    }
}
