//! SQLite credential repository.
//!
//! The credential lives in a single-row `vault` table; the `CHECK`
//! constraint on the primary key makes a second row impossible.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use gmvault_common::{Error, Result};

use crate::record::{CredentialRecord, CREDENTIAL_ID};
use crate::repository::CredentialRepository;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS vault (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    password_hash TEXT NOT NULL,
    salt TEXT NOT NULL,
    work_factor INTEGER NOT NULL,
    memory_cost INTEGER NOT NULL,
    parallelism INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

fn db_err(e: rusqlite::Error) -> Error {
    Error::Storage(format!("SQLite error: {}", e))
}

const INSERT: &str = r#"
INSERT INTO vault
(id, password_hash, salt, work_factor, memory_cost, parallelism, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;

const UPSERT_SUFFIX: &str = r#"
ON CONFLICT(id) DO UPDATE SET
    password_hash = excluded.password_hash,
    salt = excluded.salt,
    work_factor = excluded.work_factor,
    memory_cost = excluded.memory_cost,
    parallelism = excluded.parallelism,
    created_at = excluded.created_at,
    updated_at = excluded.updated_at
"#;

fn insert_record(conn: &Connection, sql: &str, record: &CredentialRecord) -> rusqlite::Result<()> {
    conn.execute(
        sql,
        params![
            CREDENTIAL_ID,
            record.password_hash,
            record.salt,
            record.work_factor,
            record.memory_cost,
            record.parallelism,
            record.created_at.to_rfc3339(),
            record.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Invalid stored timestamp: {}", e)))
}

/// Credential repository backed by a SQLite database.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Create or open the database and ensure the schema exists.
    ///
    /// # Errors
    /// - Database creation or schema failure
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        info!(path = %db_path.as_ref().display(), "Credential database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("SQLite connection lock poisoned".to_string()))
    }
}

impl CredentialRepository for SqliteRepository {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn load(&self) -> Result<Option<CredentialRecord>> {
        let conn = self.conn()?;
        let row = conn.query_row(
            r#"
            SELECT password_hash, salt, work_factor, memory_cost, parallelism,
                   created_at, updated_at
            FROM vault WHERE id = ?1
            "#,
            params![CREDENTIAL_ID],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        );

        match row {
            Ok((password_hash, salt, work_factor, memory_cost, parallelism, created, updated)) => {
                Ok(Some(CredentialRecord {
                    password_hash,
                    salt,
                    work_factor,
                    memory_cost,
                    parallelism,
                    created_at: parse_timestamp(&created)?,
                    updated_at: parse_timestamp(&updated)?,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    fn create(&self, record: &CredentialRecord) -> Result<()> {
        debug!("Creating credential record");
        let conn = self.conn()?;
        match insert_record(&conn, INSERT, record) {
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyInitialized)
            }
            result => result.map_err(db_err),
        }
    }

    fn save(&self, record: &CredentialRecord) -> Result<()> {
        debug!("Saving credential record");
        let conn = self.conn()?;
        let sql = format!("{}{}", INSERT, UPSERT_SUFFIX);
        insert_record(&conn, &sql, record).map_err(db_err)
    }
}
