//! `SQLite` schema bootstrap.
//!
//! Every statement is idempotent, so this runs on each startup.

use crate::StorageError;
use sqlx::SqlitePool;
use tracing::debug;

const DDL: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS drivers (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        name            TEXT NOT NULL,
        age             INTEGER NOT NULL,
        gender          TEXT NOT NULL,
        license_no      TEXT NOT NULL,
        place           TEXT NOT NULL,
        phone           TEXT NOT NULL,
        username        TEXT NOT NULL UNIQUE,
        password_hash   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS journeys (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        driver_id        INTEGER NOT NULL REFERENCES drivers(id),
        start_time       TEXT NOT NULL,
        end_time         TEXT,
        drowsiness_count INTEGER NOT NULL DEFAULT 0,
        journey_status   TEXT NOT NULL CHECK(journey_status IN ('Active','Completed'))
    )",
    "CREATE INDEX IF NOT EXISTS idx_journeys_driver ON journeys (driver_id, start_time)",
    "CREATE TABLE IF NOT EXISTS admins (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        username        TEXT NOT NULL UNIQUE,
        password_hash   TEXT NOT NULL
    )",
];

/// Create all tables if they do not exist yet
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<(), StorageError> {
    for statement in DDL {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!("Schema bootstrapped");
    Ok(())
}
