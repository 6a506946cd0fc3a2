//! v001 -- Initial schema creation.
//!
//! Creates `task_records` (per-profile ordered task lists) and `kv`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Task records: one row per task, newest first by seq
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS task_records (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID, simple form
    profile_id TEXT NOT NULL,               -- owning profile uuid
    seq        INTEGER NOT NULL,            -- insertion order within the profile
    record     TEXT NOT NULL                -- JSON-encoded task
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_task_records_profile_seq
    ON task_records(profile_id, seq DESC);

-- ----------------------------------------------------------------
-- Key/value: profiles and user -> profile bindings
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS kv (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;

/// Apply the initial schema.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
