//! Operations on per-profile task record lists.
//!
//! A profile's collection is ordered by `seq` descending, so index 0 is the
//! most recently appended record.  Records are compared byte for byte.

use rusqlite::{params, OptionalExtension, Transaction};
use tickler_shared::ProfileId;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// All records of a profile, newest first.
    pub fn list_task_records(&self, profile: &ProfileId) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(
            "SELECT record
             FROM task_records
             WHERE profile_id = ?1
             ORDER BY seq DESC",
        )?;

        let rows = stmt.query_map(params![profile.as_str()], |row| row.get(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Raw ids of every profile that owns at least one record.
    pub fn task_profile_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(
            "SELECT DISTINCT profile_id
             FROM task_records
             ORDER BY profile_id",
        )?;

        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Insert `record` at the head of the profile's collection.
    pub fn push_task_record(&self, profile: &ProfileId, record: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO task_records (id, profile_id, seq, record)
             VALUES (
                 ?1,
                 ?2,
                 (SELECT COALESCE(MAX(seq), 0) + 1 FROM task_records WHERE profile_id = ?2),
                 ?3
             )",
            params![Uuid::new_v4().simple().to_string(), profile.as_str(), record],
        )?;
        Ok(())
    }

    /// Overwrite the record at `index` in place.
    pub fn set_task_record_at(&self, profile: &ProfileId, index: usize, record: &str) -> Result<()> {
        let row_id: Option<String> = self
            .conn()
            .query_row(
                "SELECT id
                 FROM task_records
                 WHERE profile_id = ?1
                 ORDER BY seq DESC
                 LIMIT 1 OFFSET ?2",
                params![profile.as_str(), index as i64],
                |row| row.get(0),
            )
            .optional()?;

        let Some(row_id) = row_id else {
            let len = self.count_task_records(profile)?;
            return Err(StoreError::IndexOutOfRange { index, len });
        };

        self.conn().execute(
            "UPDATE task_records SET record = ?1 WHERE id = ?2",
            params![record, row_id],
        )?;
        Ok(())
    }

    /// Delete the first (newest) record equal to `record`.  Returns `true`
    /// if a row was deleted.
    pub fn remove_task_record(&self, profile: &ProfileId, record: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM task_records
             WHERE id = (
                 SELECT id FROM task_records
                 WHERE profile_id = ?1 AND record = ?2
                 ORDER BY seq DESC
                 LIMIT 1
             )",
            params![profile.as_str(), record],
        )?;
        Ok(affected > 0)
    }

    /// Replace the first record equal to `old` with `new` in one
    /// transaction.  Returns `false` when no record matched.
    pub fn swap_task_record(&mut self, profile: &ProfileId, old: &str, new: &str) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;
        let swapped = swap_in(&tx, profile, old, new)?;
        tx.commit()?;
        Ok(swapped)
    }

    pub fn count_task_records(&self, profile: &ProfileId) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM task_records WHERE profile_id = ?1",
            params![profile.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn swap_in(tx: &Transaction<'_>, profile: &ProfileId, old: &str, new: &str) -> Result<bool> {
    let row_id: Option<String> = tx
        .query_row(
            "SELECT id
             FROM task_records
             WHERE profile_id = ?1 AND record = ?2
             ORDER BY seq DESC
             LIMIT 1",
            params![profile.as_str(), old],
            |row| row.get(0),
        )
        .optional()?;

    let Some(row_id) = row_id else {
        return Ok(false);
    };
    tx.execute(
        "UPDATE task_records SET record = ?1 WHERE id = ?2",
        params![new, row_id],
    )?;
    Ok(true)
}
