//! Row-level access to `processing_jobs`.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A job row as stored. `result` holds serialized JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub status: String,
    pub file_name: String,
    pub file_type: String,
    pub template_id: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            status: row.get("status")?,
            file_name: row.get("file_name")?,
            file_type: row.get("file_type")?,
            template_id: row.get("template_id")?,
            result: row.get("result")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

const COLUMNS: &str =
    "id, status, file_name, file_type, template_id, result, error, created_at, updated_at";

pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            &format!(
                "INSERT INTO processing_jobs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                COLUMNS
            ),
            params![
                job.id,
                job.status,
                job.file_name,
                job.file_type,
                job.template_id,
                job.result,
                job.error,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Writes a status transition unless the job is already terminal.
///
/// Returns the number of rows changed: `0` means the job is missing or
/// already `completed`/`failed`.
pub fn update_status(
    db: &Database,
    id: &str,
    status: &str,
    result: Option<&str>,
    error: Option<&str>,
    updated_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE processing_jobs
             SET status = ?2, result = ?3, error = ?4, updated_at = ?5
             WHERE id = ?1 AND status NOT IN ('completed', 'failed')",
            params![id, status, result, error, updated_at],
        )?;
        Ok(changed)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM processing_jobs WHERE id = ?1", COLUMNS),
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Newest first. Rows sharing a timestamp keep insertion order reversed.
pub fn get_all(db: &Database) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM processing_jobs ORDER BY created_at DESC, rowid DESC",
            COLUMNS
        ))?;
        let rows = stmt
            .query_map([], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
