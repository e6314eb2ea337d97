//! Row-level access to `templates`. Field definitions are stored as JSON.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRow {
    pub id: String,
    pub name: String,
    pub doc_type: String,
    pub fields: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl TemplateRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            doc_type: row.get("type")?,
            fields: row.get("fields")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub fn insert(db: &Database, template: &TemplateRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO templates (id, name, type, fields, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                template.id,
                template.name,
                template.doc_type,
                template.fields,
                template.created_at,
                template.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Inserts, or replaces everything but `created_at` of an existing row.
pub fn upsert(db: &Database, template: &TemplateRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO templates (id, name, type, fields, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                type = excluded.type,
                fields = excluded.fields,
                updated_at = excluded.updated_at",
            params![
                template.id,
                template.name,
                template.doc_type,
                template.fields,
                template.created_at,
                template.updated_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<TemplateRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM templates WHERE id = ?1",
                params![id],
                TemplateRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

pub fn get_all(db: &Database) -> Result<Vec<TemplateRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM templates ORDER BY name ASC, id ASC")?;
        let rows = stmt
            .query_map([], TemplateRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
