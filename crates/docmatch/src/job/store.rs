//! Storage contracts for jobs and templates, implemented by [`Database`].

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::db::job_repo::{self, JobRow};
use crate::db::template_repo::{self, TemplateRow};
use crate::db::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::error::{JobError, Result};
use crate::job::model::{JobStatus, NewJob, ProcessingJob};
use crate::template::{FieldDefinition, Template};

pub trait JobStore: Send + Sync {
    /// Assigns the id and timestamps.
    fn create_job(&self, job: NewJob) -> Result<ProcessingJob>;

    /// Fails with `AlreadyTerminal` when the job is `completed` or `failed`.
    fn update_job_status(
        &self,
        id: &str,
        status: JobStatus,
        result: Option<&Value>,
        error: Option<&str>,
    ) -> Result<ProcessingJob>;

    fn job_by_id(&self, id: &str) -> Result<Option<ProcessingJob>>;

    /// Newest first.
    fn all_jobs(&self) -> Result<Vec<ProcessingJob>>;
}

/// Read side used by the pipeline. Templates are written only by
/// administrative helpers such as [`save_template`].
pub trait TemplateStore: Send + Sync {
    fn template_by_id(&self, id: &str) -> Result<Option<Template>>;

    fn all_templates(&self) -> Result<Vec<Template>>;
}

impl JobStore for Database {
    fn create_job(&self, job: NewJob) -> Result<ProcessingJob> {
        let now = format_timestamp(Utc::now());
        let row = JobRow {
            id: Uuid::new_v4().to_string(),
            status: job.status.as_str().to_string(),
            file_name: job.file_name,
            file_type: job.file_type,
            template_id: job.template_id,
            result: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
        };
        job_repo::insert(self, &row)?;
        Ok(job_from_row(row)?)
    }

    fn update_job_status(
        &self,
        id: &str,
        status: JobStatus,
        result: Option<&Value>,
        error: Option<&str>,
    ) -> Result<ProcessingJob> {
        let result = result
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DatabaseError::Corrupt {
                column: "result".to_string(),
                reason: e.to_string(),
            })?;
        let changed = job_repo::update_status(
            self,
            id,
            status.as_str(),
            result.as_deref(),
            error,
            &format_timestamp(Utc::now()),
        )?;

        let row = job_repo::find_by_id(self, id)?.ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if changed == 0 {
            return Err(JobError::AlreadyTerminal {
                id: id.to_string(),
                status: row.status,
            }
            .into());
        }
        Ok(job_from_row(row)?)
    }

    fn job_by_id(&self, id: &str) -> Result<Option<ProcessingJob>> {
        Ok(job_repo::find_by_id(self, id)?
            .map(job_from_row)
            .transpose()?)
    }

    fn all_jobs(&self) -> Result<Vec<ProcessingJob>> {
        let rows = job_repo::get_all(self)?;
        Ok(rows
            .into_iter()
            .map(job_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

impl TemplateStore for Database {
    fn template_by_id(&self, id: &str) -> Result<Option<Template>> {
        Ok(template_repo::find_by_id(self, id)?
            .map(template_from_row)
            .transpose()?)
    }

    fn all_templates(&self) -> Result<Vec<Template>> {
        let rows = template_repo::get_all(self)?;
        Ok(rows
            .into_iter()
            .map(template_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

/// Validates and stores a template, replacing any template with the same id.
/// A template without an id gets a fresh one.
pub fn save_template(db: &Database, mut template: Template) -> Result<Template> {
    if template.id.trim().is_empty() {
        template.id = Uuid::new_v4().to_string();
    }
    template.validate()?;

    let fields = serde_json::to_string(&template.fields).map_err(|e| DatabaseError::Corrupt {
        column: "fields".to_string(),
        reason: e.to_string(),
    })?;
    let row = TemplateRow {
        id: template.id.clone(),
        name: template.name.clone(),
        doc_type: template.doc_type.clone(),
        fields,
        created_at: format_timestamp(template.created_at),
        updated_at: template.updated_at.map(format_timestamp),
    };
    template_repo::upsert(db, &row)?;

    log::info!("Saved template '{}' ({})", template.name, template.id);
    Ok(template)
}

fn job_from_row(row: JobRow) -> std::result::Result<ProcessingJob, DatabaseError> {
    let status = row.status.parse::<JobStatus>().map_err(|reason| DatabaseError::Corrupt {
        column: "status".to_string(),
        reason,
    })?;
    let result = row
        .result
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(|e| DatabaseError::Corrupt {
            column: "result".to_string(),
            reason: e.to_string(),
        })?;

    Ok(ProcessingJob {
        id: row.id,
        status,
        file_name: row.file_name,
        file_type: row.file_type,
        template_id: row.template_id,
        result,
        error: row.error,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

fn template_from_row(row: TemplateRow) -> std::result::Result<Template, DatabaseError> {
    let fields: Vec<FieldDefinition> =
        serde_json::from_str(&row.fields).map_err(|e| DatabaseError::Corrupt {
            column: "fields".to_string(),
            reason: e.to_string(),
        })?;

    Ok(Template {
        id: row.id,
        name: row.name,
        doc_type: row.doc_type,
        fields,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: row.updated_at.as_deref().map(parse_timestamp).transpose()?,
    })
}
