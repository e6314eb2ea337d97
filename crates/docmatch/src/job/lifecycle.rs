use std::sync::Arc;

use serde_json::Value;

use crate::error::{JobError, Result};
use crate::job::events::{JobEvent, JobEventBroadcaster};
use crate::job::model::{JobStatus, NewJob, ProcessingJob};
use crate::job::store::JobStore;

/// Sole writer of job state.
///
/// Jobs start in `processing`; `complete` and `fail` are the only exits and
/// both are final.
#[derive(Clone)]
pub struct JobLifecycle {
    store: Arc<dyn JobStore>,
    events: JobEventBroadcaster,
}

impl JobLifecycle {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self::with_events(store, JobEventBroadcaster::default())
    }

    pub fn with_events(store: Arc<dyn JobStore>, events: JobEventBroadcaster) -> Self {
        Self { store, events }
    }

    pub fn events(&self) -> &JobEventBroadcaster {
        &self.events
    }

    pub fn create(
        &self,
        file_name: &str,
        file_type: &str,
        template_id: Option<&str>,
    ) -> Result<ProcessingJob> {
        let job = self.store.create_job(NewJob {
            status: JobStatus::Processing,
            file_name: file_name.to_string(),
            file_type: file_type.to_string(),
            template_id: template_id.map(str::to_string),
        })?;

        log::info!("Created job {} for {}", job.id, file_type);
        self.events.send(JobEvent::from_job(&job));
        Ok(job)
    }

    pub fn complete(&self, id: &str, result: Value) -> Result<ProcessingJob> {
        let job = self
            .store
            .update_job_status(id, JobStatus::Completed, Some(&result), None)?;

        log::info!("Job {} completed", id);
        self.events.send(JobEvent::from_job(&job));
        Ok(job)
    }

    pub fn fail(&self, id: &str, error: &str) -> Result<ProcessingJob> {
        let job = self
            .store
            .update_job_status(id, JobStatus::Failed, None, Some(error))?;

        log::warn!("Job {} failed: {}", id, error);
        self.events.send(JobEvent::from_job(&job));
        Ok(job)
    }

    pub fn get_by_id(&self, id: &str) -> Result<ProcessingJob> {
        self.store
            .job_by_id(id)?
            .ok_or_else(|| JobError::NotFound(id.to_string()).into())
    }

    /// Most recent first.
    pub fn get_all(&self) -> Result<Vec<ProcessingJob>> {
        self.store.all_jobs()
    }
}
