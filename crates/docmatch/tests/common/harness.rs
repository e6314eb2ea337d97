//! Isolated pipeline environment backed by a temporary SQLite file.

#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use docmatch::job::save_template;
use docmatch::{Config, Database, Pipeline, ScriptedModel, Template};

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub model: Arc<ScriptedModel>,
    pub pipeline: Pipeline,
}

impl TestHarness {
    /// A harness whose model has no replies queued.
    pub fn new() -> Self {
        Self::with_model(ScriptedModel::new())
    }

    pub fn with_model(model: ScriptedModel) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("docmatch.db"))
            .expect("Failed to open database");
        let model = Arc::new(model);
        let pipeline = Pipeline::from_config(&Config::default(), db.clone(), model.clone());

        Self {
            temp_dir,
            db,
            model,
            pipeline,
        }
    }

    pub fn add_template(&self, json: &str) -> Template {
        let template: Template = serde_json::from_str(json).expect("Invalid template JSON");
        save_template(&self.db, template).expect("Failed to save template")
    }
}
