use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures_util::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info_span, Instrument};

use crate::ai::{DetectedField, DocumentAnalyzer, DocumentLayout, LanguageModel};
use crate::config::Config;
use crate::db::Database;
use crate::error::{DocmatchError, JobError, ProcessError, Result, TemplateError};
use crate::job::{JobLifecycle, JobStatus, ProcessingJob, TemplateStore};
use crate::matcher::{MatchOutcome, TemplateMatcher};
use crate::processor::{Extraction, ExtractionMetadata, ExtractorRegistry};
use crate::sanitize;
use crate::template::Template;

use super::config::PipelineSettings;
use super::upload::Upload;

const UNEXPECTED_FAILURE: &str = "Unexpected error during processing";
const STORE_RESULT_FAILURE: &str = "Failed to store result";

/// Suggested template structure for a sample document.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateAnalysis {
    pub fields: Vec<DetectedField>,
    pub metadata: ExtractionMetadata,
    pub suggestions: Value,
    pub layout: DocumentLayout,
}

/// What a run starts from: fresh bytes, or text kept from an earlier job.
enum RunInput {
    Upload(Upload),
    Extracted { text: String, metadata: Value },
}

/// Drives uploads from bytes to a terminal job.
///
/// Cloning is cheap; clones share the store, the model and the extractors.
/// Every run ends in exactly one `complete` or `fail` write.
#[derive(Clone)]
pub struct Pipeline {
    jobs: JobLifecycle,
    templates: Arc<dyn TemplateStore>,
    analyzer: DocumentAnalyzer,
    matcher: TemplateMatcher,
    documents: Arc<ExtractorRegistry>,
    samples: Arc<ExtractorRegistry>,
    max_upload_bytes: usize,
}

impl Pipeline {
    pub fn new(
        jobs: JobLifecycle,
        templates: Arc<dyn TemplateStore>,
        model: Arc<dyn LanguageModel>,
        settings: PipelineSettings,
    ) -> Self {
        let analyzer = DocumentAnalyzer::new(model, settings.max_input_chars);
        Self {
            jobs,
            templates,
            matcher: TemplateMatcher::new(analyzer.clone()),
            analyzer,
            documents: Arc::new(ExtractorRegistry::for_documents()),
            samples: Arc::new(ExtractorRegistry::with_ocr(&settings.ocr_languages)),
            max_upload_bytes: settings.max_upload_bytes,
        }
    }

    /// Production constructor: the database serves as job and template store,
    /// and the model comes from the `ai` section.
    pub fn from_config(config: &Config, db: Database, model: Arc<dyn LanguageModel>) -> Self {
        let store = Arc::new(db);
        Self::new(
            JobLifecycle::new(store.clone()),
            store,
            model,
            PipelineSettings::from_config(config),
        )
    }

    pub fn jobs(&self) -> &JobLifecycle {
        &self.jobs
    }

    pub fn templates(&self) -> &Arc<dyn TemplateStore> {
        &self.templates
    }

    /// Creates the job and runs it in the background on the current tokio
    /// runtime. The returned job is still `processing`; poll for the outcome.
    pub fn submit(&self, upload: Upload, template_id: Option<&str>) -> Result<ProcessingJob> {
        let (job, template) = self.accept(&upload, template_id)?;

        let pipeline = self.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            pipeline
                .run_to_completion(&job_id, RunInput::Upload(upload), template)
                .await;
        });

        Ok(job)
    }

    /// Runs a plain extraction inline and returns the terminal job.
    pub async fn process(&self, upload: Upload) -> Result<ProcessingJob> {
        self.process_inline(upload, None).await
    }

    /// Extraction followed by template matching, inline.
    ///
    /// An unknown template fails with `TemplateNotFound` before a job is
    /// created or the model is called.
    pub async fn process_with_template(
        &self,
        upload: Upload,
        template_id: &str,
    ) -> Result<ProcessingJob> {
        self.process_inline(upload, Some(template_id)).await
    }

    async fn process_inline(
        &self,
        upload: Upload,
        template_id: Option<&str>,
    ) -> Result<ProcessingJob> {
        let (job, template) = self.accept(&upload, template_id)?;
        self.run_to_completion(&job.id, RunInput::Upload(upload), template)
            .await;
        self.jobs.get_by_id(&job.id)
    }

    /// Matches the text stored by a completed job against a template, as a
    /// new job. The source job is left untouched.
    pub async fn reprocess_with_template(
        &self,
        source_job_id: &str,
        template_id: &str,
    ) -> Result<ProcessingJob> {
        let template = self.template(template_id)?;
        let source = self.jobs.get_by_id(source_job_id)?;

        if source.status != JobStatus::Completed {
            return Err(not_reusable(&source, format!("status is {}", source.status)));
        }
        let stored = source.result.as_ref();
        let text = stored
            .and_then(|r| r.get("text"))
            .and_then(Value::as_str)
            .ok_or_else(|| not_reusable(&source, "stored result has no extracted text".to_string()))?
            .to_string();
        let metadata = stored
            .and_then(|r| r.get("metadata"))
            .cloned()
            .unwrap_or_else(|| json!({}));

        let job = self
            .jobs
            .create(&source.file_name, &source.file_type, Some(&template.id))?;
        log::info!("Reprocessing job {} as {}", source.id, job.id);

        self.run_to_completion(
            &job.id,
            RunInput::Extracted { text, metadata },
            Some(template),
        )
        .await;
        self.jobs.get_by_id(&job.id)
    }

    /// Extracts a sample document (images included) and asks the model for a
    /// template structure. No job is created. Model failures leave the
    /// corresponding parts empty.
    pub async fn analyze_sample(&self, upload: Upload) -> Result<TemplateAnalysis> {
        upload.validate(self.max_upload_bytes)?;
        let span = info_span!(
            "analyze_sample",
            file = %sanitize::redact_path(Path::new(&upload.file_name))
        );
        self.suggest_structure(upload).instrument(span).await
    }

    async fn suggest_structure(&self, upload: Upload) -> Result<TemplateAnalysis> {
        let extraction = extract(Arc::clone(&self.samples), upload).await?;
        if extraction.text.trim().is_empty() {
            return Err(ProcessError::NoExtractableContent.into());
        }

        let analysis = match self
            .analyzer
            .analyze_document(&extraction.text, &extraction.metadata.doc_type)
            .await
        {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                log::warn!("Document analysis failed: {}", e);
                None
            }
        };

        let suggestions = match &analysis {
            Some(analysis) => self
                .analyzer
                .generate_field_suggestions(analysis)
                .await
                .unwrap_or_else(|e| {
                    log::warn!("Field suggestions failed: {}", e);
                    json!([])
                }),
            None => json!([]),
        };

        let analysis = analysis.unwrap_or_default();
        Ok(TemplateAnalysis {
            fields: analysis.fields,
            metadata: extraction.metadata,
            suggestions,
            layout: analysis.layout,
        })
    }

    fn template(&self, template_id: &str) -> Result<Template> {
        self.templates
            .template_by_id(template_id)?
            .ok_or_else(|| TemplateError::NotFound(template_id.to_string()).into())
    }

    /// Preconditions, then job creation. Nothing is written when they fail.
    fn accept(
        &self,
        upload: &Upload,
        template_id: Option<&str>,
    ) -> Result<(ProcessingJob, Option<Template>)> {
        upload.validate(self.max_upload_bytes)?;
        let template = template_id.map(|id| self.template(id)).transpose()?;

        let job = self.jobs.create(
            &upload.file_name,
            &upload.media_type,
            template.as_ref().map(|t| t.id.as_str()),
        )?;
        Ok((job, template))
    }

    /// Runs the stages and records the terminal state. Errors and panics
    /// inside the stages become a `fail` write.
    async fn run_to_completion(&self, job_id: &str, input: RunInput, template: Option<Template>) {
        let file_name = match &input {
            RunInput::Upload(upload) => sanitize::redact_path(Path::new(&upload.file_name)),
            RunInput::Extracted { .. } => "<stored>".to_string(),
        };
        let span = info_span!("pipeline", job_id = %job_id, file = %file_name);

        let outcome = AssertUnwindSafe(self.run_stages(input, template.as_ref()))
            .catch_unwind()
            .instrument(span)
            .await;

        let written = match outcome {
            Ok(Ok(result)) => match self.jobs.complete(job_id, result) {
                Err(DocmatchError::Job(e @ JobError::AlreadyTerminal { .. })) => Err(e.into()),
                Err(e) => {
                    log::error!("Could not store result for job {}: {}", job_id, e);
                    self.jobs
                        .fail(job_id, &format!("{}: {}", STORE_RESULT_FAILURE, e))
                }
                written => written,
            },
            Ok(Err(e)) => self.jobs.fail(job_id, &e.to_string()),
            Err(_) => {
                log::error!("Pipeline panicked for job {}", job_id);
                self.jobs.fail(job_id, UNEXPECTED_FAILURE)
            }
        };

        if let Err(e) = written {
            log::error!("Could not record terminal state for job {}: {}", job_id, e);
        }
    }

    async fn run_stages(&self, input: RunInput, template: Option<&Template>) -> Result<Value> {
        let (text, metadata) = match input {
            RunInput::Upload(upload) => {
                let extraction = extract(Arc::clone(&self.documents), upload).await?;
                let metadata = serde_json::to_value(&extraction.metadata)
                    .map_err(|e| ProcessError::extraction("document", e))?;
                (extraction.text, metadata)
            }
            RunInput::Extracted { text, metadata } => (text, metadata),
        };

        let Some(template) = template else {
            return Ok(json!({ "text": text, "metadata": metadata }));
        };

        if text.trim().is_empty() {
            return Err(ProcessError::NoExtractableContent.into());
        }

        let outcome = match self.matcher.match_document(&text, &metadata, template).await {
            outcome @ MatchOutcome::Completed { .. } => outcome,
            MatchOutcome::Error { error, metadata } => {
                log::warn!("Template match diagnostics: {}", metadata);
                return Err(DocmatchError::TemplateAnalysis(error));
            }
        };

        let mut result = outcome.to_json().map_err(|e| {
            DocmatchError::TemplateAnalysis(format!("result could not be serialized: {}", e))
        })?;
        // Kept so the job can be matched against another template later.
        if let Value::Object(fields) = &mut result {
            fields.insert("text".to_string(), Value::String(text));
        }
        Ok(result)
    }
}

fn not_reusable(job: &ProcessingJob, reason: String) -> DocmatchError {
    JobError::SourceNotReusable {
        id: job.id.clone(),
        reason,
    }
    .into()
}

/// Runs extraction on the blocking pool. The payload is dropped when it
/// returns.
async fn extract(registry: Arc<ExtractorRegistry>, upload: Upload) -> Result<Extraction> {
    let media_type = upload.media_type.clone();
    let extraction = tokio::task::spawn_blocking(move || {
        registry.extract(&upload.media_type, &upload.bytes)
    })
    .await
    .map_err(|e| ProcessError::extraction(&media_type, e))??;

    log::debug!(
        "Extracted {} chars from {} document",
        extraction.text.len(),
        extraction.metadata.doc_type
    );
    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ScriptedModel;
    use crate::error::AnalysisError;
    use crate::db::DatabaseError;
    use crate::job::{save_template, JobEvent, JobStore, NewJob};
    use crate::processor::format::{PDF_MEDIA_TYPE, XLSX_MEDIA_TYPE};
    use crate::processor::pdf::tests::build_pdf;
    use crate::processor::spreadsheet::tests::build_xlsx;
    use crate::template::tests::invoice_template;

    fn pipeline_with(model: Arc<ScriptedModel>) -> (Pipeline, Database) {
        let db = Database::open_in_memory().unwrap();
        let pipeline = Pipeline::from_config(&Config::default(), db.clone(), model);
        (pipeline, db)
    }

    fn pdf_upload(pages: &[&str]) -> Upload {
        Upload::new("invoice.pdf", PDF_MEDIA_TYPE, build_pdf(pages, Some("ACME")))
    }

    #[tokio::test]
    async fn test_pdf_without_template_completes_with_text() {
        let (pipeline, _) = pipeline_with(Arc::new(ScriptedModel::new()));

        let job = pipeline
            .process(pdf_upload(&["Invoice INV-1 Total 99.50"]))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        let result = job.result.unwrap();
        assert!(result["text"].as_str().unwrap().contains("INV-1"));
        assert_eq!(result["metadata"]["pageCount"], 1);
        assert_eq!(result["metadata"]["type"], "pdf");
        assert_eq!(job.error, None);
    }

    #[tokio::test]
    async fn test_spreadsheet_result_is_json_text() {
        let (pipeline, _) = pipeline_with(Arc::new(ScriptedModel::new()));
        let bytes = build_xlsx(
            &[(
                "Sheet1",
                r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Item</t></is></c></row><row r="2"><c r="A2"><v>5</v></c></row>"#,
            )],
            None,
        );

        let job = pipeline
            .process(Upload::new("items.xlsx", XLSX_MEDIA_TYPE, bytes))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        let result = job.result.unwrap();
        let table: Value = serde_json::from_str(result["text"].as_str().unwrap()).unwrap();
        assert_eq!(table["Sheet1"]["headers"], json!(["Item"]));
        assert_eq!(result["metadata"]["totalSheets"], 1);
    }

    #[tokio::test]
    async fn test_corrupt_pdf_fails_job() {
        let (pipeline, _) = pipeline_with(Arc::new(ScriptedModel::new()));

        let job = pipeline
            .process(Upload::new("bad.pdf", PDF_MEDIA_TYPE, b"%PDF-1.4 garbage".to_vec()))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.result, None);
        assert!(job.error.unwrap().starts_with("Failed to process PDF:"));
    }

    #[tokio::test]
    async fn test_unsupported_media_type_fails_after_creation() {
        let (pipeline, _) = pipeline_with(Arc::new(ScriptedModel::new()));

        let job = pipeline
            .process(Upload::new("notes.txt", "text/plain", b"hello".to_vec()))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("Unsupported file type: text/plain"));
    }

    #[tokio::test]
    async fn test_oversized_upload_creates_no_job() {
        let (pipeline, _) = pipeline_with(Arc::new(ScriptedModel::new()));
        let huge = Upload::new("big.pdf", PDF_MEDIA_TYPE, vec![b'x'; 10 * 1024 * 1024 + 1]);

        let err = pipeline.process(huge).await.unwrap_err();

        assert!(matches!(
            err,
            DocmatchError::Process(ProcessError::UploadTooLarge { .. })
        ));
        assert!(pipeline.jobs().get_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_template_fails_before_job_or_model() {
        let model = Arc::new(ScriptedModel::new());
        let (pipeline, _) = pipeline_with(model.clone());

        let err = pipeline
            .process_with_template(pdf_upload(&["text"]), "missing")
            .await
            .unwrap_err();

        assert!(matches!(err, DocmatchError::Template(TemplateError::NotFound(_))));
        assert_eq!(model.call_count(), 0);
        assert!(pipeline.jobs().get_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_template_match_completes() {
        let model = Arc::new(ScriptedModel::new().with_reply(
            r#"{ "invoice_number": { "value": "INV-1", "confidence": "high", "location": "page 1" },
                 "total": { "value": "99.50", "confidence": "high" } }"#,
        ));
        let (pipeline, db) = pipeline_with(model.clone());
        save_template(&db, invoice_template()).unwrap();

        let job = pipeline
            .process_with_template(pdf_upload(&["Invoice INV-1 Total 99.50"]), "tpl-invoice")
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.template_id.as_deref(), Some("tpl-invoice"));
        let result = job.result.unwrap();
        assert_eq!(result["status"], "completed");
        assert_eq!(result["result"]["template_used"], "tpl-invoice");
        assert_eq!(result["result"]["extracted_data"]["invoice_number"]["value"], "INV-1");
        assert_eq!(result["metadata"]["template_name"], "Supplier invoice");
        assert_eq!(result["metadata"]["pageCount"], 1);
        assert!(model.calls()[0].1.contains("INV-1"));
    }

    #[tokio::test]
    async fn test_model_failure_fails_job() {
        let model = Arc::new(ScriptedModel::new().with_error(AnalysisError::Provider("HTTP 500".to_string())));
        let (pipeline, db) = pipeline_with(model);
        save_template(&db, invoice_template()).unwrap();

        let job = pipeline
            .process_with_template(pdf_upload(&["Invoice"]), "tpl-invoice")
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.result, None);
        let error = job.error.unwrap();
        assert!(error.starts_with("Template analysis failed:"));
        assert!(error.contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_empty_text_with_template_is_no_content() {
        let model = Arc::new(ScriptedModel::new());
        let (pipeline, db) = pipeline_with(model.clone());
        save_template(&db, invoice_template()).unwrap();

        let job = pipeline
            .process_with_template(pdf_upload(&[""]), "tpl-invoice")
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_runs_in_background() {
        let (pipeline, _) = pipeline_with(Arc::new(ScriptedModel::new()));
        let mut events = pipeline.jobs().events().subscribe();

        let job = pipeline.submit(pdf_upload(&["Hello"]), None).unwrap();
        assert_eq!(job.status, JobStatus::Processing);

        loop {
            let event = events.recv().await.unwrap();
            if event.job_id == job.id && event.status.is_terminal() {
                assert_eq!(event.status, JobStatus::Completed);
                break;
            }
        }
        assert_eq!(
            pipeline.jobs().get_by_id(&job.id).unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_reprocess_creates_new_job_and_keeps_source() {
        let model = Arc::new(ScriptedModel::new().with_reply(r#"{ "total": { "value": "5", "confidence": "medium" } }"#));
        let (pipeline, db) = pipeline_with(model.clone());
        save_template(&db, invoice_template()).unwrap();
        let source = pipeline.process(pdf_upload(&["Total 5"])).await.unwrap();

        let job = pipeline
            .reprocess_with_template(&source.id, "tpl-invoice")
            .await
            .unwrap();

        assert_ne!(job.id, source.id);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.file_name, source.file_name);
        assert_eq!(job.result.unwrap()["metadata"]["pageCount"], 1);
        assert_eq!(pipeline.jobs().get_by_id(&source.id).unwrap(), source);
        assert!(model.calls()[0].1.contains("Total 5"));
    }

    #[tokio::test]
    async fn test_reprocess_checks_template_first() {
        let model = Arc::new(ScriptedModel::new());
        let (pipeline, _) = pipeline_with(model.clone());

        let err = pipeline
            .reprocess_with_template("no-such-job", "no-such-template")
            .await
            .unwrap_err();

        assert!(matches!(err, DocmatchError::Template(TemplateError::NotFound(_))));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reprocess_rejects_failed_source() {
        let (pipeline, db) = pipeline_with(Arc::new(ScriptedModel::new()));
        save_template(&db, invoice_template()).unwrap();
        let failed = pipeline
            .process(Upload::new("bad.pdf", PDF_MEDIA_TYPE, b"junk".to_vec()))
            .await
            .unwrap();

        let err = pipeline
            .reprocess_with_template(&failed.id, "tpl-invoice")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DocmatchError::Job(JobError::SourceNotReusable { .. })
        ));
        assert_eq!(pipeline.jobs().get_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_sample_returns_structure() {
        let model = Arc::new(
            ScriptedModel::new()
                .with_reply(r#"{ "documentType": "invoice", "fields": [ { "name": "total", "type": "currency" } ], "layout": { "sections": ["footer"] } }"#)
                .with_reply(r#"{ "rules": [] }"#),
        );
        let (pipeline, _) = pipeline_with(model);

        let analysis = pipeline
            .analyze_sample(pdf_upload(&["Total 12.00"]))
            .await
            .unwrap();

        assert_eq!(analysis.fields[0].name, "total");
        assert_eq!(analysis.layout.sections, ["footer"]);
        assert_eq!(analysis.metadata.doc_type, "pdf");
        assert_eq!(analysis.suggestions, json!({ "rules": [] }));
        assert!(pipeline.jobs().get_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_sample_degrades_on_model_failure() {
        let model = Arc::new(ScriptedModel::new().with_error(AnalysisError::RateLimited));
        let (pipeline, _) = pipeline_with(model.clone());

        let analysis = pipeline
            .analyze_sample(pdf_upload(&["Total 12.00"]))
            .await
            .unwrap();

        assert!(analysis.fields.is_empty());
        assert_eq!(analysis.suggestions, json!([]));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_analyze_sample_without_text() {
        let (pipeline, _) = pipeline_with(Arc::new(ScriptedModel::new()));

        let err = pipeline.analyze_sample(pdf_upload(&[""])).await.unwrap_err();

        assert!(matches!(
            err,
            DocmatchError::Process(ProcessError::NoExtractableContent)
        ));
    }

    /// Database-backed store that refuses every `completed` write.
    struct RejectsCompletion(Database);

    impl JobStore for RejectsCompletion {
        fn create_job(&self, job: NewJob) -> Result<ProcessingJob> {
            self.0.create_job(job)
        }

        fn update_job_status(
            &self,
            id: &str,
            status: JobStatus,
            result: Option<&Value>,
            error: Option<&str>,
        ) -> Result<ProcessingJob> {
            if status == JobStatus::Completed {
                return Err(DatabaseError::LockPoisoned.into());
            }
            self.0.update_job_status(id, status, result, error)
        }

        fn job_by_id(&self, id: &str) -> Result<Option<ProcessingJob>> {
            self.0.job_by_id(id)
        }

        fn all_jobs(&self) -> Result<Vec<ProcessingJob>> {
            self.0.all_jobs()
        }
    }

    struct PanickingModel;

    #[async_trait::async_trait]
    impl LanguageModel for PanickingModel {
        fn name(&self) -> String {
            "panicking".to_string()
        }

        async fn invoke(&self, _: &str, _: &str) -> std::result::Result<String, AnalysisError> {
            panic!("model crashed mid-request");
        }
    }

    fn terminal_events(
        events: &mut tokio::sync::broadcast::Receiver<JobEvent>,
        job_id: &str,
    ) -> Vec<JobEvent> {
        let mut terminal = Vec::new();
        while let Ok(event) = events.try_recv() {
            if event.job_id == job_id && event.status.is_terminal() {
                terminal.push(event);
            }
        }
        terminal
    }

    #[tokio::test]
    async fn test_failed_result_write_falls_back_to_fail() {
        let db = Database::open_in_memory().unwrap();
        let pipeline = Pipeline::new(
            JobLifecycle::new(Arc::new(RejectsCompletion(db.clone()))),
            Arc::new(db),
            Arc::new(ScriptedModel::new()),
            PipelineSettings::default(),
        );
        let mut events = pipeline.jobs().events().subscribe();

        let job = pipeline.process(pdf_upload(&["Invoice INV-3"])).await.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.result, None);
        let error = job.error.unwrap();
        assert!(error.starts_with("Failed to store result:"), "{}", error);
        assert!(error.contains("lock poisoned"));
        let terminal = terminal_events(&mut events, &job.id);
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_panic_in_stage_fails_job_once() {
        let db = Database::open_in_memory().unwrap();
        let pipeline = Pipeline::from_config(&Config::default(), db.clone(), Arc::new(PanickingModel));
        save_template(&db, invoice_template()).unwrap();
        let mut events = pipeline.jobs().events().subscribe();

        let job = pipeline
            .process_with_template(pdf_upload(&["Invoice INV-4"]), "tpl-invoice")
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(UNEXPECTED_FAILURE));
        assert_eq!(job.result, None);
        assert_eq!(terminal_events(&mut events, &job.id).len(), 1);
        assert!(matches!(
            pipeline.jobs().fail(&job.id, "again"),
            Err(DocmatchError::Job(JobError::AlreadyTerminal { .. }))
        ));
    }

    #[tokio::test]
    async fn test_template_result_keeps_text_for_reprocessing() {
        let model = Arc::new(
            ScriptedModel::new()
                .with_reply(r#"{ "invoice_number": "INV-5" }"#)
                .with_reply(r#"{ "invoice_number": "INV-5", "total": "12 EUR" }"#),
        );
        let (pipeline, db) = pipeline_with(model.clone());
        save_template(&db, invoice_template()).unwrap();
        let first = pipeline
            .process_with_template(pdf_upload(&["Invoice INV-5 total 12 EUR"]), "tpl-invoice")
            .await
            .unwrap();
        assert!(first.result.as_ref().unwrap()["text"]
            .as_str()
            .unwrap()
            .contains("INV-5"));

        let second = pipeline
            .reprocess_with_template(&first.id, "tpl-invoice")
            .await
            .unwrap();

        assert_eq!(second.status, JobStatus::Completed);
        let result = second.result.unwrap();
        assert_eq!(result["result"]["extracted_data"]["total"]["value"]["currency"], "EUR");
        assert!(model.calls()[1].1.contains("INV-5"));
    }
}
