//! Processing job state machine and its storage contracts.

pub mod events;
pub mod lifecycle;
pub mod model;
pub mod store;

pub use events::{JobEvent, JobEventBroadcaster};
pub use lifecycle::JobLifecycle;
pub use model::{JobStatus, NewJob, ProcessingJob};
pub use store::{save_template, JobStore, TemplateStore};
