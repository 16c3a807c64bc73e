//! ABOUTME: Job orchestration engine for download pipelines
//! ABOUTME: Job store, playlist merger, pipeline state machine, and dispatcher

pub mod dispatcher;
pub mod merger;
pub mod model;
pub mod pipeline;
pub mod store;
#[cfg(test)]
mod testutil;

pub use dispatcher::{CancelSignal, Dispatcher};
pub use merger::{MergeItem, PlaylistMerger};
pub use model::{
    ExtraSpec, Job, JobRequest, JobStatus, JobTarget, PlaylistMode, StandaloneNameMode,
};
pub use pipeline::{run_job, PipelineContext};
pub use store::{CancelState, JobStore};
