//! Render pipeline: submit a job, poll it under a bounded budget, then
//! resolve the finished artifact to a signed URL.
//!
//! Each stage is usable on its own; [`RenderOrchestrator`] composes them into
//! one cancellable operation.

mod error;
mod orchestrator;
mod poller;
mod resolver;
mod submitter;

pub use error::{
    PollTransportError, RenderError, ResolutionError, SubmissionError, TIMEOUT_MESSAGE,
};
pub use orchestrator::{RenderHandle, RenderOptions, RenderOrchestrator, RenderStatus, RenderUpdate};
pub use poller::JobPoller;
pub use resolver::{ArtifactResolver, DEFAULT_URL_TTL_SECONDS, RenderedArtifact};
pub use submitter::JobSubmitter;
