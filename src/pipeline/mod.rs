//! Candidate pipeline: stages, stage-triggered email workflows, and the
//! guard/matcher/engine trio that decides whether, when, and with what
//! content a transition fires an outbound message.

pub mod domain;
pub(crate) mod engine;
pub(crate) mod guard;
pub(crate) mod matcher;
pub mod message;
pub mod repository;
pub mod router;
pub mod service;
pub mod templates;

#[cfg(test)]
mod tests;

pub use domain::{
    Candidate, CandidateId, CandidateStage, DeferredSend, EmailTemplate, EmailWorkflow,
    ExecutionStatus, InterviewDetails, JobId, TemplateId, TemplateType, UserId, WorkflowExecution,
    WorkflowId,
};
pub use engine::TestSendError;
pub use guard::TransitionRejection;
pub use message::MessageContext;
pub use repository::{
    ActiveOfferLookup, EmailReceipt, EmailSender, OutboundEmail, PipelineRepository, SendError,
    StoreError,
};
pub use router::pipeline_router;
pub use service::{
    NewCandidate, NewTemplate, NewWorkflow, PipelineService, PipelineServiceError,
    WorkflowConfigError,
};
pub use templates::{valid_templates_for_stage, TemplateSelection};
