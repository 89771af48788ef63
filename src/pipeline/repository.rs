use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Candidate, CandidateId, DeferredSend, EmailTemplate, EmailWorkflow, TemplateId, UserId,
    WorkflowExecution, WorkflowId,
};

/// Error enumeration for pipeline store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction over candidates, workflows, templates, the
/// execution log, and deferred sends, so the services can be exercised in
/// isolation. Implementations are keyed by opaque ids and scoped per
/// owning user where noted.
pub trait PipelineRepository: Send + Sync {
    fn insert_candidate(&self, candidate: Candidate) -> Result<Candidate, StoreError>;
    fn candidate(&self, id: &CandidateId) -> Result<Option<Candidate>, StoreError>;
    fn update_candidate(&self, candidate: Candidate) -> Result<(), StoreError>;

    fn insert_workflow(&self, workflow: EmailWorkflow) -> Result<EmailWorkflow, StoreError>;
    fn workflow(&self, id: &WorkflowId) -> Result<Option<EmailWorkflow>, StoreError>;
    /// Every workflow owned by `user`, enabled or not.
    fn workflows_for_user(&self, user: &UserId) -> Result<Vec<EmailWorkflow>, StoreError>;

    fn insert_template(&self, template: EmailTemplate) -> Result<EmailTemplate, StoreError>;
    fn template(&self, id: &TemplateId) -> Result<Option<EmailTemplate>, StoreError>;
    fn templates_for_user(&self, user: &UserId) -> Result<Vec<EmailTemplate>, StoreError>;

    /// Append to the immutable execution log.
    fn record_execution(&self, execution: WorkflowExecution) -> Result<(), StoreError>;
    fn executions_for_candidate(
        &self,
        id: &CandidateId,
    ) -> Result<Vec<WorkflowExecution>, StoreError>;

    /// Durably schedule a delayed send.
    fn schedule_send(&self, send: DeferredSend) -> Result<(), StoreError>;
    /// Remove and return every deferred send due at or before `now`.
    fn take_due_sends(&self, now: DateTime<Utc>) -> Result<Vec<DeferredSend>, StoreError>;
}

/// Lookup seam the stage transition guard uses to learn whether a
/// candidate has an active offer on file. Implemented by offer stores.
pub trait ActiveOfferLookup: Send + Sync {
    fn has_active_offer(&self, candidate: &CandidateId) -> Result<bool, StoreError>;
}

/// A fully rendered message handed to the delivery transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub from_name: String,
    pub subject: String,
    pub body: String,
    pub metadata: BTreeMap<String, String>,
}

/// Receipt returned by the delivery transport on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailReceipt {
    pub message_id: String,
}

/// Delivery failure surfaced by the transport.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("recipient address rejected: {0}")]
    InvalidRecipient(String),
    #[error("email transport unavailable: {0}")]
    Transport(String),
}

/// Trait describing the outbound email capability. Delivery internals
/// (SMTP, provider APIs) live behind this seam.
pub trait EmailSender: Send + Sync {
    fn send(&self, email: OutboundEmail) -> Result<EmailReceipt, SendError>;
}
