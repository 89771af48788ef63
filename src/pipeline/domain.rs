use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for candidates moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub String);

/// Identifier wrapper for the recruiter account owning workflows and offers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for configured email workflows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

/// Identifier wrapper for reusable email templates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

/// Identifier wrapper for the job a candidate applied to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

/// Discrete position of a candidate in the hiring pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStage {
    New,
    Screening,
    Interview,
    Offer,
    Hired,
    Rejected,
}

impl CandidateStage {
    pub const fn label(self) -> &'static str {
        match self {
            CandidateStage::New => "new",
            CandidateStage::Screening => "screening",
            CandidateStage::Interview => "interview",
            CandidateStage::Offer => "offer",
            CandidateStage::Hired => "hired",
            CandidateStage::Rejected => "rejected",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Some(CandidateStage::New),
            "screening" => Some(CandidateStage::Screening),
            "interview" => Some(CandidateStage::Interview),
            "offer" => Some(CandidateStage::Offer),
            "hired" => Some(CandidateStage::Hired),
            "rejected" => Some(CandidateStage::Rejected),
            _ => None,
        }
    }

    /// The single authoritative stage-to-template-type mapping. Both the
    /// template resolver and workflow validation consume this table so the
    /// two can never drift apart.
    pub const fn allowed_template_types(self) -> &'static [TemplateType] {
        match self {
            CandidateStage::New => &[],
            CandidateStage::Screening => &[TemplateType::Screening],
            CandidateStage::Interview => &[TemplateType::Interview, TemplateType::Reschedule],
            CandidateStage::Offer => &[TemplateType::Offer],
            CandidateStage::Hired => &[TemplateType::Hired],
            CandidateStage::Rejected => &[TemplateType::Rejection],
        }
    }
}

/// Semantic tag restricting where a template may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    Screening,
    Interview,
    Reschedule,
    Offer,
    OfferAccepted,
    OfferDeclined,
    CounterOfferResponse,
    Hired,
    Rejection,
    Custom,
}

impl TemplateType {
    pub const fn label(self) -> &'static str {
        match self {
            TemplateType::Screening => "screening",
            TemplateType::Interview => "interview",
            TemplateType::Reschedule => "reschedule",
            TemplateType::Offer => "offer",
            TemplateType::OfferAccepted => "offer_accepted",
            TemplateType::OfferDeclined => "offer_declined",
            TemplateType::CounterOfferResponse => "counter_offer_response",
            TemplateType::Hired => "hired",
            TemplateType::Rejection => "rejection",
            TemplateType::Custom => "custom",
        }
    }

    /// Types reserved for the offer negotiation machine. They can never be
    /// attached to a stage-triggered workflow.
    pub const fn offer_driven(self) -> bool {
        matches!(
            self,
            TemplateType::OfferAccepted
                | TemplateType::OfferDeclined
                | TemplateType::CounterOfferResponse
        )
    }
}

/// A candidate record as the pipeline sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub user_id: UserId,
    pub full_name: String,
    pub email: String,
    pub position_title: String,
    pub stage: CandidateStage,
    /// Free-text origin, e.g. "LinkedIn". Compared case-sensitively against
    /// workflow source filters.
    pub source: Option<String>,
    /// CV match score in 0..=100. Absent when no CV has been scored yet.
    pub match_score: Option<u8>,
}

/// Reusable subject/body pair with `{placeholder}` tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: TemplateId,
    pub user_id: UserId,
    pub template_type: TemplateType,
    pub subject: String,
    pub body: String,
}

/// User-configured rule binding a trigger stage, optional filters, and a
/// template, used to auto-notify candidates on stage entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailWorkflow {
    pub id: WorkflowId,
    pub user_id: UserId,
    pub name: String,
    pub trigger_stage: CandidateStage,
    pub template_id: TemplateId,
    pub min_match_score: Option<u8>,
    /// OR-matched set of candidate sources; empty matches any source.
    pub source_filter: Vec<String>,
    pub enabled: bool,
    pub delay_minutes: u32,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a single attempted workflow send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Sent,
    Failed,
    Skipped,
}

impl ExecutionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Sent => "sent",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Skipped => "skipped",
        }
    }
}

/// Immutable execution-log record. Appended once per attempted send; never
/// rewritten afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub workflow_id: WorkflowId,
    pub candidate_id: CandidateId,
    pub template_type: TemplateType,
    pub status: ExecutionStatus,
    pub executed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Durable schedule entry for a delayed workflow send. Swept by the
/// dispatcher; redelivery is idempotent because dispatch re-checks the
/// execution log before sending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredSend {
    pub workflow_id: WorkflowId,
    pub candidate_id: CandidateId,
    pub user_id: UserId,
    pub stage: CandidateStage,
    pub due_at: DateTime<Utc>,
}

/// Context snapshot an interview scheduler hands the pipeline when a
/// transition carries meeting details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewDetails {
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub duration: Option<String>,
    pub kind: Option<String>,
    pub meeting_link: Option<String>,
    pub address: Option<String>,
}
