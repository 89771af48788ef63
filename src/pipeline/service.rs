use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::CompanyConfig;

use super::domain::{
    Candidate, CandidateId, CandidateStage, EmailTemplate, EmailWorkflow, InterviewDetails,
    TemplateId, TemplateType, UserId, WorkflowExecution, WorkflowId,
};
use super::engine::{ExecutionEngine, TestSendError};
use super::guard::{authorize_transition, TransitionRejection};
use super::repository::{ActiveOfferLookup, EmailSender, PipelineRepository, StoreError};
use super::templates::{valid_templates_for_stage, TemplateSelection};

static CANDIDATE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static WORKFLOW_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static TEMPLATE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_candidate_id() -> CandidateId {
    let id = CANDIDATE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    CandidateId(format!("cand-{id:06}"))
}

fn next_workflow_id() -> WorkflowId {
    let id = WORKFLOW_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    WorkflowId(format!("wf-{id:06}"))
}

fn next_template_id() -> TemplateId {
    let id = TEMPLATE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TemplateId(format!("tpl-{id:06}"))
}

/// Intake payload for a sourced or directly applying candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCandidate {
    pub user_id: UserId,
    pub full_name: String,
    pub email: String,
    pub position_title: String,
    pub source: Option<String>,
}

/// Payload for creating a reusable email template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTemplate {
    pub user_id: UserId,
    pub template_type: TemplateType,
    pub subject: String,
    pub body: String,
}

/// Payload for configuring a stage-triggered workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub user_id: UserId,
    pub name: String,
    pub trigger_stage: CandidateStage,
    pub template_id: TemplateId,
    pub min_match_score: Option<u8>,
    #[serde(default)]
    pub source_filter: Vec<String>,
    pub enabled: bool,
    #[serde(default)]
    pub delay_minutes: u32,
}

/// Validation errors raised when configuring a workflow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowConfigError {
    #[error("workflows cannot trigger on the new stage")]
    TriggerStageNew,
    #[error("email template not found")]
    TemplateNotFound,
    #[error(
        "template type {} is driven by the offer machine and cannot be attached to a workflow",
        .0.label()
    )]
    OfferDrivenTemplate(TemplateType),
    #[error(
        "template type {} is not valid for stage {}",
        template.label(),
        stage.label()
    )]
    TypeMismatch {
        stage: CandidateStage,
        template: TemplateType,
    },
    #[error("an enabled workflow already exists for stage {}", .0.label())]
    DuplicateEnabledWorkflow(CandidateStage),
    #[error("match score must be between 0 and 100")]
    InvalidMatchScore,
}

/// Error raised by the pipeline service facade.
#[derive(Debug, thiserror::Error)]
pub enum PipelineServiceError {
    #[error("candidate not found")]
    CandidateNotFound,
    #[error(transparent)]
    Transition(#[from] TransitionRejection),
    #[error(transparent)]
    Workflow(#[from] WorkflowConfigError),
    #[error(transparent)]
    TestSend(#[from] TestSendError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Service composing the transition guard, workflow matcher, and execution
/// engine over a pipeline store and an offer lookup.
pub struct PipelineService<R, M, O> {
    repository: Arc<R>,
    offers: Arc<O>,
    engine: ExecutionEngine<R, M>,
}

impl<R, M, O> PipelineService<R, M, O>
where
    R: PipelineRepository + 'static,
    M: EmailSender + 'static,
    O: ActiveOfferLookup + 'static,
{
    pub fn new(repository: Arc<R>, mailer: Arc<M>, offers: Arc<O>, company: CompanyConfig) -> Self {
        let engine = ExecutionEngine::new(repository.clone(), mailer, company);
        Self {
            repository,
            offers,
            engine,
        }
    }

    /// Register a candidate. New candidates always enter at stage `new`
    /// with no match score; scoring happens when the CV upload event
    /// arrives.
    pub fn create_candidate(
        &self,
        intake: NewCandidate,
    ) -> Result<Candidate, PipelineServiceError> {
        let candidate = Candidate {
            id: next_candidate_id(),
            user_id: intake.user_id,
            full_name: intake.full_name,
            email: intake.email,
            position_title: intake.position_title,
            stage: CandidateStage::New,
            source: intake.source,
            match_score: None,
        };
        Ok(self.repository.insert_candidate(candidate)?)
    }

    pub fn create_template(
        &self,
        template: NewTemplate,
    ) -> Result<EmailTemplate, PipelineServiceError> {
        let template = EmailTemplate {
            id: next_template_id(),
            user_id: template.user_id,
            template_type: template.template_type,
            subject: template.subject,
            body: template.body,
        };
        Ok(self.repository.insert_template(template)?)
    }

    /// Configure a workflow, enforcing that the trigger stage accepts the
    /// template's type and that at most one enabled workflow exists per
    /// (user, stage). The uniqueness rule removes any ambiguity about
    /// which workflow fires on a transition.
    pub fn create_workflow(
        &self,
        workflow: NewWorkflow,
        now: DateTime<Utc>,
    ) -> Result<EmailWorkflow, PipelineServiceError> {
        if workflow.trigger_stage == CandidateStage::New {
            return Err(WorkflowConfigError::TriggerStageNew.into());
        }
        if workflow.min_match_score.is_some_and(|score| score > 100) {
            return Err(WorkflowConfigError::InvalidMatchScore.into());
        }

        let template = self
            .repository
            .template(&workflow.template_id)?
            .filter(|template| template.user_id == workflow.user_id)
            .ok_or(WorkflowConfigError::TemplateNotFound)?;

        if template.template_type.offer_driven() {
            return Err(WorkflowConfigError::OfferDrivenTemplate(template.template_type).into());
        }
        if !workflow
            .trigger_stage
            .allowed_template_types()
            .contains(&template.template_type)
        {
            return Err(WorkflowConfigError::TypeMismatch {
                stage: workflow.trigger_stage,
                template: template.template_type,
            }
            .into());
        }

        if workflow.enabled {
            let existing = self.repository.workflows_for_user(&workflow.user_id)?;
            if existing
                .iter()
                .any(|other| other.enabled && other.trigger_stage == workflow.trigger_stage)
            {
                return Err(
                    WorkflowConfigError::DuplicateEnabledWorkflow(workflow.trigger_stage).into(),
                );
            }
        }

        let workflow = EmailWorkflow {
            id: next_workflow_id(),
            user_id: workflow.user_id,
            name: workflow.name,
            trigger_stage: workflow.trigger_stage,
            template_id: workflow.template_id,
            min_match_score: workflow.min_match_score,
            source_filter: workflow.source_filter,
            enabled: workflow.enabled,
            delay_minutes: workflow.delay_minutes,
            created_at: now,
        };
        Ok(self.repository.insert_workflow(workflow)?)
    }

    /// Guarded stage transition. The stage mutation is authoritative; the
    /// follow-up workflow send is best-effort and never rolls it back.
    pub fn transition(
        &self,
        candidate_id: &CandidateId,
        to_stage: CandidateStage,
        user_id: &UserId,
        interview: Option<InterviewDetails>,
        now: DateTime<Utc>,
    ) -> Result<Candidate, PipelineServiceError> {
        let mut candidate = self.owned_candidate(candidate_id, user_id)?;

        let workflows = self.repository.workflows_for_user(user_id)?;
        let enabled: Vec<_> = workflows.into_iter().filter(|w| w.enabled).collect();
        let has_active_offer = if to_stage == CandidateStage::Offer {
            self.offers.has_active_offer(candidate_id)?
        } else {
            false
        };

        authorize_transition(&candidate, to_stage, &enabled, has_active_offer)?;

        candidate.stage = to_stage;
        self.repository.update_candidate(candidate.clone())?;

        if let Err(err) = self.engine.execute(
            candidate_id,
            to_stage,
            user_id,
            false,
            interview.as_ref(),
            now,
        ) {
            error!(candidate = %candidate_id.0, %err, "workflow execution failed after transition");
        }

        Ok(candidate)
    }

    /// The automated CV-upload event: records the match score and, for
    /// candidates still in `new`, performs the one permitted exit into
    /// `screening`.
    pub fn record_cv_upload(
        &self,
        candidate_id: &CandidateId,
        user_id: &UserId,
        match_score: Option<u8>,
        now: DateTime<Utc>,
    ) -> Result<Candidate, PipelineServiceError> {
        if match_score.is_some_and(|score| score > 100) {
            return Err(WorkflowConfigError::InvalidMatchScore.into());
        }

        let mut candidate = self.owned_candidate(candidate_id, user_id)?;
        if let Some(score) = match_score {
            candidate.match_score = Some(score);
        }

        let entered_screening = candidate.stage == CandidateStage::New;
        if entered_screening {
            candidate.stage = CandidateStage::Screening;
        }
        self.repository.update_candidate(candidate.clone())?;

        if entered_screening {
            if let Err(err) = self.engine.execute(
                candidate_id,
                CandidateStage::Screening,
                user_id,
                false,
                None,
                now,
            ) {
                error!(candidate = %candidate_id.0, %err, "workflow execution failed after CV upload");
            }
        }

        Ok(candidate)
    }

    /// Resolver passthrough for configuration UIs.
    pub fn templates_for_stage(
        &self,
        user_id: &UserId,
        stage: CandidateStage,
        selected: Option<&TemplateId>,
    ) -> Result<TemplateSelection, PipelineServiceError> {
        let templates = self.repository.templates_for_user(user_id)?;
        Ok(valid_templates_for_stage(stage, &templates, selected))
    }

    /// Send a workflow's template to the requesting user's own address for
    /// inspection. Never logged to the execution history.
    pub fn test_send(
        &self,
        workflow_id: &WorkflowId,
        user_id: &UserId,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PipelineServiceError> {
        self.engine.execute_test(workflow_id, user_id, recipient, now)?;
        Ok(())
    }

    /// Sweep and dispatch deferred sends that have come due.
    pub fn dispatch_due(&self, now: DateTime<Utc>) -> Result<usize, PipelineServiceError> {
        Ok(self.engine.dispatch_due(now)?)
    }

    pub fn candidate(
        &self,
        candidate_id: &CandidateId,
        user_id: &UserId,
    ) -> Result<Candidate, PipelineServiceError> {
        self.owned_candidate(candidate_id, user_id)
    }

    pub fn executions(
        &self,
        candidate_id: &CandidateId,
        user_id: &UserId,
    ) -> Result<Vec<WorkflowExecution>, PipelineServiceError> {
        self.owned_candidate(candidate_id, user_id)?;
        Ok(self.repository.executions_for_candidate(candidate_id)?)
    }

    fn owned_candidate(
        &self,
        candidate_id: &CandidateId,
        user_id: &UserId,
    ) -> Result<Candidate, PipelineServiceError> {
        self.repository
            .candidate(candidate_id)?
            .filter(|candidate| candidate.user_id == *user_id)
            .ok_or(PipelineServiceError::CandidateNotFound)
    }
}
