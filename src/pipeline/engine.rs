use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::config::CompanyConfig;

use super::domain::{
    Candidate, CandidateId, CandidateStage, DeferredSend, EmailTemplate, EmailWorkflow,
    ExecutionStatus, InterviewDetails, TemplateType, UserId, WorkflowExecution, WorkflowId,
};
use super::matcher::find_matching_workflows;
use super::message::{render, MessageContext};
use super::repository::{EmailSender, OutboundEmail, PipelineRepository, SendError, StoreError};

/// Error raised by explicit test sends. Unlike regular execution, a test
/// send is a direct operation and surfaces its failures.
#[derive(Debug, thiserror::Error)]
pub enum TestSendError {
    #[error("workflow not found")]
    WorkflowNotFound,
    #[error("email template not found")]
    TemplateNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Delivery(#[from] SendError),
}

/// Applies matched workflows after a stage change: resolves delays,
/// substitutes placeholders, invokes the send capability, and records an
/// execution outcome. Best-effort by design; a vanished candidate or
/// template downgrades to a traced no-op so the stage mutation that
/// already happened stays authoritative.
pub struct ExecutionEngine<R, M> {
    repository: Arc<R>,
    mailer: Arc<M>,
    company: CompanyConfig,
}

impl<R, M> ExecutionEngine<R, M>
where
    R: PipelineRepository,
    M: EmailSender,
{
    pub fn new(repository: Arc<R>, mailer: Arc<M>, company: CompanyConfig) -> Self {
        Self {
            repository,
            mailer,
            company,
        }
    }

    /// Run every workflow matching the candidate's current stage. Send
    /// failures are logged, never propagated; store failures are.
    pub fn execute(
        &self,
        candidate_id: &CandidateId,
        stage: CandidateStage,
        user_id: &UserId,
        skip_if_already_sent: bool,
        interview: Option<&InterviewDetails>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let Some(candidate) = self.repository.candidate(candidate_id)? else {
            warn!(candidate = %candidate_id.0, "execution skipped: candidate not found");
            return Ok(());
        };
        if candidate.user_id != *user_id {
            warn!(candidate = %candidate_id.0, "execution skipped: candidate not owned by user");
            return Ok(());
        }

        let workflows = self.repository.workflows_for_user(user_id)?;
        let matched = find_matching_workflows(&candidate, &workflows);
        if matched.is_empty() {
            debug!(
                candidate = %candidate_id.0,
                stage = stage.label(),
                "no workflow matched, nothing to send"
            );
            return Ok(());
        }

        for workflow in matched {
            self.run_workflow(&candidate, workflow, skip_if_already_sent, interview, now)?;
        }

        Ok(())
    }

    /// Sweep deferred sends due at or before `now`. Re-delivery is
    /// idempotent: each dispatch re-checks the execution log before
    /// sending. A store failure on one entry is traced and the sweep
    /// moves on; the remaining due sends still go out. Returns the number
    /// of entries taken off the schedule.
    pub fn dispatch_due(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let due = self.repository.take_due_sends(now)?;
        let count = due.len();

        for deferred in due {
            if let Err(error) = self.dispatch_one(&deferred, now) {
                warn!(
                    workflow = %deferred.workflow_id.0,
                    candidate = %deferred.candidate_id.0,
                    %error,
                    "deferred send failed"
                );
            }
        }

        Ok(count)
    }

    fn dispatch_one(&self, deferred: &DeferredSend, now: DateTime<Utc>) -> Result<(), StoreError> {
        let Some(candidate) = self.repository.candidate(&deferred.candidate_id)? else {
            warn!(candidate = %deferred.candidate_id.0, "deferred send dropped: candidate gone");
            return Ok(());
        };
        let Some(workflow) = self.repository.workflow(&deferred.workflow_id)? else {
            warn!(workflow = %deferred.workflow_id.0, "deferred send dropped: workflow gone");
            return Ok(());
        };
        let Some(template) = self.repository.template(&workflow.template_id)? else {
            warn!(workflow = %workflow.id.0, "deferred send dropped: template gone");
            return Ok(());
        };

        if self.already_sent(&candidate.id, template.template_type)? {
            return self.record(
                &workflow.id,
                &candidate.id,
                template.template_type,
                ExecutionStatus::Skipped,
                now,
                None,
                None,
            );
        }
        if !workflow.enabled {
            return self.record(
                &workflow.id,
                &candidate.id,
                template.template_type,
                ExecutionStatus::Skipped,
                now,
                None,
                Some("workflow disabled before dispatch".to_string()),
            );
        }

        self.send_now(&candidate, &workflow, &template, None, now)
    }

    /// Send a workflow's template to the requesting user's own address,
    /// subject prefixed with `[TEST]`. Never touches the execution log.
    pub fn execute_test(
        &self,
        workflow_id: &WorkflowId,
        user_id: &UserId,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TestSendError> {
        let workflow = self
            .repository
            .workflow(workflow_id)?
            .filter(|workflow| workflow.user_id == *user_id)
            .ok_or(TestSendError::WorkflowNotFound)?;
        let template = self
            .repository
            .template(&workflow.template_id)?
            .ok_or(TestSendError::TemplateNotFound)?;

        // Candidate placeholders are deliberately left verbatim so the
        // tester sees exactly which tokens the template expects.
        let context = MessageContext {
            company_name: Some(self.company.company_name.clone()),
            your_name: Some(self.company.sender_name.clone()),
            ..MessageContext::default()
        };

        let email = OutboundEmail {
            to: recipient.to_string(),
            to_name: None,
            from_name: self.company.sender_name.clone(),
            subject: format!("[TEST] {}", render(&template.subject, &context)),
            body: render(&template.body, &context),
            metadata: BTreeMap::from([
                ("workflow_id".to_string(), workflow.id.0.clone()),
                ("test".to_string(), "true".to_string()),
                ("sent_at".to_string(), now.to_rfc3339()),
            ]),
        };
        self.mailer.send(email)?;
        Ok(())
    }

    fn run_workflow(
        &self,
        candidate: &Candidate,
        workflow: &EmailWorkflow,
        skip_if_already_sent: bool,
        interview: Option<&InterviewDetails>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let Some(template) = self.repository.template(&workflow.template_id)? else {
            warn!(
                workflow = %workflow.id.0,
                template = %workflow.template_id.0,
                "workflow send skipped: template not found"
            );
            return Ok(());
        };

        if skip_if_already_sent && self.already_sent(&candidate.id, template.template_type)? {
            return self.record(
                &workflow.id,
                &candidate.id,
                template.template_type,
                ExecutionStatus::Skipped,
                now,
                None,
                None,
            );
        }

        if workflow.delay_minutes > 0 {
            let due_at = now + Duration::minutes(i64::from(workflow.delay_minutes));
            self.repository.schedule_send(DeferredSend {
                workflow_id: workflow.id.clone(),
                candidate_id: candidate.id.clone(),
                user_id: workflow.user_id.clone(),
                stage: workflow.trigger_stage,
                due_at,
            })?;
            debug!(
                workflow = %workflow.id.0,
                candidate = %candidate.id.0,
                due_at = %due_at,
                "workflow send deferred"
            );
            return self.record(
                &workflow.id,
                &candidate.id,
                template.template_type,
                ExecutionStatus::Pending,
                now,
                None,
                None,
            );
        }

        self.send_now(candidate, workflow, &template, interview, now)
    }

    fn send_now(
        &self,
        candidate: &Candidate,
        workflow: &EmailWorkflow,
        template: &EmailTemplate,
        interview: Option<&InterviewDetails>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut context = MessageContext::for_candidate(candidate, &self.company);
        if let Some(interview) = interview {
            context = context.with_interview(interview);
        }

        let email = OutboundEmail {
            to: candidate.email.clone(),
            to_name: Some(candidate.full_name.clone()),
            from_name: self.company.sender_name.clone(),
            subject: render(&template.subject, &context),
            body: render(&template.body, &context),
            metadata: BTreeMap::from([
                ("candidate_id".to_string(), candidate.id.0.clone()),
                ("workflow_id".to_string(), workflow.id.0.clone()),
                (
                    "template_type".to_string(),
                    template.template_type.label().to_string(),
                ),
            ]),
        };

        match self.mailer.send(email) {
            Ok(receipt) => self.record(
                &workflow.id,
                &candidate.id,
                template.template_type,
                ExecutionStatus::Sent,
                now,
                Some(receipt.message_id),
                None,
            ),
            Err(error) => {
                warn!(
                    workflow = %workflow.id.0,
                    candidate = %candidate.id.0,
                    %error,
                    "workflow send failed"
                );
                self.record(
                    &workflow.id,
                    &candidate.id,
                    template.template_type,
                    ExecutionStatus::Failed,
                    now,
                    None,
                    Some(error.to_string()),
                )
            }
        }
    }

    fn already_sent(
        &self,
        candidate_id: &CandidateId,
        template_type: TemplateType,
    ) -> Result<bool, StoreError> {
        let executions = self.repository.executions_for_candidate(candidate_id)?;
        Ok(executions.iter().any(|execution| {
            execution.status == ExecutionStatus::Sent && execution.template_type == template_type
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        workflow_id: &WorkflowId,
        candidate_id: &CandidateId,
        template_type: TemplateType,
        status: ExecutionStatus,
        now: DateTime<Utc>,
        message_id: Option<String>,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        self.repository.record_execution(WorkflowExecution {
            workflow_id: workflow_id.clone(),
            candidate_id: candidate_id.clone(),
            template_type,
            status,
            executed_at: now,
            message_id,
            error,
        })
    }
}
