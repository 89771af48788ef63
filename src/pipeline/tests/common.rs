use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::config::CompanyConfig;
use crate::pipeline::domain::{
    Candidate, CandidateId, CandidateStage, EmailTemplate, EmailWorkflow, TemplateId, TemplateType,
    UserId, WorkflowId,
};
use crate::pipeline::repository::{
    ActiveOfferLookup, EmailReceipt, EmailSender, OutboundEmail, SendError, StoreError,
};
use crate::pipeline::service::PipelineService;
use crate::store::InMemoryPipelineStore;

pub(super) fn company() -> CompanyConfig {
    CompanyConfig {
        company_name: "Northwind Robotics".to_string(),
        sender_name: "Dana Reyes".to_string(),
        public_base_url: "https://hire.northwind.example".to_string(),
        offer_expiry_days: 7,
    }
}

pub(super) fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn user() -> UserId {
    UserId("user-1".to_string())
}

pub(super) fn candidate(suffix: &str, stage: CandidateStage) -> Candidate {
    Candidate {
        id: CandidateId(format!("cand-{suffix}")),
        user_id: user(),
        full_name: "Ada Okafor".to_string(),
        email: "ada@example.com".to_string(),
        position_title: "Backend Engineer".to_string(),
        stage,
        source: Some("LinkedIn".to_string()),
        match_score: Some(85),
    }
}

pub(super) fn template(suffix: &str, template_type: TemplateType) -> EmailTemplate {
    EmailTemplate {
        id: TemplateId(format!("tpl-{suffix}")),
        user_id: user(),
        template_type,
        subject: "Update on your {job_title} application".to_string(),
        body: "Hi {candidate_name}, greetings from {company_name}. -- {your_name}".to_string(),
    }
}

pub(super) fn workflow(
    suffix: &str,
    trigger_stage: CandidateStage,
    template_id: &TemplateId,
    created_at: DateTime<Utc>,
) -> EmailWorkflow {
    EmailWorkflow {
        id: WorkflowId(format!("wf-{suffix}")),
        user_id: user(),
        name: format!("{} follow-up", trigger_stage.label()),
        trigger_stage,
        template_id: template_id.clone(),
        min_match_score: None,
        source_filter: Vec::new(),
        enabled: true,
        delay_minutes: 0,
        created_at,
    }
}

/// Mailer that records everything handed to it.
#[derive(Default, Clone)]
pub(super) struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl RecordingMailer {
    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

impl EmailSender for RecordingMailer {
    fn send(&self, email: OutboundEmail) -> Result<EmailReceipt, SendError> {
        let mut guard = self.sent.lock().expect("mailer mutex poisoned");
        guard.push(email);
        Ok(EmailReceipt {
            message_id: format!("msg-{}", guard.len()),
        })
    }
}

/// Mailer whose transport is permanently down.
pub(super) struct FailingMailer;

impl EmailSender for FailingMailer {
    fn send(&self, _email: OutboundEmail) -> Result<EmailReceipt, SendError> {
        Err(SendError::Transport("smtp relay offline".to_string()))
    }
}

/// Fixed-answer stand-in for the offer store lookup.
pub(super) struct StubOffers {
    pub(super) active: bool,
}

impl ActiveOfferLookup for StubOffers {
    fn has_active_offer(&self, _candidate: &CandidateId) -> Result<bool, StoreError> {
        Ok(self.active)
    }
}

pub(super) type TestService = PipelineService<InMemoryPipelineStore, RecordingMailer, StubOffers>;

pub(super) fn build_service(
    active_offer: bool,
) -> (TestService, Arc<InMemoryPipelineStore>, Arc<RecordingMailer>) {
    let repository = Arc::new(InMemoryPipelineStore::default());
    let mailer = Arc::new(RecordingMailer::default());
    let offers = Arc::new(StubOffers {
        active: active_offer,
    });
    let service = PipelineService::new(repository.clone(), mailer.clone(), offers, company());
    (service, repository, mailer)
}
