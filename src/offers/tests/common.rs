use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::config::CompanyConfig;
use crate::offers::domain::{
    NegotiationHistory, Offer, OfferId, OfferStatus, OfferTerms, SalaryPeriod, SalaryTerms,
};
use crate::offers::repository::TokenGenerator;
use crate::offers::service::{NewOffer, OfferService};
use crate::pipeline::domain::{
    Candidate, CandidateId, CandidateStage, EmailTemplate, EmailWorkflow, JobId, TemplateId,
    TemplateType, UserId, WorkflowId,
};
use crate::pipeline::repository::{
    EmailReceipt, EmailSender, OutboundEmail, PipelineRepository, SendError,
};
use crate::store::{InMemoryOfferStore, InMemoryPipelineStore};

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

pub(super) fn terms(amount: u64) -> OfferTerms {
    OfferTerms {
        salary: SalaryTerms {
            amount,
            currency: "USD".to_string(),
            period: SalaryPeriod::Annual,
        },
        start_date: NaiveDate::from_ymd_opt(2026, 5, 1).expect("valid date"),
        benefits: vec!["health insurance".to_string(), "stock options".to_string()],
    }
}

pub(super) fn candidate(suffix: &str) -> Candidate {
    Candidate {
        id: CandidateId(format!("cand-{suffix}")),
        user_id: user(),
        full_name: "Ada Okafor".to_string(),
        email: "ada@example.com".to_string(),
        position_title: "Backend Engineer".to_string(),
        stage: CandidateStage::Interview,
        source: Some("LinkedIn".to_string()),
        match_score: Some(85),
    }
}

pub(super) fn draft(candidate_id: Option<CandidateId>) -> NewOffer {
    NewOffer {
        user_id: user(),
        candidate_id,
        job_id: JobId("job-1".to_string()),
        position_title: "Backend Engineer".to_string(),
        terms: terms(90_000),
        notes: Some("Relocation support available".to_string()),
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

/// Deterministic token source so tests can follow response links.
#[derive(Default)]
pub(super) struct SequentialTokens {
    counter: AtomicU64,
}

impl TokenGenerator for SequentialTokens {
    fn token(&self) -> String {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("token-{id:06}")
    }
}

pub(super) type TestOfferService =
    OfferService<InMemoryOfferStore, InMemoryPipelineStore, RecordingMailer, SequentialTokens>;

pub(super) struct Harness {
    pub(super) service: TestOfferService,
    pub(super) offers: Arc<InMemoryOfferStore>,
    pub(super) pipeline: Arc<InMemoryPipelineStore>,
    pub(super) mailer: Arc<RecordingMailer>,
}

pub(super) fn harness() -> Harness {
    let offers = Arc::new(InMemoryOfferStore::default());
    let pipeline = Arc::new(InMemoryPipelineStore::default());
    let mailer = Arc::new(RecordingMailer::default());
    let tokens = Arc::new(SequentialTokens::default());
    let service = OfferService::new(
        offers.clone(),
        pipeline.clone(),
        mailer.clone(),
        tokens,
        company(),
    );
    Harness {
        service,
        offers,
        pipeline,
        mailer,
    }
}

/// Seed a candidate plus the offer workflow and templates send paths need.
pub(super) fn seed_offer_setup(pipeline: &InMemoryPipelineStore, suffix: &str) -> Candidate {
    let candidate = candidate(suffix);
    pipeline
        .insert_candidate(candidate.clone())
        .expect("insert candidate");

    let offer_template = EmailTemplate {
        id: TemplateId(format!("tpl-offer-{suffix}")),
        user_id: user(),
        template_type: TemplateType::Offer,
        subject: "Your offer for {job_title}".to_string(),
        body: "Salary: {salary}. Respond here: {offer_response_link}".to_string(),
    };
    pipeline
        .insert_template(offer_template.clone())
        .expect("insert template");
    pipeline
        .insert_workflow(EmailWorkflow {
            id: WorkflowId(format!("wf-offer-{suffix}")),
            user_id: user(),
            name: "offer letter".to_string(),
            trigger_stage: CandidateStage::Offer,
            template_id: offer_template.id,
            min_match_score: None,
            source_filter: Vec::new(),
            enabled: true,
            delay_minutes: 0,
            created_at: at(8),
        })
        .expect("insert workflow");

    for (tag, template_type, subject) in [
        ("accepted", TemplateType::OfferAccepted, "Welcome aboard"),
        ("declined", TemplateType::OfferDeclined, "Sorry to hear"),
        (
            "counter",
            TemplateType::CounterOfferResponse,
            "Our updated offer",
        ),
    ] {
        pipeline
            .insert_template(EmailTemplate {
                id: TemplateId(format!("tpl-{tag}-{suffix}")),
                user_id: user(),
                template_type,
                subject: subject.to_string(),
                body: "Salary: {salary}. Link: {offer_response_link}".to_string(),
            })
            .expect("insert template");
    }

    candidate
}

/// Insert an offer directly, bypassing the service, for states the public
/// API cannot reach on its own.
pub(super) fn seed_offer(
    offers: &InMemoryOfferStore,
    suffix: &str,
    candidate_id: Option<CandidateId>,
    status: OfferStatus,
) -> Offer {
    use crate::offers::repository::OfferRepository;

    let offer = Offer {
        id: OfferId(format!("offer-{suffix}")),
        user_id: user(),
        candidate_id,
        job_id: JobId("job-1".to_string()),
        position_title: "Backend Engineer".to_string(),
        terms: terms(90_000),
        notes: None,
        status,
        expires_at: at(10) + chrono::Duration::days(7),
        token: None,
        negotiation_history: NegotiationHistory::default(),
        sent_at: None,
        resolved_at: None,
    };
    offers.insert(offer.clone()).expect("insert offer");
    offer
}
