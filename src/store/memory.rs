use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::offers::domain::{Offer, OfferId, OfferStatus};
use crate::offers::repository::{OfferRepository, OfferResponse, OfferStoreError};
use crate::pipeline::domain::{
    Candidate, CandidateId, DeferredSend, EmailTemplate, EmailWorkflow, TemplateId, UserId,
    WorkflowExecution, WorkflowId,
};
use crate::pipeline::repository::{
    ActiveOfferLookup, EmailReceipt, EmailSender, OutboundEmail, PipelineRepository, SendError,
    StoreError,
};

/// Process-local pipeline store. Each collection sits behind its own
/// mutex; cross-collection operations in the services tolerate that by
/// re-validating on read.
#[derive(Default, Clone)]
pub struct InMemoryPipelineStore {
    candidates: Arc<Mutex<HashMap<CandidateId, Candidate>>>,
    workflows: Arc<Mutex<HashMap<WorkflowId, EmailWorkflow>>>,
    templates: Arc<Mutex<HashMap<TemplateId, EmailTemplate>>>,
    executions: Arc<Mutex<Vec<WorkflowExecution>>>,
    deferred: Arc<Mutex<Vec<DeferredSend>>>,
}

impl PipelineRepository for InMemoryPipelineStore {
    fn insert_candidate(&self, candidate: Candidate) -> Result<Candidate, StoreError> {
        let mut guard = self.candidates.lock().expect("candidate mutex poisoned");
        if guard.contains_key(&candidate.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(candidate.id.clone(), candidate.clone());
        Ok(candidate)
    }

    fn candidate(&self, id: &CandidateId) -> Result<Option<Candidate>, StoreError> {
        let guard = self.candidates.lock().expect("candidate mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update_candidate(&self, candidate: Candidate) -> Result<(), StoreError> {
        let mut guard = self.candidates.lock().expect("candidate mutex poisoned");
        if guard.contains_key(&candidate.id) {
            guard.insert(candidate.id.clone(), candidate);
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    fn insert_workflow(&self, workflow: EmailWorkflow) -> Result<EmailWorkflow, StoreError> {
        let mut guard = self.workflows.lock().expect("workflow mutex poisoned");
        if guard.contains_key(&workflow.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(workflow.id.clone(), workflow.clone());
        Ok(workflow)
    }

    fn workflow(&self, id: &WorkflowId) -> Result<Option<EmailWorkflow>, StoreError> {
        let guard = self.workflows.lock().expect("workflow mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn workflows_for_user(&self, user: &UserId) -> Result<Vec<EmailWorkflow>, StoreError> {
        let guard = self.workflows.lock().expect("workflow mutex poisoned");
        Ok(guard
            .values()
            .filter(|workflow| workflow.user_id == *user)
            .cloned()
            .collect())
    }

    fn insert_template(&self, template: EmailTemplate) -> Result<EmailTemplate, StoreError> {
        let mut guard = self.templates.lock().expect("template mutex poisoned");
        if guard.contains_key(&template.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(template.id.clone(), template.clone());
        Ok(template)
    }

    fn template(&self, id: &TemplateId) -> Result<Option<EmailTemplate>, StoreError> {
        let guard = self.templates.lock().expect("template mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn templates_for_user(&self, user: &UserId) -> Result<Vec<EmailTemplate>, StoreError> {
        let guard = self.templates.lock().expect("template mutex poisoned");
        Ok(guard
            .values()
            .filter(|template| template.user_id == *user)
            .cloned()
            .collect())
    }

    fn record_execution(&self, execution: WorkflowExecution) -> Result<(), StoreError> {
        let mut guard = self.executions.lock().expect("execution mutex poisoned");
        guard.push(execution);
        Ok(())
    }

    fn executions_for_candidate(
        &self,
        id: &CandidateId,
    ) -> Result<Vec<WorkflowExecution>, StoreError> {
        let guard = self.executions.lock().expect("execution mutex poisoned");
        Ok(guard
            .iter()
            .filter(|execution| execution.candidate_id == *id)
            .cloned()
            .collect())
    }

    fn schedule_send(&self, send: DeferredSend) -> Result<(), StoreError> {
        let mut guard = self.deferred.lock().expect("deferred mutex poisoned");
        guard.push(send);
        Ok(())
    }

    fn take_due_sends(&self, now: DateTime<Utc>) -> Result<Vec<DeferredSend>, StoreError> {
        let mut guard = self.deferred.lock().expect("deferred mutex poisoned");
        let mut due = Vec::new();
        let mut remaining = Vec::with_capacity(guard.len());
        for send in guard.drain(..) {
            if send.due_at <= now {
                due.push(send);
            } else {
                remaining.push(send);
            }
        }
        *guard = remaining;
        Ok(due)
    }
}

/// Process-local offer store. A single mutex guards the whole map so
/// `resolve_by_token` can validate and mutate in one critical section.
#[derive(Default, Clone)]
pub struct InMemoryOfferStore {
    offers: Arc<Mutex<HashMap<OfferId, Offer>>>,
}

impl OfferRepository for InMemoryOfferStore {
    fn insert(&self, offer: Offer) -> Result<Offer, OfferStoreError> {
        let mut guard = self.offers.lock().expect("offer mutex poisoned");
        if guard.contains_key(&offer.id) {
            return Err(OfferStoreError::Unavailable(format!(
                "duplicate offer id {}",
                offer.id.0
            )));
        }
        guard.insert(offer.id.clone(), offer.clone());
        Ok(offer)
    }

    fn fetch(&self, id: &OfferId) -> Result<Option<Offer>, OfferStoreError> {
        let guard = self.offers.lock().expect("offer mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, offer: Offer) -> Result<(), OfferStoreError> {
        let mut guard = self.offers.lock().expect("offer mutex poisoned");
        if guard.contains_key(&offer.id) {
            guard.insert(offer.id.clone(), offer);
            Ok(())
        } else {
            Err(OfferStoreError::NotFound)
        }
    }

    fn update_from(&self, offer: Offer, expected: OfferStatus) -> Result<(), OfferStoreError> {
        let mut guard = self.offers.lock().expect("offer mutex poisoned");
        let Some(current) = guard.get(&offer.id) else {
            return Err(OfferStoreError::NotFound);
        };
        if current.status != expected {
            return Err(OfferStoreError::Conflict {
                status: current.status,
            });
        }
        guard.insert(offer.id.clone(), offer);
        Ok(())
    }

    fn offers_for_user(&self, user: &UserId) -> Result<Vec<Offer>, OfferStoreError> {
        let guard = self.offers.lock().expect("offer mutex poisoned");
        Ok(guard
            .values()
            .filter(|offer| offer.user_id == *user)
            .cloned()
            .collect())
    }

    fn find_by_token(&self, token: &str) -> Result<Option<Offer>, OfferStoreError> {
        let guard = self.offers.lock().expect("offer mutex poisoned");
        Ok(guard
            .values()
            .find(|offer| {
                offer
                    .token
                    .as_ref()
                    .is_some_and(|offer_token| offer_token.value == token)
            })
            .cloned())
    }

    fn resolve_by_token(
        &self,
        token: &str,
        response: OfferResponse,
        now: DateTime<Utc>,
    ) -> Result<Offer, OfferStoreError> {
        let mut guard = self.offers.lock().expect("offer mutex poisoned");
        let offer = guard
            .values_mut()
            .find(|offer| {
                offer
                    .token
                    .as_ref()
                    .is_some_and(|offer_token| offer_token.value == token)
            })
            .ok_or(OfferStoreError::NotFound)?;

        if offer
            .token
            .as_ref()
            .is_some_and(|offer_token| offer_token.expired(now))
        {
            return Err(OfferStoreError::TokenExpired);
        }
        if !offer.status.awaiting_response() {
            return Err(OfferStoreError::AlreadyResolved {
                status: offer.status,
            });
        }

        offer.status = response.status();
        offer.resolved_at = Some(now);
        Ok(offer.clone())
    }
}

impl ActiveOfferLookup for InMemoryOfferStore {
    fn has_active_offer(&self, candidate: &CandidateId) -> Result<bool, StoreError> {
        let guard = self.offers.lock().expect("offer mutex poisoned");
        Ok(guard.values().any(|offer| {
            offer.candidate_id.as_ref() == Some(candidate) && offer.status.counts_as_active()
        }))
    }
}

static MESSAGE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Delivery transport that writes messages to the log instead of the
/// network. Stands in until a real provider integration lands.
#[derive(Default, Clone, Copy)]
pub struct LoggingMailer;

impl EmailSender for LoggingMailer {
    fn send(&self, email: OutboundEmail) -> Result<EmailReceipt, SendError> {
        if !email.to.contains('@') {
            return Err(SendError::InvalidRecipient(email.to));
        }
        let id = MESSAGE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let message_id = format!("local-{id:06}");
        info!(
            to = %email.to,
            subject = %email.subject,
            message_id = %message_id,
            "outbound email"
        );
        Ok(EmailReceipt { message_id })
    }
}
