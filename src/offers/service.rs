use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CompanyConfig;
use crate::pipeline::domain::{
    Candidate, CandidateId, CandidateStage, JobId, TemplateType, UserId,
};
use crate::pipeline::message::{render, MessageContext};
use crate::pipeline::repository::{
    EmailSender, OutboundEmail, PipelineRepository, SendError, StoreError,
};

use super::domain::{
    NegotiationEvent, NegotiationEventKind, Offer, OfferId, OfferStatus, OfferTerms, OfferToken,
};
use super::repository::{OfferRepository, OfferResponse, OfferStoreError, TokenGenerator};

static OFFER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_offer_id() -> OfferId {
    let id = OFFER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    OfferId(format!("offer-{id:06}"))
}

/// Payload for drafting an offer. Unlinked drafts ("general" offers) are
/// allowed; linking becomes mandatory at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOffer {
    pub user_id: UserId,
    pub candidate_id: Option<CandidateId>,
    pub job_id: JobId,
    pub position_title: String,
    pub terms: OfferTerms,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Candidate-side counter proposal submitted through the response link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterProposal {
    pub terms: OfferTerms,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error raised by offer operations. Guard-style variants carry
/// user-facing messages and are surfaced verbatim.
#[derive(Debug, thiserror::Error)]
pub enum OfferError {
    #[error("offer not found")]
    NotFound,
    #[error("offer is not linked to a candidate")]
    Unlinked,
    #[error("linked candidate not found")]
    CandidateMissing,
    #[error("no enabled workflow configured for stage offer")]
    NoOfferWorkflow,
    #[error("offer email template not found")]
    TemplateMissing,
    #[error("offer response link is invalid")]
    UnknownToken,
    #[error("offer response link has expired")]
    TokenExpired,
    #[error("this offer has already been responded to")]
    AlreadyResponded { status: OfferStatus },
    #[error("offer cannot be {action} while {}", status.label())]
    InvalidState {
        action: &'static str,
        status: OfferStatus,
    },
    #[error("offer terms are locked while {}", .0.label())]
    TermsLocked(OfferStatus),
    #[error("no counter offer has been proposed")]
    NoCounterOffer,
    #[error("offer store error: {0}")]
    Store(OfferStoreError),
    #[error("pipeline store error: {0}")]
    Pipeline(#[from] StoreError),
    #[error("email delivery failed: {0}")]
    Delivery(#[from] SendError),
}

impl OfferError {
    /// Store errors from id-addressed operations. A conditional-update
    /// conflict means the offer moved under the caller; a terminal
    /// current status reads as "already responded", anything else as an
    /// invalid state for the attempted action.
    fn from_store(error: OfferStoreError) -> Self {
        match error {
            OfferStoreError::NotFound => OfferError::NotFound,
            OfferStoreError::TokenExpired => OfferError::TokenExpired,
            OfferStoreError::AlreadyResolved { status } => OfferError::AlreadyResponded { status },
            OfferStoreError::Conflict { status } if status.is_terminal() => {
                OfferError::AlreadyResponded { status }
            }
            OfferStoreError::Conflict { status } => OfferError::InvalidState {
                action: "updated",
                status,
            },
            other => OfferError::Store(other),
        }
    }

    /// Store errors from token-addressed operations, where a missing row
    /// means the link itself is invalid.
    fn from_token_store(error: OfferStoreError) -> Self {
        match error {
            OfferStoreError::NotFound => OfferError::UnknownToken,
            other => Self::from_store(other),
        }
    }
}

/// Service owning the offer negotiation state machine: send, token-gated
/// candidate responses, counter-offer rounds, and the terminal
/// resolutions that feed back into the candidate pipeline.
pub struct OfferService<O, P, M, G> {
    offers: Arc<O>,
    pipeline: Arc<P>,
    mailer: Arc<M>,
    tokens: Arc<G>,
    company: CompanyConfig,
}

impl<O, P, M, G> OfferService<O, P, M, G>
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    pub fn new(
        offers: Arc<O>,
        pipeline: Arc<P>,
        mailer: Arc<M>,
        tokens: Arc<G>,
        company: CompanyConfig,
    ) -> Self {
        Self {
            offers,
            pipeline,
            mailer,
            tokens,
            company,
        }
    }

    pub fn create_offer(&self, draft: NewOffer, now: DateTime<Utc>) -> Result<Offer, OfferError> {
        if let Some(candidate_id) = &draft.candidate_id {
            self.linked_candidate(candidate_id, &draft.user_id)?;
        }

        let offer = Offer {
            id: next_offer_id(),
            user_id: draft.user_id,
            candidate_id: draft.candidate_id,
            job_id: draft.job_id,
            position_title: draft.position_title,
            terms: draft.terms,
            notes: draft.notes,
            status: OfferStatus::Draft,
            expires_at: now + Duration::days(self.company.offer_expiry_days),
            token: None,
            negotiation_history: Default::default(),
            sent_at: None,
            resolved_at: None,
        };
        self.offers.insert(offer).map_err(OfferError::from_store)
    }

    /// Send a drafted offer to its linked candidate. Issues a fresh
    /// single-use token, emails the response link, and promotes the
    /// candidate to stage `offer` (the workflow precondition mirrors the
    /// transition guard and is checked here, so the guard is bypassed for
    /// the promotion itself).
    pub fn send_offer(
        &self,
        offer_id: &OfferId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Offer, OfferError> {
        let mut offer = self.owned_offer(offer_id, user_id)?;
        if offer.status != OfferStatus::Draft {
            return Err(OfferError::InvalidState {
                action: "sent",
                status: offer.status,
            });
        }

        let candidate_id = offer.candidate_id.clone().ok_or(OfferError::Unlinked)?;
        let mut candidate = self.linked_candidate(&candidate_id, user_id)?;

        let workflows = self.pipeline.workflows_for_user(user_id)?;
        let offer_workflow = workflows
            .iter()
            .find(|workflow| workflow.enabled && workflow.trigger_stage == CandidateStage::Offer)
            .ok_or(OfferError::NoOfferWorkflow)?;
        let template = self
            .pipeline
            .template(&offer_workflow.template_id)?
            .ok_or(OfferError::TemplateMissing)?;

        let token = OfferToken {
            value: self.tokens.token(),
            expires_at: now + Duration::days(self.company.offer_expiry_days),
        };

        let context = self.offer_context(&candidate, &offer, Some(&token));
        let email = OutboundEmail {
            to: candidate.email.clone(),
            to_name: Some(candidate.full_name.clone()),
            from_name: self.company.sender_name.clone(),
            subject: render(&template.subject, &context),
            body: render(&template.body, &context),
            metadata: BTreeMap::from([
                ("offer_id".to_string(), offer.id.0.clone()),
                ("candidate_id".to_string(), candidate.id.0.clone()),
            ]),
        };
        // The offer email is the operation itself: a delivery failure
        // leaves the offer in draft.
        self.mailer.send(email)?;

        offer.status = OfferStatus::Sent;
        offer.sent_at = Some(now);
        offer.expires_at = token.expires_at;
        offer.token = Some(token);
        self.offers
            .update_from(offer.clone(), OfferStatus::Draft)
            .map_err(OfferError::from_store)?;

        candidate.stage = CandidateStage::Offer;
        self.pipeline.update_candidate(candidate)?;

        Ok(offer)
    }

    /// Candidate opens the response link. Marks `sent` offers as `viewed`;
    /// later statuses are returned unchanged so the page can render the
    /// current state.
    pub fn view_by_token(&self, token: &str, now: DateTime<Utc>) -> Result<Offer, OfferError> {
        let mut offer = self.offer_by_token(token, now)?;
        if offer.status == OfferStatus::Sent {
            offer.status = OfferStatus::Viewed;
            match self.offers.update_from(offer.clone(), OfferStatus::Sent) {
                Ok(()) => {}
                // Lost a race against another actor; the current row is
                // what the page should render.
                Err(OfferStoreError::Conflict { .. }) => return self.offer_by_token(token, now),
                Err(error) => return Err(OfferError::from_store(error)),
            }
        }
        Ok(offer)
    }

    pub fn accept_by_token(&self, token: &str, now: DateTime<Utc>) -> Result<Offer, OfferError> {
        self.respond_by_token(token, OfferResponse::Accepted, now)
    }

    pub fn decline_by_token(&self, token: &str, now: DateTime<Utc>) -> Result<Offer, OfferError> {
        self.respond_by_token(token, OfferResponse::Declined, now)
    }

    /// Candidate proposes different terms. Appends a `counter_offer` event
    /// and moves to `negotiating`; the offer's authoritative terms stay
    /// untouched until the recruiter responds.
    pub fn counter_offer_by_token(
        &self,
        token: &str,
        proposal: CounterProposal,
        now: DateTime<Utc>,
    ) -> Result<Offer, OfferError> {
        let mut offer = self.offer_by_token(token, now)?;
        if !offer.status.awaiting_response() {
            return Err(OfferError::AlreadyResponded {
                status: offer.status,
            });
        }
        let observed = offer.status;

        offer.negotiation_history.append(NegotiationEvent {
            kind: NegotiationEventKind::CounterOffer,
            at: now,
            terms: Some(proposal.terms),
            message: proposal.message,
        });
        offer.status = OfferStatus::Negotiating;
        self.offers
            .update_from(offer.clone(), observed)
            .map_err(OfferError::from_store)?;
        Ok(offer)
    }

    /// Recruiter replies to a counter with a revised proposal. Optionally
    /// applies the revised terms, issues a fresh token superseding the old
    /// one, and notifies the candidate with a new response link. The offer
    /// stays in `negotiating`.
    pub fn respond_to_counter_offer(
        &self,
        offer_id: &OfferId,
        user_id: &UserId,
        updated_terms: Option<OfferTerms>,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Offer, OfferError> {
        let mut offer = self.owned_offer(offer_id, user_id)?;
        if offer.status != OfferStatus::Negotiating {
            return Err(OfferError::InvalidState {
                action: "responded to",
                status: offer.status,
            });
        }

        offer.negotiation_history.append(NegotiationEvent {
            kind: NegotiationEventKind::CounterOfferResponse,
            at: now,
            terms: updated_terms.clone(),
            message,
        });
        if let Some(terms) = updated_terms {
            offer.terms = terms;
        }
        let token = OfferToken {
            value: self.tokens.token(),
            expires_at: now + Duration::days(self.company.offer_expiry_days),
        };
        offer.expires_at = token.expires_at;
        offer.token = Some(token);

        self.offers
            .update_from(offer.clone(), OfferStatus::Negotiating)
            .map_err(OfferError::from_store)?;
        self.notify_candidate(&offer, TemplateType::CounterOfferResponse);
        Ok(offer)
    }

    /// Recruiter accepts the candidate's latest counter: its terms become
    /// authoritative, the offer resolves to `accepted`, and the candidate
    /// is promoted to `hired`.
    pub fn accept_counter_offer(
        &self,
        offer_id: &OfferId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Offer, OfferError> {
        let mut offer = self.owned_offer(offer_id, user_id)?;
        if offer.status != OfferStatus::Negotiating {
            return Err(OfferError::InvalidState {
                action: "accepted",
                status: offer.status,
            });
        }

        let terms = offer
            .negotiation_history
            .latest_counter_offer()
            .and_then(|event| event.terms.clone())
            .ok_or(OfferError::NoCounterOffer)?;

        offer.terms = terms.clone();
        offer.status = OfferStatus::Accepted;
        offer.resolved_at = Some(now);
        offer.negotiation_history.append(NegotiationEvent {
            kind: NegotiationEventKind::CounterOfferAccepted,
            at: now,
            terms: Some(terms),
            message: None,
        });
        self.offers
            .update_from(offer.clone(), OfferStatus::Negotiating)
            .map_err(OfferError::from_store)?;

        self.promote_hired(&offer);
        self.notify_candidate(&offer, TemplateType::OfferAccepted);
        Ok(offer)
    }

    /// Recruiter declines the candidate's counter: the offer reverts to
    /// `sent` with the original terms still standing and open for
    /// response.
    pub fn decline_counter_offer(
        &self,
        offer_id: &OfferId,
        user_id: &UserId,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Offer, OfferError> {
        let mut offer = self.owned_offer(offer_id, user_id)?;
        if offer.status != OfferStatus::Negotiating {
            return Err(OfferError::InvalidState {
                action: "declined",
                status: offer.status,
            });
        }

        offer.status = OfferStatus::Sent;
        offer.negotiation_history.append(NegotiationEvent {
            kind: NegotiationEventKind::CounterOfferDeclined,
            at: now,
            terms: None,
            message,
        });
        self.offers
            .update_from(offer.clone(), OfferStatus::Negotiating)
            .map_err(OfferError::from_store)?;
        self.notify_candidate(&offer, TemplateType::CounterOfferResponse);
        Ok(offer)
    }

    /// Explicit business expiry, independent of token expiry. Token expiry
    /// merely blocks candidate actions; this retires the offer itself.
    pub fn expire_offer(
        &self,
        offer_id: &OfferId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Offer, OfferError> {
        let mut offer = self.owned_offer(offer_id, user_id)?;
        if offer.status.is_terminal() {
            return Err(OfferError::InvalidState {
                action: "expired",
                status: offer.status,
            });
        }

        let observed = offer.status;
        offer.status = OfferStatus::Expired;
        offer.resolved_at = Some(now);
        self.offers
            .update_from(offer.clone(), observed)
            .map_err(OfferError::from_store)?;
        Ok(offer)
    }

    /// Terms are mutable only while drafting or negotiating.
    pub fn update_terms(
        &self,
        offer_id: &OfferId,
        user_id: &UserId,
        terms: OfferTerms,
    ) -> Result<Offer, OfferError> {
        let mut offer = self.owned_offer(offer_id, user_id)?;
        if !offer.status.terms_mutable() {
            return Err(OfferError::TermsLocked(offer.status));
        }

        let observed = offer.status;
        offer.terms = terms;
        self.offers
            .update_from(offer.clone(), observed)
            .map_err(OfferError::from_store)?;
        Ok(offer)
    }

    pub fn offer(&self, offer_id: &OfferId, user_id: &UserId) -> Result<Offer, OfferError> {
        self.owned_offer(offer_id, user_id)
    }

    fn respond_by_token(
        &self,
        token: &str,
        response: OfferResponse,
        now: DateTime<Utc>,
    ) -> Result<Offer, OfferError> {
        let offer = self
            .offers
            .resolve_by_token(token, response, now)
            .map_err(OfferError::from_token_store)?;

        if response == OfferResponse::Accepted {
            self.promote_hired(&offer);
        }
        let confirmation = match response {
            OfferResponse::Accepted => TemplateType::OfferAccepted,
            OfferResponse::Declined => TemplateType::OfferDeclined,
        };
        self.notify_candidate(&offer, confirmation);

        Ok(offer)
    }

    fn offer_by_token(&self, token: &str, now: DateTime<Utc>) -> Result<Offer, OfferError> {
        let offer = self
            .offers
            .find_by_token(token)
            .map_err(OfferError::Store)?
            .ok_or(OfferError::UnknownToken)?;
        if offer
            .token
            .as_ref()
            .is_some_and(|offer_token| offer_token.expired(now))
        {
            return Err(OfferError::TokenExpired);
        }
        Ok(offer)
    }

    fn owned_offer(&self, offer_id: &OfferId, user_id: &UserId) -> Result<Offer, OfferError> {
        self.offers
            .fetch(offer_id)
            .map_err(OfferError::from_store)?
            .filter(|offer| offer.user_id == *user_id)
            .ok_or(OfferError::NotFound)
    }

    fn linked_candidate(
        &self,
        candidate_id: &CandidateId,
        user_id: &UserId,
    ) -> Result<Candidate, OfferError> {
        self.pipeline
            .candidate(candidate_id)?
            .filter(|candidate| candidate.user_id == *user_id)
            .ok_or(OfferError::CandidateMissing)
    }

    /// Terminal-accept side effect: the linked candidate becomes `hired`.
    /// Best-effort; the resolved offer status stays authoritative even if
    /// the candidate record has since vanished.
    fn promote_hired(&self, offer: &Offer) {
        let Some(candidate_id) = &offer.candidate_id else {
            return;
        };
        match self.pipeline.candidate(candidate_id) {
            Ok(Some(mut candidate)) => {
                candidate.stage = CandidateStage::Hired;
                if let Err(error) = self.pipeline.update_candidate(candidate) {
                    warn!(candidate = %candidate_id.0, %error, "failed to promote accepted candidate");
                }
            }
            Ok(None) => {
                warn!(candidate = %candidate_id.0, "accepted offer references missing candidate");
            }
            Err(error) => {
                warn!(candidate = %candidate_id.0, %error, "candidate lookup failed after offer accept");
            }
        }
    }

    /// Best-effort notification using the owner's template of the given
    /// offer-driven type. Absence of a template or a delivery failure is
    /// logged, never propagated: the state change already committed.
    fn notify_candidate(&self, offer: &Offer, template_type: TemplateType) {
        let Some(candidate_id) = &offer.candidate_id else {
            return;
        };
        let candidate = match self.pipeline.candidate(candidate_id) {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                warn!(candidate = %candidate_id.0, "offer notification dropped: candidate gone");
                return;
            }
            Err(error) => {
                warn!(candidate = %candidate_id.0, %error, "offer notification dropped: store error");
                return;
            }
        };

        let templates = match self.pipeline.templates_for_user(&offer.user_id) {
            Ok(templates) => templates,
            Err(error) => {
                warn!(%error, "offer notification dropped: template lookup failed");
                return;
            }
        };
        let Some(template) = templates
            .iter()
            .find(|template| template.template_type == template_type)
        else {
            debug!(
                template_type = template_type.label(),
                "no template configured, offer notification skipped"
            );
            return;
        };

        let context = self.offer_context(&candidate, offer, offer.token.as_ref());
        let email = OutboundEmail {
            to: candidate.email.clone(),
            to_name: Some(candidate.full_name.clone()),
            from_name: self.company.sender_name.clone(),
            subject: render(&template.subject, &context),
            body: render(&template.body, &context),
            metadata: BTreeMap::from([
                ("offer_id".to_string(), offer.id.0.clone()),
                ("template_type".to_string(), template_type.label().to_string()),
            ]),
        };
        if let Err(error) = self.mailer.send(email) {
            warn!(offer = %offer.id.0, %error, "offer notification failed");
        }
    }

    fn offer_context(
        &self,
        candidate: &Candidate,
        offer: &Offer,
        token: Option<&OfferToken>,
    ) -> MessageContext {
        let mut context = MessageContext::for_candidate(candidate, &self.company);
        context.job_title = Some(offer.position_title.clone());
        context.salary = Some(offer.terms.salary.display());
        context.salary_amount = Some(offer.terms.salary.amount.to_string());
        context.salary_currency = Some(offer.terms.salary.currency.clone());
        context.salary_period = Some(offer.terms.salary.period.label().to_string());
        context.start_date = Some(offer.terms.start_date.format("%Y-%m-%d").to_string());
        context.expires_at = Some(offer.expires_at.format("%Y-%m-%d").to_string());
        if !offer.terms.benefits.is_empty() {
            context.benefits = Some(offer.terms.benefits.join(", "));
        }
        context.notes = offer.notes.clone();
        context.offer_response_link = token.map(|token| {
            format!(
                "{}/offers/respond/{}",
                self.company.public_base_url.trim_end_matches('/'),
                token.value
            )
        });
        context
    }
}
