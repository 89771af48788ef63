use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::domain::{CandidateId, JobId, UserId};

/// Identifier wrapper for offer documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalaryPeriod {
    Annual,
    Monthly,
    Hourly,
}

impl SalaryPeriod {
    pub const fn label(self) -> &'static str {
        match self {
            SalaryPeriod::Annual => "year",
            SalaryPeriod::Monthly => "month",
            SalaryPeriod::Hourly => "hour",
        }
    }
}

/// Salary triple carried by an offer and by counter proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryTerms {
    pub amount: u64,
    pub currency: String,
    pub period: SalaryPeriod,
}

impl SalaryTerms {
    /// Human-readable form used for the `{salary}` placeholder.
    pub fn display(&self) -> String {
        format!("{} {} per {}", self.amount, self.currency, self.period.label())
    }
}

/// The negotiable substance of an offer. Counter proposals carry a full
/// replacement set of terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferTerms {
    pub salary: SalaryTerms,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub benefits: Vec<String>,
}

/// Lifecycle of an offer document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Draft,
    Sent,
    Viewed,
    Negotiating,
    Accepted,
    Declined,
    Expired,
}

impl OfferStatus {
    pub const fn label(self) -> &'static str {
        match self {
            OfferStatus::Draft => "draft",
            OfferStatus::Sent => "sent",
            OfferStatus::Viewed => "viewed",
            OfferStatus::Negotiating => "negotiating",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Declined => "declined",
            OfferStatus::Expired => "expired",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            OfferStatus::Accepted | OfferStatus::Declined | OfferStatus::Expired
        )
    }

    /// Whether the candidate may still act on the offer through a token.
    pub const fn awaiting_response(self) -> bool {
        matches!(
            self,
            OfferStatus::Sent | OfferStatus::Viewed | OfferStatus::Negotiating
        )
    }

    /// Terms are mutable only while drafting or negotiating.
    pub const fn terms_mutable(self) -> bool {
        matches!(self, OfferStatus::Draft | OfferStatus::Negotiating)
    }

    /// Statuses that satisfy the transition guard's "active offer" rule.
    pub const fn counts_as_active(self) -> bool {
        matches!(
            self,
            OfferStatus::Draft
                | OfferStatus::Sent
                | OfferStatus::Viewed
                | OfferStatus::Negotiating
                | OfferStatus::Accepted
        )
    }
}

/// Single-use opaque credential granting a candidate access to one offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl OfferToken {
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationEventKind {
    CounterOffer,
    CounterOfferResponse,
    CounterOfferAccepted,
    CounterOfferDeclined,
}

impl NegotiationEventKind {
    pub const fn label(self) -> &'static str {
        match self {
            NegotiationEventKind::CounterOffer => "counter_offer",
            NegotiationEventKind::CounterOfferResponse => "counter_offer_response",
            NegotiationEventKind::CounterOfferAccepted => "counter_offer_accepted",
            NegotiationEventKind::CounterOfferDeclined => "counter_offer_declined",
        }
    }
}

/// One entry in the negotiation audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationEvent {
    pub kind: NegotiationEventKind,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<OfferTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Append-only ordered log of negotiation events. The log, not the offer
/// row, is the source of truth for "latest counter offer".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NegotiationHistory(Vec<NegotiationEvent>);

impl NegotiationHistory {
    pub fn append(&mut self, event: NegotiationEvent) {
        self.0.push(event);
    }

    pub fn events(&self) -> &[NegotiationEvent] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The most recent counter proposal, selected by timestamp rather than
    /// array position so out-of-order writes cannot mislead consumers.
    pub fn latest_counter_offer(&self) -> Option<&NegotiationEvent> {
        self.0
            .iter()
            .filter(|event| event.kind == NegotiationEventKind::CounterOffer)
            .max_by_key(|event| event.at)
    }
}

/// A job-offer document and its negotiation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub user_id: UserId,
    /// Unlinked "general" offers are permitted only while drafting.
    pub candidate_id: Option<CandidateId>,
    pub job_id: JobId,
    pub position_title: String,
    pub terms: OfferTerms,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: OfferStatus,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<OfferToken>,
    #[serde(default)]
    pub negotiation_history: NegotiationHistory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}
