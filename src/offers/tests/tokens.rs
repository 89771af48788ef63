use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, Utc};

use super::common::*;
use crate::offers::domain::{Offer, OfferId, OfferStatus, OfferToken};
use crate::offers::repository::{OfferRepository, OfferResponse, OfferStoreError};
use crate::offers::service::{CounterProposal, OfferError, OfferService};
use crate::pipeline::domain::UserId;
use crate::store::{InMemoryOfferStore, InMemoryPipelineStore};

#[test]
fn unknown_tokens_resolve_to_not_found() {
    let h = harness();
    match h.service.view_by_token("token-bogus", at(10)) {
        Err(OfferError::UnknownToken) => {}
        other => panic!("expected unknown token, got {other:?}"),
    }
    match h.service.accept_by_token("token-bogus", at(10)) {
        Err(OfferError::UnknownToken) => {}
        other => panic!("expected unknown token, got {other:?}"),
    }
}

#[test]
fn expired_tokens_block_every_candidate_action() {
    let h = harness();
    let candidate = seed_offer_setup(&h.pipeline, "1");
    let offer = h
        .service
        .create_offer(draft(Some(candidate.id)), at(9))
        .expect("draft");
    let sent = h.service.send_offer(&offer.id, &user(), at(10)).expect("send");
    let token = sent.token.expect("token").value;

    let after_expiry = at(10) + Duration::days(7);

    match h.service.view_by_token(&token, after_expiry) {
        Err(OfferError::TokenExpired) => {}
        other => panic!("expected expired token, got {other:?}"),
    }
    match h.service.accept_by_token(&token, after_expiry) {
        Err(OfferError::TokenExpired) => {}
        other => panic!("expected expired token, got {other:?}"),
    }

    // The offer itself is untouched by the failed attempts.
    let stored = h.offers.fetch(&offer.id).expect("fetch").expect("present");
    assert_eq!(stored.status, OfferStatus::Sent);
}

#[test]
fn a_resolved_offer_rejects_further_responses() {
    let h = harness();
    let candidate = seed_offer_setup(&h.pipeline, "1");
    let offer = h
        .service
        .create_offer(draft(Some(candidate.id)), at(9))
        .expect("draft");
    let sent = h.service.send_offer(&offer.id, &user(), at(10)).expect("send");
    let token = sent.token.expect("token").value;

    h.service.accept_by_token(&token, at(11)).expect("accept");

    match h.service.decline_by_token(&token, at(12)) {
        Err(OfferError::AlreadyResponded {
            status: OfferStatus::Accepted,
        }) => {}
        other => panic!("expected already responded, got {other:?}"),
    }
}

#[test]
fn concurrent_responses_resolve_exactly_once() {
    let offers = Arc::new(InMemoryOfferStore::default());
    let mut offer = seed_offer(&offers, "1", None, OfferStatus::Sent);
    offer.token = Some(OfferToken {
        value: "token-race".to_string(),
        expires_at: at(10) + Duration::days(7),
    });
    offers.update(offer).expect("arm token");

    let accept_store = offers.clone();
    let accept = thread::spawn(move || {
        accept_store.resolve_by_token("token-race", OfferResponse::Accepted, at(11))
    });
    let decline_store = offers.clone();
    let decline = thread::spawn(move || {
        decline_store.resolve_by_token("token-race", OfferResponse::Declined, at(11))
    });

    let outcomes = [accept.join().expect("join"), decline.join().expect("join")];
    let wins = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(wins, 1, "exactly one response may land");

    let loss = outcomes
        .iter()
        .find(|outcome| outcome.is_err())
        .expect("one loser");
    match loss {
        Err(OfferStoreError::AlreadyResolved { .. }) => {}
        other => panic!("loser should observe the resolution, got {other:?}"),
    }
}

/// Store wrapper that accepts the offer on the inner store the first time
/// a token lookup hits, so the caller proceeds with a snapshot the
/// candidate has already resolved out from under it.
struct RacingStore {
    inner: Arc<InMemoryOfferStore>,
    raced: AtomicBool,
}

impl OfferRepository for RacingStore {
    fn insert(&self, offer: Offer) -> Result<Offer, OfferStoreError> {
        self.inner.insert(offer)
    }

    fn fetch(&self, id: &OfferId) -> Result<Option<Offer>, OfferStoreError> {
        self.inner.fetch(id)
    }

    fn update(&self, offer: Offer) -> Result<(), OfferStoreError> {
        self.inner.update(offer)
    }

    fn update_from(&self, offer: Offer, expected: OfferStatus) -> Result<(), OfferStoreError> {
        self.inner.update_from(offer, expected)
    }

    fn offers_for_user(&self, user: &UserId) -> Result<Vec<Offer>, OfferStoreError> {
        self.inner.offers_for_user(user)
    }

    fn find_by_token(&self, token: &str) -> Result<Option<Offer>, OfferStoreError> {
        let snapshot = self.inner.find_by_token(token)?;
        if snapshot.is_some() && !self.raced.swap(true, Ordering::SeqCst) {
            self.inner
                .resolve_by_token(token, OfferResponse::Accepted, at(11))
                .expect("concurrent acceptance");
        }
        Ok(snapshot)
    }

    fn resolve_by_token(
        &self,
        token: &str,
        response: OfferResponse,
        now: DateTime<Utc>,
    ) -> Result<Offer, OfferStoreError> {
        self.inner.resolve_by_token(token, response, now)
    }
}

#[test]
fn a_counter_cannot_clobber_a_concurrent_acceptance() {
    let inner = Arc::new(InMemoryOfferStore::default());
    let offers = Arc::new(RacingStore {
        inner: inner.clone(),
        raced: AtomicBool::new(false),
    });
    let pipeline = Arc::new(InMemoryPipelineStore::default());
    let service = OfferService::new(
        offers,
        pipeline.clone(),
        Arc::new(RecordingMailer::default()),
        Arc::new(SequentialTokens::default()),
        company(),
    );

    let candidate = seed_offer_setup(&pipeline, "1");
    let offer = service
        .create_offer(draft(Some(candidate.id)), at(9))
        .expect("draft");
    let sent = service.send_offer(&offer.id, &user(), at(10)).expect("send");
    let token = sent.token.expect("token").value;

    let proposal = CounterProposal {
        terms: terms(120_000),
        message: Some("Hoping for a higher base".to_string()),
    };
    match service.counter_offer_by_token(&token, proposal, at(12)) {
        Err(OfferError::AlreadyResponded {
            status: OfferStatus::Accepted,
        }) => {}
        other => panic!("expected the acceptance to stand, got {other:?}"),
    }

    // The acceptance that landed first is untouched.
    let stored = inner.fetch(&offer.id).expect("fetch").expect("present");
    assert_eq!(stored.status, OfferStatus::Accepted);
    assert_eq!(stored.resolved_at, Some(at(11)));
    assert!(stored.negotiation_history.is_empty());
}

#[test]
fn token_expiry_boundary_is_exclusive_of_the_deadline() {
    let token = OfferToken {
        value: "token-edge".to_string(),
        expires_at: at(10),
    };
    assert!(!token.expired(at(9)));
    assert!(token.expired(at(10)));
    assert!(token.expired(at(11)));
}
