use std::sync::Arc;

use super::common::*;
use crate::offers::domain::OfferStatus;
use crate::offers::repository::{OfferRepository, TokenGenerator};
use crate::offers::service::{OfferError, OfferService};
use crate::pipeline::domain::{CandidateId, CandidateStage};
use crate::pipeline::repository::PipelineRepository;
use crate::store::{InMemoryOfferStore, InMemoryPipelineStore};

#[test]
fn drafts_start_unsent_and_may_be_unlinked() {
    let h = harness();
    let offer = h.service.create_offer(draft(None), at(9)).expect("draft");
    assert_eq!(offer.status, OfferStatus::Draft);
    assert!(offer.candidate_id.is_none());
    assert!(offer.token.is_none());
    assert!(offer.sent_at.is_none());
}

#[test]
fn linked_draft_requires_an_existing_candidate() {
    let h = harness();
    match h.service.create_offer(
        draft(Some(CandidateId("cand-ghost".to_string()))),
        at(9),
    ) {
        Err(OfferError::CandidateMissing) => {}
        other => panic!("expected missing candidate rejection, got {other:?}"),
    }
}

#[test]
fn send_requires_a_linked_candidate() {
    let h = harness();
    let offer = h.service.create_offer(draft(None), at(9)).expect("draft");
    match h.service.send_offer(&offer.id, &user(), at(10)) {
        Err(OfferError::Unlinked) => {}
        other => panic!("expected unlinked rejection, got {other:?}"),
    }
}

#[test]
fn send_requires_an_enabled_offer_workflow() {
    let h = harness();
    let candidate = candidate("1");
    h.pipeline
        .insert_candidate(candidate.clone())
        .expect("insert");
    let offer = h
        .service
        .create_offer(draft(Some(candidate.id)), at(9))
        .expect("draft");

    match h.service.send_offer(&offer.id, &user(), at(10)) {
        Err(OfferError::NoOfferWorkflow) => {}
        other => panic!("expected workflow precondition, got {other:?}"),
    }
}

#[test]
fn send_issues_token_emails_link_and_promotes_candidate() {
    let h = harness();
    let candidate = seed_offer_setup(&h.pipeline, "1");
    let offer = h
        .service
        .create_offer(draft(Some(candidate.id.clone())), at(9))
        .expect("draft");

    let sent = h.service.send_offer(&offer.id, &user(), at(10)).expect("send");
    assert_eq!(sent.status, OfferStatus::Sent);
    assert_eq!(sent.sent_at, Some(at(10)));
    let token = sent.token.clone().expect("token issued");
    assert_eq!(sent.expires_at, token.expires_at);

    let emails = h.mailer.sent();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to, "ada@example.com");
    assert_eq!(emails[0].subject, "Your offer for Backend Engineer");
    assert!(emails[0].body.contains("90000 USD per year"));
    assert!(emails[0].body.contains(&format!(
        "https://hire.northwind.example/offers/respond/{}",
        token.value
    )));

    let promoted = h
        .pipeline
        .candidate(&candidate.id)
        .expect("fetch")
        .expect("present");
    assert_eq!(promoted.stage, CandidateStage::Offer);
}

#[test]
fn send_is_draft_only() {
    let h = harness();
    let candidate = seed_offer_setup(&h.pipeline, "1");
    let offer = h
        .service
        .create_offer(draft(Some(candidate.id)), at(9))
        .expect("draft");
    h.service.send_offer(&offer.id, &user(), at(10)).expect("send");

    match h.service.send_offer(&offer.id, &user(), at(11)) {
        Err(OfferError::InvalidState {
            status: OfferStatus::Sent,
            ..
        }) => {}
        other => panic!("expected invalid state, got {other:?}"),
    }
}

#[test]
fn delivery_failure_keeps_the_offer_in_draft() {
    let offers = Arc::new(InMemoryOfferStore::default());
    let pipeline = Arc::new(InMemoryPipelineStore::default());
    let service = OfferService::new(
        offers.clone(),
        pipeline.clone(),
        Arc::new(FailingMailer),
        Arc::new(SequentialTokens::default()),
        company(),
    );

    let candidate = seed_offer_setup(&pipeline, "1");
    let offer = service
        .create_offer(draft(Some(candidate.id.clone())), at(9))
        .expect("draft");

    match service.send_offer(&offer.id, &user(), at(10)) {
        Err(OfferError::Delivery(_)) => {}
        other => panic!("expected delivery failure, got {other:?}"),
    }

    let stored = offers.fetch(&offer.id).expect("fetch").expect("present");
    assert_eq!(stored.status, OfferStatus::Draft);
    assert!(stored.token.is_none());
    let unchanged = pipeline
        .candidate(&candidate.id)
        .expect("fetch")
        .expect("present");
    assert_eq!(unchanged.stage, CandidateStage::Interview);
}

#[test]
fn first_view_marks_the_offer_viewed() {
    let h = harness();
    let candidate = seed_offer_setup(&h.pipeline, "1");
    let offer = h
        .service
        .create_offer(draft(Some(candidate.id)), at(9))
        .expect("draft");
    let sent = h.service.send_offer(&offer.id, &user(), at(10)).expect("send");
    let token = sent.token.expect("token").value;

    let viewed = h.service.view_by_token(&token, at(11)).expect("view");
    assert_eq!(viewed.status, OfferStatus::Viewed);

    // A later view does not regress or duplicate the state change.
    let again = h.service.view_by_token(&token, at(12)).expect("view again");
    assert_eq!(again.status, OfferStatus::Viewed);
}

#[test]
fn accepting_resolves_the_offer_and_hires_the_candidate() {
    let h = harness();
    let candidate = seed_offer_setup(&h.pipeline, "1");
    let offer = h
        .service
        .create_offer(draft(Some(candidate.id.clone())), at(9))
        .expect("draft");
    let sent = h.service.send_offer(&offer.id, &user(), at(10)).expect("send");
    let token = sent.token.expect("token").value;

    let accepted = h.service.accept_by_token(&token, at(11)).expect("accept");
    assert_eq!(accepted.status, OfferStatus::Accepted);
    assert_eq!(accepted.resolved_at, Some(at(11)));

    let hired = h
        .pipeline
        .candidate(&candidate.id)
        .expect("fetch")
        .expect("present");
    assert_eq!(hired.stage, CandidateStage::Hired);

    let emails = h.mailer.sent();
    assert_eq!(emails.len(), 2, "offer letter plus confirmation");
    assert_eq!(emails[1].subject, "Welcome aboard");
}

#[test]
fn declining_resolves_without_touching_the_stage() {
    let h = harness();
    let candidate = seed_offer_setup(&h.pipeline, "1");
    let offer = h
        .service
        .create_offer(draft(Some(candidate.id.clone())), at(9))
        .expect("draft");
    let sent = h.service.send_offer(&offer.id, &user(), at(10)).expect("send");
    let token = sent.token.expect("token").value;

    let declined = h.service.decline_by_token(&token, at(11)).expect("decline");
    assert_eq!(declined.status, OfferStatus::Declined);

    let unchanged = h
        .pipeline
        .candidate(&candidate.id)
        .expect("fetch")
        .expect("present");
    assert_eq!(unchanged.stage, CandidateStage::Offer);

    let emails = h.mailer.sent();
    assert_eq!(emails.last().expect("confirmation").subject, "Sorry to hear");
}

#[test]
fn missing_confirmation_template_is_not_an_error() {
    let h = harness();
    let candidate = candidate("1");
    h.pipeline
        .insert_candidate(candidate.clone())
        .expect("insert");
    let offer = seed_offer(&h.offers, "1", Some(candidate.id), OfferStatus::Negotiating);

    // No templates exist at all; resolving through the recruiter path
    // still succeeds, it just sends nothing.
    h.service
        .decline_counter_offer(&offer.id, &user(), None, at(11))
        .expect("decline counter");
    assert!(h.mailer.sent().is_empty());
}

#[test]
fn expire_retires_any_open_offer() {
    let h = harness();
    let offer = seed_offer(&h.offers, "1", None, OfferStatus::Sent);

    let expired = h.service.expire_offer(&offer.id, &user(), at(11)).expect("expire");
    assert_eq!(expired.status, OfferStatus::Expired);
    assert_eq!(expired.resolved_at, Some(at(11)));

    match h.service.expire_offer(&offer.id, &user(), at(12)) {
        Err(OfferError::InvalidState {
            status: OfferStatus::Expired,
            ..
        }) => {}
        other => panic!("expected terminal rejection, got {other:?}"),
    }
}

#[test]
fn terms_are_locked_outside_draft_and_negotiating() {
    let h = harness();
    let open = seed_offer(&h.offers, "1", None, OfferStatus::Draft);
    h.service
        .update_terms(&open.id, &user(), terms(95_000))
        .expect("draft terms mutable");

    let sent = seed_offer(&h.offers, "2", None, OfferStatus::Sent);
    match h.service.update_terms(&sent.id, &user(), terms(95_000)) {
        Err(OfferError::TermsLocked(OfferStatus::Sent)) => {}
        other => panic!("expected locked terms, got {other:?}"),
    }
}

#[test]
fn offers_are_scoped_to_their_owner() {
    let h = harness();
    let offer = seed_offer(&h.offers, "1", None, OfferStatus::Draft);
    match h
        .service
        .offer(&offer.id, &crate::pipeline::domain::UserId("user-2".to_string()))
    {
        Err(OfferError::NotFound) => {}
        other => panic!("expected not found for foreign user, got {other:?}"),
    }
}

#[test]
fn sequential_tokens_are_unique() {
    let tokens = SequentialTokens::default();
    let first = tokens.token();
    let second = tokens.token();
    assert_ne!(first, second);
}
