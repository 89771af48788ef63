//! Offer documents and the negotiation state machine, including the
//! token-gated candidate response surface and its atomic resolution
//! guarantees.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    NegotiationEvent, NegotiationEventKind, NegotiationHistory, Offer, OfferId, OfferStatus,
    OfferTerms, OfferToken, SalaryPeriod, SalaryTerms,
};
pub use repository::{
    OfferRepository, OfferResponse, OfferStoreError, RandomTokens, TokenGenerator,
};
pub use router::offers_router;
pub use service::{CounterProposal, NewOffer, OfferError, OfferService};
