use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

use super::domain::{Offer, OfferId, OfferStatus};
use crate::pipeline::domain::UserId;

/// Error enumeration for offer store failures. Token-path variants are
/// deliberately distinguishable so callers can render "already responded"
/// instead of a generic failure.
#[derive(Debug, thiserror::Error)]
pub enum OfferStoreError {
    #[error("offer not found")]
    NotFound,
    #[error("offer response link has expired")]
    TokenExpired,
    #[error("this offer has already been responded to")]
    AlreadyResolved { status: OfferStatus },
    #[error("offer changed concurrently, now {}", status.label())]
    Conflict { status: OfferStatus },
    #[error("offer store unavailable: {0}")]
    Unavailable(String),
}

/// The two terminal outcomes a candidate can pick through a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferResponse {
    Accepted,
    Declined,
}

impl OfferResponse {
    pub const fn status(self) -> OfferStatus {
        match self {
            OfferResponse::Accepted => OfferStatus::Accepted,
            OfferResponse::Declined => OfferStatus::Declined,
        }
    }
}

/// Storage abstraction for offers.
///
/// `resolve_by_token` is the concurrency-critical seam: token validation
/// (existence, expiry, respondable status) and the terminal status write
/// must happen as one atomic conditional update, so two concurrent
/// responses against the same token can never both succeed. In-memory
/// implementations hold one lock across check-and-mutate; a database
/// implementation would use a conditional UPDATE or serializable
/// transaction.
pub trait OfferRepository: Send + Sync {
    fn insert(&self, offer: Offer) -> Result<Offer, OfferStoreError>;
    fn fetch(&self, id: &OfferId) -> Result<Option<Offer>, OfferStoreError>;
    /// Unconditional overwrite. Lifecycle paths go through `update_from`
    /// so a concurrent resolution cannot be clobbered.
    fn update(&self, offer: Offer) -> Result<(), OfferStoreError>;
    /// Conditional overwrite: writes `offer` only while the stored status
    /// still equals `expected`, the status the caller observed when it
    /// read the row. A mismatch leaves the row untouched and returns
    /// `Conflict` with the current status. Database implementations
    /// express this as `UPDATE ... WHERE status = expected`.
    fn update_from(&self, offer: Offer, expected: OfferStatus) -> Result<(), OfferStoreError>;
    fn offers_for_user(&self, user: &UserId) -> Result<Vec<Offer>, OfferStoreError>;
    fn find_by_token(&self, token: &str) -> Result<Option<Offer>, OfferStoreError>;

    /// Atomically validate `token` and move the offer to the terminal
    /// status for `response`, stamping `resolved_at = now`. Exactly one of
    /// two concurrent calls succeeds; the loser observes
    /// `AlreadyResolved`.
    fn resolve_by_token(
        &self,
        token: &str,
        response: OfferResponse,
        now: DateTime<Utc>,
    ) -> Result<Offer, OfferStoreError>;
}

/// Produces the opaque single-use credentials embedded in offer links.
pub trait TokenGenerator: Send + Sync {
    fn token(&self) -> String;
}

const TOKEN_LENGTH: usize = 48;

/// Default generator: 48 alphanumeric characters from the thread-local
/// CSPRNG, comfortably above the 128-bit entropy floor.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokens;

impl TokenGenerator for RandomTokens {
    fn token(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }
}
