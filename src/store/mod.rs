//! In-process storage and delivery backends used by the binary and the
//! test suites.

mod memory;

pub use memory::{InMemoryOfferStore, InMemoryPipelineStore, LoggingMailer};
