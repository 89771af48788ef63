//! Hiring pipeline automation: candidate stage tracking, stage-triggered
//! email workflows, and offer negotiation with token-gated candidate
//! responses.

pub mod config;
pub mod error;
pub mod offers;
pub mod pipeline;
pub mod store;
pub mod telemetry;
