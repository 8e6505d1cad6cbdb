//! Ports layer - Async boundaries between usecases and adapters.
//!
//! The portal boundary is a trait so the session state machine can be
//! tested against a mock without a network.

pub mod portal;
pub mod retry;

pub use portal::{AuthGrant, CapitalEntry, PortalApi, PortalError, SubmissionReceipt};
pub use retry::RetryPolicy;
