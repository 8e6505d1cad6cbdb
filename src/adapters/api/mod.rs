//! Portal HTTP adapter.

pub mod client;
pub mod types;

pub use client::{PortalClient, PortalClientConfig};
