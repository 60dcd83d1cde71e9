//! Evidence supplied by the caller about a request.
//!
//! This module provides:
//! - The per-request evidence store
//! - Key filters that stages use to declare which evidence they read

mod filter;
mod store;

pub use filter::{BasicListEvidenceKeyFilter, EvidenceKeyFilter, PrefixEvidenceKeyFilter};
pub use store::EvidenceStore;
