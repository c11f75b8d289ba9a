//! Fragment marketplace integration
//!
//! Fetches a username's marketplace page and interprets it into a typed
//! [`ListingRecord`](crate::types::ListingRecord).

pub mod client;
pub mod interpreter;

pub use client::{FragmentClient, PageOutcome, PageSource};
pub use interpreter::interpret;

/// Marker whose absence on an auction page triggers the on-chain
/// provenance lookup
pub const OWNERSHIP_HISTORY_MARKER: &str = "Ownership History";

/// True when the page carries no ownership-history section
pub fn lacks_ownership_history(html: &str) -> bool {
    !html.contains(OWNERSHIP_HISTORY_MARKER)
}
