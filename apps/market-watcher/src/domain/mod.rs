//! Domain Layer - Listing records and session bookkeeping.
//!
//! This layer contains the core domain types for the new-listing feed
//! with no I/O. Everything here is pure and deterministic so it can be
//! exercised without a network.

/// Listing records: field extraction policy and rendering.
pub mod listing;

/// Session token lifetime and the process-wide retry budget.
pub mod session;
