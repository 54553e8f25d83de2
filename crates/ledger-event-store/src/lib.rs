//! # Event Store
//!
//! Idempotent per-tx execute-notify and per-block tx-hash-list
//! persistence (SPEC-4.3).

pub mod errors;
pub mod store;

pub use errors::EventStoreError;
pub use store::EventStore;
