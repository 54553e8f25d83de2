//! # Ledger Storage Engine Test Suite
//!
//! Cross-crate integration flows that no single `ledger-*` crate's own
//! `#[cfg(test)]` module can exercise on its own: a node opened against a
//! real on-disk data directory, restarted mid-stream, and recovered.
//!
//! ```text
//! tests/src/
//! └── integration/   # full-ledger scenarios over a file-backed store
//! ```

pub mod integration;
