//! # Header Verifier
//!
//! The chain-link/timestamp/bookkeeper-quorum verification pipeline
//! (SPEC-4.2), parameterized over `ConsensusType` so one call site serves
//! both VBFT and non-VBFT chains.

pub mod errors;
pub mod verifier;

pub use errors::VerifierError;
pub use verifier::verify_header;
