//! Cross-subsystem choreography: a `Ledger` wired to real file-backed
//! sub-stores, driven the way `ledger-node` would drive it.

pub mod file_backed_lifecycle;
