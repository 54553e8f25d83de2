//! # Ledger Crypto
//!
//! Ed25519 signing and the multisignature threshold check the header
//! verifier needs (SPEC-4.2). Grounded on `shared-crypto::signatures`,
//! narrowed to only what the ledger needs: sign/verify and an
//! any-`m`-of-`n` multisig check over a bookkeeper set.

use ledger_types::{Hash, PublicKey, Signature};
use thiserror::Error;

/// Errors from signing or verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("invalid signature bytes")]
    InvalidSignature,
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("multisig threshold not met: {valid} of {required} required signatures verified")]
    ThresholdNotMet { valid: usize, required: usize },
}

/// An Ed25519 keypair, used by tests and the genesis bring-up to produce
/// header signatures.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Deterministic keypair from a 32-byte seed (handy for reproducible
    /// tests — no RNG dependency, matching `shared-crypto`'s rationale).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &Hash) -> Signature {
        use ed25519_dalek::Signer;
        self.signing_key.sign(message).to_bytes()
    }
}

/// Verify a single Ed25519 signature share over `message`.
pub fn verify_share(
    pubkey: &PublicKey,
    message: &Hash,
    signature: &[u8],
) -> Result<(), CryptoError> {
    use ed25519_dalek::Verifier;

    let verifying_key =
        ed25519_dalek::VerifyingKey::from_bytes(pubkey).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;
    let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Verify an `m`-of-`n` multisignature: `signers[i]` must have produced
/// `shares[i]` over `message`, and at least `threshold` distinct shares
/// must verify. Mirrors SPEC-4.2's "verify the multi-signature SigData
/// against header.Hash() with threshold m".
///
/// A bad share does not abort the check (a single malformed signer must
/// not be able to deny quorum to the rest) — it simply doesn't count.
pub fn verify_multisig(
    signers: &[PublicKey],
    shares: &[Vec<u8>],
    message: &Hash,
    threshold: usize,
) -> Result<(), CryptoError> {
    let valid = signers
        .iter()
        .zip(shares.iter())
        .filter(|(pk, share)| verify_share(pk, message, share).is_ok())
        .count();

    if valid >= threshold {
        Ok(())
    } else {
        Err(CryptoError::ThresholdNotMet {
            valid,
            required: threshold,
        })
    }
}
