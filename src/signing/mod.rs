//! Wallet authorization: canonical payloads, detached ed25519 signatures and
//! the signed body that wallet-mutating endpoints require.
//!
//! The flow is always the same: stamp a [`SignedPayload`], [`sign`] its
//! canonical JSON, [`verify`] the result locally, and only then hand the
//! [`SignedBody`] to the network. [`build_signed_body`] runs all of it.

mod keypair;
mod payload;

use ed25519_dalek::{Signer as _, Verifier as _};

pub use keypair::{Keypair, PublicKey};
pub use payload::{Signature, SignedBody, SignedPayload};

use crate::Result;
use crate::error::Error;

/// Signs the canonical serialization of `payload` with `secret_key`.
///
/// `secret_key` is a 64-byte wallet key or a 32-byte seed. The payload is
/// not modified and is not embedded in the returned signature.
pub fn sign(payload: &SignedPayload, secret_key: &[u8]) -> Result<Signature> {
    let keypair = Keypair::from_bytes(secret_key)?;
    sign_with(payload, &keypair)
}

/// Checks `signature` against `payload` and the base58 `public_key`.
///
/// Malformed signature or key text is reported as `false`, never as an error.
#[must_use]
pub fn verify(payload: &SignedPayload, signature: &str, public_key: &str) -> bool {
    let Ok(public_key) = public_key.parse::<PublicKey>() else {
        return false;
    };
    let Ok(signature) = signature.parse::<Signature>() else {
        return false;
    };
    let Ok(message) = payload.canonical_bytes() else {
        return false;
    };

    let signature = ed25519_dalek::Signature::from_bytes(&signature.to_bytes());
    public_key
        .verifying_key()
        .verify(&message, &signature)
        .is_ok()
}

/// Builds the `{payload, signature}` body for `subject_id`, signed by `keypair`.
///
/// The body is returned only if its signature verifies locally against the
/// keypair's public key; otherwise the call fails with
/// [`Kind::BodyConstruction`](crate::error::Kind::BodyConstruction) and the
/// caller must not submit anything.
pub fn build_signed_body(subject_id: &str, keypair: &Keypair) -> Result<SignedBody> {
    let owner = keypair.public_key();
    let payload = SignedPayload::new(&owner, subject_id);
    seal(payload, keypair, &owner)
}

fn sign_with(payload: &SignedPayload, keypair: &Keypair) -> Result<Signature> {
    let message = payload.canonical_bytes()?;
    Ok(keypair.signing_key().sign(&message).into())
}

fn seal(
    payload: SignedPayload,
    keypair: &Keypair,
    verify_against: &PublicKey,
) -> Result<SignedBody> {
    let signature = sign_with(&payload, keypair)?;

    if !verify(&payload, &signature.to_string(), &verify_against.to_string()) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            account_id = %payload.subject_id,
            public_key = %verify_against,
            "signed body failed local verification"
        );
        return Err(Error::body_construction(payload.subject_id));
    }

    Ok(SignedBody { payload, signature })
}
