use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use ed25519_dalek::SIGNATURE_LENGTH;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Result;
use crate::error::Error;
use crate::signing::PublicKey;

/// The message a wallet signs to authorize a wallet or bank-account change.
///
/// Field order here is the wire order; it must never change, because the
/// server re-serializes the same struct and checks the signature over it.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    #[serde(rename = "publicKey")]
    pub owner_public_key: String,
    #[serde(rename = "accountId")]
    pub subject_id: String,
    #[serde(rename = "timestamp")]
    pub issued_at: String,
}

impl SignedPayload {
    /// Creates a payload stamped with the current time.
    #[must_use]
    pub fn new<S: Into<String>>(owner: &PublicKey, subject_id: S) -> Self {
        Self {
            owner_public_key: owner.to_string(),
            subject_id: subject_id.into(),
            issued_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Canonical bytes that signatures are computed over.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Detached ed25519 signature, base58 on the wire.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        self.0
    }
}

impl From<ed25519_dalek::Signature> for Signature {
    fn from(signature: ed25519_dalek::Signature) -> Self {
        Self(signature.to_bytes())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::validation(format!("signature is not base58: {e}")))?;
        let raw: [u8; SIGNATURE_LENGTH] = bytes.as_slice().try_into().map_err(
            |_e: std::array::TryFromSliceError| {
                Error::validation(format!(
                    "signature must be {SIGNATURE_LENGTH} bytes, got {}",
                    bytes.len()
                ))
            },
        )?;
        Ok(Self(raw))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// `{payload, signature}` as submitted to the wallet endpoints.
///
/// Only [`build_signed_body`](crate::signing::build_signed_body) produces
/// one, and only after the signature has verified locally.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBody {
    pub payload: SignedPayload,
    pub signature: Signature,
}
