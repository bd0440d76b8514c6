use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{
    KEYPAIR_LENGTH, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SigningKey, VerifyingKey,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::Result;
use crate::error::Error;

/// An ed25519 wallet keypair in the Solana convention.
///
/// The caller owns the keypair. Signing functions borrow it for the duration
/// of one call and never copy the secret half anywhere else; the key is
/// zeroized when dropped.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    #[must_use]
    pub fn generate() -> Self {
        let seed = Zeroizing::new(rand::random::<[u8; SECRET_KEY_LENGTH]>());
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// Accepts either the 64-byte `secret || public` wallet encoding or a bare 32-byte seed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            KEYPAIR_LENGTH => {
                let mut full = Zeroizing::new([0_u8; KEYPAIR_LENGTH]);
                full.copy_from_slice(bytes);
                let signing = SigningKey::from_keypair_bytes(&full)
                    .map_err(|e| Error::signing(format!("inconsistent keypair bytes: {e}")))?;
                Ok(Self { signing })
            }
            SECRET_KEY_LENGTH => {
                let mut seed = Zeroizing::new([0_u8; SECRET_KEY_LENGTH]);
                seed.copy_from_slice(bytes);
                Ok(Self {
                    signing: SigningKey::from_bytes(&seed),
                })
            }
            other => Err(Error::signing(format!(
                "expected {KEYPAIR_LENGTH} or {SECRET_KEY_LENGTH} key bytes, got {other}"
            ))),
        }
    }

    pub fn from_base58(encoded: &str) -> Result<Self> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map(Zeroizing::new)
            .map_err(|e| Error::signing(format!("secret key is not base58: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Parses the `[12, 250, ...]` byte-array format used by wallet files.
    pub fn from_json_array(json: &str) -> Result<Self> {
        let bytes: Zeroizing<Vec<u8>> = serde_json::from_str(json)
            .map(Zeroizing::new)
            .map_err(|e| Error::signing(format!("wallet file is not a byte array: {e}")))?;
        Self::from_bytes(&bytes)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; KEYPAIR_LENGTH] {
        self.signing.to_keypair_bytes()
    }

    pub fn to_json_array(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_bytes().to_vec())?)
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// The public half of a [`Keypair`], displayed as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; PUBLIC_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_e: std::array::TryFromSliceError| {
                Error::validation(format!(
                    "public key must be {PUBLIC_KEY_LENGTH} bytes, got {}",
                    bytes.len()
                ))
            })?;
        VerifyingKey::from_bytes(&raw)
            .map(Self)
            .map_err(|e| Error::validation(format!("not an ed25519 point: {e}")))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        self.0.as_bytes()
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0.as_bytes()).into_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| Error::validation(format!("public key is not base58: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
