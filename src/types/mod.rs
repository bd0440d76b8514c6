//! Shared domain types for the ramp API.

pub mod request;
pub mod response;

use std::fmt;
use std::str::FromStr;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::Result;
use crate::error::Error;

pub use rust_decimal::Decimal;

/// Fiat currencies the service settles in.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Currency {
    Ngn,
    Ghs,
    Tzs,
    Kes,
    Zar,
    Usd,
}

/// Chains an onramp order can pay out on.
///
/// Order creation uses the upper-case names; the live update channel
/// reports lower-case ones, so both are accepted.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Chain {
    #[serde(alias = "solana")]
    Solana,
    #[serde(alias = "ethereum")]
    Ethereum,
    #[serde(alias = "polygon")]
    Polygon,
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum RateType {
    OnRamp,
    OffRamp,
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum TransactionStatus {
    Init,
    Paid,
    Completed,
    #[serde(other)]
    Unknown,
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    OnRamp,
    OffRamp,
}

/// Status carried by live order updates.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl OrderStatus {
    /// Whether no further updates are expected for the order.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }
}

/// Who a session OTP is sent to.
///
/// Decided once when the value is built, then serialized as either
/// `{"email": ...}` or `{"phone": ...}`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Identity {
    Email(String),
    Phone(String),
}

const MIN_PHONE_DIGITS: usize = 7;

impl Identity {
    pub fn email<S: Into<String>>(address: S) -> Result<Self> {
        let address = address.into();
        let trimmed = address.trim();
        match trimmed.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
                Ok(Identity::Email(trimmed.to_owned()))
            }
            _ => Err(Error::validation(format!(
                "`{address}` is not an email address"
            ))),
        }
    }

    pub fn phone<S: Into<String>>(number: S) -> Result<Self> {
        let number = number.into();
        let trimmed = number.trim();
        let well_formed = trimmed
            .strip_prefix('+')
            .unwrap_or(trimmed)
            .chars()
            .all(|c| c.is_ascii_digit() || c == ' ' || c == '-');
        let digits = trimmed.chars().filter(char::is_ascii_digit).count();

        if well_formed && digits >= MIN_PHONE_DIGITS {
            Ok(Identity::Phone(trimmed.to_owned()))
        } else {
            Err(Error::validation(format!(
                "`{number}` is not a phone number"
            )))
        }
    }

    /// Classifies free-form input: anything with an `@` must be an email,
    /// everything else must be a phone number.
    pub fn parse(value: &str) -> Result<Self> {
        if value.contains('@') {
            Identity::email(value)
        } else {
            Identity::phone(value)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Identity::Email(value) | Identity::Phone(value) => value,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Identity::parse(s)
    }
}

/// Description of the device a session is verified from.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct DeviceSignature {
    #[builder(into)]
    pub uuid: String,
    #[builder(into)]
    pub device: String,
    #[builder(into)]
    pub os: Option<String>,
    #[builder(into)]
    pub browser: Option<String>,
    #[builder(into)]
    pub ip: Option<String>,
}

impl DeviceSignature {
    /// A signature for `device` with a freshly generated identifier.
    #[must_use]
    pub fn for_device<S: Into<String>>(device: S) -> Self {
        Self::builder()
            .uuid(uuid::Uuid::new_v4().to_string())
            .device(device)
            .build()
    }
}
