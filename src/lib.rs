//! Client SDK for the PAJ fiat ⇄ crypto ramp API.
//!
//! - [`Client`] wraps the REST surface: OTP sessions, banks and bank
//!   accounts, rates and quotes, onramp/offramp orders, transactions and
//!   wallets.
//! - [`signing`] builds the signed `{payload, signature}` body that wallet
//!   mutations require. A body is only ever produced after its ed25519
//!   signature verifies locally.
//! - [`subscription`] follows a single order's status over a live channel.
//!
//! ```rust,ignore
//! use paj_ramp_sdk::{Client, Config, Environment};
//! use paj_ramp_sdk::types::{DeviceSignature, Identity};
//!
//! let client = Client::new(Config::from_environment(Environment::Staging)?)?;
//! let identity = Identity::parse("user@example.com")?;
//! client.initiate(&identity, &api_key).await?;
//! let session = client
//!     .verify(&identity, &otp, &DeviceSignature::for_device("desktop"), &api_key)
//!     .await?;
//! let banks = client.banks(&session.token).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod signing;
pub mod subscription;
pub mod types;

use reqwest::header::HeaderMap;
use reqwest::{Client as ReqwestClient, Request};
use serde::de::DeserializeOwned;

pub use client::Client;
pub use config::{Config, Environment};
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Executes `request`, mapping non-success statuses to [`error::Kind::Status`]
/// with the server's body attached.
///
/// Failures are logged here and returned unchanged; nothing is retried.
pub(crate) async fn request<Response: DeserializeOwned>(
    client: &ReqwestClient,
    mut request: Request,
    headers: Option<HeaderMap>,
) -> Result<Response> {
    let method = request.method().clone();
    let path = request.url().path().to_owned();

    if let Some(headers) = headers {
        request.headers_mut().extend(headers);
    }

    let response = match client.execute(request).await {
        Ok(response) => response,
        Err(err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(%method, %path, error = %err, "request did not complete");
            return Err(err.into());
        }
    };

    let status_code = response.status();
    if !status_code.is_success() {
        let message = response.text().await.unwrap_or_default();
        #[cfg(feature = "tracing")]
        tracing::warn!(
            %method,
            %path,
            status = status_code.as_u16(),
            %message,
            "request rejected by server"
        );
        return Err(Error::status(status_code, method, path, message));
    }

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(%method, %path, error = %err, "response body could not be read");
            return Err(err.into());
        }
    };

    let decoded = decode(&body);
    #[cfg(feature = "tracing")]
    if let Err(err) = &decoded {
        tracing::warn!(%method, %path, error = %err, "response body did not decode");
    }
    decoded
}

#[cfg(feature = "tracing")]
fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let mut json = serde_json::Deserializer::from_slice(body);
    let mut ignored = |path: serde_ignored::Path<'_>| {
        tracing::debug!(field = %path, "ignored response field");
    };
    let value = serde_path_to_error::deserialize(serde_ignored::Deserializer::new(
        &mut json,
        &mut ignored,
    ))?;
    json.end()?;
    Ok(value)
}

#[cfg(not(feature = "tracing"))]
fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(body)?)
}
