use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::Result;
use crate::config::Config;
use crate::error::Error;
use crate::signing::{self, Keypair, PublicKey, SignedBody};
use crate::subscription::OrderSubscription;
use crate::types::request::{
    BankAccountBody, InitiateBody, OfframpOrderRequest, OnrampOrderRequest, TokenAmountQuery,
    ValueQuery, VerifyBody,
};
use crate::types::response::{
    AllRates, Bank, BankAccount, FiatValue, InitiateResponse, OfframpOrder, OfframpValue,
    OnrampOrder, OnrampValue, Rate, RateByAmount, ResolvedBankAccount, Session, TokenUsdcValue,
    TokenValue, Transaction, TxPoolAddress, Wallet,
};
use crate::types::{DeviceSignature, Identity, RateType};

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// How a request proves who is calling.
enum Auth<'req> {
    None,
    /// Business API key, used to open and verify sessions.
    ApiKey(&'req SecretString),
    /// Session token returned by [`Client::verify`].
    Bearer(&'req SecretString),
}

/// Request gateway for the ramp REST API.
///
/// The target host is fixed at construction. Cloning is cheap and shares the
/// underlying connection pool.
#[derive(Clone, Debug)]
pub struct Client {
    config: Arc<Config>,
    client: ReqwestClient,
}

impl Client {
    pub fn new(config: Config) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.request_timeout)
            .build()?;
        Self::with_client(config, client)
    }

    /// Creates a client that sends through a caller-configured HTTP client.
    pub fn with_client(config: Config, client: ReqwestClient) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn host(&self) -> &Url {
        &self.config.api_host
    }

    /// Sends a one-time password to `identity`.
    pub async fn initiate(
        &self,
        identity: &Identity,
        api_key: &SecretString,
    ) -> Result<InitiateResponse> {
        self.send_json(
            Method::POST,
            "pub/initiate",
            &InitiateBody { identity },
            Auth::ApiKey(api_key),
        )
        .await
    }

    /// Exchanges the OTP for a session token bound to `device`.
    pub async fn verify(
        &self,
        identity: &Identity,
        otp: &str,
        device: &DeviceSignature,
        api_key: &SecretString,
    ) -> Result<Session> {
        if otp.trim().is_empty() {
            return Err(Error::validation("otp must not be empty"));
        }

        self.send_json(
            Method::POST,
            "pub/verify",
            &VerifyBody {
                identity,
                otp,
                device,
            },
            Auth::ApiKey(api_key),
        )
        .await
    }

    pub async fn all_rates(&self) -> Result<AllRates> {
        self.get("pub/rate", Auth::None).await
    }

    pub async fn rate_by_amount(&self, amount: Decimal) -> Result<RateByAmount> {
        self.get(&format!("pub/rate/{amount}"), Auth::None).await
    }

    pub async fn rate_by_type(&self, rate_type: RateType) -> Result<Rate> {
        self.get(&format!("pub/rate/{rate_type}"), Auth::None).await
    }

    /// USDC value of `amount` units of `mint`.
    pub async fn token_usdc_value(&self, amount: Decimal, mint: &str) -> Result<TokenUsdcValue> {
        self.get_with_query("pub/rate/value", &TokenAmountQuery { amount, mint }, Auth::None)
            .await
    }

    pub async fn onramp_value(
        &self,
        query: &ValueQuery,
        token: &SecretString,
    ) -> Result<OnrampValue> {
        self.get_with_query("pub/rates/onramp-value", query, Auth::Bearer(token))
            .await
    }

    pub async fn offramp_value(
        &self,
        query: &ValueQuery,
        token: &SecretString,
    ) -> Result<OfframpValue> {
        self.get_with_query("pub/rates/offramp-value", query, Auth::Bearer(token))
            .await
    }

    pub async fn fiat_value(&self, query: &ValueQuery, token: &SecretString) -> Result<FiatValue> {
        self.get_with_query("pub/rates/fiat-value", query, Auth::Bearer(token))
            .await
    }

    pub async fn token_value(
        &self,
        query: &ValueQuery,
        token: &SecretString,
    ) -> Result<TokenValue> {
        self.get_with_query("pub/rates/token-value", query, Auth::Bearer(token))
            .await
    }

    pub async fn banks(&self, token: &SecretString) -> Result<Vec<Bank>> {
        self.get("pub/bank", Auth::Bearer(token)).await
    }

    /// Looks up the account holder for `account_number` at `bank_id`.
    pub async fn resolve_bank_account(
        &self,
        token: &SecretString,
        bank_id: &str,
        account_number: &str,
    ) -> Result<ResolvedBankAccount> {
        self.get_with_query(
            "pub/bank-account/confirm",
            &BankAccountBody {
                bank_id,
                account_number,
            },
            Auth::Bearer(token),
        )
        .await
    }

    pub async fn add_bank_account(
        &self,
        token: &SecretString,
        bank_id: &str,
        account_number: &str,
    ) -> Result<BankAccount> {
        self.send_json(
            Method::POST,
            "pub/bank-account",
            &BankAccountBody {
                bank_id,
                account_number,
            },
            Auth::Bearer(token),
        )
        .await
    }

    pub async fn bank_accounts(&self, token: &SecretString) -> Result<Vec<BankAccount>> {
        self.get("pub/bank-account", Auth::Bearer(token)).await
    }

    pub async fn transactions(&self, token: &SecretString) -> Result<Vec<Transaction>> {
        self.get("pub/transactions", Auth::Bearer(token)).await
    }

    pub async fn transaction(&self, token: &SecretString, id: &str) -> Result<Transaction> {
        self.get(&format!("pub/transactions/{}", path_segment("id", id)?), Auth::Bearer(token))
            .await
    }

    pub async fn create_onramp_order(
        &self,
        order: &OnrampOrderRequest,
        token: &SecretString,
    ) -> Result<OnrampOrder> {
        self.send_json(Method::POST, "pub/onramp", order, Auth::Bearer(token))
            .await
    }

    pub async fn create_offramp_order(
        &self,
        order: &OfframpOrderRequest,
        token: &SecretString,
    ) -> Result<OfframpOrder> {
        self.send_json(Method::POST, "pub/offramp", order, Auth::Bearer(token))
            .await
    }

    /// Address that offramp deposits are sent to.
    pub async fn tx_pool_address(&self) -> Result<TxPoolAddress> {
        self.get("pub/txpool-address", Auth::None).await
    }

    pub async fn wallet(&self, public_key: &PublicKey) -> Result<Wallet> {
        self.get(&format!("pub/wallet/{public_key}"), Auth::None)
            .await
    }

    /// Registers `keypair`'s wallet against bank account `account_id`.
    ///
    /// The signed body is built and verified before any request is made.
    pub async fn add_wallet(
        &self,
        token: &SecretString,
        account_id: &str,
        keypair: &Keypair,
    ) -> Result<Wallet> {
        let body = self.signed_body(account_id, keypair)?;
        self.send_json(Method::POST, "pub/wallet", &body, Auth::Bearer(token))
            .await
    }

    /// Points wallet `wallet_id` at bank account `account_id`.
    pub async fn switch_wallet_bank_account(
        &self,
        token: &SecretString,
        account_id: &str,
        wallet_id: &str,
        keypair: &Keypair,
    ) -> Result<Wallet> {
        let body = self.signed_body(account_id, keypair)?;
        let path = format!("pub/wallet/{}", path_segment("wallet_id", wallet_id)?);
        self.send_json(Method::PATCH, &path, &body, Auth::Bearer(token))
            .await
    }

    /// An unconnected live-update subscription for `order_id` on this
    /// client's socket host.
    #[cfg(feature = "ws")]
    #[must_use]
    pub fn observe_order(&self, order_id: &str) -> OrderSubscription {
        OrderSubscription::new(
            order_id,
            Arc::new(crate::subscription::WebSocketTransport::new(
                self.config.socket_host.clone(),
                self.config.connect_timeout,
            )),
        )
    }

    /// Like [`observe_order`](Self::observe_order) but over a caller-supplied transport.
    #[must_use]
    pub fn observe_order_with(
        &self,
        order_id: &str,
        transport: Arc<dyn crate::subscription::Transport>,
    ) -> OrderSubscription {
        OrderSubscription::new(order_id, transport)
    }

    fn signed_body(&self, account_id: &str, keypair: &Keypair) -> Result<SignedBody> {
        if account_id.trim().is_empty() {
            return Err(Error::validation("account_id must not be empty"));
        }
        signing::build_signed_body(account_id, keypair)
    }

    async fn get<Response: DeserializeOwned>(
        &self,
        path: &str,
        auth: Auth<'_>,
    ) -> Result<Response> {
        let request = self
            .client
            .request(Method::GET, self.endpoint(path)?)
            .build()?;
        crate::request(&self.client, request, Some(auth_headers(&auth)?)).await
    }

    async fn get_with_query<Query: Serialize + ?Sized, Response: DeserializeOwned>(
        &self,
        path: &str,
        query: &Query,
        auth: Auth<'_>,
    ) -> Result<Response> {
        let request = self
            .client
            .request(Method::GET, self.endpoint(path)?)
            .query(query)
            .build()?;
        crate::request(&self.client, request, Some(auth_headers(&auth)?)).await
    }

    async fn send_json<Body: Serialize + ?Sized, Response: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &Body,
        auth: Auth<'_>,
    ) -> Result<Response> {
        let request = self
            .client
            .request(method, self.endpoint(path)?)
            .json(body)
            .build()?;
        crate::request(&self.client, request, Some(auth_headers(&auth)?)).await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.config.api_host.join(path)?)
    }
}

fn auth_headers(auth: &Auth<'_>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    match auth {
        Auth::None => {}
        Auth::ApiKey(key) => {
            headers.insert(API_KEY_HEADER, sensitive_value(key.expose_secret())?);
        }
        Auth::Bearer(token) => {
            headers.insert(
                AUTHORIZATION,
                sensitive_value(&format!("Bearer {}", token.expose_secret()))?,
            );
        }
    }
    Ok(headers)
}

fn sensitive_value(raw: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(raw)
        .map_err(|e| Error::validation(format!("credential is not a valid header value: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

fn path_segment<'req>(field: &str, value: &'req str) -> Result<&'req str> {
    // `%2e` counts as a dot when the URL is normalized
    let dots = value.to_ascii_lowercase().replace("%2e", ".");
    if value.is_empty() || value.contains(['/', '\\', '?', '#']) || dots == "." || dots == ".." {
        return Err(Error::validation(format!(
            "{field} `{value}` cannot be used as a path segment"
        )));
    }
    Ok(value)
}
