use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

use crate::types::{Chain, Currency, OrderStatus, TransactionStatus, TransactionType};

fn secret_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

/// Where the session OTP was sent.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct InitiateResponse {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub recipient: Option<String>,
}

impl InitiateResponse {
    #[must_use]
    pub fn sent_to(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or(self.phone.as_deref())
            .or(self.recipient.as_deref())
    }
}

/// A verified session. `token` authorizes every bearer endpoint.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub recipient: Option<String>,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    #[serde(deserialize_with = "secret_string")]
    pub token: SecretString,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rate {
    pub base_currency: String,
    pub target_currency: String,
    pub is_active: Option<bool>,
    pub rate: Decimal,
    #[serde(rename = "type")]
    pub rate_type: Option<String>,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllRates {
    pub on_ramp_rate: Rate,
    pub off_ramp_rate: Rate,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateAmounts {
    pub user_tax: Decimal,
    pub merchant_tax: Decimal,
    #[serde(rename = "amountUSD")]
    pub amount_usd: Decimal,
    pub user_amount_fiat: Decimal,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RateByAmount {
    pub rate: Rate,
    pub amounts: RateAmounts,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsdcValue {
    pub amount: Decimal,
    pub usdc_value: Decimal,
    pub mint: String,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnrampValue {
    pub amount: Option<Decimal>,
    pub fiat_amount: Option<Decimal>,
    pub mint: String,
    pub currency: Currency,
    pub rate: Decimal,
    pub token_rate: Decimal,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfframpValue {
    pub amount: Option<Decimal>,
    pub fiat_amount: Decimal,
    pub mint: String,
    pub currency: Currency,
    pub token_rate: Decimal,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiatValue {
    pub amount: Decimal,
    pub mint: String,
    pub currency: Currency,
    pub fiat_amount: Decimal,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenValue {
    pub amount: Decimal,
    pub mint: String,
    pub currency: Currency,
    pub token_amount: Decimal,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Bank {
    pub id: String,
    pub name: String,
    pub country: String,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub id: String,
    pub account_name: String,
    pub account_number: String,
    pub bank: String,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ResolvedBank {
    pub id: String,
    pub name: String,
    pub code: String,
    pub country: String,
}

/// Account holder details the bank reports for an account number.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBankAccount {
    pub account_name: String,
    pub account_number: String,
    pub bank: ResolvedBank,
}

/// A created onramp order: pay `fiat_amount` into the returned account.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnrampOrder {
    pub id: String,
    pub account_number: String,
    pub account_name: String,
    pub bank: String,
    pub fiat_amount: Decimal,
    pub amount: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub recipient: Option<String>,
    pub mint: Option<String>,
    pub currency: Option<Currency>,
    pub chain: Option<Chain>,
}

/// A created offramp order: send `amount` of `mint` to `address`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfframpOrder {
    pub id: String,
    pub address: String,
    pub mint: String,
    pub currency: Currency,
    pub amount: Decimal,
    pub fiat_amount: Decimal,
    pub rate: Decimal,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub status: TransactionStatus,
    pub transaction_type: TransactionType,
    pub created_at: DateTime<Utc>,
    pub mint: String,
    pub currency: Currency,
    pub amount: Decimal,
    pub fiat_amount: Decimal,
    pub usdc_amount: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub signature: Option<String>,
    pub recipient: Option<String>,
    pub address: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub bank: Option<String>,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TxPoolAddress {
    pub address: String,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,
    pub public_key: String,
    pub bank_account: Option<BankAccount>,
}

/// One status change pushed over an order's live update channel.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdateEvent {
    #[serde(rename = "id")]
    pub order_id: String,
    pub fiat_amount: Decimal,
    pub currency: String,
    #[serde(rename = "recipient")]
    pub recipient_address: String,
    #[serde(rename = "mint")]
    pub token_mint: String,
    pub chain: Chain,
    #[serde(rename = "amount")]
    pub token_amount: Decimal,
    pub status: OrderStatus,
}
