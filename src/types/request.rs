use bon::Builder;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::types::{Chain, Currency, DeviceSignature, Identity};

/// Order that turns fiat paid into a virtual account into tokens at `recipient`.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct OnrampOrderRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub fiat_amount: Decimal,
    pub currency: Currency,
    #[builder(into)]
    pub recipient: String,
    #[builder(into)]
    pub mint: String,
    pub chain: Chain,
    #[serde(rename = "webhookURL")]
    #[builder(into)]
    pub webhook_url: Option<String>,
}

/// Order that pays out fiat to a bank account once `amount` of `mint` arrives.
#[derive(Clone, Debug, PartialEq, Serialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct OfframpOrderRequest {
    #[builder(into)]
    pub bank: String,
    #[builder(into)]
    pub account_number: String,
    pub currency: Currency,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[builder(into)]
    pub mint: String,
    #[serde(rename = "webhookURL")]
    #[builder(into)]
    pub webhook_url: String,
}

/// Query for the `/pub/rates/*-value` quote endpoints.
///
/// Quotes can be asked from either side: set `amount` (token units) or
/// `fiat_amount`.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct ValueQuery {
    pub amount: Option<Decimal>,
    pub fiat_amount: Option<Decimal>,
    #[builder(into)]
    pub mint: String,
    pub currency: Currency,
}

#[derive(Serialize)]
pub(crate) struct InitiateBody<'req> {
    #[serde(flatten)]
    pub identity: &'req Identity,
}

#[derive(Serialize)]
pub(crate) struct VerifyBody<'req> {
    #[serde(flatten)]
    pub identity: &'req Identity,
    pub otp: &'req str,
    pub device: &'req DeviceSignature,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BankAccountBody<'req> {
    pub bank_id: &'req str,
    pub account_number: &'req str,
}

#[derive(Serialize)]
pub(crate) struct TokenAmountQuery<'req> {
    pub amount: Decimal,
    pub mint: &'req str,
}
