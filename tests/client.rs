#[cfg(feature = "tracing")]
use std::io;
#[cfg(feature = "tracing")]
use std::sync::{Arc, Mutex};

use httpmock::Method::{GET, PATCH, POST};
use httpmock::MockServer;
use paj_ramp_sdk::error::{Kind, Status};
use paj_ramp_sdk::signing::{self, Keypair, SignedPayload};
use paj_ramp_sdk::types::request::{OnrampOrderRequest, ValueQuery};
use paj_ramp_sdk::types::{Chain, Currency, DeviceSignature, Identity, RateType};
use paj_ramp_sdk::{Client, Config};
use reqwest::StatusCode;
use rust_decimal_macros::dec;
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::json;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt as _;

fn client_for(server: &MockServer) -> anyhow::Result<Client> {
    let config = Config::from_raw(&server.base_url(), &server.base_url())?;
    Ok(Client::new(config)?)
}

#[tokio::test]
async fn verified_session_token_lists_banks() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let api_key = SecretString::from("biz-key");

    let initiate = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/pub/initiate")
                .header("x-api-key", "biz-key")
                .json_body(json!({ "email": "user@example.com" }));
            then.status(200)
                .json_body(json!({ "email": "user@example.com" }));
        })
        .await;
    let verify = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/pub/verify")
                .header("x-api-key", "biz-key")
                .json_body(json!({
                    "email": "user@example.com",
                    "otp": "123456",
                    "device": { "uuid": "d1", "device": "desktop", "os": "mac" },
                }));
            then.status(200).json_body(json!({
                "recipient": "user@example.com",
                "isActive": "true",
                "expiresAt": "2030-01-01T00:00:00.000Z",
                "token": "tok-1",
            }));
        })
        .await;
    let banks = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/pub/bank")
                .header("authorization", "Bearer tok-1");
            then.status(200).json_body(json!([
                { "id": "b1", "name": "First Bank", "country": "NG" },
                { "id": "b2", "name": "Access Bank", "country": "NG", "logo": "ignored" },
            ]));
        })
        .await;

    let client = client_for(&server)?;
    let identity = Identity::parse("user@example.com")?;
    let device = DeviceSignature::builder()
        .uuid("d1")
        .device("desktop")
        .os("mac")
        .build();

    let sent = client.initiate(&identity, &api_key).await?;
    assert_eq!(sent.sent_to(), Some("user@example.com"));

    let session = client.verify(&identity, "123456", &device, &api_key).await?;
    assert!(session.is_active);
    assert_eq!(session.token.expose_secret(), "tok-1");

    let listed = client.banks(&session.token).await?;
    assert!(!listed.is_empty(), "bank list should not be empty");
    assert_eq!(listed[0].id, "b1");
    assert_eq!(listed[1].name, "Access Bank");

    initiate.assert_async().await;
    verify.assert_async().await;
    banks.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn phone_identity_is_sent_under_its_own_key() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let initiate = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/pub/initiate")
                .json_body(json!({ "phone": "+2348012345678" }));
            then.status(200).json_body(json!({ "phone": "+2348012345678" }));
        })
        .await;

    let client = client_for(&server)?;
    let identity = Identity::parse("+2348012345678")?;
    client
        .initiate(&identity, &SecretString::from("biz-key"))
        .await?;

    initiate.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn server_error_body_is_carried_on_the_error() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/pub/verify");
            then.status(400)
                .json_body(json!({ "message": "Invalid OTP", "statusCode": 400 }));
        })
        .await;

    let client = client_for(&server)?;
    let err = client
        .verify(
            &Identity::email("user@example.com")?,
            "000000",
            &DeviceSignature::for_device("desktop"),
            &SecretString::from("biz-key"),
        )
        .await
        .expect_err("400 must fail");

    assert_eq!(err.kind(), Kind::Status);
    let status = err.downcast_ref::<Status>().expect("status source");
    assert_eq!(status.status_code, StatusCode::BAD_REQUEST);
    assert_eq!(status.path, "/pub/verify");
    assert_eq!(
        status.payload.as_ref().and_then(|p| p["message"].as_str()),
        Some("Invalid OTP")
    );
    Ok(())
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() -> anyhow::Result<()> {
    let client = Client::new(Config::from_raw("http://127.0.0.1:9", "http://127.0.0.1:9")?)?;

    let err = client.all_rates().await.expect_err("nothing listens on port 9");

    assert_eq!(err.kind(), Kind::Transport);
    assert!(!err.to_string().is_empty(), "carries the transport error text");
    Ok(())
}

/// Collects formatted log lines for assertions.
#[cfg(feature = "tracing")]
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

#[cfg(feature = "tracing")]
impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("lock")).into_owned()
    }
}

#[cfg(feature = "tracing")]
impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(feature = "tracing")]
#[tokio::test]
async fn undecodable_success_body_is_logged_and_returned() -> anyhow::Result<()> {
    let logs = Captured::default();
    let writer = logs.clone();
    let _guard = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .set_default();

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/pub/bank");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let client = client_for(&server)?;
    let err = client
        .banks(&SecretString::from("tok-1"))
        .await
        .expect_err("body is not json");

    assert_eq!(err.kind(), Kind::Internal);
    let logs = logs.text();
    assert!(logs.contains("response body did not decode"), "{logs}");
    assert!(logs.contains("/pub/bank"), "{logs}");
    Ok(())
}

#[tokio::test]
async fn add_wallet_posts_a_verifiable_signed_body() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let keypair = Keypair::generate();
    let public_key = keypair.public_key().to_string();

    let add = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/pub/wallet")
                .header("authorization", "Bearer tok-1")
                .body_includes(r#""accountId":"acct-1""#)
                .body_includes(format!(r#""publicKey":"{public_key}""#))
                .body_includes(r#""signature":""#);
            then.status(201).json_body(json!({
                "id": "w1",
                "publicKey": public_key,
                "bankAccount": {
                    "id": "acct-1",
                    "accountName": "ADA OBI",
                    "accountNumber": "0123456789",
                    "bank": "First Bank",
                },
            }));
        })
        .await;

    let client = client_for(&server)?;
    let wallet = client
        .add_wallet(&SecretString::from("tok-1"), "acct-1", &keypair)
        .await?;

    add.assert_async().await;
    assert_eq!(wallet.id, "w1");
    assert_eq!(
        wallet.bank_account.map(|account| account.account_number),
        Some("0123456789".to_owned())
    );
    Ok(())
}

#[tokio::test]
async fn switch_wallet_patches_the_wallet_path() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let keypair = Keypair::generate();

    let switch = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/pub/wallet/w1")
                .header("authorization", "Bearer tok-1")
                .body_includes(r#""accountId":"acct-2""#);
            then.status(200).json_body(json!({
                "id": "w1",
                "publicKey": keypair.public_key().to_string(),
            }));
        })
        .await;

    let client = client_for(&server)?;
    let wallet = client
        .switch_wallet_bank_account(&SecretString::from("tok-1"), "acct-2", "w1", &keypair)
        .await?;

    switch.assert_async().await;
    assert!(wallet.bank_account.is_none());
    Ok(())
}

#[tokio::test]
async fn rejected_wallet_input_never_reaches_the_server() -> anyhow::Result<()> {
    // no mocks: anything that reached the server would come back as a 404
    let server = MockServer::start_async().await;
    let client = client_for(&server)?;
    let keypair = Keypair::generate();
    let token = SecretString::from("tok-1");

    let err = client
        .add_wallet(&token, "  ", &keypair)
        .await
        .expect_err("blank account id");
    assert_eq!(err.kind(), Kind::Validation);

    let err = client
        .switch_wallet_bank_account(&token, "acct-1", "w1/../admin", &keypair)
        .await
        .expect_err("wallet id with a slash");
    assert_eq!(err.kind(), Kind::Validation);
    Ok(())
}

#[tokio::test]
async fn onramp_order_round_trip() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/pub/onramp")
                .header("authorization", "Bearer tok-1")
                .json_body(json!({
                    "fiatAmount": 5000.0,
                    "currency": "NGN",
                    "recipient": "Recipient1111",
                    "mint": "Mint1111",
                    "chain": "SOLANA",
                }));
            then.status(200).json_body(json!({
                "id": "order-42",
                "accountNumber": "9912345678",
                "accountName": "PAJ / ADA OBI",
                "bank": "Wema Bank",
                "fiatAmount": 5000,
                "amount": 3.12,
                "rate": 1602.5,
                "recipient": "Recipient1111",
                "mint": "Mint1111",
                "currency": "NGN",
                "chain": "SOLANA",
            }));
        })
        .await;

    let client = client_for(&server)?;
    let order = OnrampOrderRequest::builder()
        .fiat_amount(dec!(5000))
        .currency(Currency::Ngn)
        .recipient("Recipient1111")
        .mint("Mint1111")
        .chain(Chain::Solana)
        .build();
    let created = client
        .create_onramp_order(&order, &SecretString::from("tok-1"))
        .await?;

    create.assert_async().await;
    assert_eq!(created.id, "order-42");
    assert_eq!(created.fiat_amount, dec!(5000));
    assert_eq!(created.rate, Some(dec!(1602.5)));
    assert_eq!(created.chain, Some(Chain::Solana));
    Ok(())
}

#[tokio::test]
async fn rates_and_quotes() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let by_type = server
        .mock_async(|when, then| {
            when.method(GET).path("/pub/rate/offRamp");
            then.status(200).json_body(json!({
                "baseCurrency": "USD",
                "targetCurrency": "NGN",
                "isActive": true,
                "rate": 1580.25,
                "type": "offRamp",
            }));
        })
        .await;
    let quote = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/pub/rates/onramp-value")
                .query_param("fiatAmount", "10000")
                .query_param("mint", "Mint1111")
                .query_param("currency", "NGN")
                .header("authorization", "Bearer tok-1");
            then.status(200).json_body(json!({
                "fiatAmount": 10000,
                "mint": "Mint1111",
                "currency": "NGN",
                "rate": 1600,
                "tokenRate": 1,
                "amount": 6.25,
            }));
        })
        .await;

    let client = client_for(&server)?;
    let rate = client.rate_by_type(RateType::OffRamp).await?;
    assert_eq!(rate.rate, dec!(1580.25));

    let query = ValueQuery::builder()
        .fiat_amount(dec!(10000))
        .mint("Mint1111")
        .currency(Currency::Ngn)
        .build();
    let value = client
        .onramp_value(&query, &SecretString::from("tok-1"))
        .await?;
    assert_eq!(value.amount, Some(dec!(6.25)));

    by_type.assert_async().await;
    quote.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn public_lookups() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let keypair = Keypair::generate();
    let public_key = keypair.public_key();

    let pool = server
        .mock_async(|when, then| {
            when.method(GET).path("/pub/txpool-address");
            then.status(200).json_body(json!({ "address": "Pool1111" }));
        })
        .await;
    let wallet = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/pub/wallet/{public_key}"));
            then.status(200).json_body(json!({
                "id": "w1",
                "publicKey": public_key.to_string(),
            }));
        })
        .await;

    let client = client_for(&server)?;
    assert_eq!(client.tx_pool_address().await?.address, "Pool1111");
    assert_eq!(client.wallet(&public_key).await?.id, "w1");

    pool.assert_async().await;
    wallet.assert_async().await;
    Ok(())
}

#[test]
fn two_bodies_for_the_same_account_differ_and_both_verify() -> anyhow::Result<()> {
    let keypair = Keypair::generate();

    let first = signing::build_signed_body("acct-1", &keypair)?;
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = signing::build_signed_body("acct-1", &keypair)?;

    assert_ne!(first.payload.issued_at, second.payload.issued_at);
    assert_ne!(first.signature, second.signature);
    for body in [&first, &second] {
        assert!(signing::verify(
            &body.payload,
            &body.signature.to_string(),
            &keypair.public_key().to_string()
        ));
    }
    Ok(())
}

#[test]
fn payload_serialization_is_stable() -> anyhow::Result<()> {
    let keypair = Keypair::generate();
    let payload = SignedPayload::new(&keypair.public_key(), "acct-1");

    assert_eq!(payload.canonical_bytes()?, payload.canonical_bytes()?);
    let text = String::from_utf8(payload.canonical_bytes()?)?;
    assert!(text.starts_with(r#"{"publicKey":""#), "{text}");
    Ok(())
}

