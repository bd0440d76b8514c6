use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use paj_ramp_sdk::error::Kind;
use paj_ramp_sdk::subscription::State;
use paj_ramp_sdk::types::OrderStatus;
use paj_ramp_sdk::{Client, Config};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};
use tracing_subscriber::EnvFilter;
use url::Url;

type ServerSocket = WebSocketStream<TcpStream>;

const OPEN: &str = r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
const UPDATE: &str = r#"42/onramp-socket,["ORDER_UPDATE",{"id":"order-42","fiatAmount":5000,"currency":"NGN","recipient":"Recipient1111","mint":"Mint1111","chain":"solana","amount":3.12,"status":"processing"}]"#;
const WAIT: Duration = Duration::from_secs(5);

/// `RUST_LOG=paj_ramp_sdk=trace` shows the frames each test exchanges.
fn init_tracing() {
    drop(
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init(),
    );
}

/// Accepts one websocket and returns it with the request target it asked for.
async fn accept(listener: &TcpListener) -> (ServerSocket, String) {
    let (stream, _) = listener.accept().await.expect("tcp accept");
    let mut target = String::new();
    let socket = accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            target = request.uri().to_string();
            Ok(response)
        },
    )
    .await
    .expect("websocket accept");
    (socket, target)
}

async fn next_text(socket: &mut ServerSocket) -> String {
    loop {
        if let Message::Text(text) = socket.next().await.expect("client frame").expect("readable") {
            return text.as_str().to_owned();
        }
    }
}

/// Engine.IO open followed by the namespace join the client asks for.
async fn open_namespace(socket: &mut ServerSocket) {
    socket.send(Message::text(OPEN)).await.expect("open");
    assert_eq!(next_text(socket).await, "40/onramp-socket,");
    socket
        .send(Message::text(r#"40/onramp-socket,{"sid":"n1"}"#))
        .await
        .expect("namespace ack");
}

async fn listen() -> anyhow::Result<(TcpListener, Config)> {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let host = format!("http://{}", listener.local_addr()?);
    Ok((listener, Config::from_raw(&host, &host)?))
}

#[tokio::test]
async fn relays_updates_and_closes_on_disconnect() -> anyhow::Result<()> {
    let (listener, config) = listen().await?;
    let server = tokio::spawn(async move {
        let (mut socket, target) = accept(&listener).await;
        open_namespace(&mut socket).await;

        socket.send(Message::text("2")).await.expect("ping");
        assert_eq!(next_text(&mut socket).await, "3", "heartbeat answered");

        socket.send(Message::text(UPDATE)).await.expect("update");
        socket
            .send(Message::text(r#"42/onramp-socket,5["ERROR","late payment"]"#))
            .await
            .expect("error event");
        assert_eq!(next_text(&mut socket).await, "43/onramp-socket,5[]");
        assert_eq!(next_text(&mut socket).await, "41/onramp-socket,");
        target
    });

    let client = Client::new(config)?;
    let mut subscription = client.observe_order("order-42");
    let (update_tx, mut updates) = mpsc::unbounded_channel();
    let (error_tx, mut errors) = mpsc::unbounded_channel();
    subscription
        .on_order_update(move |update| update_tx.send(update).expect("test listening"))
        .on_error(move |message| error_tx.send(message).expect("test listening"));

    subscription.connect().await?;
    assert!(subscription.is_connected());

    let update = timeout(WAIT, updates.recv()).await?.expect("update delivered");
    assert_eq!(update.order_id, "order-42");
    assert_eq!(update.status, OrderStatus::Processing);

    let error = timeout(WAIT, errors.recv()).await?.expect("error delivered");
    assert_eq!(error, "late payment");

    subscription.disconnect();
    assert!(!subscription.is_connected());

    let target = timeout(WAIT, server).await??;
    assert_eq!(target, "/socket.io/?EIO=4&transport=websocket&id=order-42");
    Ok(())
}

#[tokio::test]
async fn refused_namespace_is_a_connect_error() -> anyhow::Result<()> {
    let (listener, config) = listen().await?;
    let server = tokio::spawn(async move {
        let (mut socket, _) = accept(&listener).await;
        socket.send(Message::text(OPEN)).await.expect("open");
        assert_eq!(next_text(&mut socket).await, "40/onramp-socket,");
        socket
            .send(Message::text(r#"44/onramp-socket,{"message":"Invalid order"}"#))
            .await
            .expect("refuse");
    });

    let client = Client::new(config)?;
    let mut subscription = client.observe_order("order-404");
    let (error_tx, mut errors) = mpsc::unbounded_channel();
    subscription.on_error(move |message| error_tx.send(message).expect("test listening"));

    let err = subscription.connect().await.expect_err("refused");

    assert_eq!(err.kind(), Kind::SubscriptionConnect);
    assert!(err.to_string().contains("Invalid order"), "{err}");
    assert_eq!(subscription.state(), State::Idle, "eligible for retry");
    assert!(!subscription.is_connected());
    assert_eq!(errors.recv().await.as_deref(), Some("Invalid order"));

    server.await?;
    Ok(())
}

#[tokio::test]
async fn silent_server_times_out() -> anyhow::Result<()> {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let host = Url::parse(&format!("http://{}", listener.local_addr()?))?;
    let config = Config::builder()
        .api_host(host.clone())
        .socket_host(host)
        .connect_timeout(Duration::from_millis(200))
        .build();
    let server = tokio::spawn(async move {
        let (_socket, _) = accept(&listener).await;
        tokio::time::sleep(WAIT).await;
    });

    let client = Client::new(config)?;
    let mut subscription = client.observe_order("order-42");

    let err = subscription.connect().await.expect_err("no open packet");

    assert_eq!(err.kind(), Kind::SubscriptionConnect);
    assert!(err.to_string().contains("connection timed out"), "{err}");
    server.abort();
    Ok(())
}

#[tokio::test]
async fn server_disconnect_lowers_the_link() -> anyhow::Result<()> {
    let (listener, config) = listen().await?;
    let server = tokio::spawn(async move {
        let (mut socket, _) = accept(&listener).await;
        open_namespace(&mut socket).await;
        socket
            .send(Message::text("41/onramp-socket,"))
            .await
            .expect("server disconnect");
        socket
    });

    let client = Client::new(config)?;
    let mut subscription = client.observe_order("order-42");
    let (status_tx, mut statuses) = mpsc::unbounded_channel();
    subscription
        .on_connection_status_change(move |up| status_tx.send(up).expect("test listening"));

    subscription.connect().await?;
    assert_eq!(timeout(WAIT, statuses.recv()).await?, Some(true));
    assert_eq!(timeout(WAIT, statuses.recv()).await?, Some(false));

    assert!(!subscription.is_connected(), "flag follows the transport");
    assert_eq!(subscription.state(), State::Connected, "only disconnect() moves the state");

    subscription.disconnect();
    assert_eq!(subscription.state(), State::Disconnected);
    drop(server.await?);
    Ok(())
}
