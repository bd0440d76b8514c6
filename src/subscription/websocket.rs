use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::Result;
use crate::config::Config;
use crate::error::Error;
use crate::subscription::socketio::{self, Handshake, NAMESPACE, Packet};
use crate::subscription::transport::{Channel, LinkState, Transport, TransportEvent};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Events = mpsc::UnboundedSender<TransportEvent>;

const TIMED_OUT: &str = "connection timed out";

/// Socket.IO v4 client over a plain WebSocket, one connection per order.
///
/// Each [`open`](Transport::open) spawns a driver task onto the current tokio
/// runtime. The driver completes the Engine.IO and namespace handshakes
/// within `connect_timeout`, answers heartbeats, and forwards namespace
/// events until the channel is shut down or the server goes away.
#[derive(Clone, Debug)]
pub struct WebSocketTransport {
    socket_host: Url,
    connect_timeout: Duration,
}

impl WebSocketTransport {
    #[must_use]
    pub fn new(socket_host: Url, connect_timeout: Duration) -> Self {
        Self {
            socket_host,
            connect_timeout,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.socket_host.clone(), config.connect_timeout)
    }

    /// `ws(s)://host/socket.io/?EIO=4&transport=websocket&id={order_id}`
    pub fn endpoint(&self, order_id: &str) -> Result<Url> {
        let mut url = self.socket_host.join("socket.io/")?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme).map_err(|()| {
            Error::validation(format!(
                "socket host `{}` cannot be reached over websocket",
                self.socket_host
            ))
        })?;
        url.query_pairs_mut()
            .clear()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket")
            .append_pair("id", order_id);
        Ok(url)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, order_id: &str) -> Result<Channel> {
        let url = self.endpoint(order_id)?;
        let (events, receiver) = mpsc::unbounded_channel();
        let link = LinkState::new();
        let shutdown = CancellationToken::new();

        tokio::spawn(drive(
            url,
            self.connect_timeout,
            events,
            link.clone(),
            shutdown.clone(),
        ));

        Ok(Channel::new(receiver, link, shutdown))
    }
}

async fn drive(
    url: Url,
    connect_timeout: Duration,
    events: Events,
    link: LinkState,
    shutdown: CancellationToken,
) {
    let attempt = timeout(connect_timeout, handshake(&url));
    let (mut socket, session) = tokio::select! {
        () = shutdown.cancelled() => return,
        () = events.closed() => return,
        outcome = attempt => match outcome {
            Ok(Ok(connected)) => connected,
            Ok(Err(reason)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%url, %reason, "order channel refused");
                let _sent = events.send(TransportEvent::ConnectError(reason));
                return;
            }
            Err(_elapsed) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%url, timeout = ?connect_timeout, "order channel timed out");
                let _sent = events.send(TransportEvent::ConnectError(TIMED_OUT.to_owned()));
                return;
            }
        },
    };

    link.set(true);
    #[cfg(feature = "tracing")]
    tracing::info!(%url, sid = %session.sid, "order channel connected");
    let _sent = events.send(TransportEvent::Connected);

    let reason = pump(&mut socket, &session, &events, &shutdown).await;

    link.set(false);
    #[cfg(feature = "tracing")]
    tracing::info!(%url, %reason, "order channel closed");
    let _sent = events.send(TransportEvent::Disconnected(reason));
}

/// Opens the socket and joins [`NAMESPACE`]. Errors are the reason text
/// reported to the subscription.
async fn handshake(url: &Url) -> std::result::Result<(Socket, Handshake), String> {
    let (mut socket, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| e.to_string())?;

    let mut session = None;
    while let Some(frame) = socket.next().await {
        let text = match frame.map_err(|e| e.to_string())? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        #[cfg(feature = "tracing")]
        tracing::trace!(frame = text.as_str(), "socket frame");

        match socketio::decode(text.as_str()).map_err(|e| e.to_string())? {
            Packet::Open(open) => {
                session = Some(open);
                send_text(&mut socket, socketio::connect(NAMESPACE)).await?;
            }
            Packet::Ping => send_text(&mut socket, socketio::PONG.to_owned()).await?,
            Packet::Connect { namespace } if namespace == NAMESPACE => {
                return session
                    .map(|session| (socket, session))
                    .ok_or_else(|| "namespace joined before the transport opened".to_owned());
            }
            Packet::ConnectError { namespace, message } if namespace == NAMESPACE => {
                return Err(message);
            }
            Packet::Close => break,
            _ => {}
        }
    }

    Err("socket closed during handshake".to_owned())
}

/// Forwards namespace events until shutdown or the server goes away and
/// returns why the channel ended.
async fn pump(
    socket: &mut Socket,
    session: &Handshake,
    events: &Events,
    shutdown: &CancellationToken,
) -> String {
    let liveness = Duration::from_millis(session.ping_interval + session.ping_timeout);
    let mut deadline = Instant::now() + liveness;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                close(socket).await;
                return "client disconnect".to_owned();
            }
            () = events.closed() => {
                close(socket).await;
                return "subscription dropped".to_owned();
            }
            () = sleep_until(deadline) => {
                return "ping timeout".to_owned();
            }
            frame = socket.next() => {
                deadline = Instant::now() + liveness;
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => return "transport close".to_owned(),
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => return err.to_string(),
                };
                #[cfg(feature = "tracing")]
                tracing::trace!(frame = text.as_str(), "socket frame");

                match socketio::decode(text.as_str()) {
                    Ok(Packet::Ping) => {
                        if let Err(reason) = send_text(socket, socketio::PONG.to_owned()).await {
                            return reason;
                        }
                    }
                    Ok(Packet::Event {
                        namespace,
                        ack,
                        name,
                        payload,
                    }) if namespace == NAMESPACE => {
                        if let Some(id) = ack
                            && let Err(reason) =
                                send_text(socket, socketio::ack(NAMESPACE, id)).await
                        {
                            return reason;
                        }
                        let _sent = events.send(TransportEvent::Event { name, payload });
                    }
                    Ok(Packet::Disconnect { namespace }) if namespace == NAMESPACE => {
                        return "server disconnect".to_owned();
                    }
                    Ok(Packet::Close) => return "transport close".to_owned(),
                    Ok(_) => {}
                    Err(err) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(error = %err, "dropping unreadable socket frame");
                        #[cfg(not(feature = "tracing"))]
                        drop(err);
                    }
                }
            }
        }
    }
}

async fn send_text(socket: &mut Socket, text: String) -> std::result::Result<(), String> {
    socket
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| e.to_string())
}

async fn close(socket: &mut Socket) {
    let _ignored = send_text(socket, socketio::disconnect(NAMESPACE)).await;
    let _ignored = socket.close(None).await;
}
