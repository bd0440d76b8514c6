//! Socket.IO v4 packets carried in Engine.IO v4 text frames.

use std::error::Error as StdError;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::Result;
use crate::error::{Error, Kind};

/// Namespace the order-update server emits on.
pub(crate) const NAMESPACE: &str = "/onramp-socket";

pub(crate) const PONG: &str = "3";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Handshake {
    pub sid: String,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Noop,
    Connect {
        namespace: String,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack: Option<u64>,
        name: String,
        payload: Value,
    },
    ConnectError {
        namespace: String,
        message: String,
    },
    /// Anything this client does not act on (acks, binary, upgrades).
    Other(String),
}

#[derive(Debug)]
pub(crate) struct MalformedFrame {
    frame: String,
    reason: &'static str,
}

impl fmt::Display for MalformedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed socket frame `{}`: {}", self.frame, self.reason)
    }
}

impl StdError for MalformedFrame {}

fn malformed(frame: &str, reason: &'static str) -> Error {
    Error::with_source(
        Kind::Internal,
        MalformedFrame {
            frame: frame.to_owned(),
            reason,
        },
    )
}

pub(crate) fn decode(frame: &str) -> Result<Packet> {
    let mut chars = frame.chars();
    let Some(kind) = chars.next() else {
        return Err(malformed(frame, "empty frame"));
    };
    let rest = chars.as_str();

    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_message(frame, rest),
        '6' => Ok(Packet::Noop),
        _ => Ok(Packet::Other(frame.to_owned())),
    }
}

fn decode_message(frame: &str, body: &str) -> Result<Packet> {
    let mut chars = body.chars();
    let Some(kind) = chars.next() else {
        return Err(malformed(frame, "message without a packet type"));
    };
    let (namespace, rest) = split_namespace(chars.as_str());
    let (ack, data) = split_ack(rest);

    match kind {
        '0' => Ok(Packet::Connect { namespace }),
        '1' => Ok(Packet::Disconnect { namespace }),
        '2' => {
            let Value::Array(items) = serde_json::from_str(data)? else {
                return Err(malformed(frame, "event data is not an array"));
            };
            let mut args = items.into_iter();
            let Some(Value::String(name)) = args.next() else {
                return Err(malformed(frame, "event without a name"));
            };
            Ok(Packet::Event {
                namespace,
                ack,
                name,
                payload: args.next().unwrap_or(Value::Null),
            })
        }
        '4' => {
            let data = if data.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(data)?
            };
            Ok(Packet::ConnectError {
                namespace,
                message: error_message(data),
            })
        }
        _ => Ok(Packet::Other(frame.to_owned())),
    }
}

/// `/nsp,rest` → (`/nsp`, `rest`); no leading slash means the main namespace.
fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return ("/".to_owned(), rest);
    }
    match rest.split_once(',') {
        Some((namespace, tail)) => (namespace.to_owned(), tail),
        None => (rest.to_owned(), ""),
    }
}

fn split_ack(rest: &str) -> (Option<u64>, &str) {
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (id, data) = rest.split_at(end);
    (id.parse().ok(), data)
}

fn error_message(data: Value) -> String {
    match data {
        Value::String(message) => message,
        Value::Object(mut fields) => match fields.remove("message") {
            Some(Value::String(message)) => message,
            _ => Value::Object(fields).to_string(),
        },
        Value::Null => "connection refused".to_owned(),
        other => other.to_string(),
    }
}

pub(crate) fn connect(namespace: &str) -> String {
    format!("40{namespace},")
}

pub(crate) fn disconnect(namespace: &str) -> String {
    format!("41{namespace},")
}

pub(crate) fn ack(namespace: &str, id: u64) -> String {
    format!("43{namespace},{id}[]")
}
