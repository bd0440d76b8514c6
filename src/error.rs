use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use reqwest::{Method, StatusCode};

/// Broad category of an [`Error`].
///
/// The kind is stable across releases and is the intended way to branch on
/// failures. The concrete source (when there is one) can be recovered with
/// [`Error::downcast_ref`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// The server answered with a non-success status code.
    Status,
    /// The request never produced a response (connect, TLS, timeout, body read).
    Transport,
    /// Caller supplied input that cannot be used.
    Validation,
    /// Key material is structurally invalid for ed25519 signing.
    Signing,
    /// A signed body failed local re-verification; nothing was submitted.
    BodyConstruction,
    /// The real-time order channel could not be established.
    SubscriptionConnect,
    /// A subscription was asked to connect without an order id.
    MissingSubscriptionTarget,
    /// Decoding or other library-internal failure.
    Internal,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Status => "status",
            Kind::Transport => "transport",
            Kind::Validation => "validation",
            Kind::Signing => "signing",
            Kind::BodyConstruction => "body construction",
            Kind::SubscriptionConnect => "subscription connect",
            Kind::MissingSubscriptionTarget => "missing subscription target",
            Kind::Internal => "internal",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    #[must_use]
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let source = self.source.as_deref()?;
        source.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(reason: S) -> Self {
        Validation {
            reason: reason.into(),
        }
        .into()
    }

    pub fn signing<S: Into<String>>(reason: S) -> Self {
        Signing {
            reason: reason.into(),
        }
        .into()
    }

    pub fn body_construction<S: Into<String>>(subject_id: S) -> Self {
        BodyConstruction {
            subject_id: subject_id.into(),
        }
        .into()
    }

    pub fn status<S: Into<String>>(
        status_code: StatusCode,
        method: Method,
        path: S,
        message: String,
    ) -> Self {
        let payload = serde_json::from_str(&message).ok();
        Status {
            status_code,
            method,
            path: path.into(),
            message,
            payload,
        }
        .into()
    }

    pub fn subscription_connect<O: Into<String>, R: Into<String>>(order_id: O, reason: R) -> Self {
        SubscriptionConnect {
            order_id: order_id.into(),
            reason: reason.into(),
        }
        .into()
    }

    #[must_use]
    pub fn missing_subscription_target() -> Self {
        Self {
            kind: Kind::MissingSubscriptionTarget,
            source: None,
            backtrace: Backtrace::capture(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {source}", self.kind),
            None if self.kind == Kind::MissingSubscriptionTarget => {
                f.write_str("an order id is required before opening a subscription")
            }
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Non-success HTTP response.
///
/// `message` is the raw response body the server sent; `payload` is the
/// same body parsed as JSON when it was JSON.
#[non_exhaustive]
#[derive(Debug)]
pub struct Status {
    pub status_code: StatusCode,
    pub method: Method,
    pub path: String,
    pub message: String,
    pub payload: Option<serde_json::Value>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error({}) making {} call to {} with {}",
            self.status_code, self.method, self.path, self.message
        )
    }
}

impl StdError for Status {}

#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

#[non_exhaustive]
#[derive(Debug)]
pub struct Signing {
    pub reason: String,
}

impl fmt::Display for Signing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unusable key material: {}", self.reason)
    }
}

impl StdError for Signing {}

#[non_exhaustive]
#[derive(Debug)]
pub struct BodyConstruction {
    pub subject_id: String,
}

impl fmt::Display for BodyConstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "signature over payload for account {} did not verify; request not sent",
            self.subject_id
        )
    }
}

impl StdError for BodyConstruction {}

#[non_exhaustive]
#[derive(Debug)]
pub struct SubscriptionConnect {
    pub order_id: String,
    pub reason: String,
}

impl fmt::Display for SubscriptionConnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to open update channel for order {}: {}",
            self.order_id, self.reason
        )
    }
}

impl StdError for SubscriptionConnect {}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<Signing> for Error {
    fn from(err: Signing) -> Self {
        Error::with_source(Kind::Signing, err)
    }
}

impl From<BodyConstruction> for Error {
    fn from(err: BodyConstruction) -> Self {
        Error::with_source(Kind::BodyConstruction, err)
    }
}

impl From<Status> for Error {
    fn from(err: Status) -> Self {
        Error::with_source(Kind::Status, err)
    }
}

impl From<SubscriptionConnect> for Error {
    fn from(err: SubscriptionConnect) -> Self {
        Error::with_source(Kind::SubscriptionConnect, err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::with_source(Kind::Internal, err)
        } else {
            Error::with_source(Kind::Transport, err)
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(Kind::Internal, err)
    }
}

#[cfg(feature = "tracing")]
impl From<serde_path_to_error::Error<serde_json::Error>> for Error {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        Error::with_source(Kind::Internal, err)
    }
}
