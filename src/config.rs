use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bon::Builder;
use url::Url;

use crate::Result;
use crate::error::Error;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Matches the Socket.IO client default the service is tuned for.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Named deployment of the ramp service.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Environment {
    Local,
    #[default]
    Staging,
    Production,
}

static ENVIRONMENTS: phf::Map<&'static str, Environment> = phf::phf_map! {
    "local" => Environment::Local,
    "staging" => Environment::Staging,
    "production" => Environment::Production,
};

impl Environment {
    #[must_use]
    pub const fn api_host(self) -> &'static str {
        match self {
            Environment::Local => "http://localhost:3000",
            Environment::Staging => "https://api-staging.paj.cash",
            Environment::Production => "https://api.paj.cash",
        }
    }

    #[must_use]
    pub const fn socket_host(self) -> &'static str {
        match self {
            Environment::Local => "http://localhost:3000",
            Environment::Staging => "https://onramp-staging.paj.cash",
            Environment::Production => "https://onramp.paj.cash",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        ENVIRONMENTS.get(key.as_str()).copied().ok_or_else(|| {
            Error::validation(format!(
                "unknown environment `{s}`; expected one of: local|staging|production"
            ))
        })
    }
}

/// Where a [`Client`](crate::Client) and its order subscriptions connect to.
///
/// A config is a plain value: each client holds its own, so several clients
/// can talk to different deployments at the same time.
#[derive(Clone, Debug, Builder)]
pub struct Config {
    pub api_host: Url,
    pub socket_host: Url,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,
    #[builder(default = DEFAULT_CONNECT_TIMEOUT)]
    pub connect_timeout: Duration,
}

impl Config {
    pub fn from_environment(environment: Environment) -> Result<Self> {
        Self::from_raw(environment.api_host(), environment.socket_host())
    }

    /// Builds a config from host strings, typically read from app-level settings.
    pub fn from_raw(api_host: &str, socket_host: &str) -> Result<Self> {
        let api_host = parse_host("api_host", api_host)?;
        let socket_host = parse_host("socket_host", socket_host)?;

        Ok(Self::builder()
            .api_host(api_host)
            .socket_host(socket_host)
            .build())
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::validation("connect_timeout must be non-zero"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::validation("request_timeout must be non-zero"));
        }
        Ok(())
    }
}

fn parse_host(field: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::validation(format!("invalid {field} `{raw}`: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::validation(format!(
            "{field} must use http or https, got `{other}`"
        ))),
    }
}
