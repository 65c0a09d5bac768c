use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::TransportConfig;
use crate::snapshot::Snapshot;

const FEED_PATH: &str = "/feed.php";
const LAST_GOOD_COMMAND: &str = "lastGood";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}")]
    Status { status: u16 },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Record returned by the remote for a one-shot command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    pub body: Value,
}

impl CommandResponse {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    /// `response.result`, the remote's own success flag.
    pub fn result_flag(&self) -> bool {
        match self.body.pointer("/response/result") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true") || s == "1",
            Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
            _ => false,
        }
    }

    /// `response.<field>`, the remote's post-action report for a field.
    pub fn reported(&self, field: &str) -> Option<&Value> {
        self.body.get("response").and_then(|r| r.get(field))
    }
}

#[async_trait]
pub trait VehicleTransport: Send + Sync {
    async fn fetch_live(&self) -> Result<Snapshot, TransportError>;
    async fn fetch_last_good(&self) -> Result<Snapshot, TransportError>;
    async fn send_command(&self, command: &str) -> Result<CommandResponse, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("teslafi-rs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::from_reqwest(client, config))
    }

    pub fn from_reqwest(client: reqwest::Client, config: TransportConfig) -> Self {
        Self { client, config }
    }

    async fn get(&self, command: Option<&str>) -> Result<Value, TransportError> {
        let url = format!("{}{FEED_PATH}", self.config.base_url.trim_end_matches('/'));
        debug!(command = command.unwrap_or("live"), "querying feed");

        let mut request = self
            .client
            .get(&url)
            .query(&[("token", self.config.token.expose_secret())]);
        if let Some(command) = command {
            request = request.query(&[("command", command)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|err| TransportError::Decode(err.to_string()))
    }

    fn decode_snapshot(body: Value) -> Result<Snapshot, TransportError> {
        match body {
            Value::Null => Ok(Snapshot::empty()),
            Value::Object(map) => Ok(Snapshot::from_vars(map.into_iter().collect())),
            other => Err(TransportError::Decode(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

#[async_trait]
impl VehicleTransport for HttpTransport {
    async fn fetch_live(&self) -> Result<Snapshot, TransportError> {
        Self::decode_snapshot(self.get(None).await?)
    }

    async fn fetch_last_good(&self) -> Result<Snapshot, TransportError> {
        Self::decode_snapshot(self.get(Some(LAST_GOOD_COMMAND)).await?)
    }

    async fn send_command(&self, command: &str) -> Result<CommandResponse, TransportError> {
        Ok(CommandResponse::new(self.get(Some(command)).await?))
    }
}
