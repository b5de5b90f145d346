//! Home Assistant REST client
//!
//! The client holds no connection pool until [`HomeAssistantClient::open`] is
//! called, and gives it back on [`HomeAssistantClient::close`]. Requests made
//! outside an open session fail with [`HomeAssistantError::NotOpen`].
//! [`HomeAssistantClient::with_session`] wraps a block of calls and closes the
//! session however the block ends.

use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::HomeAssistantConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Entity state exactly as Home Assistant returned it.
pub type EntityState = Map<String, Value>;

#[derive(Debug, Error)]
pub enum HomeAssistantError {
    /// DNS, connect, TLS or timeout failure.
    #[error("Cannot connect to Home Assistant: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("Home Assistant API returned status {status}")]
    Api { status: u16 },

    #[error("Home Assistant returned an invalid body: {0}")]
    InvalidBody(String),

    /// Programming error: request made without an open session.
    #[error("HomeAssistantClient must be opened before use")]
    NotOpen,

    #[error("Invalid Home Assistant token: {0}")]
    InvalidToken(String),

    /// The HTTP client could not be built locally.
    #[error("Cannot set up Home Assistant client: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, HomeAssistantError>;

/// Async client for the Home Assistant REST API.
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: Option<Client>,
}

impl HomeAssistantClient {
    /// `base_url` is the instance root, e.g. `http://localhost:8123`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: None,
        }
    }

    pub fn from_config(config: &HomeAssistantConfig) -> Self {
        Self::new(&config.base_url, &config.token)
    }

    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    /// Build the pooled HTTP client. Opening twice keeps the existing pool.
    pub fn open(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| HomeAssistantError::InvalidToken(e.to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HomeAssistantError::InvalidConfig(e.to_string()))?;

        debug!("Home Assistant session opened for {}", self.base_url);
        self.client = Some(client);
        Ok(())
    }

    /// Drop the connection pool. Safe to call when already closed.
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            debug!("Home Assistant session closed");
        }
    }

    /// Open, run `f`, then close. The session is closed on every exit:
    /// success, error, panic, or the returned future being dropped.
    ///
    /// ```no_run
    /// # use aura_bot::home_assistant::HomeAssistantClient;
    /// # async fn demo() -> aura_bot::home_assistant::Result<()> {
    /// let mut ha = HomeAssistantClient::new("http://localhost:8123", "token");
    /// let state = ha
    ///     .with_session(|ha| Box::pin(async move { ha.get_entity_state("sun.sun").await }))
    ///     .await?;
    /// # Ok(()) }
    /// ```
    pub async fn with_session<T, F>(&mut self, f: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a HomeAssistantClient) -> BoxFuture<'a, Result<T>>,
    {
        self.open()?;
        let session = Session(self);
        // Bound to a local so the block's future is gone before `session` drops.
        let result = f(&*session.0).await;
        result
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or(HomeAssistantError::NotOpen)
    }

    /// Fetch the state of one entity, e.g. `light.living_room`.
    pub async fn get_entity_state(&self, entity_id: &str) -> Result<EntityState> {
        let client = self.client()?;

        let api_path = format!("api/states/{}", entity_id);
        info!("Requesting entity state from: {}", api_path);

        let response = client
            .get(format!("{}/{}", self.base_url, api_path))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to connect to Home Assistant: {}", e);
                HomeAssistantError::Connection(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("Received non-2xx response from Home Assistant: {}", status.as_u16());
            return Err(HomeAssistantError::Api {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| {
            error!("Failed to read Home Assistant response: {}", e);
            HomeAssistantError::Connection(e)
        })?;

        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(state)) => Ok(state),
            Ok(other) => Err(HomeAssistantError::InvalidBody(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(HomeAssistantError::InvalidBody(e.to_string())),
        }
    }
}

/// Closes the client when dropped.
struct Session<'a>(&'a mut HomeAssistantClient);

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl Drop for HomeAssistantClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
