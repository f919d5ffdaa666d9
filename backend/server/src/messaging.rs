//! # Messaging Gateway
//!
//! The messaging network session (login, credentials, reconnects, delivery)
//! lives in an external gateway process. This service only needs three things
//! from it, captured by [`Messenger`]:
//!
//! - resume the gateway session from its persisted credential file
//! - send a text reply to an address
//! - set the profile picture of an address
//!
//! Inbound messages flow the other way: the gateway posts them to
//! `/webhook/messages` and they are queued as [`InboundMessage`]s.
//!
//! ## Addresses
//! One-to-one chats are addressed as `<digits>@s.whatsapp.net`. Groups and
//! broadcasts use other suffixes and are ignored.
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::info;

pub const USER_SUFFIX: &str = "@s.whatsapp.net";

pub const BRIDGE_TOKEN_HEADER: &str = "x-bridge-token";

#[derive(Error, Debug)]
pub enum MessengerError {
    #[error("Gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gateway rejected request with status {0}")]
    Rejected(u16),

    #[error("Gateway call timed out")]
    Timeout,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct InboundMessage {
    pub from: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn connect(&self) -> Result<(), MessengerError>;

    async fn send_text(&self, address: &str, text: &str) -> Result<(), MessengerError>;

    async fn set_profile_picture(&self, address: &str, jpeg: Vec<u8>) -> Result<(), MessengerError>;
}

pub fn to_address(phone: &str) -> String {
    format!("{phone}{USER_SUFFIX}")
}

/// Local part of a one-to-one address, `None` for groups and broadcasts.
pub fn from_address(address: &str) -> Option<&str> {
    address
        .strip_suffix(USER_SUFFIX)
        .filter(|local| !local.is_empty())
}

pub struct BridgeMessenger {
    client: Client,
    base_url: String,
    token: Option<String>,
    auth_state_path: String,
}

impl BridgeMessenger {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        auth_state_path: &str,
        timeout: Duration,
    ) -> Result<Self, MessengerError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            auth_state_path: auth_state_path.to_string(),
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(format!("{}{path}", self.base_url));

        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<(), MessengerError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MessengerError::Timeout
            } else {
                MessengerError::Request(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MessengerError::Rejected(status.as_u16()));
        }

        Ok(())
    }
}

#[async_trait]
impl Messenger for BridgeMessenger {
    async fn connect(&self) -> Result<(), MessengerError> {
        info!("Resuming gateway session from {}", self.auth_state_path);

        self.send(self.post("/session").json(&json!({
            "authStatePath": self.auth_state_path,
            "browser": ["WhatsApp DP Changer", "Chrome", "Linux"],
        })))
        .await
    }

    async fn send_text(&self, address: &str, text: &str) -> Result<(), MessengerError> {
        self.send(self.post("/messages").json(&json!({
            "to": address,
            "text": text,
        })))
        .await
    }

    async fn set_profile_picture(&self, address: &str, jpeg: Vec<u8>) -> Result<(), MessengerError> {
        self.send(self.post("/profile-picture").json(&json!({
            "to": address,
            "image": STANDARD.encode(jpeg),
            "mimeType": "image/jpeg",
        })))
        .await
    }
}
