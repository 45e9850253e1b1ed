//! Universe and place operations
//!
//! Payloads are validated locally before any request is sent.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::client::{Discard, OpenCloudClient};
use crate::error::{CoreError, Result};

/// Largest server size a place can be configured with
pub const MAX_SERVER_SIZE: u32 = 200;
/// Longest allowed message topic, in bytes
pub const MAX_TOPIC_LEN: usize = 80;
/// Largest allowed message payload, in bytes
pub const MAX_MESSAGE_BYTES: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Universe {
    pub path: String,
    pub create_time: String,
    pub update_time: String,
    pub display_name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub visibility: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Place {
    pub path: String,
    pub create_time: String,
    pub update_time: String,
    pub display_name: String,
    pub description: String,
    pub server_size: u32,
}

/// Partial update for a place; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_size: Option<u32>,
}

impl PlaceUpdate {
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn server_size(mut self, size: u32) -> Self {
        self.server_size = Some(size);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.display_name.is_none() && self.description.is_none() && self.server_size.is_none()
        {
            return Err(CoreError::Validation(
                "place update must set at least one field".to_string(),
            ));
        }
        if let Some(size) = self.server_size
            && !(1..=MAX_SERVER_SIZE).contains(&size)
        {
            return Err(CoreError::Validation(format!(
                "server size must be between 1 and {MAX_SERVER_SIZE}, got {size}"
            )));
        }
        Ok(())
    }
}

/// A message published to every server in a universe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseMessage {
    pub topic: String,
    pub message: String,
}

impl UniverseMessage {
    pub fn new(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            message: message.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let topic_len = self.topic.len();
        if topic_len == 0 || topic_len > MAX_TOPIC_LEN {
            return Err(CoreError::Validation(format!(
                "message topic must be between 1 and {MAX_TOPIC_LEN} characters, got {topic_len}"
            )));
        }
        if self.message.len() > MAX_MESSAGE_BYTES {
            return Err(CoreError::Validation(format!(
                "message payload must be at most {MAX_MESSAGE_BYTES} bytes, got {}",
                self.message.len()
            )));
        }
        Ok(())
    }
}

/// Universe and place operations
#[derive(Debug, Clone)]
pub struct UniverseHandler {
    client: OpenCloudClient,
}

impl UniverseHandler {
    pub fn new(client: OpenCloudClient) -> Self {
        Self { client }
    }

    pub async fn get_universe(&self, universe_id: &str) -> Result<Universe> {
        self.client
            .get(&format!("/cloud/v2/universes/{universe_id}"))
            .await
    }

    pub async fn get_place(&self, universe_id: &str, place_id: &str) -> Result<Place> {
        self.client
            .get(&format!(
                "/cloud/v2/universes/{universe_id}/places/{place_id}"
            ))
            .await
    }

    #[instrument(skip(self, update))]
    pub async fn update_place(
        &self,
        universe_id: &str,
        place_id: &str,
        update: &PlaceUpdate,
    ) -> Result<Place> {
        update.validate()?;
        self.client
            .patch(
                &format!("/cloud/v2/universes/{universe_id}/places/{place_id}"),
                update,
            )
            .await
    }

    #[instrument(skip(self, message), fields(topic = %message.topic))]
    pub async fn publish_message(&self, universe_id: &str, message: &UniverseMessage) -> Result<()> {
        message.validate()?;
        let _: Discard = self
            .client
            .post(
                &format!("/cloud/v2/universes/{universe_id}:publishMessage"),
                message,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn restart_servers(&self, universe_id: &str) -> Result<()> {
        let _: Discard = self
            .client
            .request(
                reqwest::Method::POST,
                &format!("/cloud/v2/universes/{universe_id}:restartServers"),
                None::<&()>,
                None,
            )
            .await?
            .decode()?;
        info!(universe_id, "requested server restart");
        Ok(())
    }
}
