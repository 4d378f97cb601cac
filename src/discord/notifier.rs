use std::fmt;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::camera::Frame;
use crate::config::ConfigDiscord;

/// Destination channel for a notification. Two logical channels exist: the
/// primary alert channel and a debug/status channel for startup,
/// first-contact and failure messages.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivers an image plus message to a channel. A failed delivery is an
/// error; there is no retry and the failure must not be masked.
pub trait NotificationSink {
    async fn notify(
        &self,
        image: &Frame,
        message: &str,
        channel: &ChannelId,
    ) -> Result<(), NotifyError>;
}

#[derive(Clone)]
pub struct DiscordNotifier {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl DiscordNotifier {
    pub fn new(config: &ConfigDiscord) -> Result<DiscordNotifier, NotifyError> {
        let client = reqwest::Client::builder()
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(NotifyError::ConnectionError)?;
        Ok(DiscordNotifier {
            client,
            api_url: config.api_url.clone(),
            token: config.token.clone(),
        })
    }
}

impl NotificationSink for DiscordNotifier {
    async fn notify(
        &self,
        image: &Frame,
        message: &str,
        channel: &ChannelId,
    ) -> Result<(), NotifyError> {
        info!(%channel, "sending notification");

        let jpeg = image.to_jpeg()?;
        let form = Form::new()
            .text("content", message.to_string())
            .part("file", Part::bytes(jpeg).file_name("image.jpeg"));

        let url = format!("{}/channels/{}/messages", self.api_url, channel);
        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .multipart(form)
            .send()
            .await
            .map_err(NotifyError::ConnectionError)?;
        if !res.status().is_success() {
            return Err(NotifyError::Rejected(res.status().as_u16()));
        }
        Ok(())
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum NotifyError {
        ConnectionError(error: reqwest::Error) {
            display("Unable to reach notification API: {}", error)
            source(error)
        }
        Rejected(status: u16) {
            display("Notification API rejected message with status {}", status)
        }
        ImageEncoding(error: image::ImageError) {
            from()
            display("Unable to encode frame as JPEG: {}", error)
            source(error)
        }
    }
}
