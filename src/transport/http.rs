//! HTTP uploader speaking the coordinator's device API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::{info, warn};

use crate::transport::{EventTag, TransportError, UploadTransport};
use crate::UploadConfig;

pub struct HttpUploader {
    client: reqwest::Client,
    stream_url: String,
    register_url: String,
    device: String,
}

impl HttpUploader {
    pub fn new(config: &UploadConfig, device: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        let base = config.coordinator.trim_end_matches('/');
        Ok(Self {
            client,
            stream_url: format!("{}/api/device/stream?device={}", base, device),
            register_url: format!("{}/api/device/register", base),
            device: device.to_string(),
        })
    }

    /// Announce this node to the coordinator, retrying until acknowledged.
    pub async fn register(&self) {
        let body = serde_json::json!({
            "name": self.device,
            "type": crate::DEVICE_TYPE,
        });

        info!("Registering device...");
        loop {
            match self.client.put(&self.register_url).json(&body).send().await {
                Ok(resp) if resp.status() == StatusCode::NO_CONTENT => {
                    info!("Registered with coordinator as {}", self.device);
                    return;
                }
                Ok(resp) => warn!("Registration rejected: HTTP {}", resp.status()),
                Err(e) => warn!("Registration attempt failed: {}", e),
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

#[async_trait]
impl UploadTransport for HttpUploader {
    async fn send_frame(
        &self,
        payload: &[u8],
        event: Option<EventTag>,
    ) -> Result<(), TransportError> {
        let url = match event {
            Some(tag) => format!("{}&event={}", self.stream_url, tag.time),
            None => self.stream_url.clone(),
        };

        let resp = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "image/jpeg")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Http(e)
                }
            })?;

        match resp.status() {
            StatusCode::NO_CONTENT => Ok(()),
            status => Err(TransportError::Status(status.as_u16())),
        }
    }
}
