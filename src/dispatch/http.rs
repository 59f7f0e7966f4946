//! HTTP implementation of the chat backend

use async_trait::async_trait;
use std::time::Duration;

use super::error::DispatchError;
use super::request::{ChatReply, ChatRequest, Endpoint};
use super::ChatBackend;
use crate::config::BackendConfig;

/// Posts JSON requests to the documentation site's chat API
pub struct HttpChatBackend {
    client: reqwest::Client,
    base_url: String,
    general_path: String,
    selection_path: String,
    timeout: Option<Duration>,
}

impl HttpChatBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            general_path: config.general_path.clone(),
            selection_path: config.selection_path.clone(),
            timeout: config.request_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn url_for(&self, endpoint: Endpoint) -> String {
        let path = match endpoint {
            Endpoint::GeneralMessage => &self.general_path,
            Endpoint::SelectionQuery => &self.selection_path,
        };
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn submit(&self, request: &ChatRequest) -> Result<ChatReply, DispatchError> {
        let url = self.url_for(request.endpoint());

        let mut builder = self.client.post(&url).json(request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(DispatchError::from_network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::from_http_status(status, body));
        }

        let body = response
            .text()
            .await
            .map_err(DispatchError::from_network_error)?;
        serde_json::from_str(&body).map_err(|e| DispatchError::Decode(e.to_string()))
    }
}
