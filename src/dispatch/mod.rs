//! Dispatch client
//!
//! Serializes a user turn into one of the two endpoint shapes, submits it
//! through a `ChatBackend`, and turns whatever comes back into the content
//! of an assistant message.

mod error;
mod http;
mod request;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

pub use error::{DispatchError, CONNECTION_ERROR_TEXT, SERVER_ERROR_TEXT};
pub use http::HttpChatBackend;
pub use request::{
    ChatReply, ChatRequest, Endpoint, GeneralMessageRequest, InteractionMode,
    SelectionQueryRequest, GENERAL_MESSAGE_PATH, SELECTION_QUERY_PATH,
};

use crate::config::BackendConfig;
use crate::conversation::Source;

pub type DispatchResult = Result<ChatReply, DispatchError>;

/// Something that can answer a chat request
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn submit(&self, request: &ChatRequest) -> DispatchResult;
}

/// Cheap-to-clone handle used by the widget and the driver
#[derive(Clone)]
pub struct DispatchClient {
    backend: Arc<dyn ChatBackend>,
}

impl DispatchClient {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub fn http(config: &BackendConfig) -> Self {
        Self::new(Arc::new(HttpChatBackend::new(config)))
    }

    pub async fn dispatch(&self, request: &ChatRequest) -> DispatchResult {
        let started = Instant::now();
        tracing::info!(
            endpoint = ?request.endpoint(),
            history = request.history().len(),
            "dispatching chat request"
        );

        let result = self.backend.submit(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(reply) => tracing::info!(
                elapsed_ms,
                sources = reply.sources.len(),
                "chat request completed"
            ),
            Err(e) => tracing::warn!(elapsed_ms, error = %e, "chat request failed"),
        }

        result
    }
}

/// Content of the assistant message for a finished request
pub fn assistant_reply(result: DispatchResult) -> (String, Vec<Source>) {
    match result {
        Ok(reply) => (reply.response, reply.sources),
        Err(e) => (e.user_message().to_string(), Vec::new()),
    }
}
