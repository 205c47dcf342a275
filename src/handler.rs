use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::client::OpenAiClient;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::models::{ChatMessage, CompletionRequest, GenerateIndictmentBody};
use crate::prompt;
use crate::provider::Provider;
use crate::streaming::{spawn_relay, watch_relay};

pub struct AppState {
    /// `None` when no credential is configured; requests then short-circuit
    pub provider: Option<Arc<dyn Provider>>,
    pub config: RelayConfig,
}

impl AppState {
    /// Build the upstream client only when a credential is present
    pub fn from_config(config: RelayConfig) -> Result<Self> {
        let provider: Option<Arc<dyn Provider>> = if config.has_credential() {
            Some(Arc::new(OpenAiClient::new(config.upstream.clone())?))
        } else {
            warn!("OPENAI_API_KEY is not set, generation requests will be rejected");
            None
        };

        Ok(Self { provider, config })
    }

    pub fn with_provider(provider: Arc<dyn Provider>, config: RelayConfig) -> Self {
        Self {
            provider: Some(provider),
            config,
        }
    }

    fn completion_request(&self, body: &GenerateIndictmentBody) -> CompletionRequest {
        CompletionRequest::new(
            self.config.upstream.model.clone(),
            prompt::compose_from_body(body),
            &self.config.generation,
        )
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/generateIndictment", post(handle_generate))
        .route("/api/generateIndictment/stream", post(handle_generate_stream))
        .route("/health", get(health))
        .with_state(state)
}

fn missing_credential_response() -> Response {
    warn!("Rejecting request: no credential configured");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ChatMessage::missing_credential()),
    )
        .into_response()
}

fn upstream_error_response(e: RelayError) -> Response {
    (StatusCode::BAD_GATEWAY, Json(ChatMessage::system(e.to_string()))).into_response()
}

/// Relay generated text to the browser as it is produced
pub async fn handle_generate_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateIndictmentBody>,
) -> Response {
    let Some(provider) = state.provider.as_ref() else {
        return missing_credential_response();
    };

    let request = state.completion_request(&body);
    info!(
        "{}: Streaming request, prompt {} chars",
        provider.name(),
        request.prompt.chars().count()
    );

    let upstream = match provider.stream_completion(request).await {
        Ok(s) => s,
        Err(e) => {
            error!("{} request failed: {}", provider.name(), e);
            return upstream_error_response(e);
        }
    };

    let (receiver, relay) = spawn_relay(upstream, state.config.relay);
    tokio::spawn(watch_relay(relay));
    let body = receiver.map(|item| item.map_err(RelayError::into_io_error));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

/// Wait for the whole document and return it at once
pub async fn handle_generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateIndictmentBody>,
) -> Response {
    let Some(provider) = state.provider.as_ref() else {
        return missing_credential_response();
    };

    let request = state.completion_request(&body).non_streaming();
    info!(
        "{}: Blocking request, prompt {} chars",
        provider.name(),
        request.prompt.chars().count()
    );

    let completion = match provider.complete(request).await {
        Ok(c) => c,
        Err(e) => {
            error!("{} request failed: {}", provider.name(), e);
            return upstream_error_response(e);
        }
    };

    let id = completion.id;
    let Some(choice) = completion.choices.into_iter().next() else {
        return upstream_error_response(RelayError::UpstreamError(
            "Completion has no choices".to_string(),
        ));
    };

    let mut message = ChatMessage::assistant(choice.text.trim_start_matches(['\n', '\r']));
    if let Some(id) = id {
        message.id = id;
    }

    (StatusCode::OK, Json(message)).into_response()
}

pub async fn health() -> &'static str {
    "ok"
}
