use futures::TryStreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::UpstreamConfig;
use crate::error::{RelayError, Result};
use crate::models::{CompletionRequest, CompletionResponse};
use crate::provider::{CompleteFuture, Provider, ProviderStream, StreamFuture};

pub struct OpenAiClient {
    client: Client,
    config: UpstreamConfig,
}

impl OpenAiClient {
    /// Build a client bound to one credential. An empty credential is
    /// rejected so no request can ever leave without one.
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(RelayError::ConfigError("API key is empty".to_string()));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                RelayError::InternalError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

impl Provider for OpenAiClient {
    fn stream_completion(&self, request: CompletionRequest) -> StreamFuture {
        let url = self.completions_url();
        let client = self.client.clone();
        let api_key = self.config.api_key.clone();

        Box::pin(async move { Self::stream_completion_impl(url, request, client, api_key).await })
    }

    fn complete(&self, request: CompletionRequest) -> CompleteFuture {
        let url = self.completions_url();
        let client = self.client.clone();
        let api_key = self.config.api_key.clone();

        Box::pin(async move { Self::complete_impl(url, request, client, api_key).await })
    }

    fn name(&self) -> &str {
        "OpenAI"
    }
}

impl OpenAiClient {
    async fn send(
        url: &str,
        request: &CompletionRequest,
        client: &Client,
        api_key: &str,
    ) -> Result<reqwest::Response> {
        let body = serde_json::to_vec(request)?;
        info!(
            "OpenAI: Sending {} bytes to: {} (model: {}, stream: {})",
            body.len(),
            url,
            request.model,
            request.stream
        );

        let response = client
            .post(url)
            .header("Content-Type", "application/json")
            .bearer_auth(api_key)
            .body(body)
            .send()
            .await
            .map_err(|e| RelayError::UpstreamError(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        info!("OpenAI responded with status: {}", status);

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RelayError::UpstreamError(format!(
                "OpenAI API error {}: {}",
                status, error_body
            )));
        }

        Ok(response)
    }

    async fn stream_completion_impl(
        url: String,
        request: CompletionRequest,
        client: Client,
        api_key: String,
    ) -> Result<ProviderStream> {
        let response = Self::send(&url, &request, &client, &api_key).await?;

        let stream = response.bytes_stream().map_err(|e| {
            RelayError::UpstreamError(format!("OpenAI stream interrupted: {}", e))
        });

        Ok(Box::pin(stream))
    }

    async fn complete_impl(
        url: String,
        request: CompletionRequest,
        client: Client,
        api_key: String,
    ) -> Result<CompletionResponse> {
        let response = Self::send(&url, &request, &client, &api_key).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::UpstreamError(format!("OpenAI body read failed: {}", e)))?;
        debug!("OpenAI: Received {} bytes", body.len());

        let completion: CompletionResponse = serde_json::from_slice(&body).map_err(|e| {
            RelayError::UpstreamError(format!("Invalid OpenAI completion: {}", e))
        })?;

        Ok(completion)
    }
}
