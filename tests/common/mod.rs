#![allow(dead_code)]

use bytes::Bytes;
use futures::StreamExt;
use indictment_relay::{
    RelayError,
    config::{RelayConfig, RelaySettings, ServerConfig, UpstreamConfig},
    models::{CompletionChoice, CompletionRequest, CompletionResponse},
    provider::{CompleteFuture, Provider, ProviderStream, StreamFuture},
};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// One step of a scripted upstream body
#[derive(Clone, Debug)]
pub enum Step {
    Chunk(Vec<u8>),
    Fail(String),
    /// Never yields again
    Hang,
}

pub fn chunk(s: &str) -> Step {
    Step::Chunk(s.as_bytes().to_vec())
}

/// Encode one upstream record carrying `text`
pub fn record(text: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({
            "id": "cmpl-test",
            "object": "text_completion",
            "choices": [{ "text": text, "index": 0, "logprobs": null, "finish_reason": null }],
            "model": "text-davinci-003"
        })
    )
}

pub const DONE: &str = "data: [DONE]\n\n";

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// In-memory provider replaying a fixed script
pub struct MockProvider {
    steps: Vec<Step>,
    reject_with: Option<String>,
    complete_text: String,
    pub calls: AtomicUsize,
    pub upstream_dropped: Arc<AtomicBool>,
    pub last_request: Mutex<Option<CompletionRequest>>,
}

impl MockProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            reject_with: None,
            complete_text: String::new(),
            calls: AtomicUsize::new(0),
            upstream_dropped: Arc::new(AtomicBool::new(false)),
            last_request: Mutex::new(None),
        }
    }

    /// Fail the request itself, as a non-success status would
    pub fn rejecting(reason: &str) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.reject_with = Some(reason.to_string());
        provider
    }

    pub fn completing(text: &str) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.complete_text = text.to_string();
        provider
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn was_dropped(&self) -> bool {
        self.upstream_dropped.load(Ordering::SeqCst)
    }

    fn record_call(&self, request: CompletionRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
    }
}

impl Provider for MockProvider {
    fn stream_completion(&self, request: CompletionRequest) -> StreamFuture {
        self.record_call(request);

        if let Some(reason) = self.reject_with.clone() {
            return Box::pin(async move {
                Err::<ProviderStream, _>(RelayError::UpstreamError(reason))
            });
        }

        let mut items = Vec::new();
        let mut hang = false;
        for step in &self.steps {
            match step {
                Step::Chunk(bytes) => items.push(Ok(Bytes::from(bytes.clone()))),
                Step::Fail(reason) => items.push(Err(RelayError::UpstreamError(reason.clone()))),
                Step::Hang => {
                    hang = true;
                    break;
                }
            }
        }

        let flag = DropFlag(self.upstream_dropped.clone());
        let body = futures::stream::iter(items);
        let stream = if hang {
            body.chain(futures::stream::pending::<Result<Bytes, RelayError>>())
                .boxed()
        } else {
            body.boxed()
        };
        let stream = stream.map(move |item| {
            let _guard = &flag;
            item
        });

        let stream: ProviderStream = Box::pin(stream);
        Box::pin(async move { Ok::<_, RelayError>(stream) })
    }

    fn complete(&self, request: CompletionRequest) -> CompleteFuture {
        self.record_call(request);

        let result = match self.reject_with.clone() {
            Some(reason) => Err(RelayError::UpstreamError(reason)),
            None => Ok(CompletionResponse {
                id: Some("cmpl-full".to_string()),
                choices: vec![CompletionChoice {
                    text: self.complete_text.clone(),
                    index: Some(0),
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            }),
        };

        Box::pin(async move { result })
    }

    fn name(&self) -> &str {
        "Mock"
    }
}

pub fn test_config(api_key: &str, settings: RelaySettings) -> RelayConfig {
    RelayConfig {
        server: ServerConfig {
            listen_addr: "127.0.0.1:0".to_string(),
        },
        upstream: UpstreamConfig {
            api_key: api_key.to_string(),
            ..UpstreamConfig::default()
        },
        generation: Default::default(),
        relay: settings,
    }
}
