use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;

/// Text completion request (OpenAI `/v1/completions` shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,

    pub prompt: String,

    pub max_tokens: u32,

    pub temperature: f32,

    pub top_p: f32,

    pub frequency_penalty: f32,

    pub presence_penalty: f32,

    /// Number of samples to generate
    pub n: u32,

    /// Ask the upstream for an event stream instead of one document
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

impl CompletionRequest {
    pub fn new(
        model: impl Into<String>,
        prompt: impl Into<String>,
        generation: &GenerationConfig,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            max_tokens: generation.max_tokens,
            temperature: generation.temperature,
            top_p: generation.top_p,
            frequency_penalty: generation.frequency_penalty,
            presence_penalty: generation.presence_penalty,
            n: generation.n,
            stream: true,
        }
    }

    pub fn non_streaming(mut self) -> Self {
        self.stream = false;
        self
    }
}

/// Completion payload. Each streamed `data:` record carries one of these,
/// and the non-streaming endpoint returns a single one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub choices: Vec<CompletionChoice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    /// Incremental fragment when streaming, full text otherwise
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>, // "stop", "length"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}
