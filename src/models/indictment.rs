use serde::{Deserialize, Serialize};

/// Form fields submitted by the browser
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerateIndictmentBody {
    /// Description of the facts of the dispute
    pub fact: String,

    /// What the client is asking the court for
    pub appeal: String,
}

/// Reply payload for the non-streaming route and for error short-circuits
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: String,
    pub text: String,
}

impl ChatMessage {
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: "assistant".to_string(),
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            id: "0".to_string(),
            role: "system".to_string(),
            text: text.into(),
        }
    }

    /// Payload returned when no credential is configured
    pub fn missing_credential() -> Self {
        Self::system("请设置 OPENAI_API_KEY")
    }
}
