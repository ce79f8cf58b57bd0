//! LLM analysis client
//!
//! OpenAI-compatible chat-completions client implementing the
//! AnalysisAdapter boundary. Requests strict JSON matching the structured
//! output shapes; token usage is tracked across the client's lifetime.

use super::{
    parse_analysis_output, AnalysisAdapter, AnalysisError, AnalysisInstruction, AnalysisOutput,
    EvidenceBundle,
};
use crate::providers::rate_limit::RateLimiter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const USER_AGENT: &str = "dossier-en/0.1.0 (+https://github.com/dossier/dossier)";
const RATE_LIMIT_MS: u64 = 500;

/// LLM client errors (construction only; request errors map to AnalysisError)
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Accumulated token usage across the client's lifetime
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// OpenAI-compatible analysis client
pub struct LlmAnalysisClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
    model: String,
    api_key: String,
    usage: Mutex<TokenUsage>,
}

impl LlmAnalysisClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
            usage: Mutex::new(TokenUsage::default()),
        })
    }

    /// Override the API base URL (for compatible gateways)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Total token usage since construction
    pub async fn token_usage(&self) -> TokenUsage {
        *self.usage.lock().await
    }

    fn system_text(instruction: AnalysisInstruction) -> String {
        let shape = match instruction {
            AnalysisInstruction::CompetitorScan => {
                r#"{"competitors": ["<name>", ...]}"#
            }
            AnalysisInstruction::Swot => {
                r#"{"strengths": [...], "weaknesses": [...], "opportunities": [...], "threats": [...]}"#
            }
            AnalysisInstruction::Sentiment => {
                r#"{"label": "positive|neutral|negative", "score": <-1.0..1.0>, "rationale": "<short>"}"#
            }
            AnalysisInstruction::Biography | AnalysisInstruction::Synthesis => {
                r#"{"content": "<text>"}"#
            }
        };

        format!(
            "You are a business-intelligence analyst. Use only the evidence \
             provided; do not invent facts. Respond with a single JSON object \
             of exactly this shape, no surrounding prose: {}",
            shape
        )
    }

    async fn record_usage(&self, usage: Option<ChatUsage>) {
        if let Some(u) = usage {
            let mut total = self.usage.lock().await;
            total.prompt_tokens += u.prompt_tokens;
            total.completion_tokens += u.completion_tokens;
        }
    }
}

#[async_trait::async_trait]
impl AnalysisAdapter for LlmAnalysisClient {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn analyze(
        &self,
        bundle: &EvidenceBundle,
        instruction: AnalysisInstruction,
    ) -> Result<AnalysisOutput, AnalysisError> {
        self.rate_limiter.wait().await;

        let evidence = serde_json::to_string(bundle)
            .map_err(|e| AnalysisError::Network(format!("evidence serialization: {}", e)))?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: Self::system_text(instruction),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Instruction: {}\nSubject: {} ({})\nEvidence:\n{}",
                        instruction.as_str(),
                        bundle.subject,
                        bundle.entity_kind.as_str(),
                        evidence
                    ),
                },
            ],
            temperature: 0.2,
        };

        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(
            instruction = instruction.as_str(),
            subject = %bundle.subject,
            "Dispatching analysis request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::Network(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(AnalysisError::Auth(format!("status {}", status)));
        }
        if status.as_u16() == 429 {
            return Err(AnalysisError::RateLimited);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Api(status.as_u16(), error_text));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Network(format!("response decode: {}", e)))?;

        self.record_usage(chat.usage).await;

        let content = chat
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        tracing::info!(
            instruction = instruction.as_str(),
            subject = %bundle.subject,
            response_chars = content.len(),
            "Analysis response received"
        );

        // Malformed output is data (a ParseFailure marker), not an error
        Ok(parse_analysis_output(instruction, &content))
    }
}
