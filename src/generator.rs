#![forbid(unsafe_code)]

//! Generative-text seam and the Gemini `generateContent` client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GeminiConfig;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const MAX_OUTPUT_TOKENS: u32 = 4096;
pub const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    /// Request with the fixed article-generation parameters.
    pub fn article(prompt: String) -> Self {
        Self {
            prompt,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("generation request failed: {0}")]
    Transport(String),

    #[error("generation response could not be decoded: {0}")]
    Decode(String),

    #[error("generation response contained no text")]
    Empty,
}

/// One prompt in, one block of text out. Implementations never retry.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn into_text(self) -> Result<String, GenerationError> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text)
    }
}

pub struct GeminiClient {
    agent: ureq::Agent,
    api_key: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Self {
        Self::with_base_url(config, GEMINI_API_BASE)
    }

    pub fn with_base_url(config: &GeminiConfig, base_url: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/models/{GEMINI_MODEL}:generateContent",
                base_url.trim_end_matches('/')
            ),
        }
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = GenerateBody {
            contents: [Content {
                parts: [Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: request.max_output_tokens,
                temperature: request.temperature,
            },
        };
        let response = self
            .agent
            .post(&self.endpoint)
            .set("x-goog-api-key", &self.api_key)
            .send_json(&body)
            .map_err(|err| match err {
                ureq::Error::Status(status, response) => GenerationError::Http {
                    status,
                    body: response.into_string().unwrap_or_default(),
                },
                ureq::Error::Transport(transport) => {
                    GenerationError::Transport(transport.to_string())
                }
            })?;
        response
            .into_json::<GenerateResponse>()
            .map_err(|err| GenerationError::Decode(err.to_string()))?
            .into_text()
    }
}
