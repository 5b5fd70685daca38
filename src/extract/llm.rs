//! Extraction LLM client
//!
//! The provider is an external collaborator; the core only owns the
//! request/response contract: POST a prompt, receive text that must
//! contain a single JSON object. Transport failures are retried with
//! backoff; the circuit breaker and semaphore wrap this client one level
//! up in the service.

use crate::error::{PipelineError, Result};
use crate::types::Article;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Abstraction over the extraction model so tests can stub it.
#[async_trait]
pub trait LlmExtractor: Send + Sync {
    /// Return the raw model response text for one article prompt.
    async fn extract(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// HTTP client against the configured LLM gateway.
pub struct LlmClient {
    url: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("llm client: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl LlmExtractor for LlmClient {
    async fn extract(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            prompt,
            stream: false,
        };
        let resp = self.client.post(&self.url).json(&request).send().await?;
        if !resp.status().is_success() {
            return Err(PipelineError::TransientExternal(format!(
                "llm gateway returned {}",
                resp.status()
            )));
        }
        let body: GenerateResponse = resp.json().await?;
        debug!(response_len = body.response.len(), "LLM response received");
        Ok(body.response)
    }
}

/// Strict extraction prompt. The model must answer with one JSON object
/// and nothing else; the validator tolerates fences anyway.
pub fn build_extraction_prompt(article: &Article) -> String {
    format!(
        "You are a conflict-event extraction system for Nigeria.\n\
         Read the article below and respond with EXACTLY ONE JSON object, no prose.\n\
         Required keys:\n\
         - \"Event_Type\": one of attack, protest, clash, kidnapping, banditry, terrorism, communal, violence, conflict, other\n\
         - \"State\": Nigerian state where the event occurred\n\
         - \"LGA\": Local Government Area\n\
         - \"Severity\": one of low, medium, high, critical\n\
         Optional keys: \"Fatalities\" (number), \"Conflict_Actor\" (string), \"Confidence_Score\" (0-100), \"Longitude\", \"Latitude\".\n\
         \n\
         TITLE: {}\n\
         ARTICLE:\n{}\n",
        article.title, article.content
    )
}
