//! HTTP client for the remote LLM service.
//!
//! `POST {base}/embeddings` with `{"text"}` returns `{"embedding": [...]}`.
//! `POST {base}/complete` takes chat messages in JSON mode and returns
//! `{"content": "..."}`, where the content is itself a JSON object such as
//! `{"queries": [...]}`.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use newsrag_core::config::{ExpansionSettings, LlmSettings};
use newsrag_core::traits::{EmbeddingService, QueryExpansionService};
use newsrag_core::EmbedError;

const REWRITE_PROMPT: &str = "You rewrite search queries for a research system covering startups, \
venture funding, companies and investors. Produce 3 to 5 alternative phrasings of the user's query \
that keep its intent. Use synonyms, expand abbreviations and add domain terms that are likely to \
appear in article titles or bodies. Answer with a JSON object of the form {\"queries\": [\"...\"]}.";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct CompleteResponse {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct VariantsPayload {
    #[serde(default)]
    queries: Vec<serde_json::Value>,
}

pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
    temperature: f32,
    dimension: Option<usize>,
}

impl HttpLlmClient {
    pub fn new(llm: &LlmSettings, expansion: &ExpansionSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            user_id: llm.user_id.clone(),
            temperature: expansion.temperature,
            dimension: None,
        })
    }

    /// Rejects embeddings whose length differs from `dim`.
    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = Some(dim);
        self
    }

    async fn post_json<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("X-User-ID", &self.user_id)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("LLM service returned {status}: {body}"));
        }
        response.json::<R>().await.with_context(|| format!("decoding response from {url}"))
    }
}

#[async_trait]
impl EmbeddingService for HttpLlmClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let resp: EmbeddingResponse = self
            .post_json("/embeddings", &EmbeddingRequest { text })
            .await
            .map_err(|e| EmbedError::Transient(format!("{e:#}")))?;
        if let Some(expected) = self.dimension {
            if resp.embedding.len() != expected {
                return Err(EmbedError::Dimension { expected, got: resp.embedding.len() });
            }
        }
        Ok(resp.embedding)
    }
}

#[async_trait]
impl QueryExpansionService for HttpLlmClient {
    async fn generate_variants(&self, query: &str) -> Result<Vec<String>> {
        let request = CompleteRequest {
            messages: vec![
                ChatMessage { role: "system", content: REWRITE_PROMPT.to_string() },
                ChatMessage { role: "user", content: format!("Original query: {query}") },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat { kind: "json_object" },
        };
        let resp: CompleteResponse = self.post_json("/complete", &request).await?;
        let variants = parse_variants(&resp.content)?;
        debug!(query, variants = variants.len(), "query variants generated");
        Ok(variants)
    }
}

/// Extracts the `queries` array from a JSON-mode completion. Non-string and
/// blank entries are dropped.
pub fn parse_variants(content: &str) -> Result<Vec<String>> {
    let payload: VariantsPayload =
        serde_json::from_str(content.trim()).with_context(|| format!("malformed variants payload: {content}"))?;
    Ok(payload
        .queries
        .into_iter()
        .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_queries_array() {
        let v = parse_variants(r#" {"queries": ["ai startup funding", "  ", 7, "venture rounds for AI"]} "#).unwrap();
        assert_eq!(v, vec!["ai startup funding", "venture rounds for AI"]);
    }

    #[test]
    fn missing_key_yields_empty_list() {
        assert!(parse_variants(r#"{"other": 1}"#).unwrap().is_empty());
    }

    #[test]
    fn non_json_is_an_error() {
        assert!(parse_variants("here are some queries: a, b").is_err());
    }

    #[test]
    fn request_bodies_serialize_in_wire_shape() {
        let req = CompleteRequest {
            messages: vec![ChatMessage { role: "user", content: "q".into() }],
            temperature: 0.2,
            response_format: ResponseFormat { kind: "json_object" },
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["response_format"]["type"], "json_object");
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(serde_json::to_value(EmbeddingRequest { text: "hi" }).unwrap()["text"], "hi");
    }

    #[tokio::test]
    async fn unreachable_service_is_transient() {
        let llm = LlmSettings { base_url: "http://127.0.0.1:9".into(), timeout_secs: 2, ..LlmSettings::default() };
        let client = HttpLlmClient::new(&llm, &ExpansionSettings::default()).unwrap();
        let err = client.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbedError::Transient(_)));
    }
}
