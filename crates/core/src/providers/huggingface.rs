use crate::answer::{stuff_prompt, GenerationConfig};
use crate::embeddings::EmbeddingProvider;
use crate::error::CapabilityError;
use crate::models::RetrievedChunk;
use crate::traits::GenerativeAnswerer;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

pub const DEFAULT_HF_ENDPOINT: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_EMBEDDING_MODEL: &str = "hkunlp/instructor-xl";
pub const DEFAULT_HF_EMBEDDING_DIMENSIONS: usize = 768;
pub const DEFAULT_GENERATION_MODEL: &str = "google/flan-t5-xxl";
/// Inputs sent per feature-extraction request.
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 32;

const BACKEND: &str = "huggingface";

/// Connection settings shared by the Hugging Face inference backends.
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    pub endpoint: String,
    pub api_token: String,
    pub timeout: Duration,
}

impl HuggingFaceConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_HF_ENDPOINT.to_string(),
            api_token: api_token.into(),
            timeout: Duration::from_secs(120),
        }
    }

    fn base_url(&self) -> Result<Url, CapabilityError> {
        let mut base = self.endpoint.trim_end_matches('/').to_string();
        base.push('/');
        Ok(Url::parse(&base)?)
    }

    fn client(&self) -> Result<Client, CapabilityError> {
        if self.api_token.trim().is_empty() {
            return Err(CapabilityError::Request(
                "hugging face api token must not be empty".to_string(),
            ));
        }
        Ok(Client::builder().timeout(self.timeout).build()?)
    }
}

async fn post_json(
    client: &Client,
    url: Url,
    api_token: &str,
    body: &Value,
) -> Result<Value, CapabilityError> {
    let response = client
        .post(url)
        .bearer_auth(api_token)
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let details = response.text().await.unwrap_or_default();
        let details = serde_json::from_str::<Value>(&details)
            .ok()
            .and_then(|value| value.pointer("/error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(details);
        tracing::warn!(%status, backend = BACKEND, "inference request failed");
        return Err(CapabilityError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("{status}: {details}"),
        });
    }

    Ok(response.json().await?)
}

/// Embeddings from the feature-extraction pipeline of the inference API.
pub struct HuggingFaceEmbedder {
    client: Client,
    config: HuggingFaceConfig,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl HuggingFaceEmbedder {
    pub fn new(
        config: HuggingFaceConfig,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, CapabilityError> {
        Ok(Self {
            client: config.client()?,
            config,
            model: model.into(),
            dimensions,
            batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
        })
    }

    /// Caps how many texts go into one inference request. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        tracing::debug!(model = %self.model, batch_size = texts.len(), "embedding batch");
        let url = self
            .config
            .base_url()?
            .join(&format!("pipeline/feature-extraction/{}", self.model))?;
        let payload = json!({
            "inputs": texts,
            "options": { "wait_for_model": true },
        });

        let parsed = post_json(&self.client, url, &self.config.api_token, &payload).await?;
        let vectors = parse_feature_extraction(&parsed)?;

        if vectors.len() != texts.len() {
            return Err(CapabilityError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("{} embeddings for {} inputs", vectors.len(), texts.len()),
            });
        }
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != self.dimensions) {
            return Err(CapabilityError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!(
                    "embedding has {} dimensions, configured for {}",
                    bad.len(),
                    self.dimensions
                ),
            });
        }

        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbedder {
    fn model_id(&self) -> String {
        format!("{BACKEND}:{}", self.model)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CapabilityError::BackendResponse {
                backend: BACKEND.to_string(),
                details: "empty embedding response".to_string(),
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_request(batch).await?);
        }
        Ok(vectors)
    }
}

/// Accepts either one pooled vector per input or token-level vectors, which
/// are mean-pooled.
fn parse_feature_extraction(value: &Value) -> Result<Vec<Vec<f32>>, CapabilityError> {
    let malformed = |details: &str| CapabilityError::BackendResponse {
        backend: BACKEND.to_string(),
        details: details.to_string(),
    };

    let items = value
        .as_array()
        .ok_or_else(|| malformed("feature extraction response is not an array"))?;

    items
        .iter()
        .map(|item| {
            let rows = item
                .as_array()
                .ok_or_else(|| malformed("embedding is not an array"))?;

            if rows.iter().all(Value::is_number) {
                return Ok(rows.iter().filter_map(Value::as_f64).map(|v| v as f32).collect());
            }

            let tokens = rows
                .iter()
                .map(|row| {
                    row.as_array()
                        .map(|row| {
                            row.iter()
                                .filter_map(Value::as_f64)
                                .map(|v| v as f32)
                                .collect::<Vec<_>>()
                        })
                        .ok_or_else(|| malformed("token embedding is not an array"))
                })
                .collect::<Result<Vec<_>, _>>()?;

            mean_pool(&tokens).ok_or_else(|| malformed("token embeddings are empty or ragged"))
        })
        .collect()
}

fn mean_pool(tokens: &[Vec<f32>]) -> Option<Vec<f32>> {
    let width = tokens.first()?.len();
    if width == 0 || tokens.iter().any(|token| token.len() != width) {
        return None;
    }

    let mut pooled = vec![0f32; width];
    for token in tokens {
        for (sum, value) in pooled.iter_mut().zip(token) {
            *sum += value;
        }
    }
    let count = tokens.len() as f32;
    pooled.iter_mut().for_each(|value| *value /= count);
    Some(pooled)
}

/// Text generation through the inference API with a stuffed prompt.
pub struct HuggingFaceAnswerer {
    client: Client,
    config: HuggingFaceConfig,
    model: String,
    generation: GenerationConfig,
}

impl HuggingFaceAnswerer {
    pub fn new(
        config: HuggingFaceConfig,
        model: impl Into<String>,
        generation: GenerationConfig,
    ) -> Result<Self, CapabilityError> {
        Ok(Self {
            client: config.client()?,
            config,
            model: model.into(),
            generation,
        })
    }
}

#[async_trait]
impl GenerativeAnswerer for HuggingFaceAnswerer {
    fn name(&self) -> &str {
        &self.model
    }

    async fn answer(
        &self,
        context: &[RetrievedChunk],
        question: &str,
    ) -> Result<String, CapabilityError> {
        let url = self.config.base_url()?.join(&format!("models/{}", self.model))?;
        let payload = json!({
            "inputs": stuff_prompt(context, question),
            "parameters": {
                "temperature": self.generation.temperature,
                "max_new_tokens": self.generation.max_new_tokens,
                "return_full_text": false,
            },
            "options": { "wait_for_model": true },
        });

        tracing::debug!(model = %self.model, context_chunks = context.len(), "generating answer");
        let parsed = post_json(&self.client, url, &self.config.api_token, &payload).await?;
        parse_generated_text(&parsed)
    }
}

fn parse_generated_text(value: &Value) -> Result<String, CapabilityError> {
    let text = value
        .pointer("/0/generated_text")
        .or_else(|| value.pointer("/generated_text"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    if text.is_empty() {
        return Err(CapabilityError::BackendResponse {
            backend: BACKEND.to_string(),
            details: "generation response had no generated_text".to_string(),
        });
    }

    Ok(text.to_string())
}
