use super::{validate_dimensions, Embedder};
use crate::config::{parse_base_url, EmbeddingConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct EmbedTextRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Data { data: Vec<EmbeddingData> },
    Embeddings { embeddings: Vec<Vec<f32>> },
    Vectors { vectors: Vec<Vec<f32>> },
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl EmbeddingResponse {
    fn into_embeddings(self) -> Vec<Vec<f32>> {
        match self {
            EmbeddingResponse::Data { mut data } => {
                if data.iter().all(|d| d.index.is_some()) {
                    data.sort_by_key(|d| d.index);
                }
                data.into_iter().map(|d| d.embedding).collect()
            }
            EmbeddingResponse::Embeddings { embeddings } => embeddings,
            EmbeddingResponse::Vectors { vectors } => vectors,
        }
    }
}

/// Embedder for OpenAI-compatible `/v1/embeddings` endpoints
pub struct HttpEmbedder {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    model_id: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.url)
            .map_err(|e| Error::Config(format!("Invalid embedding URL '{}': {}", config.url, e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let api_key = config.api_key();
        if api_key.is_none() {
            warn!(
                "No embedding API key found in ${}; sending unauthenticated requests",
                config.api_key_env
            );
        }

        Ok(Self {
            client,
            base_url,
            api_key,
            model_id: config.model.clone(),
            dimension: config.dimension,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid embedding backend URL: {}", e)))
    }

    fn provider_error(&self, what: &str, err: impl std::fmt::Display) -> Error {
        Error::EmbeddingProvider(format!("{} ({}): {}", what, self.model_id, err))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let url = self.endpoint("v1/embeddings")?;
        let request = EmbedTextRequest {
            model: &self.model_id,
            input: texts,
        };

        debug!("Requesting {} embeddings from {}", expected, url);

        let mut builder = self.client.post(url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.provider_error("Request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.provider_error(
                "Request rejected",
                format!("status {}: {}", status, body),
            ));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| self.provider_error("Malformed response", e))?;
        let embeddings = parsed.into_embeddings();

        if embeddings.len() != expected {
            return Err(self.provider_error(
                "Malformed response",
                format!("{} embeddings for {} inputs", embeddings.len(), expected),
            ));
        }
        validate_dimensions(&self.model_id, self.dimension, &embeddings)?;

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
