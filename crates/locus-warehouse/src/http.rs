//! Platform-agnostic HTTP client abstraction for the warehouse REST job API.
//!
//! Mirrors `otlp2parquet-storage::iceberg::http::HttpClient`: the REST
//! client depends only on this trait, not on `reqwest` directly, so it can
//! be swapped for a mock in tests without touching the network.

use async_trait::async_trait;
use locus_core::PipelineError;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, PipelineError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| PipelineError::transient("warehouse", format!("bad JSON response: {e}")))
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn request(
        &self,
        method: &str,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, PipelineError>;

    async fn get(&self, url: &str) -> Result<HttpResponse, PipelineError> {
        self.request("GET", url, None).await
    }

    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, PipelineError> {
        self.request("POST", url, Some(body)).await
    }
}

/// `reqwest`-backed implementation used in production.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn request(
        &self,
        method: &str,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, PipelineError> {
        let mut builder = match method {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            other => {
                return Err(PipelineError::permanent_config(
                    "warehouse",
                    format!("unsupported HTTP method {other}"),
                ))
            }
        };
        if let Some(body) = body {
            builder = builder
                .header("content-type", "application/json")
                .body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                PipelineError::transient("warehouse", e.to_string())
            } else {
                PipelineError::permanent_config("warehouse", e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| PipelineError::transient("warehouse", e.to_string()))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }
}
