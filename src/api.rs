//! Backend API client.
//!
//! [`JobApi`] is the seam between the dispatcher and the network: the TUI and
//! headless modes talk to [`HttpApi`], tests use an in-memory mock.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::model::{
    AnalyzerOption, CreateExtract, CreatedExtract, FieldsetOption, MutationAck, StartAnalysis,
    StartDocumentExtract,
};

/// The read and write operations this tool consumes.
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn list_analyzers(&self) -> Result<Vec<AnalyzerOption>>;
    async fn list_fieldsets(&self) -> Result<Vec<FieldsetOption>>;
    async fn start_analysis(&self, req: StartAnalysis) -> Result<MutationAck>;
    async fn start_document_extract(&self, req: StartDocumentExtract) -> Result<MutationAck>;
    async fn create_extract(&self, req: CreateExtract) -> Result<CreatedExtract>;
    async fn start_extract(&self, extract_id: &str) -> Result<MutationAck>;
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

/// JSON-over-HTTP implementation of [`JobApi`].
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApi {
    pub fn new(cfg: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("jobpick/{}", env!("CARGO_PKG_VERSION")))
            .timeout(cfg.timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            token: cfg.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .authed(self.client.get(self.url(path)))
            .send()
            .await
            .with_context(|| format!("GET {path}"))?
            .error_for_status()
            .with_context(|| format!("GET {path}"))?;
        resp.json::<T>()
            .await
            .with_context(|| format!("decode response of GET {path}"))
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .authed(self.client.post(self.url(path)).json(body))
            .send()
            .await
            .with_context(|| format!("POST {path}"))?
            .error_for_status()
            .with_context(|| format!("POST {path}"))?;
        resp.json::<T>()
            .await
            .with_context(|| format!("decode response of POST {path}"))
    }
}

#[async_trait]
impl JobApi for HttpApi {
    async fn list_analyzers(&self) -> Result<Vec<AnalyzerOption>> {
        self.get_json("/api/analyzers").await
    }

    async fn list_fieldsets(&self) -> Result<Vec<FieldsetOption>> {
        self.get_json("/api/fieldsets").await
    }

    async fn start_analysis(&self, req: StartAnalysis) -> Result<MutationAck> {
        self.post_json("/api/analyses/start", &req).await
    }

    async fn start_document_extract(&self, req: StartDocumentExtract) -> Result<MutationAck> {
        self.post_json("/api/extracts/document/start", &req).await
    }

    async fn create_extract(&self, req: CreateExtract) -> Result<CreatedExtract> {
        self.post_json("/api/extracts", &req).await
    }

    async fn start_extract(&self, extract_id: &str) -> Result<MutationAck> {
        let path = format!("/api/extracts/{extract_id}/start");
        self.post_json(&path, &serde_json::json!({})).await
    }
}
