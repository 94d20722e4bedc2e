//! REST access to the agent.
//!
//! `AgentApi` is the narrow seam the commands talk through: raw JSON in and
//! out. `AgentApiExt` layers typed helpers on top of any implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

/// Header carrying the event channel session id.
pub const SID_HEADER: &str = "XDS-AGENT-SID";

#[async_trait]
pub trait AgentApi: Send + Sync {
    /// `GET <base>/<path>` returning the decoded JSON body.
    async fn get_value(&self, path: &str) -> Result<serde_json::Value>;

    /// `POST <base>/<path>` with a JSON body; an empty response yields `Null`.
    async fn post_value(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value>;
}

#[async_trait]
pub trait AgentApiExt: AgentApi {
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.get_value(path).await?;
        serde_json::from_value(value).with_context(|| format!("failed to decode response of GET {path}"))
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<()> {
        let body = serde_json::to_value(body)
            .with_context(|| format!("failed to encode body of POST {path}"))?;
        self.post_value(path, body).await?;
        Ok(())
    }
}

impl<A: AgentApi + ?Sized> AgentApiExt for A {}

/// reqwest-backed implementation.
pub struct HttpClient {
    base: Url,
    http: reqwest::Client,
    sid: Option<String>,
}

impl HttpClient {
    /// `base` must end with a slash (see `AgentUrl::api_base`).
    pub fn new(base: Url) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("xds-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base,
            http,
            sid: None,
        })
    }

    /// Attach the event channel session id to every following request.
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("invalid request path: {path}"))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = self.url(path)?;
        tracing::trace!(%method, %url, "agent request");
        let mut req = self.http.request(method, url);
        if let Some(sid) = &self.sid {
            req = req.header(SID_HEADER, sid);
        }
        Ok(req)
    }

    async fn send(req: reqwest::RequestBuilder, what: &str) -> Result<serde_json::Value> {
        let response = req
            .send()
            .await
            .with_context(|| format!("{what} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{what} failed: {status} - {}", body.trim());
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("{what}: failed to read body"))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&bytes).with_context(|| format!("{what}: invalid JSON body"))
    }
}

#[async_trait]
impl AgentApi for HttpClient {
    async fn get_value(&self, path: &str) -> Result<serde_json::Value> {
        let req = self.request(reqwest::Method::GET, path)?;
        Self::send(req, &format!("GET {path}")).await
    }

    async fn post_value(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let req = self.request(reqwest::Method::POST, path)?.json(&body);
        Self::send(req, &format!("POST {path}")).await
    }
}
