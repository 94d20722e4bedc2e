/*!
shared.rs - state and helpers shared by subcommands.

Focus:
  - AppContext: agent API handle, resolved settings, lazily cached version
  - runtime(): Tokio runtime for the (sync) command entry points
  - resolve_id: --id flag or first positional argument
  - log_post: JSON dump of outgoing POST bodies
*/

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::OnceCell;
use url::Url;

use crate::agent::types::XdsVersion;
use crate::agent::{AgentApi, AgentApiExt};
use crate::config::{DEFAULT_EXEC_TIMEOUT, DEFAULT_SERVER_INDEX, EnvFile};
use crate::utils::ContextExt;

/* ---- Application Context ---- */

/// Everything a command needs to talk to the agent.
pub struct AppContext {
    pub api: Arc<dyn AgentApi>,
    /// Entries of the `--config` env file (remote command environment).
    pub env: EnvFile,
    /// Prefix command output with its timestamp.
    pub show_timestamp: bool,
    /// Session id shared by the HTTP client and the event channel.
    pub sid: String,
    pub events_url: Option<Url>,
    server_index: usize,
    exec_timeout: u32,
    version: OnceCell<XdsVersion>,
}

impl AppContext {
    pub fn new(api: Arc<dyn AgentApi>) -> Self {
        Self {
            api,
            env: EnvFile::default(),
            show_timestamp: false,
            sid: String::new(),
            events_url: None,
            server_index: DEFAULT_SERVER_INDEX,
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
            version: OnceCell::new(),
        }
    }

    pub fn with_env(mut self, env: EnvFile) -> Self {
        self.env = env;
        self
    }

    pub fn with_timestamp(mut self, on: bool) -> Self {
        self.show_timestamp = on;
        self
    }

    pub fn with_events(mut self, url: Url, sid: impl Into<String>) -> Self {
        self.events_url = Some(url);
        self.sid = sid.into();
        self
    }

    pub fn with_server_index(mut self, index: usize) -> Self {
        self.server_index = index;
        self
    }

    pub fn with_exec_timeout(mut self, seconds: u32) -> Self {
        self.exec_timeout = seconds;
        self
    }

    /// Index of the XDS server SDK requests address. Opaque to callers:
    /// only ever use it to build `servers/{index}/...` paths.
    pub fn server_index(&self) -> usize {
        self.server_index
    }

    /// Timeout forwarded to the agent with every exec request.
    pub fn exec_timeout(&self) -> u32 {
        self.exec_timeout
    }

    /// Agent and server versions. The first successful `GET /version` is
    /// cached for the lifetime of the context; a failure leaves the cache
    /// empty so the next call retries.
    pub async fn version(&self) -> Result<&XdsVersion> {
        self.version
            .get_or_try_init(|| async { self.api.get::<XdsVersion>("/version").await })
            .await
    }

    /// Id of the selected XDS server, empty when unknown.
    pub async fn server_id(&self) -> String {
        match self.version().await {
            Ok(ver) => ver
                .servers
                .get(self.server_index)
                .map(|s| s.id.clone())
                .unwrap_or_default(),
            Err(e) => {
                tracing::debug!(error = %format!("{e:#}"), "server id unavailable");
                String::new()
            }
        }
    }
}

/* ---- Runtime ---- */

/// Tokio runtime for the synchronous command entry points.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().ctx("Failed to create Tokio runtime")
}

/* ---- Argument / Logging Helpers ---- */

/// Id from `--id`, else the first positional argument, else empty.
pub fn resolve_id(flag: Option<&str>, positional: Option<&str>) -> String {
    match (flag, positional) {
        (Some(id), _) if !id.is_empty() => id.to_string(),
        (_, Some(arg)) if !arg.is_empty() => arg.to_string(),
        _ => String::new(),
    }
}

/// Log an outgoing POST body. Serialization failure logs an empty body.
pub fn log_post<T: Serialize + ?Sized>(what: &str, data: &T) {
    let body = serde_json::to_string(data).unwrap_or_default();
    tracing::info!("{what} {body}");
}

/* ---- Test Support ---- */


/* ---- Tests ---- */
#[cfg(test)]
mod tests {
    use super::fake::FakeAgent;
    use super::*;
    use serde_json::json;

    fn version_body() -> serde_json::Value {
        json!({
            "client": {"id": "agent-1", "version": "1.0.0"},
            "servers": [{"id": "srv-a", "version": "1.0.0"}]
        })
    }

    #[tokio::test]
    async fn version_fetched_once() {
        let fake = Arc::new(FakeAgent::new().respond("/version", version_body()));
        let ctx = AppContext::new(fake.clone());

        let first = ctx.version().await.unwrap().client.id.clone();
        let second = ctx.version().await.unwrap().client.id.clone();
        assert_eq!(first, "agent-1");
        assert_eq!(second, "agent-1");
        assert_eq!(fake.count_of("GET /version"), 1);
    }

    #[tokio::test]
    async fn failed_version_is_not_cached() {
        let fake = Arc::new(
            FakeAgent::new()
                .respond("/version", version_body())
                .fail("GET /version"),
        );
        let ctx = AppContext::new(fake.clone());

        assert!(ctx.version().await.is_err());
        fake.heal("GET /version");
        assert!(ctx.version().await.is_ok());
        assert!(ctx.version().await.is_ok());
        assert_eq!(fake.count_of("GET /version"), 2);
    }

    #[tokio::test]
    async fn server_id_uses_index() {
        let fake = Arc::new(FakeAgent::new().respond("/version", version_body()));
        let ctx = AppContext::new(fake.clone());
        assert_eq!(ctx.server_id().await, "srv-a");

        let ctx = AppContext::new(fake).with_server_index(3);
        assert_eq!(ctx.server_id().await, "");
    }

    #[tokio::test]
    async fn server_id_empty_when_agent_unreachable() {
        let fake = Arc::new(FakeAgent::new());
        let ctx = AppContext::new(fake);
        assert_eq!(ctx.server_id().await, "");
    }

    #[test]
    fn resolve_id_prefers_flag() {
        assert_eq!(resolve_id(Some("a"), Some("b")), "a");
        assert_eq!(resolve_id(None, Some("b")), "b");
        assert_eq!(resolve_id(Some(""), Some("b")), "b");
        assert_eq!(resolve_id(None, None), "");
    }

    #[test]
    fn defaults_are_configurable() {
        let ctx = AppContext::new(Arc::new(FakeAgent::new()));
        assert_eq!(ctx.server_index(), 0);
        assert_eq!(ctx.exec_timeout(), 60);
        let ctx = ctx.with_server_index(1).with_exec_timeout(5);
        assert_eq!(ctx.server_index(), 1);
        assert_eq!(ctx.exec_timeout(), 5);
    }
}
