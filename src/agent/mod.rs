//! Agent endpoint parsing and transports.
//!
//! parse_agent_url -> AgentUrl { api base (http/https), events endpoint (ws/wss) }
//! Submodules: http (REST calls), events (push channel), types (wire structs).
//!
use anyhow::{Context, Result, bail};
use std::fmt;
use url::Url;

pub mod events;
pub mod http;
pub mod types;

pub use events::{EventChannel, EventHub};
pub use http::{AgentApi, AgentApiExt, HttpClient};

/// API prefix appended to every agent URL.
const API_PREFIX: &str = "api/v1/";

/// A parsed agent location.
///
/// Keeps the original input for diagnostics and derives both the REST
/// base URL and the event channel URL from it.
#[derive(Debug, Clone)]
pub struct AgentUrl {
    original: String,
    base: Url,
}

impl AgentUrl {
    /// Returns the original user-supplied form.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// REST base, always ending with `/api/v1/`.
    pub fn api_base(&self) -> Result<Url> {
        self.base
            .join(API_PREFIX)
            .context("failed to build agent API base URL")
    }

    /// Event channel endpoint for the given session id.
    pub fn events_url(&self, sid: &str) -> Result<Url> {
        let mut url = self.api_base()?.join("events/ws")?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow::anyhow!("cannot switch '{}' to {scheme}", self.original))?;
        url.query_pairs_mut().append_pair("sid", sid);
        Ok(url)
    }
}

impl fmt::Display for AgentUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)
    }
}

/// Parse an `--url` value into an `AgentUrl`.
///
/// Accepts full URLs (`http://host:8800`) as well as bare `host:port`
/// forms, which get an `http://` scheme.
///
/// Examples:
/// - "localhost:8800" -> http://localhost:8800/
/// - "https://agent.example/" -> https://agent.example/
pub fn parse_agent_url(raw: &str) -> Result<AgentUrl> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Agent URL is empty");
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if trimmed.contains("://") {
        bail!("Unsupported agent URL scheme: '{trimmed}' (use http or https)");
    } else {
        format!("http://{trimmed}")
    };

    let mut base =
        Url::parse(&with_scheme).with_context(|| format!("Invalid agent URL: '{trimmed}'"))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    Ok(AgentUrl {
        original: raw.to_string(),
        base,
    })
}
