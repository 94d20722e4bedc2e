//! Configuration: env file loading and setting resolution.
//!
//! Precedence for every setting: command-line flag, process environment
//! (both handled by clap), then the `--config` env file, then the default.

use anyhow::{Context, Result, bail};
use std::path::Path;

pub const DEFAULT_AGENT_URL: &str = "localhost:8800";
pub const DEFAULT_SERVER_INDEX: usize = 0;
pub const DEFAULT_EXEC_TIMEOUT: u32 = 60;

pub const KEY_AGENT_URL: &str = "XDS_AGENT_URL";
pub const KEY_PROJECT_ID: &str = "XDS_PROJECT_ID";
pub const KEY_RPATH: &str = "XDS_RPATH";
pub const KEY_SDK_ID: &str = "XDS_SDK_ID";
pub const KEY_SERVER_INDEX: &str = "XDS_SERVER_INDEX";
pub const KEY_EXEC_TIMEOUT: &str = "XDS_EXEC_TIMEOUT";

/// Ordered `KEY=VALUE` entries read from an env file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    entries: Vec<(String, String)>,
}

impl EnvFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config file: {}", path.display()))
    }

    /// Parse `[export ]KEY=VALUE` lines. Blank lines and `#` comments are
    /// skipped; values are unquoted with shell rules. A repeated key
    /// replaces the earlier value in place.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut file = EnvFile::default();
        for (lineno, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").map_or(line, str::trim_start);
            let Some((key, value)) = line.split_once('=') else {
                bail!("line {}: expected KEY=VALUE", lineno + 1);
            };
            let key = key.trim();
            if key.is_empty() {
                bail!("line {}: empty key", lineno + 1);
            }
            let words = shell_words::split(value.trim())
                .with_context(|| format!("line {}: bad quoting", lineno + 1))?;
            file.set(key, words.join(" "));
        }
        Ok(file)
    }

    pub fn set(&mut self, key: &str, value: String) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries flattened to `KEY=VALUE` strings, file order.
    pub fn to_env_list(&self) -> Vec<String> {
        self.entries.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

/// Flag/env value when non-empty, else the env file entry.
pub fn resolve_string(cli: Option<&str>, file: &EnvFile, key: &str) -> Option<String> {
    cli.filter(|s| !s.trim().is_empty())
        .or_else(|| file.get(key).filter(|s| !s.trim().is_empty()))
        .map(str::to_string)
}

/// Numeric setting with the same precedence plus a default.
pub fn resolve_number<T>(cli: Option<T>, file: &EnvFile, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(v) = cli {
        return Ok(v);
    }
    match file.get(key).map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key} '{raw}': {e}")),
        None => Ok(default),
    }
}
