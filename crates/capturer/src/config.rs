//! Capture configuration with environment variable and file-based loading.
//!
//! Environment variables:
//! - `CAPTURER_SINKS`: Comma-separated sink names (`stdout`, `stderr`)
//! - `CAPTURER_STDLOG`: Set to "true" to also capture the default logger

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Which sinks a [`Capturer`](crate::Capturer) built from config redirects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Sink names. Unknown names panic when the capturer is built.
    #[serde(default)]
    pub sinks: Vec<String>,

    /// Redirect the default logger as well.
    #[serde(default)]
    pub stdlog: bool,
}

impl CaptureConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let sinks = env::var("CAPTURER_SINKS")
            .map(|v| parse_sink_list(&v))
            .unwrap_or_default();

        let stdlog = env::var("CAPTURER_STDLOG")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        Ok(Self { sinks, stdlog })
    }

    /// Load configuration from a TOML file, falling back to environment.
    ///
    /// The file should contain a `[capture]` section:
    /// ```toml
    /// [capture]
    /// sinks = ["stdout", "stderr"]
    /// stdlog = true
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let table: toml::Table = contents
            .parse()
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;

        match table.get("capture") {
            Some(section) => section
                .clone()
                .try_into::<CaptureConfig>()
                .context("failed to parse [capture] section"),
            None => Self::from_env(),
        }
    }

    /// Capture only the given sink names.
    pub fn with_sinks<I, S>(sinks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sinks: sinks.into_iter().map(Into::into).collect(),
            stdlog: false,
        }
    }
}

fn parse_sink_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
