//! Preflight validation checks for early failure detection
//!
//! Commands call these before making requests so that a missing key or a
//! mistyped URL fails with a clear message instead of an HTTP error.

use anyhow::{bail, Context, Result};
use url::Url;

use crate::llm::ApiSettings;

/// Summary of the settings a command is about to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettingsInfo {
    /// Base URL requests will go to
    pub base_url: String,
    /// Whether the aggregator headers will be sent
    pub aggregator: bool,
}

/// Validate that a base URL is an absolute http(s) URL
pub fn check_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url.trim())
        .with_context(|| format!("Invalid base URL: {base_url}"))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("Invalid base URL: unsupported scheme '{other}' (expected http or https)"),
    }
}

/// Validate API settings before processing
///
/// Checks that a key is configured and the base URL is usable. The client
/// still performs its own key check on every call.
pub fn check_api_settings(settings: &ApiSettings) -> Result<ApiSettingsInfo> {
    if settings.require_api_key().is_err() {
        bail!(
            "No API key configured.\n\
             Run 'ai-slop settings save --base-url <url> --api-key <key>' \
             or set AI_SLOP_API_KEY and run 'ai-slop settings save'."
        );
    }

    let base_url = settings.resolved_base_url().to_string();
    check_base_url(&base_url)?;

    Ok(ApiSettingsInfo {
        base_url,
        aggregator: settings.is_aggregator(),
    })
}
