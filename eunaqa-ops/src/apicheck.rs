//! External API connectivity checks
//!
//! Probes the third-party LLM endpoint used by the diagnostic process so
//! an operator can distinguish credential problems from network problems
//! before launching a sweep. Failures are surfaced verbatim with a
//! remediation hint.

use std::time::Duration;

use tracing::info;

use eunaqa_common::{Error, Result};

/// Environment variable holding the LLM API key
pub const LLM_API_KEY_ENV: &str = "EUNAQA_LLM_API_KEY";

/// Default LLM API base URL when neither CLI nor config names one
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";

pub async fn check_llm_api(base_url: &str) -> Result<()> {
    let api_key = std::env::var(LLM_API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| Error::External(format!("HTTP client construction failed: {}", e)))?;

    let url = format!("{}/models", base_url.trim_end_matches('/'));
    info!("Probing LLM API at {}", url);

    let mut request = client.get(&url);
    if let Some(key) = &api_key {
        request = request.bearer_auth(key);
    }

    let response = request.send().await.map_err(|e| {
        Error::External(format!(
            "LLM API unreachable at {}: {}\n\
             Check network connectivity and the base URL (--llm-base-url or config llm_base_url).",
            url, e
        ))
    })?;

    let status = response.status();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        let detail = response.text().await.unwrap_or_default();
        return Err(Error::External(format!(
            "LLM API rejected credentials ({}): {}\n\
             Set a valid API key via the {} environment variable.",
            status, detail.trim(), LLM_API_KEY_ENV
        )));
    }
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(Error::External(format!(
            "LLM API returned {}: {}",
            status,
            detail.trim()
        )));
    }

    info!("✓ LLM API reachable and credentials accepted");
    Ok(())
}
