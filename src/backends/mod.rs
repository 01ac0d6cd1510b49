// Model backends
// Blocking HTTP clients for the hosted (OpenAI-compatible) and local (Ollama)
// model servers, used for both embeddings and chat completions.

pub mod ollama;
pub mod openai;


use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
/// Requests are attempted once unless a caller opts into retries
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 1;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Shared transport: base URL, agent and retry policy
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    base_url: Url,
    agent: ureq::Agent,
    retry_attempts: u32,
    bearer_token: Option<String>,
}

impl HttpTransport {
    pub(crate) fn new(mut base_url: Url, timeout: Duration) -> Self {
        // Url::join replaces the last path segment unless the base ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            base_url,
            agent: build_agent(timeout),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            bearer_token: None,
        }
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.agent = build_agent(timeout);
    }

    pub(crate) fn set_retry_attempts(&mut self, attempts: u32) {
        self.retry_attempts = attempts.max(1);
    }

    pub(crate) fn set_bearer_token(&mut self, token: Option<String>) {
        self.bearer_token = token;
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))
    }

    pub(crate) fn get(&self, path: &str) -> Result<String> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);

        self.make_request_with_retry(|| {
            let mut request = self.agent.get(url.as_str());
            if let Some(token) = &self.bearer_token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request.call().and_then(read_response)
        })
    }

    pub(crate) fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<String> {
        let url = self.endpoint(path)?;
        let request_json = serde_json::to_string(body).context("Failed to serialize request")?;
        debug!("POST {} ({} bytes)", url, request_json.len());

        self.make_request_with_retry(|| {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            if let Some(token) = &self.bearer_token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request.send(&request_json).and_then(read_response)
        })
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<(u16, String), ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok((status, response_text)) if status < 400 => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Ok((status, response_text)) => {
                    let detail = error_detail(&response_text);
                    if status < 500 {
                        warn!("Client error (status {}), not retrying", status);
                        return Err(anyhow::anyhow!("Client error: HTTP {}: {}", status, detail));
                    }

                    warn!(
                        "Server error (status {}), attempt {}/{}",
                        status, attempt, self.retry_attempts
                    );
                    last_error = Some(anyhow::anyhow!("Server error: HTTP {}: {}", status, detail));
                }
                Err(error) => {
                    match &error {
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                        }
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));
                }
            }

            if attempt < self.retry_attempts {
                let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                let delay = Duration::from_millis(delay_ms);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    // Error statuses are read like any other response so their body can be reported
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

fn read_response(
    mut response: ureq::http::Response<ureq::Body>,
) -> Result<(u16, String), ureq::Error> {
    let status = response.status().as_u16();
    let text = response.body_mut().read_to_string()?;
    Ok((status, text))
}

/// Pull a readable message out of an error body.
///
/// OpenAI nests it under `error.message`, Ollama returns `error` as a string.
fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &value["error"];
        if let Some(message) = error["message"].as_str().or_else(|| error.as_str()) {
            return message.to_string();
        }
    }

    match body.trim() {
        "" => "empty response body".to_string(),
        text => text.to_string(),
    }
}

/// Check that a batch response has one vector per input
pub(crate) fn ensure_batch_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(anyhow::anyhow!(
            "Mismatch between request and response counts: {} vs {}",
            expected,
            actual
        ));
    }
    Ok(())
}
