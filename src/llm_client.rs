use crate::types::{ChatCompletion, ChatRequest};
use serde_json::Value;
use tokio::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";

#[derive(Clone)]
pub struct LlmClient {
    base_url: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// One non-streaming completion. The credential travels with the request
    /// and is never kept on the client.
    pub async fn chat_once(
        &self,
        api_key: &str,
        request: &ChatRequest<'_>,
    ) -> anyhow::Result<ChatCompletion> {
        let url = format!("{}/chat/completions", self.base_url);

        let resp = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let response_text = resp.text().await?;
        tracing::debug!(status = %status, body = %response_text, "API response");

        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "API request failed with status {}: {}",
                status,
                api_error_message(&response_text)
            ));
        }

        parse_completion(&response_text)
    }
}

/// Parse a `/chat/completions` body, rejecting error payloads and empty
/// choice lists.
pub fn parse_completion(body: &str) -> anyhow::Result<ChatCompletion> {
    let response_json: Value = serde_json::from_str(body)
        .map_err(|e| anyhow::anyhow!("Failed to parse JSON response: {}", e))?;

    if let Some(error) = response_json.get("error").filter(|e| !e.is_null()) {
        return Err(anyhow::anyhow!("API error: {}", describe_error(error)));
    }

    let completion: ChatCompletion = serde_json::from_value(response_json)
        .map_err(|e| anyhow::anyhow!("Malformed completion response: {}", e))?;

    if completion.choices.is_empty() {
        return Err(anyhow::anyhow!("No choices in response"));
    }
    Ok(completion)
}

// Providers disagree on the error envelope: OpenAI nests `error.message`,
// Mistral returns a flat `message` or a `detail`.
pub(crate) fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => {
            if let Some(error) = v.get("error").filter(|e| !e.is_null()) {
                describe_error(error)
            } else if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
                msg.to_string()
            } else if let Some(detail) = v.get("detail") {
                detail
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| detail.to_string())
            } else {
                v.to_string()
            }
        }
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

fn describe_error(error: &Value) -> String {
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| error.to_string())
}
