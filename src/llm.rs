use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use tracing::debug;

/// Text-generation capability used by the router and the extractors.
///
/// Implementations must sample deterministically (temperature 0) so the same
/// question routes and extracts the same way every time.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system_instruction: &str, user_text: &str) -> Result<String>;
}

/// OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Ok(Self::new(
            config.require_api_key()?.to_string(),
            config.model.clone(),
            config.base_url.clone(),
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, system_instruction: &str, user_text: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_instruction},
                {"role": "user", "content": user_text}
            ],
            "temperature": 0
        });

        debug!("Calling {} with model {}", self.base_url, self.model);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::Llm(format!("Failed to read LLM response: {}", e)))?;

        completion_content(status, &body)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions reply.
/// The status is checked before the body is treated as JSON.
fn completion_content(status: reqwest::StatusCode, body: &str) -> Result<String> {
    if !status.is_success() {
        return Err(AgentError::Llm(format!("LLM API returned {}: {}", status, body.trim())));
    }

    let response_json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| AgentError::Llm(format!("Failed to parse LLM response: {}", e)))?;

    response_json["choices"][0]["message"]["content"]
        .as_str()
        .map(|content| content.to_string())
        .ok_or_else(|| AgentError::Llm("No content in LLM response".to_string()))
}

/// Strip whitespace and Markdown code fences the model sometimes wraps JSON in.
pub fn clean_json_response(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_content() {
        let body = r#"{"choices": [{"message": {"content": "trend"}}]}"#;
        assert_eq!(completion_content(reqwest::StatusCode::OK, body).unwrap(), "trend");

        let err = completion_content(reqwest::StatusCode::OK, r#"{"choices": []}"#).unwrap_err();
        assert_eq!(err.to_string(), "LLM error: No content in LLM response");
    }

    #[test]
    fn test_error_status_keeps_raw_body() {
        let page = "<html><body>502 Bad Gateway</body></html>";
        let err = completion_content(reqwest::StatusCode::BAD_GATEWAY, page).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("502"));
        assert!(message.contains("<html>"));
        assert!(!message.contains("Failed to parse"));
    }

    #[test]
    fn test_clean_json_response() {
        assert_eq!(clean_json_response("  {\"a\":1}\n"), "{\"a\":1}");
        assert_eq!(clean_json_response("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(clean_json_response("```\n{}\n```"), "{}");
        assert_eq!(clean_json_response("not json"), "not json");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = LlmClient::new("k".into(), "m".into(), "http://localhost:8080/v1/".into());
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert_eq!(client.model(), "m");
    }
}
