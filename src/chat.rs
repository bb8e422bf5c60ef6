//! Azure OpenAI chat completion client.
//!
//! A single non-streaming call per answer. Unlike the embedding path there
//! is no retry loop here: a failed completion surfaces immediately and the
//! caller decides whether to re-ask.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::{AzureConfig, ChatConfig};

/// Send a system + user message pair and return the assistant's reply text.
pub async fn complete(
    azure: &AzureConfig,
    config: &ChatConfig,
    system: &str,
    user: &str,
) -> Result<String> {
    let api_key = azure.api_key()?;
    let url = format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        azure.endpoint()?,
        azure.chat_deployment()?,
        azure.api_version
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user }
        ],
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
    });

    let response = client
        .post(&url)
        .header("api-key", &api_key)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Chat API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json().await?;
    extract_reply(&json)
}

/// Pull `choices[0].message.content` out of a chat completion response.
fn extract_reply(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_extracted() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Diebstahl regelt § 242 StGB." } }
            ]
        });
        assert_eq!(
            extract_reply(&json).unwrap(),
            "Diebstahl regelt § 242 StGB."
        );
    }

    #[test]
    fn empty_choices_is_error() {
        let json = serde_json::json!({ "choices": [] });
        assert!(extract_reply(&json).is_err());
    }

    #[test]
    fn missing_content_is_error() {
        let json = serde_json::json!({ "choices": [{ "message": { "role": "assistant" } }] });
        assert!(extract_reply(&json).is_err());
    }
}
