//! Azure OpenAI embedding client and vector utilities.
//!
//! Calls `POST {endpoint}/openai/deployments/{deployment}/embeddings` with
//! batched inputs and an exponential-backoff retry loop:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - `max_retries` is the total attempt count per batch
//! - Backoff before each retry: 2s, 4s, 8s, ... capped at 32s
//!
//! Also provides the pgvector helpers:
//! - [`vector_literal`] — encode a `&[f32]` as a pgvector text literal
//! - [`cosine_similarity`] — similarity between two embedding vectors

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::{AzureConfig, EmbeddingConfig};

/// Embed a batch of texts, preserving input order.
///
/// The response `data` array is sorted by `index` before the vectors are
/// extracted, so the i-th output always corresponds to the i-th input.
pub async fn embed_texts(
    azure: &AzureConfig,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let api_key = azure.api_key()?;
    let url = format!(
        "{}/openai/deployments/{}/embeddings?api-version={}",
        azure.endpoint()?,
        azure.embed_deployment()?,
        azure.api_version
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({ "input": texts });

    let mut last_err = None;

    for attempt in 1..=config.max_retries {
        if attempt > 1 {
            // Exponential backoff: 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1u64 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(&url)
            .header("api-key", &api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    let vectors = parse_embedding_response(&json)?;
                    if vectors.len() != texts.len() {
                        bail!(
                            "Embedding count mismatch: sent {} texts, got {} vectors",
                            texts.len(),
                            vectors.len()
                        );
                    }
                    return Ok(vectors);
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    if attempt < config.max_retries {
                        eprintln!(
                            "Warning: embeddings HTTP {} (attempt {}/{}), retrying",
                            status, attempt, config.max_retries
                        );
                    }
                    last_err = Some(anyhow::anyhow!(
                        "Embeddings API error {}: {}",
                        status,
                        truncate(&body_text, 500)
                    ));
                    continue;
                }

                // Client error (not 429) — don't retry
                let body_text = response.text().await.unwrap_or_default();
                bail!(
                    "Embeddings API error {}: {}",
                    status,
                    truncate(&body_text, 500)
                );
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
}

/// Embed a single query text.
pub async fn embed_query(
    azure: &AzureConfig,
    config: &EmbeddingConfig,
    text: &str,
) -> Result<Vec<f32>> {
    let results = embed_texts(azure, config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Parse the embeddings API response, restoring input order via `data[].index`.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing data array"))?;

    let mut indexed: Vec<(i64, Vec<f32>)> = Vec::with_capacity(data.len());

    for item in data {
        let index = item
            .get("index")
            .and_then(|i| i.as_i64())
            .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing index"))?;
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Encode a float vector as a pgvector text literal: `[x1,x2,...]` with
/// seven decimal places, suitable for binding with a `::vector` cast.
pub fn vector_literal(vec: &[f32]) -> String {
    let mut out = String::with_capacity(vec.len() * 11 + 2);
    out.push('[');
    for (i, v) in vec.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!("{:.7}", v));
    }
    out.push(']');
    out
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Minimal HTTP listener that answers every request with a fixed status
    /// and counts how many requests it saw.
    fn spawn_stub(status_line: &'static str, hits: Arc<AtomicUsize>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(s) => s,
                    Err(_) => break,
                };
                let mut buf = [0u8; 8192];
                let _ = stream.read(&mut buf);
                hits.fetch_add(1, Ordering::SeqCst);
                let resp = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{{}}",
                    status_line
                );
                let _ = stream.write_all(resp.as_bytes());
            }
        });
        format!("http://{}", addr)
    }

    fn azure_for(url: String) -> AzureConfig {
        std::env::set_var("AZURE_OPENAI_API_KEY", "test-key");
        AzureConfig {
            endpoint: Some(url),
            embed_deployment: Some("embed".to_string()),
            chat_deployment: None,
            api_version: "2024-05-01-preview".to_string(),
        }
    }

    fn embed_config(max_retries: u32) -> EmbeddingConfig {
        EmbeddingConfig {
            dims: 3,
            batch_size: 4,
            max_retries,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn server_errors_retried_up_to_max_attempts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_stub("500 Internal Server Error", hits.clone());
        let azure = azure_for(url);

        let err = embed_texts(&azure, &embed_config(2), &["text".to_string()])
            .await
            .unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(err.to_string().contains("500"), "err: {}", err);
    }

    #[tokio::test]
    async fn rate_limiting_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_stub("429 Too Many Requests", hits.clone());
        let azure = azure_for(url);

        let err = embed_texts(&azure, &embed_config(2), &["text".to_string()])
            .await
            .unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(err.to_string().contains("429"), "err: {}", err);
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_stub("400 Bad Request", hits.clone());
        let azure = azure_for(url);

        let err = embed_texts(&azure, &embed_config(3), &["text".to_string()])
            .await
            .unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(err.to_string().contains("400"), "err: {}", err);
    }

    #[test]
    fn response_reordered_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] },
                { "index": 2, "embedding": [0.5, 0.5] }
            ]
        });
        let vecs = parse_embedding_response(&json).unwrap();
        assert_eq!(vecs[0], vec![1.0, 0.0]);
        assert_eq!(vecs[1], vec![0.0, 1.0]);
        assert_eq!(vecs[2], vec![0.5, 0.5]);
    }

    #[test]
    fn response_missing_data_is_error() {
        let json = serde_json::json!({ "object": "list" });
        assert!(parse_embedding_response(&json).is_err());
    }

    #[test]
    fn response_missing_index_is_error() {
        let json = serde_json::json!({ "data": [{ "embedding": [1.0] }] });
        assert!(parse_embedding_response(&json).is_err());
    }

    #[test]
    fn vector_literal_format() {
        let lit = vector_literal(&[1.0, -0.5, 0.125]);
        assert_eq!(lit, "[1.0000000,-0.5000000,0.1250000]");
    }

    #[test]
    fn vector_literal_empty() {
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
