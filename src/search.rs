//! Semantic retrieval over the pgvector store.
//!
//! Embeds the query and lets the database order chunks by cosine distance.
//! The similarity reported to callers is `1 - distance`, so higher is
//! better and identical vectors score 1.0.

use anyhow::{bail, Result};
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, vector_literal};
use crate::models::RetrievedSection;

/// Retrieve the top-k sections nearest to `query` for one law.
pub async fn retrieve(
    config: &Config,
    query: &str,
    k: i64,
    law: &str,
) -> Result<Vec<RetrievedSection>> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    if k < 1 {
        bail!("k must be >= 1");
    }

    let query_vec = embedding::embed_query(&config.azure, &config.embedding, query).await?;
    let qvec = vector_literal(&query_vec);

    let pool = db::connect(config).await?;

    let rows = sqlx::query(
        r#"
        SELECT c.section_number, c.section_title, c.full_text,
               1 - (c.embedding <=> $1::vector) AS similarity
        FROM legal.chunks c
        JOIN legal.documents d ON d.id = c.document_id
        WHERE d.law_abbr = $2 AND c.embedding IS NOT NULL
        ORDER BY c.embedding <=> $1::vector
        LIMIT $3
        "#,
    )
    .bind(&qvec)
    .bind(law)
    .bind(k)
    .fetch_all(&pool)
    .await?;

    pool.close().await;

    let results = rows
        .iter()
        .map(|row| RetrievedSection {
            section_number: row.get("section_number"),
            section_title: row.get("section_title"),
            full_text: row.get("full_text"),
            similarity: row.get("similarity"),
        })
        .collect();

    Ok(results)
}

/// CLI entry point: retrieve and print ranked sections.
pub async fn run_search(config: &Config, query: &str, k: Option<i64>, law: Option<String>) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.top_k);
    let law = law.unwrap_or_else(|| config.retrieval.law.clone());

    let results = retrieve(config, query, k, &law).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("Query: {}", query);
    println!("Top {} results ({}):", results.len(), law);
    for (i, r) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] § {} {}",
            i + 1,
            r.similarity,
            r.section_number,
            r.section_title
        );
    }

    Ok(())
}
