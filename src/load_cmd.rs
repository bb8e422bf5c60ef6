//! Bulk loading of embedded sections into Postgres.
//!
//! Ensures a `legal.documents` row per law, then inserts section chunks in
//! batches with a conflict-ignore constraint on (document_id,
//! section_number). Re-running the command resumes: sections already in the
//! store are skipped up front and the unique constraint catches the rest.

use anyhow::{bail, Result};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::embedding::vector_literal;
use crate::models::EmbeddedSection;
use crate::ndjson;
use crate::progress::{ProgressEvent, ProgressReporter};

const INSERT_BATCH: usize = 100;

pub async fn run_load(
    config: &Config,
    input: &Path,
    limit: Option<usize>,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    progress.report(ProgressEvent::Loading {
        stage: "load".to_string(),
    });

    let mut rows: Vec<EmbeddedSection> = ndjson::load(input)?;
    if let Some(lim) = limit {
        rows.truncate(lim);
    }

    if rows.is_empty() {
        println!("load");
        println!("  no sections in input");
        println!("ok");
        return Ok(());
    }

    for rec in &rows {
        if rec.embedding.len() != config.embedding.dims {
            bail!(
                "Section § {} has embedding of dim {}, expected {} — re-run embed with the right model",
                rec.section.section_number,
                rec.embedding.len(),
                config.embedding.dims
            );
        }
    }

    let pool = db::connect(config).await?;

    // One documents row per (law_abbr, source_uri, lang) present in the file.
    let mut doc_ids: HashMap<(String, String, String), i64> = HashMap::new();
    let mut existing: HashMap<i64, HashSet<String>> = HashMap::new();

    for rec in &rows {
        let key = (
            rec.section.law_abbr.clone(),
            rec.section.source_uri.clone(),
            rec.section.lang.clone(),
        );
        if !doc_ids.contains_key(&key) {
            let doc_id = ensure_document(&pool, &key.0, &key.1, &key.2).await?;
            let loaded = fetch_existing_sections(&pool, doc_id).await?;
            existing.insert(doc_id, loaded);
            doc_ids.insert(key, doc_id);
        }
    }

    let total = rows.len() as u64;
    let mut inserted = 0u64;
    let mut skipped = 0u64;

    for batch in rows.chunks(INSERT_BATCH) {
        let mut tx = pool.begin().await?;

        for rec in batch {
            let key = (
                rec.section.law_abbr.clone(),
                rec.section.source_uri.clone(),
                rec.section.lang.clone(),
            );
            let doc_id = doc_ids[&key];

            if existing
                .get(&doc_id)
                .map(|s| s.contains(&rec.section.section_number))
                .unwrap_or(false)
            {
                skipped += 1;
                continue;
            }

            let result = sqlx::query(
                r#"
                INSERT INTO legal.chunks
                    (document_id, section_number, section_title, full_text, embedding)
                VALUES ($1, $2, $3, $4, $5::vector)
                ON CONFLICT (document_id, section_number) DO NOTHING
                "#,
            )
            .bind(doc_id)
            .bind(&rec.section.section_number)
            .bind(&rec.section.section_title)
            .bind(&rec.section.full_text)
            .bind(vector_literal(&rec.embedding))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            } else {
                skipped += 1;
            }
        }

        tx.commit().await?;

        progress.report(ProgressEvent::Processing {
            stage: "load".to_string(),
            n: inserted + skipped,
            total,
        });
    }

    println!("load");
    println!("  sections in input: {}", rows.len());
    println!("  inserted: {}", inserted);
    println!("  skipped (already loaded): {}", skipped);
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Get-or-create the documents row for a law corpus.
async fn ensure_document(pool: &PgPool, law_abbr: &str, source_uri: &str, lang: &str) -> Result<i64> {
    let inserted: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO legal.documents (law_abbr, source_uri, lang)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING
        RETURNING id
        "#,
    )
    .bind(law_abbr)
    .bind(source_uri)
    .bind(lang)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = inserted {
        return Ok(id);
    }

    let id: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM legal.documents WHERE law_abbr = $1 AND COALESCE(source_uri, '') = $2",
    )
    .bind(law_abbr)
    .bind(source_uri)
    .fetch_optional(pool)
    .await?;

    id.ok_or_else(|| anyhow::anyhow!("Could not obtain document id for {}", law_abbr))
}

/// Section numbers already loaded for this document (resume support).
async fn fetch_existing_sections(pool: &PgPool, doc_id: i64) -> Result<HashSet<String>> {
    let numbers: Vec<String> =
        sqlx::query_scalar("SELECT section_number FROM legal.chunks WHERE document_id = $1")
            .bind(doc_id)
            .fetch_all(pool)
            .await?;

    Ok(numbers.into_iter().collect())
}
