//! Batch embedding of parsed sections.
//!
//! Reads section NDJSON, attaches an `embedding` field to every record via
//! the remote embedding API, and writes the result as NDJSON. Supports
//! resuming from a partially embedded output file: already-embedded records
//! (keyed by law + section number) are carried over without new API calls,
//! and the output file is rewritten whole at the end.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::Path;

use crate::config::Config;
use crate::embedding;
use crate::models::{EmbeddedSection, Section};
use crate::ndjson;
use crate::progress::{ProgressEvent, ProgressReporter};

pub async fn run_embed(
    config: &Config,
    input: &Path,
    output: &Path,
    resume: bool,
    limit: Option<usize>,
    batch_size_override: Option<usize>,
    dry_run: bool,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);
    if batch_size == 0 {
        bail!("batch size must be > 0");
    }

    progress.report(ProgressEvent::Loading {
        stage: "embed".to_string(),
    });

    let mut rows: Vec<Section> = ndjson::load(input)?;
    if let Some(lim) = limit {
        rows.truncate(lim);
    }

    // Resume: index already-embedded records from a previous partial run.
    let mut done: HashMap<String, EmbeddedSection> = HashMap::new();
    if resume && output.exists() {
        let existing: Vec<EmbeddedSection> = ndjson::load(output)?;
        for rec in existing {
            done.insert(rec.key(), rec);
        }
    }

    let todo_count = rows
        .iter()
        .filter(|r| !done.contains_key(&crate::models::section_key(&r.law_abbr, &r.section_number)))
        .count();

    if dry_run {
        println!("embed (dry-run)");
        println!("  sections in input: {}", rows.len());
        println!("  already embedded:  {}", rows.len() - todo_count);
        println!("  to embed:          {}", todo_count);
        return Ok(());
    }

    let total = rows.len() as u64;
    let mut out_rows: Vec<EmbeddedSection> = Vec::with_capacity(rows.len());
    let mut embedded = 0u64;
    let mut reused = 0u64;
    let mut reported_dims: Option<usize> = None;

    for batch in rows.chunks(batch_size) {
        let mut todo: Vec<&Section> = Vec::new();
        for section in batch {
            let key = crate::models::section_key(&section.law_abbr, &section.section_number);
            if let Some(existing) = done.get(&key) {
                out_rows.push(existing.clone());
                reused += 1;
            } else {
                todo.push(section);
            }
        }

        if !todo.is_empty() {
            let texts: Vec<String> = todo.iter().map(|s| s.full_text.clone()).collect();
            let vectors = embedding::embed_texts(&config.azure, &config.embedding, &texts).await?;

            if reported_dims.is_none() {
                if let Some(first) = vectors.first() {
                    if first.len() != config.embedding.dims {
                        bail!(
                            "Embedding dimensionality mismatch: API returned {}, config says {}",
                            first.len(),
                            config.embedding.dims
                        );
                    }
                    reported_dims = Some(first.len());
                }
            }

            for (section, vector) in todo.iter().zip(vectors.into_iter()) {
                out_rows.push(EmbeddedSection {
                    section: (*section).clone(),
                    embedding: vector,
                });
                embedded += 1;
            }
        }

        progress.report(ProgressEvent::Processing {
            stage: "embed".to_string(),
            n: embedded + reused,
            total,
        });
    }

    ndjson::save(output, &out_rows)?;

    println!("embed");
    println!("  sections in input: {}", rows.len());
    if resume {
        println!("  reused: {}", reused);
    }
    println!("  embedded: {}", embedded);
    if let Some(dims) = reported_dims {
        println!("  dims: {}", dims);
    }
    println!("  wrote: {}", output.display());
    println!("ok");

    Ok(())
}
