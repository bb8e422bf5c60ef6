//! Corpus statistics and health overview.
//!
//! Provides a quick summary of what's loaded: document counts, section
//! counts, embedding coverage, and a per-law breakdown. Used by
//! `lexrag stats` to give confidence that parse, embed, and load runs
//! landed where they should.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

struct LawStats {
    law_abbr: String,
    section_count: i64,
    embedded_count: i64,
    loaded_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM legal.documents")
        .fetch_one(&pool)
        .await?;

    let total_sections: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM legal.chunks")
        .fetch_one(&pool)
        .await?;

    let total_embedded: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM legal.chunks WHERE embedding IS NOT NULL")
            .fetch_one(&pool)
            .await?;

    println!("lexrag — Corpus Stats");
    println!("=====================");
    println!();
    println!("  Documents:  {}", total_docs);
    println!("  Sections:   {}", total_sections);
    println!(
        "  Embedded:   {} / {} ({}%)",
        total_embedded,
        total_sections,
        if total_sections > 0 {
            (total_embedded * 100) / total_sections
        } else {
            0
        }
    );

    let law_rows = sqlx::query(
        r#"
        SELECT
            d.law_abbr,
            COUNT(c.id) AS section_count,
            COUNT(c.embedding) AS embedded_count,
            MAX(c.created_at) AS loaded_at
        FROM legal.documents d
        LEFT JOIN legal.chunks c ON c.document_id = d.id
        GROUP BY d.law_abbr
        ORDER BY section_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let law_stats: Vec<LawStats> = law_rows
        .iter()
        .map(|row| LawStats {
            law_abbr: row.get("law_abbr"),
            section_count: row.get("section_count"),
            embedded_count: row.get("embedded_count"),
            loaded_at: row.get("loaded_at"),
        })
        .collect();

    if !law_stats.is_empty() {
        println!();
        println!("  By law:");
        println!(
            "  {:<12} {:>10} {:>10}   {}",
            "LAW", "SECTIONS", "EMBEDDED", "LAST LOAD"
        );
        println!("  {}", "-".repeat(56));

        for s in &law_stats {
            let loaded_display = match s.loaded_at {
                Some(ts) => format_ts_relative(ts.timestamp()),
                None => "never".to_string(),
            };
            println!(
                "  {:<12} {:>10} {:>10}   {}",
                s.law_abbr, s.section_count, s.embedded_count, loaded_display
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
