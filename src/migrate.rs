use anyhow::Result;

use crate::config::Config;
use crate::db;

/// Create the pgvector extension, the `legal` schema, the tables, and the
/// ANN index. Idempotent; safe to re-run.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(&pool)
        .await?;

    sqlx::query("CREATE SCHEMA IF NOT EXISTS legal")
        .execute(&pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS legal.documents (
            id BIGSERIAL PRIMARY KEY,
            law_abbr TEXT NOT NULL,
            source_uri TEXT,
            lang TEXT NOT NULL DEFAULT 'de',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (law_abbr, source_uri)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // The vector column width is fixed by the embedding model, so dims is
    // baked into the DDL from config.
    let create_chunks = format!(
        r#"
        CREATE TABLE IF NOT EXISTS legal.chunks (
            id BIGSERIAL PRIMARY KEY,
            document_id BIGINT NOT NULL REFERENCES legal.documents(id),
            section_number TEXT NOT NULL,
            section_title TEXT NOT NULL DEFAULT '',
            full_text TEXT NOT NULL,
            embedding vector({}),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (document_id, section_number)
        )
        "#,
        config.embedding.dims
    );
    sqlx::query(&create_chunks).execute(&pool).await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON legal.chunks(document_id)")
        .execute(&pool)
        .await?;

    // Approximate nearest-neighbor index; exact scans still work without it.
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_chunks_embedding
        ON legal.chunks USING ivfflat (embedding vector_cosine_ops)
        WITH (lists = 100)
        "#,
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
