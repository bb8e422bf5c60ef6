use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::str::FromStr;

use crate::config::Config;

pub async fn connect(config: &Config) -> Result<PgPool> {
    let options = match &config.db.url {
        Some(url) => PgConnectOptions::from_str(url)
            .with_context(|| "Invalid db.url connection string")?,
        None => options_from_env()?,
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| "Failed to connect to Postgres")?;

    Ok(pool)
}

/// Build connection options from the conventional PG* environment variables.
/// SSL defaults to `require` since the store is usually a managed instance.
fn options_from_env() -> Result<PgConnectOptions> {
    let host = std::env::var("PGHOST")
        .map_err(|_| anyhow::anyhow!("Set db.url in config or the PGHOST environment variable"))?;
    let port: u16 = std::env::var("PGPORT")
        .unwrap_or_else(|_| "5432".to_string())
        .parse()
        .with_context(|| "PGPORT must be a port number")?;
    let dbname = std::env::var("PGDATABASE")
        .map_err(|_| anyhow::anyhow!("PGDATABASE environment variable not set"))?;
    let user = std::env::var("PGUSER")
        .map_err(|_| anyhow::anyhow!("PGUSER environment variable not set"))?;

    let ssl_mode = match std::env::var("PGSSLMODE").as_deref() {
        Ok("disable") => PgSslMode::Disable,
        Ok("prefer") => PgSslMode::Prefer,
        Ok("allow") => PgSslMode::Allow,
        Ok("verify-ca") => PgSslMode::VerifyCa,
        Ok("verify-full") => PgSslMode::VerifyFull,
        _ => PgSslMode::Require,
    };

    let mut options = PgConnectOptions::new()
        .host(&host)
        .port(port)
        .database(&dbname)
        .username(&user)
        .ssl_mode(ssl_mode);

    if let Ok(password) = std::env::var("PGPASSWORD") {
        options = options.password(&password);
    }

    Ok(options)
}
