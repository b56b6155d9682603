//! Database location, connection and migrations.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::time::Duration;

const MAX_CONNECT_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Resolve the database URL: `DATABASE_URL` when set, otherwise a SQLite
/// file under the platform data directory.
pub fn database_url() -> Result<String> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return Ok(url);
    }

    let dir = dirs::data_dir()
        .context("Could not determine platform data directory")?
        .join("refdata-cli");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

    Ok(format!("sqlite://{}?mode=rwc", dir.join("refdata.db").display()))
}

/// Open the connection pool, retrying with capped exponential backoff.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1;

    loop {
        match SqlitePool::connect(url).await {
            Ok(pool) => {
                log::debug!("Connected to database at {}", url);
                return Ok(pool);
            }
            Err(err) if attempt < MAX_CONNECT_ATTEMPTS => {
                log::warn!(
                    "Database connection attempt {}/{} failed: {}; retrying in {:?}",
                    attempt,
                    MAX_CONNECT_ATTEMPTS,
                    err,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                attempt += 1;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to connect to database at {}", url));
            }
        }
    }
}

/// Apply pending schema migrations.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")
}
