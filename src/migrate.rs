use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an already-connected pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Create questions table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            question TEXT NOT NULL,
            asked_by TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            responded_at INTEGER,
            response TEXT,
            generated INTEGER,
            rating INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_questions_created_at ON questions(created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
