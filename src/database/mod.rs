use crate::errors::{DbError, DbResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

// Embed migration SQL files at compile time so deployments carry their schema.
const MIGRATION_CORE_SCHEMA: &str = include_str!("../../migrations/20250601000000_core_schema.sql");

const MIGRATIONS: &[(&str, &str)] = &[
    ("20250601000000_core_schema.sql", MIGRATION_CORE_SCHEMA),
];

/// Open a connection pool against the given SQLite URL, creating the file if needed.
pub async fn connect(database_url: &str) -> DbResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(DbError::Sqlx)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(DbError::Sqlx)
}

/// Apply any migrations that have not been recorded yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    create_migrations_table(pool).await?;
    let last_migration = get_last_migration(pool).await?;
    apply_pending_migrations(pool, last_migration).await
}

async fn create_migrations_table(pool: &SqlitePool) -> DbResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| DbError::Migration(format!("Failed to create migrations table: {}", e)))?;

    Ok(())
}

async fn get_last_migration(pool: &SqlitePool) -> DbResult<Option<String>> {
    sqlx::query_scalar::<_, String>("SELECT name FROM migrations ORDER BY id DESC LIMIT 1")
        .fetch_optional(pool)
        .await
        .map_err(|e| DbError::Migration(format!("Failed to read last migration: {}", e)))
}

async fn apply_pending_migrations(pool: &SqlitePool, last_migration: Option<String>) -> DbResult<()> {
    let pending: Vec<_> = match &last_migration {
        None => MIGRATIONS.iter().collect(),
        Some(last) => MIGRATIONS.iter().skip_while(|(name, _)| *name != last.as_str()).skip(1).collect(),
    };

    if pending.is_empty() {
        log::debug!("No pending migrations to apply");
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| DbError::Transaction(format!("Failed to begin migration transaction: {}", e)))?;

    for &(migration_name, migration_sql) in pending {
        log::info!("Applying migration: {}", migration_name);

        sqlx::raw_sql(migration_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(format!("Failed to apply migration {}: {}", migration_name, e)))?;

        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO migrations (name, applied_at) VALUES (?, ?)")
            .bind(migration_name)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(format!("Failed to record migration {}: {}", migration_name, e)))?;
    }

    tx.commit()
        .await
        .map_err(|e| DbError::Transaction(format!("Failed to commit migrations: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/test.db", dir.path().display());
        let pool = connect(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }
}
