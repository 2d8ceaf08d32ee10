use anyhow::Result;
use rust_embed::RustEmbed;
use sqlx::{migrate::MigrateDatabase, Pool, Sqlite, SqlitePool};

use crate::config::DatabaseConfig;

#[derive(RustEmbed)]
#[folder = "src/database/migrations"]
struct MigrationAssets;

/// Thin wrapper over a `sqlx` SQLite pool, shared (by `Clone`) between the
/// web server, the scheduler and the ticker.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        if !Sqlite::database_exists(&config.url).await.unwrap_or(false) {
            Sqlite::create_database(&config.url).await?;
        }

        let pool = SqlitePool::connect(&config.url).await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        self.run_embedded_migrations().await?;
        Ok(())
    }

    async fn run_embedded_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _schema_migrations (
                version TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let mut names: Vec<_> = MigrationAssets::iter().collect();
        names.sort();

        for name in names {
            let existing = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM _schema_migrations WHERE version = ?",
            )
            .bind(name.as_ref())
            .fetch_one(&self.pool)
            .await?;

            if existing > 0 {
                continue;
            }

            let asset = MigrationAssets::get(&name)
                .ok_or_else(|| anyhow::anyhow!("embedded migration {name} missing"))?;
            let sql = std::str::from_utf8(asset.data.as_ref())?;

            let mut transaction = self.pool.begin().await?;
            for statement in sql.split(';') {
                let statement = statement.trim();
                if statement.is_empty() {
                    continue;
                }
                sqlx::query(statement).execute(&mut *transaction).await?;
            }
            sqlx::query("INSERT INTO _schema_migrations (version) VALUES (?)")
                .bind(name.as_ref())
                .execute(&mut *transaction)
                .await?;
            transaction.commit().await?;

            tracing::info!("applied migration: {}", name);
        }

        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}
