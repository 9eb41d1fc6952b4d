//! SQLite connection setup
//!
//! Opens the pool that backs the definition store and brings its schema
//! up to date.

use crate::infrastructure::blueprint::SqliteDefinitionStore;
use crate::storage::migrations;
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const FILE_POOL_SIZE: u32 = 5;

/// Where and how to open the definition database
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub journal_mode: SqliteJournalMode,
}

impl DatabaseConfig {
    /// A database file, created along with its directory if missing
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: FILE_POOL_SIZE,
            journal_mode: SqliteJournalMode::Wal,
        }
    }

    /// A private in-memory database
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            // Each connection would get its own empty database.
            max_connections: 1,
            journal_mode: SqliteJournalMode::Memory,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

/// Migrated connection pool for blueprint definitions
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

impl Database {
    /// Open the database and apply pending migrations
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        let connection_str = if config.is_in_memory() {
            "sqlite::memory:".to_string()
        } else {
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory: {:?}", parent)
                    })?;
                }
            }
            format!("sqlite:{}?mode=rwc", config.path.display())
        };

        // Set per connection so every pooled connection enforces cascades.
        let connect_options = SqliteConnectOptions::from_str(&connection_str)?
            .journal_mode(config.journal_mode)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("Failed to connect to database: {:?}", config.path))?;

        migrations::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        Ok(Self {
            pool,
            path: config.path,
        })
    }

    pub async fn in_memory() -> Result<Self> {
        Self::new(DatabaseConfig::in_memory()).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Definition store backed by this database
    pub fn definition_store(&self) -> SqliteDefinitionStore {
        SqliteDefinitionStore::new(self.pool.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blueprint::{
        BlueprintMeta, BlueprintVersion, DefinitionStore, EntityKind, EntityTypeDef,
        FieldDataType, FieldDef,
    };

    #[tokio::test]
    async fn test_open_applies_migrations() {
        let db = Database::in_memory().await.expect("Failed to create in-memory database");

        let status = migrations::migration_status(db.pool())
            .await
            .expect("Failed to get migration status");
        assert!(!status.needs_migration);
        assert!(db.definition_store().list_blueprints().await.unwrap().is_empty());
    }

    #[test]
    fn test_config_for_path_and_memory() {
        let file = DatabaseConfig::with_path("/tmp/test.db");
        assert_eq!(file.path, PathBuf::from("/tmp/test.db"));
        assert!(!file.is_in_memory());
        assert!(file.max_connections > 1);

        let memory = DatabaseConfig::in_memory();
        assert!(memory.is_in_memory());
        assert_eq!(memory.max_connections, 1);
    }

    #[tokio::test]
    async fn test_file_database_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data").join("blueprint.db");

        let db = Database::new(DatabaseConfig::with_path(&path))
            .await
            .expect("Failed to open file database");
        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());
        db.pool().close().await;
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = Database::in_memory().await.expect("Failed to create database");

        let result: (i32,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .expect("Failed to check foreign_keys pragma");

        assert_eq!(result.0, 1, "Foreign keys should be enabled");
    }

    #[tokio::test]
    async fn test_cascade_delete_version() {
        let db = Database::in_memory().await.expect("Failed to create database");
        let store = db.definition_store();

        let meta = BlueprintMeta::new("World");
        store.save_blueprint_meta(&meta).await.unwrap();
        let version = BlueprintVersion::draft(&meta.id, 1);
        store.insert_version(&version).await.unwrap();
        let person = EntityTypeDef::new(&version.id, EntityKind::Character);
        store.save_entity_type(&person).await.unwrap();
        store
            .save_field(&FieldDef::new(&person.id, "name", FieldDataType::Text))
            .await
            .unwrap();

        sqlx::query("DELETE FROM blueprint_versions WHERE id = ?")
            .bind(&version.id)
            .execute(db.pool())
            .await
            .expect("Failed to delete version");

        assert!(store.list_entity_types(&version.id).await.unwrap().is_empty());
        assert!(store.list_fields(&person.id).await.unwrap().is_empty());
    }
}
