//! Database migrations
//!
//! This module manages SQLite schema migrations for blueprint storage.
//! Migrations are versioned and applied automatically on database connection.

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Blueprints, versions, entity and relationship definitions
const MIGRATION_V1: &str = r#"
    -- Blueprint metadata
    CREATE TABLE IF NOT EXISTS blueprints (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        is_system INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_blueprints_name ON blueprints(name);

    -- Versions; numbers are unique per blueprint
    CREATE TABLE IF NOT EXISTS blueprint_versions (
        id TEXT PRIMARY KEY NOT NULL,
        blueprint_id TEXT NOT NULL REFERENCES blueprints(id) ON DELETE CASCADE,
        version_number INTEGER NOT NULL CHECK (version_number > 0),
        status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published', 'archived', 'deprecated')),
        notes TEXT,
        created_at TEXT NOT NULL,
        published_at TEXT,
        UNIQUE (blueprint_id, version_number)
    );

    CREATE INDEX IF NOT EXISTS idx_blueprint_versions_blueprint_id ON blueprint_versions(blueprint_id);
    CREATE INDEX IF NOT EXISTS idx_blueprint_versions_status ON blueprint_versions(status);

    -- Entity types; parent_type_id is not a foreign key (dangling parents are allowed)
    CREATE TABLE IF NOT EXISTS entity_types (
        id TEXT PRIMARY KEY NOT NULL,
        version_id TEXT NOT NULL REFERENCES blueprint_versions(id) ON DELETE CASCADE,
        entity_kind TEXT NOT NULL,
        display_name TEXT NOT NULL,
        description TEXT,
        parent_type_id TEXT,
        is_abstract INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_entity_types_version_id ON entity_types(version_id);

    -- Fields owned by an entity type
    CREATE TABLE IF NOT EXISTS field_defs (
        id TEXT PRIMARY KEY NOT NULL,
        entity_type_id TEXT NOT NULL REFERENCES entity_types(id) ON DELETE CASCADE,
        field_name TEXT NOT NULL,
        display_label TEXT NOT NULL,
        data_type TEXT NOT NULL,
        is_required INTEGER NOT NULL DEFAULT 0,
        display_order INTEGER NOT NULL DEFAULT 0,
        default_value TEXT,
        validation TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_field_defs_entity_type_id ON field_defs(entity_type_id);

    -- Relationship types between entity kinds
    CREATE TABLE IF NOT EXISTS relationship_types (
        id TEXT PRIMARY KEY NOT NULL,
        version_id TEXT NOT NULL REFERENCES blueprint_versions(id) ON DELETE CASCADE,
        relationship_name TEXT NOT NULL,
        display_label TEXT NOT NULL,
        source_entity_kind TEXT NOT NULL,
        target_entity_kind TEXT NOT NULL,
        direction TEXT NOT NULL CHECK (direction IN ('directed', 'undirected', 'bidirectional')),
        cardinality TEXT NOT NULL CHECK (cardinality IN ('one_to_one', 'one_to_many', 'many_to_one', 'many_to_many')),
        reverse_label TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_relationship_types_version_id ON relationship_types(version_id);

    CREATE TABLE IF NOT EXISTS relationship_attributes (
        id TEXT PRIMARY KEY NOT NULL,
        relationship_type_id TEXT NOT NULL REFERENCES relationship_types(id) ON DELETE CASCADE,
        attribute_name TEXT NOT NULL,
        data_type TEXT NOT NULL,
        is_required INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_relationship_attributes_type_id ON relationship_attributes(relationship_type_id);
"#;

/// Migration 2: Views, MOCs and extraction configuration
const MIGRATION_V2: &str = r#"
    CREATE TABLE IF NOT EXISTS view_templates (
        id TEXT PRIMARY KEY NOT NULL,
        version_id TEXT NOT NULL REFERENCES blueprint_versions(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        entity_kind TEXT,
        config TEXT NOT NULL DEFAULT '{}'
    );

    CREATE INDEX IF NOT EXISTS idx_view_templates_version_id ON view_templates(version_id);

    CREATE TABLE IF NOT EXISTS mocs (
        id TEXT PRIMARY KEY NOT NULL,
        version_id TEXT NOT NULL REFERENCES blueprint_versions(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        entity_kinds TEXT NOT NULL DEFAULT '[]',
        config TEXT NOT NULL DEFAULT '{}'
    );

    CREATE INDEX IF NOT EXISTS idx_mocs_version_id ON mocs(version_id);

    -- At most one extraction profile per version
    CREATE TABLE IF NOT EXISTS extraction_profiles (
        id TEXT PRIMARY KEY NOT NULL,
        version_id TEXT NOT NULL UNIQUE REFERENCES blueprint_versions(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 1,
        confidence_threshold REAL NOT NULL DEFAULT 0.5
    );

    CREATE TABLE IF NOT EXISTS label_mappings (
        id TEXT PRIMARY KEY NOT NULL,
        profile_id TEXT NOT NULL REFERENCES extraction_profiles(id) ON DELETE CASCADE,
        ner_label TEXT NOT NULL,
        entity_kind TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_label_mappings_profile_id ON label_mappings(profile_id);

    CREATE TABLE IF NOT EXISTS ignore_entries (
        id TEXT PRIMARY KEY NOT NULL,
        profile_id TEXT NOT NULL REFERENCES extraction_profiles(id) ON DELETE CASCADE,
        term TEXT NOT NULL,
        case_sensitive INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_ignore_entries_profile_id ON ignore_entries(profile_id);
"#;

/// Get the current schema version from the database
async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    // Ensure migrations table exists
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let row: Option<(Option<i32>,)> = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|(v,)| v).unwrap_or(0))
}

/// Record that a migration has been applied
async fn record_migration(pool: &SqlitePool, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    if current_version < 1 {
        tracing::info!("Applying migration v1: Blueprint definitions");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Views, MOCs and extraction profiles");
        sqlx::raw_sql(MIGRATION_V2).execute(pool).await?;
        record_migration(pool, 2).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Check if the database needs migrations
pub async fn needs_migration(pool: &SqlitePool) -> anyhow::Result<bool> {
    let current_version = get_current_version(pool).await?;
    Ok(current_version < CURRENT_VERSION)
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Current schema version in the database
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool")
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await;

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, 0);
        assert!(status.needs_migration);

        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
        assert!(!status.needs_migration);
        assert!(!needs_migration(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = create_test_pool().await;

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_tables_created() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        let tables = vec![
            "blueprints",
            "blueprint_versions",
            "entity_types",
            "field_defs",
            "relationship_types",
            "relationship_attributes",
            "view_templates",
            "mocs",
            "extraction_profiles",
            "label_mappings",
            "ignore_entries",
        ];

        for table in tables {
            let result: (i32,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap_or_else(|_| panic!("Table {} should exist", table));
            assert_eq!(result.0, 0, "Table {} should be empty", table);
        }
    }

    #[tokio::test]
    async fn test_version_number_unique_per_blueprint() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO blueprints (id, name, created_at, updated_at) VALUES ('b', 'B', '', '')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let insert = "INSERT INTO blueprint_versions (id, blueprint_id, version_number, created_at) VALUES (?, 'b', 1, '')";
        sqlx::query(insert).bind("v1").execute(&pool).await.unwrap();
        let duplicate = sqlx::query(insert).bind("v2").execute(&pool).await;
        assert!(duplicate.is_err());
    }
}
