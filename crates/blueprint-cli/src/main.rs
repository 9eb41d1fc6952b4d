//! Blueprint CLI - manage and compile knowledge-base schemas

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use blueprint_core::config::Config;
use blueprint_core::domain::blueprint::{BlueprintService, DefinitionBundle, DefinitionStore};
use blueprint_core::infrastructure::blueprint::SqliteDefinitionStore;
use blueprint_core::storage::{Database, DatabaseConfig};
use tracing::debug;

#[derive(Parser)]
#[command(name = "blueprint")]
#[command(author, version, about = "Versioned schema compiler for knowledge bases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (overrides database.path from the config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage blueprints
    Blueprints {
        #[command(subcommand)]
        action: BlueprintAction,
    },

    /// Manage blueprint versions
    Versions {
        #[command(subcommand)]
        action: VersionAction,
    },

    /// Compile a blueprint version and print it as JSON
    Compile {
        /// Blueprint ID
        blueprint_id: String,
        /// Compile this version instead of the default pick
        #[arg(long = "version")]
        version_id: Option<String>,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum BlueprintAction {
    /// Create a new blueprint
    Create {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Mark as a system blueprint
        #[arg(long)]
        system: bool,
    },
    /// List all blueprints
    List,
}

#[derive(Subcommand)]
enum VersionAction {
    /// Create a new draft version
    Create {
        blueprint_id: String,
        /// Copy all definitions from this version
        #[arg(long)]
        from: Option<String>,
    },
    /// List versions of a blueprint
    List { blueprint_id: String },
    /// Publish a draft
    Publish { version_id: String },
    /// Archive a published or deprecated version
    Archive { version_id: String },
    /// Deprecate a published version
    Deprecate { version_id: String },
    /// Import a JSON definition bundle into a draft
    Import {
        version_id: String,
        bundle: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let default_level = if cli.quiet { "blueprint=warn" } else { "blueprint=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

/// Print an error with its code and a fix hint when it comes from the core
fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<blueprint_core::Error>() {
        Some(core) => {
            eprintln!("Error [{}]: {}", core.code(), core);
            if let Some(hint) = core.suggestion() {
                eprintln!("  Try: {}", hint);
            }
        }
        None => eprintln!("Error: {:#}", err),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let quiet = cli.quiet;
    let format = cli.format;

    match cli.command {
        Commands::Config { action } => cmd_config(action, quiet),
        Commands::Blueprints { action } => {
            let service = open_service(cli.db.as_deref()).await?;
            cmd_blueprints(&service, action, format, quiet).await
        }
        Commands::Versions { action } => {
            let service = open_service(cli.db.as_deref()).await?;
            cmd_versions(&service, action, format, quiet).await
        }
        Commands::Compile {
            blueprint_id,
            version_id,
            pretty,
        } => {
            let service = open_service(cli.db.as_deref()).await?;
            cmd_compile(&service, &blueprint_id, version_id.as_deref(), pretty).await
        }
    }
}

async fn open_service(
    db_override: Option<&Path>,
) -> anyhow::Result<BlueprintService<SqliteDefinitionStore>> {
    let config = Config::load()?;
    let path = match db_override {
        Some(path) => path.to_path_buf(),
        None => config.database_path()?,
    };
    debug!(path = %path.display(), "Opening database");

    let db = Database::new(DatabaseConfig::with_path(path)).await?;
    Ok(BlueprintService::with_config(
        Arc::new(db.definition_store()),
        &config.compiler,
    ))
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_blueprints(
    service: &BlueprintService<SqliteDefinitionStore>,
    action: BlueprintAction,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    match action {
        BlueprintAction::Create {
            name,
            description,
            tags,
            system,
        } => {
            let meta = service
                .create_blueprint(&name, description.as_deref(), tags, system)
                .await?;

            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string(&meta)?);
            } else if quiet {
                println!("{}", meta.id);
            } else {
                println!("Blueprint created successfully!");
                println!("  ID: {}", meta.id);
                println!("  Name: {}", meta.name);
                if !meta.tags.is_empty() {
                    let tags: Vec<&str> = meta.tags.iter().map(String::as_str).collect();
                    println!("  Tags: {}", tags.join(", "));
                }
                println!("\nNext steps:");
                println!("  Run `blueprint versions create {}` to start a draft", meta.id);
            }
        }
        BlueprintAction::List => {
            let blueprints = service.list_blueprints().await?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string(&blueprints)?);
            } else if blueprints.is_empty() {
                if !quiet {
                    println!("No blueprints found.");
                    println!("\nCreate one with: blueprint blueprints create <name>");
                }
            } else {
                if !quiet {
                    println!("Blueprints:");
                }
                for meta in blueprints {
                    let system = if meta.is_system { " [system]" } else { "" };
                    println!("  {} - {}{}", meta.id, meta.name, system);
                }
            }
        }
    }
    Ok(())
}

async fn cmd_versions(
    service: &BlueprintService<SqliteDefinitionStore>,
    action: VersionAction,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let version = match action {
        VersionAction::Create { blueprint_id, from } => match from {
            Some(source_id) => {
                ensure_version_of(service, &blueprint_id, &source_id).await?;
                service.fork_draft(&source_id).await?
            }
            None => service.create_draft(&blueprint_id).await?,
        },
        VersionAction::List { blueprint_id } => {
            let versions = service.list_versions(&blueprint_id).await?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string(&versions)?);
            } else if versions.is_empty() {
                if !quiet {
                    println!("No versions found.");
                    println!(
                        "\nCreate one with: blueprint versions create {}",
                        blueprint_id
                    );
                }
            } else {
                for v in versions {
                    let published = v
                        .published_at
                        .map(|t| format!(" (published {})", t.format("%Y-%m-%d %H:%M:%S")))
                        .unwrap_or_default();
                    println!("  v{} {} [{}]{}", v.version_number, v.id, v.status, published);
                }
            }
            return Ok(());
        }
        VersionAction::Publish { version_id } => service.publish(&version_id).await?,
        VersionAction::Archive { version_id } => service.archive(&version_id).await?,
        VersionAction::Deprecate { version_id } => service.deprecate(&version_id).await?,
        VersionAction::Import { version_id, bundle } => {
            let contents = std::fs::read_to_string(&bundle).map_err(|e| {
                anyhow::anyhow!("Failed to read bundle {}: {}", bundle.display(), e)
            })?;
            let parsed = DefinitionBundle::from_json(&contents)?;
            let summary = service.import_bundle(&version_id, &parsed).await?;

            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string(&summary)?);
            } else if !quiet {
                println!("Imported into {}:", version_id);
                println!("  Entity types: {}", summary.entity_types);
                println!("  Fields: {}", summary.fields);
                println!("  Relationship types: {}", summary.relationship_types);
                println!("  Relationship attributes: {}", summary.attributes);
                println!("  View templates: {}", summary.view_templates);
                println!("  MOCs: {}", summary.mocs);
                if summary.extraction_profile {
                    println!(
                        "  Extraction profile: {} label mappings, {} ignore entries",
                        summary.label_mappings, summary.ignore_entries
                    );
                }
            }
            return Ok(());
        }
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string(&version)?);
    } else if quiet {
        println!("{}", version.id);
    } else {
        println!(
            "Version {} (v{}) is {}",
            version.id, version.version_number, version.status
        );
    }
    Ok(())
}

/// Fail unless `version_id` is a version of `blueprint_id`
async fn ensure_version_of(
    service: &BlueprintService<SqliteDefinitionStore>,
    blueprint_id: &str,
    version_id: &str,
) -> anyhow::Result<()> {
    let version = service
        .store()
        .get_version(version_id)
        .await?
        .ok_or_else(|| blueprint_core::Error::VersionNotFound(version_id.to_string()))?;
    if version.blueprint_id != blueprint_id {
        return Err(blueprint_core::Error::InvalidInput(format!(
            "Version '{}' belongs to blueprint '{}', not '{}'",
            version_id, version.blueprint_id, blueprint_id
        ))
        .into());
    }
    Ok(())
}

async fn cmd_compile(
    service: &BlueprintService<SqliteDefinitionStore>,
    blueprint_id: &str,
    version_id: Option<&str>,
    pretty: bool,
) -> anyhow::Result<()> {
    if let Some(version_id) = version_id {
        ensure_version_of(service, blueprint_id, version_id).await?;
    }
    let compiled = service.compile(blueprint_id, version_id).await?;

    for warning in &compiled.diagnostics {
        eprintln!("warning: {}", warning);
    }

    let json = if pretty {
        serde_json::to_string_pretty(compiled.as_ref())?
    } else {
        serde_json::to_string(compiled.as_ref())?
    };
    println!("{}", json);
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_compile_args() {
        let cli = Cli::try_parse_from([
            "blueprint", "compile", "bp-1", "--version", "v-2", "--pretty", "--db", "x.db",
        ])
        .unwrap();
        assert_eq!(cli.db.as_deref(), Some(Path::new("x.db")));
        match cli.command {
            Commands::Compile {
                blueprint_id,
                version_id,
                pretty,
            } => {
                assert_eq!(blueprint_id, "bp-1");
                assert_eq!(version_id.as_deref(), Some("v-2"));
                assert!(pretty);
            }
            _ => panic!("expected compile"),
        }
    }

    #[test]
    fn test_repeatable_tags() {
        let cli = Cli::try_parse_from([
            "blueprint", "blueprints", "create", "World", "--tag", "a", "--tag", "b", "--system",
        ])
        .unwrap();
        match cli.command {
            Commands::Blueprints {
                action: BlueprintAction::Create { tags, system, .. },
            } => {
                assert_eq!(tags, vec!["a", "b"]);
                assert!(system);
            }
            _ => panic!("expected blueprints create"),
        }
    }
}
