use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use classboard_migrate::config::WORKSPACE_ENV;
use classboard_migrate::{
    backup, fixtures, validate_input_data, validate_payload, ExistingIds, MigrationConfig,
    MigrationPayload, Migrator, Store,
};
use std::path::{Path, PathBuf};

/// Seed the ClassBoard database from a JSON fixture, with backup and rollback.
#[derive(Parser, Debug)]
#[command(name = "classboard-migrate", version, about)]
struct Cli {
    /// Directory holding the database, backups/ and logs/.
    #[arg(long, global = true, env = WORKSPACE_ENV, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate, back up and insert a payload (the built-in demo data by default).
    Migrate {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Undo completed groups if a later group fails.
        #[arg(long)]
        compensate: bool,
    },
    /// Validate a payload against the workspace database without writing to it.
    Validate {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Validate the demo data and a deliberately broken copy of it.
    Demo,
    /// Restore the database from a backup id.
    Rollback { backup_id: String },
    /// List backup ids, newest first.
    Backups,
    /// Post-migration smoke check.
    Check,
}

fn load(input: Option<&Path>) -> anyhow::Result<MigrationPayload> {
    match input {
        Some(p) => fixtures::load_payload(p)
            .with_context(|| format!("failed to load payload {}", p.to_string_lossy())),
        None => fixtures::demo_payload().context("built-in demo fixture is invalid JSON"),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = MigrationConfig::new(&cli.workspace);

    match cli.command {
        Commands::Migrate { input, compensate } => {
            let payload = load(input.as_deref())?;
            let mut migrator = Migrator::open(config.with_compensation(compensate))
                .context("failed to open workspace")?;
            let result = migrator
                .migrate_all_data(&payload)
                .context("migration aborted")?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                bail!("migration rejected by validation");
            }
        }
        Commands::Validate { input } => {
            let payload = load(input.as_deref())?;
            let existing = match Store::open_read_only(config.workspace())
                .context("failed to open workspace database")?
            {
                Some(store) => store
                    .existing_ids()
                    .context("failed to read stored ids")?,
                None => ExistingIds::default(),
            };
            let errors = validate_input_data(&payload, &existing);
            println!("{}", serde_json::to_string_pretty(&errors)?);
            if !errors.is_empty() {
                bail!("{} validation error(s)", errors.len());
            }
        }
        Commands::Demo => {
            let good = validate_payload(&fixtures::demo_payload()?);
            println!("demo fixture: {} validation error(s)", good.len());
            let bad = validate_payload(&fixtures::broken_demo_payload()?);
            println!("broken fixture: {} validation error(s)", bad.len());
            for e in &bad {
                println!("  {}", e);
            }
        }
        Commands::Rollback { backup_id } => {
            let mut migrator = Migrator::open(config).context("failed to open workspace")?;
            migrator
                .rollback(&backup_id)
                .with_context(|| format!("rollback from {} failed", backup_id))?;
            println!("restored {}", backup_id);
        }
        Commands::Backups => {
            for id in backup::list_backups(&config.backups_dir())? {
                println!("{}", id);
            }
        }
        Commands::Check => {
            let mut migrator = Migrator::open(config).context("failed to open workspace")?;
            if !migrator.validate_migration()? {
                bail!("post-migration check failed; see logs/migration.log");
            }
            println!("post-migration check passed");
        }
    }

    Ok(())
}
