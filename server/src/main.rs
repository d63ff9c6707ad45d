mod auth;
mod config;
mod graphql;
mod http;
mod seed;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_authz::Role;
use platform_db::{DatabaseSettings, DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use products_pipeline::{PipelineService, SeaPipelineStore, TracingNotifier};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "pipeline-server", version, about = "Real-estate deal pipeline")]
struct Cli {
    /// Allow a generated development secret when AUTH_SECRET is unset.
    #[arg(long, global = true)]
    dev: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Seed a demo org with buyer and seller deals.
    Seed {
        #[arg(long, default_value = "demo-realty")]
        org: String,
    },
    /// Print the GraphQL schema (SDL).
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Write to a file instead of stdout")]
        output: Option<PathBuf>,
    },
    /// Issue a session token for local testing.
    #[command(name = "token:issue")]
    TokenIssue {
        #[arg(long)]
        org: Uuid,
        #[arg(long)]
        user: Option<Uuid>,
        #[arg(long, value_delimiter = ',', default_value = "agent")]
        roles: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Roll back the most recent migration.
    Down,
    /// Roll back every migration.
    Reset,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::from_env("pipeline-server"))?;
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(cmd) => {
            let config = Arc::new(AppConfig::load(cli.dev)?);
            run_server(cmd, config).await
        }
        Command::Migrate(action) => run_migration(action).await,
        Command::Seed { org } => {
            let pool = setup_pool().await?;
            Migrator::up(&pool, None).await?;
            seed::run(&pool, &org).await
        }
        Command::SchemaPrint { output } => schema_print(output).await,
        Command::TokenIssue { org, user, roles } => {
            let config = AppConfig::load(cli.dev)?;
            token_issue(&config, org, user, &roles)
        }
    }
}

async fn setup_pool() -> Result<DbPool> {
    let settings = DatabaseSettings::from_env();
    connect(&settings).await.map_err(Into::into)
}

fn pipeline_service(pool: &DbPool) -> PipelineService {
    PipelineService::new(
        Arc::new(SeaPipelineStore::new(pool.clone())),
        Arc::new(TracingNotifier),
    )
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let pool = setup_pool().await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    let schema = graphql::build_schema(pipeline_service(&pool));
    let state = AppState {
        pool,
        schema,
        auth: Arc::new(config.auth.clone()),
        config,
    };
    http::serve((&cmd).into(), state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "{} pending migrations; run `pipeline-server migrate up` or pass --allow-dirty",
            pending.len()
        );
    }
    Ok(())
}

async fn run_migration(action: MigrateCommand) -> Result<()> {
    let pool = setup_pool().await?;
    match action {
        MigrateCommand::Up => {
            Migrator::up(&pool, None).await?;
            info!("database migrations applied");
        }
        MigrateCommand::Down => {
            Migrator::down(&pool, Some(1)).await?;
            info!("most recent migration rolled back");
        }
        MigrateCommand::Reset => {
            Migrator::reset(&pool).await?;
            info!("all migrations rolled back");
        }
    }
    Ok(())
}

/// The SDL does not depend on data, so an in-memory database is enough.
async fn schema_print(path: Option<PathBuf>) -> Result<()> {
    let pool = sea_orm::Database::connect("sqlite::memory:").await?;
    let sdl = graphql::build_schema(pipeline_service(&pool)).sdl();
    match path {
        Some(path) => {
            std::fs::write(&path, sdl)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "schema written");
        }
        None => println!("{sdl}"),
    }
    Ok(())
}

fn token_issue(config: &AppConfig, org: Uuid, user: Option<Uuid>, roles: &[String]) -> Result<()> {
    let roles = roles
        .iter()
        .map(|raw| Role::parse(raw).with_context(|| format!("unknown role `{raw}`")))
        .collect::<Result<Vec<_>>>()?;
    let token = auth::issue_token(user.unwrap_or_else(Uuid::new_v4), org, &roles, &config.auth)?;
    println!("{token}");
    Ok(())
}
