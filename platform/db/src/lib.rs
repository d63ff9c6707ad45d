//! Database primitives shared by the server and tests.

use std::time::Duration;

use chrono::Utc;
use entity::orgs;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, Set,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Shared connection pool alias.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing (set {0})")]
    MissingUrl(String),
    #[error(transparent)]
    Db(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Environment-driven connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
    #[serde(default = "default_max_connections")]
    max_connections: u32,
    #[serde(default)]
    sql_logging: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            env_key: default_url_key(),
            max_connections: default_max_connections(),
            sql_logging: false,
        }
    }
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

fn default_max_connections() -> u32 {
    10
}

impl DatabaseSettings {
    pub fn new(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(max) = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|raw| raw.parse::<u32>().ok())
        {
            settings.max_connections = max.max(1);
        }
        settings.sql_logging = std::env::var("DATABASE_SQL_LOGGING")
            .ok()
            .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        settings
    }

    pub fn database_url(&self) -> DbResult<String> {
        std::env::var(&self.env_key).map_err(|_| DbError::MissingUrl(self.env_key.clone()))
    }

    fn connect_options(&self, url: String) -> ConnectOptions {
        let mut options = ConnectOptions::new(url);
        options
            .max_connections(self.max_connections)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(self.sql_logging);
        options
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let url = settings.database_url()?;
    connect_url(settings, url).await
}

pub async fn connect_url(settings: &DatabaseSettings, url: String) -> DbResult<DbPool> {
    let pool = Database::connect(settings.connect_options(url)).await?;
    Ok(pool)
}

/// Returns the id of the org with `slug`, creating it when missing.
pub async fn ensure_org(pool: &DbPool, slug: &str, name: &str) -> DbResult<Uuid> {
    if let Some(existing) = orgs::Entity::find()
        .filter(orgs::Column::Slug.eq(slug))
        .one(pool)
        .await?
    {
        return Ok(existing.id);
    }
    let id = Uuid::new_v4();
    orgs::ActiveModel {
        id: Set(id),
        slug: Set(slug.to_string()),
        name: Set(name.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(pool)
    .await?;
    info!(%id, slug, "created org");
    Ok(id)
}
