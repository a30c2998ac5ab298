use anyhow::Context;
use serde::Deserialize;

use crate::books_repository::PostgresBooksRepositoryConfig;

/// Service settings, each field can be overridden by the upper-cased environment variable,
/// e.g. `DB_HOST` or `USE_IN_MEMORY_DB`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppSettings {
    pub use_in_memory_db: bool,
    pub db_host: String,
    pub db_username: String,
    pub db_password: String,
    pub db_name: String,
    pub http_host: String,
    pub http_port: u16,
    pub jaeger_enabled: bool,
}

impl AppSettings {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_environment(config::Environment::default().try_parsing(true))
    }

    fn from_environment(environment: config::Environment) -> anyhow::Result<Self> {
        config::Config::builder()
            .set_default("use_in_memory_db", false)?
            .set_default("db_host", "127.0.0.1")?
            .set_default("db_username", "postgres")?
            .set_default("db_password", "postgres")?
            .set_default("db_name", "postgres")?
            .set_default("http_host", "0.0.0.0")?
            .set_default("http_port", 8080)?
            .set_default("jaeger_enabled", false)?
            .add_source(environment)
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn postgres_config(&self) -> PostgresBooksRepositoryConfig {
        PostgresBooksRepositoryConfig {
            hostname: self.db_host.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
            database: self.db_name.clone(),
        }
    }
}
