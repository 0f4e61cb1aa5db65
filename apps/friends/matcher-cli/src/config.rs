//! Configuration for the friend matcher

use core_config::{Environment, FromEnv};
use database::postgres::PostgresConfig;
use domain_matching::EmbedderConfig;

/// Composes the shared config components
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database: PostgresConfig,
    pub embedder: EmbedderConfig,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // Required - DATABASE_URL
        let embedder = EmbedderConfig::from_env()?; // Defaults to the local hashing embedder

        Ok(Self {
            environment,
            database,
            embedder,
        })
    }
}
