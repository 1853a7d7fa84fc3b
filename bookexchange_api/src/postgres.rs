use anyhow::Context;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls};

use crate::settings::DatabaseSettings;

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

impl From<&DatabaseSettings> for PostgresConfig {
    fn from(settings: &DatabaseSettings) -> Self {
        Self {
            hostname: settings.hostname.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
        }
    }
}

/// Opens a connection and drives it on a background task
pub(crate) async fn connect(config: &PostgresConfig) -> anyhow::Result<Client> {
    let connection_str = format!(
        "postgresql://{}:{}@{}",
        config.username, config.password, config.hostname
    );
    tracing::info!(
        "Connecting to postgres at {} as {}",
        config.hostname,
        config.username
    );
    let (client, connection) = tokio_postgres::connect(&connection_str, NoTls)
        .await
        .context("Failed to start postgres")?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Postgres connection error: {}", e);
        }
    });

    Ok(client)
}

pub(crate) fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    err.as_db_error()
        .map(|db_err| db_err.code() == &SqlState::UNIQUE_VIOLATION)
        .unwrap_or_default()
}
