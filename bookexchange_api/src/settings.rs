use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseSettings {
    pub use_in_memory: bool,
    pub hostname: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AuthSettings {
    /// Random secret is generated at start-up when missing
    pub jwt_secret: Option<String>,
    pub session_ttl_hours: i64,
    pub email_token_ttl_minutes: i64,
    pub bcrypt_cost: u32,
    pub require_validated_login: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MailSettings {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FrontendSettings {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TelemetrySettings {
    pub jaeger_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub mail: MailSettings,
    pub frontend: FrontendSettings,
    pub telemetry: TelemetrySettings,
}

/// Environment variables the service historically used, mapped onto settings keys
const LEGACY_VARIABLES: [(&str, &str); 8] = [
    ("PORT", "server.port"),
    ("HOST", "frontend.url"),
    ("JWT_SECRET", "auth.jwt_secret"),
    ("MAIL_USER", "mail.username"),
    ("MAIL_PASS", "mail.password"),
    ("DB_HOST", "database.hostname"),
    ("DB_USERNAME", "database.username"),
    ("DB_PASSWORD", "database.password"),
];

impl Settings {
    /// Loads settings from defaults, optional `bookexchange.toml`,
    /// `BOOKEXCHANGE__*` variables and finally the legacy variables
    pub fn load() -> anyhow::Result<Self> {
        let mut builder = Self::builder_with_defaults()?
            .add_source(File::with_name("bookexchange").required(false))
            .add_source(Environment::with_prefix("BOOKEXCHANGE").separator("__"));

        for (variable, key) in LEGACY_VARIABLES {
            builder = builder.set_override_option(key, std::env::var(variable).ok())?;
        }
        builder = builder.set_override_option(
            "database.use_in_memory",
            std::env::var("USE_IN_MEMORY_DB")
                .ok()
                .map(|value| value.to_lowercase() == "true"),
        )?;

        builder
            .build()
            .context("Failed to build settings")?
            .try_deserialize()
            .context("Failed to deserialize settings")
    }

    /// Settings with nothing but the defaults applied
    pub fn defaults() -> anyhow::Result<Self> {
        Self::builder_with_defaults()?
            .build()
            .context("Failed to build settings")?
            .try_deserialize()
            .context("Failed to deserialize settings")
    }

    fn builder_with_defaults(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.use_in_memory", false)?
            .set_default("database.hostname", "127.0.0.1")?
            .set_default("database.username", "postgres")?
            .set_default("database.password", "postgres")?
            .set_default("auth.session_ttl_hours", 48)?
            .set_default("auth.email_token_ttl_minutes", 60)?
            .set_default("auth.bcrypt_cost", 12)?
            .set_default("auth.require_validated_login", false)?
            .set_default("mail.enabled", false)?
            .set_default("mail.smtp_host", "smtp-mail.outlook.com")?
            .set_default("mail.smtp_port", 587)?
            .set_default("mail.username", "")?
            .set_default("mail.password", "")?
            .set_default("mail.from", "")?
            .set_default("frontend.url", "http://localhost:5173")?
            .set_default("telemetry.jaeger_enabled", false)
    }

    /// Sender address, falls back to the SMTP user as the mailbox owner
    pub fn mail_from(&self) -> &str {
        if self.mail.from.is_empty() {
            &self.mail.username
        } else {
            &self.mail.from
        }
    }
}

#[cfg(test)]
mod settings_tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn defaults_are_complete() {
        let settings = Settings::defaults().expect("Failed to load defaults");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.auth.session_ttl_hours, 48);
        assert_eq!(settings.auth.email_token_ttl_minutes, 60);
        assert_eq!(settings.auth.jwt_secret, None);
        assert_eq!(settings.frontend.url, "http://localhost:5173");
        assert!(!settings.mail.enabled);
        assert!(!settings.database.use_in_memory);
    }

    #[test]
    #[serial]
    /// Prefixed variables and legacy variables both end up in settings,
    /// legacy ones take precedence
    fn environment_overrides_defaults() {
        std::env::set_var("BOOKEXCHANGE__SERVER__PORT", "9000");
        std::env::set_var("BOOKEXCHANGE__MAIL__FROM", "books@example.com");
        std::env::set_var("JWT_SECRET", "very-secret");
        std::env::set_var("USE_IN_MEMORY_DB", "TRUE");

        let settings = Settings::load();

        std::env::remove_var("BOOKEXCHANGE__SERVER__PORT");
        std::env::remove_var("BOOKEXCHANGE__MAIL__FROM");
        std::env::remove_var("JWT_SECRET");
        std::env::remove_var("USE_IN_MEMORY_DB");

        let settings = settings.expect("Failed to load settings");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.auth.jwt_secret.as_deref(), Some("very-secret"));
        assert!(settings.database.use_in_memory);
        assert_eq!(settings.mail_from(), "books@example.com");
    }
}
