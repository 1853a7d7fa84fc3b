use std::sync::Arc;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{App, HttpServer};
use anyhow::Context;
use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::runtime::TokioCurrentThread;
use paperclip::actix::{web, OpenApiExt};
use tracing_actix_web::TracingLogger;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use bookexchange_api::app_config::{config_app, json_config};
use bookexchange_api::auth::JwtKeys;
use bookexchange_api::credentials::{LoginPolicy, PasswordHasher};
use bookexchange_api::interactions_repository::{
    InMemoryInteractionsRepository, InteractionsRepository, PostgresInteractionsRepository,
};
use bookexchange_api::mailer::{InMemoryMailer, Mailer, SmtpMailer};
use bookexchange_api::notifications::Notifier;
use bookexchange_api::postgres::PostgresConfig;
use bookexchange_api::publications_repository::{
    InMemoryPublicationsRepository, PostgresPublicationsRepository, PublicationsRepository,
};
use bookexchange_api::reviews_repository::{
    InMemoryReviewsRepository, PostgresReviewsRepository, ReviewsRepository,
};
use bookexchange_api::settings::Settings;
use bookexchange_api::users_repository::{
    InMemoryUsersRepository, PostgresUsersRepository, UsersRepository,
};

const APP_NAME: &str = "bookexchange_api";

// Based on https://github.com/LukeMathWalker/tracing-actix-web/blob/main/examples/opentelemetry/src/main.rs#L15
fn init_telemetry(jaeger_enabled: bool) -> anyhow::Result<()> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Spans are exported to Jaeger in batch only when enabled
    let telemetry = if jaeger_enabled {
        #[allow(deprecated)]
        let tracer = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name(APP_NAME)
            .install_batch(TokioCurrentThread)
            .context("Failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    // Tunable via `RUST_LOG` env variable
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info"));
    let formatting_layer = BunyanFormattingLayer::new(APP_NAME.into(), std::io::stdout);
    let subscriber = Registry::default()
        .with(env_filter)
        .with(telemetry)
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install `tracing` subscriber")
}

#[derive(Clone)]
struct Repositories {
    users: Arc<dyn UsersRepository>,
    publications: Arc<dyn PublicationsRepository>,
    interactions: Arc<dyn InteractionsRepository>,
    reviews: Arc<dyn ReviewsRepository>,
}

async fn init_repositories(settings: &Settings) -> anyhow::Result<Repositories> {
    if settings.database.use_in_memory {
        tracing::warn!("Using in-memory repositories, data is lost on restart");
        return Ok(Repositories {
            users: Arc::new(InMemoryUsersRepository::default()),
            publications: Arc::new(InMemoryPublicationsRepository::default()),
            interactions: Arc::new(InMemoryInteractionsRepository::default()),
            reviews: Arc::new(InMemoryReviewsRepository::default()),
        });
    }

    let config = PostgresConfig::from(&settings.database);
    Ok(Repositories {
        users: Arc::new(
            PostgresUsersRepository::init(config.clone())
                .await
                .context("Failed to init users repository")?,
        ),
        publications: Arc::new(
            PostgresPublicationsRepository::init(config.clone())
                .await
                .context("Failed to init publications repository")?,
        ),
        interactions: Arc::new(
            PostgresInteractionsRepository::init(config.clone())
                .await
                .context("Failed to init interactions repository")?,
        ),
        reviews: Arc::new(
            PostgresReviewsRepository::init(config)
                .await
                .context("Failed to init reviews repository")?,
        ),
    })
}

fn init_mailer(settings: &Settings) -> anyhow::Result<Arc<dyn Mailer>> {
    if settings.mail.enabled {
        let mailer = SmtpMailer::new(&settings.mail, settings.mail_from())
            .context("Failed to configure SMTP mailer")?;
        Ok(Arc::new(mailer))
    } else {
        tracing::warn!("Mail is disabled, emails are only kept in memory");
        Ok(Arc::new(InMemoryMailer::default()))
    }
}

fn jwt_secret(settings: &Settings) -> String {
    match &settings.auth.jwt_secret {
        Some(secret) if !secret.is_empty() => secret.clone(),
        _ => {
            tracing::warn!("No JWT secret configured, tokens won't survive a restart");
            format!(
                "{}{}",
                uuid::Uuid::new_v4().simple(),
                uuid::Uuid::new_v4().simple()
            )
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_telemetry(settings.telemetry.jaeger_enabled)?;

    let repositories = init_repositories(&settings).await?;
    let mailer = init_mailer(&settings)?;

    let keys = web::Data::new(JwtKeys::new(
        &jwt_secret(&settings),
        chrono::Duration::hours(settings.auth.session_ttl_hours),
        chrono::Duration::minutes(settings.auth.email_token_ttl_minutes),
    ));
    let notifier = web::Data::new(Notifier::new(
        mailer,
        repositories.users.clone(),
        repositories.interactions.clone(),
        &settings.frontend.url,
    ));
    let hasher = web::Data::new(PasswordHasher::new(settings.auth.bcrypt_cost));
    let login_policy = web::Data::new(LoginPolicy {
        require_validated_login: settings.auth.require_validated_login,
    });
    let frontend_url = settings.frontend.url.trim_end_matches('/').to_string();

    tracing::info!(
        "starting HTTP server at http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .expose_headers(vec![header::AUTHORIZATION, header::LOCATION])
            .supports_credentials();

        App::new()
            .wrap_api()
            .app_data(json_config())
            .app_data(web::Data::new(repositories.users.clone()))
            .app_data(web::Data::new(repositories.publications.clone()))
            .app_data(web::Data::new(repositories.interactions.clone()))
            .app_data(web::Data::new(repositories.reviews.clone()))
            .app_data(keys.clone())
            .app_data(notifier.clone())
            .app_data(hasher.clone())
            .app_data(login_policy.clone())
            .wrap(cors)
            .wrap(TracingLogger::default())
            .configure(config_app)
            .with_json_spec_at("/apispec/v2")
            .build()
    })
    .bind((settings.server.host.as_str(), settings.server.port))?
    .run()
    .await?;

    Ok(())
}
