use std::fmt::Display;
use std::sync::Arc;

use actix_web::web::Data;
use actix_web::{Error, HttpResponse};
use paperclip::actix::api_v2_operation;

use crate::api::ErrorResponse;
use crate::errors;
use crate::interactions_repository::InteractionsRepository;
use crate::publications_repository::PublicationsRepository;
use crate::reviews_repository::ReviewsRepository;
use crate::users_repository::UsersRepository;

pub mod interactions;
pub mod publications;
pub mod reviews;
pub mod users;

pub type UsersRepositoryData = Data<Arc<dyn UsersRepository>>;
pub type PublicationsRepositoryData = Data<Arc<dyn PublicationsRepository>>;
pub type InteractionsRepositoryData = Data<Arc<dyn InteractionsRepository>>;
pub type ReviewsRepositoryData = Data<Arc<dyn ReviewsRepository>>;

#[api_v2_operation]
pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().finish())
}

#[api_v2_operation]
pub async fn hello() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().body("Hello World!"))
}

fn log_failure(operation: &str, err: impl Display) {
    tracing::error!("{} failed {}", operation, err);
}

/// Logs the failure and answers 500 with an `{"error": ..}` body,
/// used by publication, interaction and review routes
pub(crate) fn internal_error(operation: &str, err: impl Display) -> HttpResponse {
    log_failure(operation, err);
    HttpResponse::InternalServerError().json(ErrorResponse::new("Internal server error"))
}

/// Logs the failure and answers 500 with the INTERNAL_SERVER_ERROR entry of the
/// error table, which user routes and authentication answer with
pub(crate) fn internal_error_code(operation: &str, err: impl Display) -> HttpResponse {
    log_failure(operation, err);
    HttpResponse::InternalServerError().json(errors::INTERNAL_SERVER)
}

#[cfg(test)]
pub(crate) mod test_context {
    use std::sync::Arc;

    use actix_web::web::Data;
    use chrono::Duration;

    use crate::api::User;
    use crate::auth::JwtKeys;
    use crate::credentials::{LoginPolicy, PasswordHasher};
    use crate::interactions_repository::{InMemoryInteractionsRepository, InteractionsRepository};
    use crate::mailer::{InMemoryMailer, OutgoingEmail};
    use crate::notifications::Notifier;
    use crate::publications_repository::{InMemoryPublicationsRepository, PublicationsRepository};
    use crate::reviews_repository::{InMemoryReviewsRepository, ReviewsRepository};
    use crate::users_repository::{InMemoryUsersRepository, NewUserRecord, UsersRepository};

    /// In-memory state of a test application
    pub struct TestContext {
        pub users_repository: Arc<dyn UsersRepository>,
        pub publications_repository: Arc<dyn PublicationsRepository>,
        pub interactions_repository: Arc<dyn InteractionsRepository>,
        pub reviews_repository: Arc<dyn ReviewsRepository>,
        pub mailer: Arc<InMemoryMailer>,
        pub keys: Data<JwtKeys>,
        pub notifier: Data<Notifier>,
        pub hasher: Data<PasswordHasher>,
        pub login_policy: Data<LoginPolicy>,
    }

    impl TestContext {
        pub fn new() -> Self {
            Self::with_login_policy(LoginPolicy::default())
        }

        pub fn with_login_policy(login_policy: LoginPolicy) -> Self {
            let users_repository: Arc<dyn UsersRepository> =
                Arc::new(InMemoryUsersRepository::default());
            let interactions_repository: Arc<dyn InteractionsRepository> =
                Arc::new(InMemoryInteractionsRepository::default());
            let mailer = Arc::new(InMemoryMailer::default());
            let notifier = Notifier::new(
                mailer.clone(),
                users_repository.clone(),
                interactions_repository.clone(),
                "http://localhost:5173",
            );

            Self {
                users_repository,
                publications_repository: Arc::new(InMemoryPublicationsRepository::default()),
                interactions_repository,
                reviews_repository: Arc::new(InMemoryReviewsRepository::default()),
                mailer,
                keys: Data::new(JwtKeys::new(
                    "handler-tests-secret",
                    Duration::hours(48),
                    Duration::hours(1),
                )),
                notifier: Data::new(notifier),
                hasher: Data::new(PasswordHasher::new(4)),
                login_policy: Data::new(login_policy),
            }
        }

        /// Stores a validated user directly and returns it with a session token
        pub async fn add_user(&self, name: &str, email: &str, is_admin: bool) -> (User, String) {
            let password_hash = self
                .hasher
                .hash("Secret123".to_string())
                .await
                .expect("Failed to hash password");
            let user = self
                .users_repository
                .add_user(NewUserRecord {
                    is_admin,
                    is_validated: true,
                    ..NewUserRecord::new(name, email, &password_hash)
                })
                .await
                .expect("Failed to add user");
            let token = self
                .keys
                .issue_session_token(user.id)
                .expect("Failed to issue token");
            (user, format!("Bearer {token}"))
        }

        /// Waits for emails sent from background tasks
        pub async fn wait_for_emails(&self, count: usize) -> Vec<OutgoingEmail> {
            for _ in 0..100 {
                let sent = self.mailer.sent();
                if sent.len() >= count {
                    return sent;
                }
                actix_web::rt::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            self.mailer.sent()
        }
    }

    /// Initializes the whole application on top of a [`TestContext`]
    macro_rules! init_test_app {
        ($ctx:expr) => {{
            use paperclip::actix::OpenApiExt;
            let ctx = &$ctx;
            actix_web::test::init_service(
                actix_web::App::new()
                    .wrap_api()
                    .app_data(crate::app_config::json_config())
                    .app_data(actix_web::web::Data::new(ctx.users_repository.clone()))
                    .app_data(actix_web::web::Data::new(
                        ctx.publications_repository.clone(),
                    ))
                    .app_data(actix_web::web::Data::new(
                        ctx.interactions_repository.clone(),
                    ))
                    .app_data(actix_web::web::Data::new(ctx.reviews_repository.clone()))
                    .app_data(ctx.keys.clone())
                    .app_data(ctx.notifier.clone())
                    .app_data(ctx.hasher.clone())
                    .app_data(ctx.login_policy.clone())
                    .configure(crate::app_config::config_app)
                    .build(),
            )
            .await
        }};
    }
    pub(crate) use init_test_app;
}

#[cfg(test)]
mod handler_tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{json, Value};

    use super::test_context::{init_test_app, TestContext};
    use super::*;

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_web::test]
    /// Both 500 bodies keep the cause out of the response
    async fn test_internal_error_bodies() {
        let response = internal_error("List genres", "db down");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Internal server error"})
        );

        let response = internal_error_code("List users", "db down");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"code": "INTERNAL_SERVER_ERROR", "message": "Ocurrió un error en el servidor."})
        );
    }

    #[actix_web::test]
    async fn test_hello_and_health() {
        let ctx = TestContext::new();
        let app = init_test_app!(ctx);

        let response = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(test::read_body(response).await, "Hello World!");

        let response =
            test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
