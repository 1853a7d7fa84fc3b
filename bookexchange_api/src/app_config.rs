use actix_web::error::InternalError;
use actix_web::HttpResponse;
use paperclip::actix::web;

use crate::errors;
use crate::handlers::{self, interactions, publications, reviews, users};

/// Malformed JSON bodies are answered with the BAD_REQUEST error body
pub fn json_config() -> actix_web::web::JsonConfig {
    actix_web::web::JsonConfig::default().error_handler(|err, _req| {
        tracing::debug!("Rejected request body {}", err);
        InternalError::from_response(err, HttpResponse::BadRequest().json(errors::BAD_REQUEST))
            .into()
    })
}

pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(handlers::hello)))
        .service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(
            web::scope("/user")
                .service(
                    web::resource("")
                        .route(web::get().to(users::get_all_users))
                        .route(web::post().to(users::register))
                        .route(web::patch().to(users::update_user)),
                )
                .service(
                    web::resource("/interactions")
                        .route(web::get().to(users::get_my_interactions)),
                )
                .service(web::resource("/me").route(web::get().to(users::me)))
                .service(web::resource("/login").route(web::post().to(users::login)))
                .service(
                    web::resource("/change-password")
                        .route(web::post().to(users::change_password)),
                )
                .service(web::resource("/verify").route(web::post().to(users::verify)))
                .service(
                    web::resource("/reset-password")
                        .route(web::post().to(users::reset_password)),
                )
                .service(
                    web::resource("/resend-verification")
                        .route(web::post().to(users::resend_verification)),
                )
                .service(
                    web::resource("/{id}")
                        .route(web::get().to(users::get_user))
                        .route(web::delete().to(users::delete_user)),
                )
                .service(
                    web::resource("/{id}/interactions")
                        .route(web::get().to(users::get_user_interactions)),
                ),
        )
        .service(
            web::scope("/publications")
                .service(
                    web::resource("")
                        .route(web::get().to(publications::get_all_publications))
                        .route(web::post().to(publications::create_publication)),
                )
                .service(
                    web::resource("/genres").route(web::get().to(publications::get_genres)),
                )
                .service(
                    web::resource("/recommendations")
                        .route(web::get().to(publications::get_recommendations)),
                )
                .service(
                    web::resource("/interactions/{id}")
                        .route(web::patch().to(interactions::complete_interaction)),
                )
                .service(
                    web::resource("/{id}")
                        .route(web::get().to(publications::get_publication))
                        .route(web::put().to(publications::update_publication))
                        .route(web::delete().to(publications::delete_publication)),
                )
                .service(
                    web::resource("/{id}/interactions")
                        .route(web::post().to(interactions::create_interaction))
                        .route(web::get().to(interactions::get_publication_interactions)),
                ),
        )
        .service(
            web::scope("/reviews")
                .service(
                    web::resource("")
                        .route(web::get().to(reviews::get_all_reviews))
                        .route(web::post().to(reviews::create_review)),
                )
                .service(
                    web::resource("/received/{id}")
                        .route(web::get().to(reviews::get_reviews_received)),
                )
                .service(
                    web::resource("/given/{id}").route(web::get().to(reviews::get_reviews_given)),
                )
                .service(
                    web::resource("/rating/{id}").route(web::get().to(reviews::get_user_rating)),
                )
                .service(web::resource("/{id}").route(web::get().to(reviews::get_review))),
        );
}
