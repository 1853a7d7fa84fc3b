//! JWT handling and the extractors gating access to handlers.
//!
//! Handlers ask for one of three extractors:
//! - [`AuthenticatedUser`] rejects requests without a valid session,
//! - [`MaybeAuthenticatedUser`] never rejects, the user is simply absent,
//! - [`AdminUser`] additionally rejects users without admin rights.
use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError};
use chrono::{Duration, Utc};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::{User, UserId};
use crate::errors;
use crate::users_repository::{UsersRepository, UsersRepositoryError};

lazy_static! {
    static ref BEARER: Regex = Regex::new(r"^Bearer (.+)$").unwrap();
}

/// Claims of the token returned by login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub id: UserId,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of the short lived tokens sent by email (verification, password change)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailClaims {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    session_ttl: Duration,
    email_token_ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, session_ttl: Duration, email_token_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            session_ttl,
            email_token_ttl,
        }
    }

    pub fn issue_session_token(
        &self,
        user_id: UserId,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = SessionClaims {
            id: user_id,
            iat: now.timestamp(),
            exp: (now + self.session_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify_session_token(
        &self,
        token: &str,
    ) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        Ok(decode::<SessionClaims>(token, &self.decoding, &Validation::default())?.claims)
    }

    pub fn issue_email_token(&self, user_id: UserId) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = EmailClaims {
            user_id,
            iat: now.timestamp(),
            exp: (now + self.email_token_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify_email_token(
        &self,
        token: &str,
    ) -> Result<EmailClaims, jsonwebtoken::errors::Error> {
        Ok(decode::<EmailClaims>(token, &self.decoding, &Validation::default())?.claims)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Tienes que ingresar sesión para acceder a este recurso.")]
    Unauthenticated,

    #[error("Su sesión ha expirado")]
    Expired,

    #[error("No tiene permiso para acceder a este recurso.")]
    Forbidden,

    #[error("Failed to load user {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    message: String,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated | AuthError::Expired => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AuthError::Internal(_) => {
                HttpResponse::build(self.status_code()).json(errors::INTERNAL_SERVER)
            }
            other => HttpResponse::build(self.status_code()).json(AuthErrorBody {
                message: other.to_string(),
            }),
        }
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    BEARER
        .captures(header)
        .and_then(|captures| captures.get(1))
        .map(|token| token.as_str().to_string())
}

/// Resolves the user behind the bearer token.
/// Ok(None) means that the request carried no token at all
async fn resolve_user(req: &HttpRequest) -> Result<Option<User>, AuthError> {
    let Some(token) = bearer_token(req) else {
        return Ok(None);
    };

    let keys = req
        .app_data::<Data<JwtKeys>>()
        .ok_or_else(|| AuthError::Internal("JwtKeys not configured".to_string()))?;
    let users_repository = req
        .app_data::<Data<Arc<dyn UsersRepository>>>()
        .ok_or_else(|| AuthError::Internal("UsersRepository not configured".to_string()))?;

    let claims = keys.verify_session_token(&token).map_err(|err| {
        tracing::debug!("Rejected session token {}", err);
        AuthError::Expired
    })?;

    match users_repository.get_user(claims.id).await {
        Ok(user) => Ok(Some(user)),
        Err(UsersRepositoryError::NotFound(user_id)) => {
            tracing::warn!("Session token of removed user {}", user_id);
            Err(AuthError::Expired)
        }
        Err(err) => {
            tracing::error!("Failed to load user for session {}", err);
            Err(AuthError::Internal(err.to_string()))
        }
    }
}

/// User with a valid session
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
    type Error = AuthError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            resolve_user(&req)
                .await?
                .map(AuthenticatedUser)
                .ok_or(AuthError::Unauthenticated)
        })
    }
}

/// User if the request carried a valid session, nothing otherwise
#[derive(Debug, Clone)]
pub struct MaybeAuthenticatedUser(pub Option<User>);

impl FromRequest for MaybeAuthenticatedUser {
    type Error = AuthError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            match resolve_user(&req).await {
                Ok(user) => Ok(MaybeAuthenticatedUser(user)),
                Err(AuthError::Internal(err)) => Err(AuthError::Internal(err)),
                Err(_) => Ok(MaybeAuthenticatedUser(None)),
            }
        })
    }
}

/// User with a valid session and admin rights
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequest for AdminUser {
    type Error = AuthError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let user = resolve_user(&req)
                .await?
                .ok_or(AuthError::Unauthenticated)?;
            if user.is_admin {
                Ok(AdminUser(user))
            } else {
                Err(AuthError::Forbidden)
            }
        })
    }
}

// Extractors add nothing to the OpenAPI document
impl paperclip::v2::schema::Apiv2Schema for AuthenticatedUser {}
impl paperclip::actix::OperationModifier for AuthenticatedUser {}
impl paperclip::v2::schema::Apiv2Schema for MaybeAuthenticatedUser {}
impl paperclip::actix::OperationModifier for MaybeAuthenticatedUser {}
impl paperclip::v2::schema::Apiv2Schema for AdminUser {}
impl paperclip::actix::OperationModifier for AdminUser {}
