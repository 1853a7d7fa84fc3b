use std::collections::HashSet;

use actix_web::http::header::AUTHORIZATION;
use actix_web::web::Data;
use actix_web::{Error, HttpResponse};
use paperclip::actix::{api_v2_operation, web};
use serde_json::json;

use crate::api::{
    ChangePasswordRequest, EmailRequest, GetAllUsersResponse, InteractionWithPublication,
    LoginRequest, LoginResponse, MeResponse, NewUser, Pagination, TokenRequest, UserId,
    UserPatch, UserResponse, UserSummary,
};
use crate::auth::{AdminUser, AuthenticatedUser, JwtKeys};
use crate::credentials::{is_safe_password, is_valid_email, LoginPolicy, PasswordHasher};
use crate::errors;
use crate::handlers::{
    internal_error_code, InteractionsRepositoryData, PublicationsRepositoryData,
    UsersRepositoryData,
};
use crate::notifications::Notifier;
use crate::users_repository::{NewUserRecord, UserUpdate, UsersRepositoryError};

#[api_v2_operation]
/// Lists users newest first, admins only
pub async fn get_all_users(
    _admin: AdminUser,
    users_repository: UsersRepositoryData,
    pagination: web::Query<Pagination>,
) -> Result<HttpResponse, Error> {
    let pagination = pagination.into_inner();
    Ok(
        match users_repository
            .list_users(pagination.skip.unwrap_or_default(), pagination.take)
            .await
        {
            Ok(users) => HttpResponse::Ok().json(GetAllUsersResponse { users }),
            Err(err) => internal_error_code("List users", err),
        },
    )
}

#[api_v2_operation]
/// Interactions of the caller with publications that are still open to them
pub async fn get_my_interactions(
    user: AuthenticatedUser,
    interactions_repository: InteractionsRepositoryData,
    publications_repository: PublicationsRepositoryData,
) -> Result<HttpResponse, Error> {
    let user_id = user.0.id;
    let interactions = match interactions_repository.list_for_user(user_id).await {
        Ok(interactions) => interactions,
        Err(err) => return Ok(internal_error_code("List user interactions", err)),
    };
    let completed_by_others: HashSet<_> =
        match interactions_repository.completed_by_others(user_id).await {
            Ok(ids) => ids.into_iter().collect(),
            Err(err) => return Ok(internal_error_code("List completed interactions", err)),
        };

    let publication_ids: Vec<_> = interactions
        .iter()
        .filter_map(|interaction| interaction.publication_id)
        .filter(|id| !completed_by_others.contains(id))
        .collect();
    let publications = match publications_repository
        .get_publications(&publication_ids)
        .await
    {
        Ok(publications) => publications,
        Err(err) => return Ok(internal_error_code("Get interacted publications", err)),
    };

    let result: Vec<InteractionWithPublication> = interactions
        .into_iter()
        .filter_map(|interaction| {
            let publication_id = interaction.publication_id?;
            if completed_by_others.contains(&publication_id) {
                return None;
            }
            publications
                .iter()
                .find(|publication| publication.id == publication_id)
                .map(|publication| InteractionWithPublication {
                    interaction,
                    publication: publication.clone(),
                })
        })
        .collect();

    Ok(HttpResponse::Ok().json(result))
}

#[api_v2_operation]
pub async fn me(user: AuthenticatedUser) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(MeResponse { user: user.0 }))
}

#[api_v2_operation]
/// Admins see the whole account, other users only id and name
pub async fn get_user(
    caller: AuthenticatedUser,
    users_repository: UsersRepositoryData,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    Ok(match users_repository.get_user(user_id.into_inner()).await {
        Ok(user) if caller.0.is_admin => HttpResponse::Ok().json(UserResponse::success(user)),
        Ok(user) => HttpResponse::Ok().json(UserResponse::success(UserSummary::from(&user))),
        Err(UsersRepositoryError::NotFound(_)) => {
            HttpResponse::NotFound().json(errors::USER_NOT_FOUND)
        }
        Err(err) => internal_error_code("Get user", err),
    })
}

#[api_v2_operation]
/// Creates an account and sends the verification email once the response is out
pub async fn register(
    users_repository: UsersRepositoryData,
    hasher: Data<PasswordHasher>,
    keys: Data<JwtKeys>,
    notifier: Data<Notifier>,
    new_user: web::Json<NewUser>,
) -> Result<HttpResponse, Error> {
    let new_user = new_user.into_inner();
    if !is_safe_password(&new_user.password) {
        return Ok(HttpResponse::BadRequest().json(errors::INVALID_PASSWORD));
    }
    let email = new_user.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Ok(HttpResponse::BadRequest().json(errors::INVALID_EMAIL));
    }

    let password_hash = match hasher.hash(new_user.password).await {
        Ok(hash) => hash,
        Err(err) => return Ok(internal_error_code("Hash password", err)),
    };

    let record = NewUserRecord {
        birthdate: new_user.birthdate,
        ..NewUserRecord::new(&new_user.name, &email, &password_hash)
    };
    let user = match users_repository.add_user(record).await {
        Ok(user) => user,
        Err(UsersRepositoryError::EmailAlreadyRegistered(_)) => {
            return Ok(HttpResponse::Forbidden().json(errors::USER_ALREADY_EXISTS))
        }
        Err(err) => {
            tracing::error!("Create user failed {}", err);
            return Ok(HttpResponse::BadRequest().json(errors::UNKOWN_ERROR_CREATE_USER));
        }
    };

    let token = match keys.issue_email_token(user.id) {
        Ok(token) => token,
        Err(err) => {
            if let Err(delete_err) = users_repository.delete_user(user.id).await {
                tracing::error!("Failed to remove user {} {}", user.id, delete_err);
            }
            return Ok(internal_error_code("Issue verification token", err));
        }
    };

    tracing::info!("Registered user {}", user.id);
    let notified_user = user.clone();
    actix_web::rt::spawn(async move {
        notifier.welcome_or_remove(notified_user, token).await;
    });

    Ok(HttpResponse::Created().json(UserResponse::success(user)))
}

#[api_v2_operation]
/// Answers with the session token both in the `authorization` header and in the body
pub async fn login(
    users_repository: UsersRepositoryData,
    hasher: Data<PasswordHasher>,
    keys: Data<JwtKeys>,
    login_policy: Data<LoginPolicy>,
    credentials: web::Json<LoginRequest>,
) -> Result<HttpResponse, Error> {
    let LoginRequest {
        email: Some(email),
        password: Some(password),
    } = credentials.into_inner()
    else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "status": "error",
            "es": "Las credenciales tiene un formato invalido.",
            "en": "Credentials have an invalid type",
        })));
    };
    let email = email.trim().to_lowercase();

    let credentials = match users_repository.find_by_email(&email).await {
        Ok(Some(credentials)) => credentials,
        Ok(None) => return Ok(HttpResponse::Unauthorized().json(errors::UNREGISTERED_USER)),
        Err(err) => return Ok(internal_error_code("Find user by email", err)),
    };

    match hasher.verify(password, credentials.password_hash).await {
        Ok(true) => {}
        Ok(false) => return Ok(HttpResponse::Unauthorized().json(errors::INCORRECT_PASSWORD)),
        Err(err) => return Ok(internal_error_code("Verify password", err)),
    }

    if login_policy.require_validated_login && !credentials.user.is_validated {
        return Ok(HttpResponse::Forbidden().json(errors::UNVALIDATED));
    }

    Ok(match keys.issue_session_token(credentials.user.id) {
        Ok(token) => HttpResponse::Ok()
            .append_header((AUTHORIZATION, token.clone()))
            .json(LoginResponse {
                authorization: token,
            }),
        Err(err) => internal_error_code("Issue session token", err),
    })
}

#[api_v2_operation]
/// Sets a new password for the user named by the emailed token
pub async fn change_password(
    users_repository: UsersRepositoryData,
    hasher: Data<PasswordHasher>,
    keys: Data<JwtKeys>,
    request: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, Error> {
    let request = request.into_inner();
    let claims = match keys.verify_email_token(request.token.as_deref().unwrap_or_default()) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!("Rejected password change token {}", err);
            return Ok(HttpResponse::Unauthorized().json(errors::TOKEN_EXPIRED));
        }
    };
    if !is_safe_password(&request.password) {
        return Ok(HttpResponse::BadRequest().json(errors::INVALID_PASSWORD));
    }

    let password_hash = match hasher.hash(request.password).await {
        Ok(hash) => hash,
        Err(err) => return Ok(internal_error_code("Hash password", err)),
    };

    Ok(
        match users_repository
            .update_user(
                claims.user_id,
                UserUpdate {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(user) => HttpResponse::Ok().json(UserResponse::success(user)),
            Err(UsersRepositoryError::NotFound(_)) => {
                HttpResponse::NotFound().json(errors::USER_NOT_FOUND)
            }
            Err(err) => internal_error_code("Change password", err),
        },
    )
}

#[api_v2_operation]
/// Marks the email of the user named by the emailed token as verified
pub async fn verify(
    users_repository: UsersRepositoryData,
    keys: Data<JwtKeys>,
    request: web::Json<TokenRequest>,
) -> Result<HttpResponse, Error> {
    let claims = match keys.verify_email_token(request.token.as_deref().unwrap_or_default()) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!("Rejected verification token {}", err);
            return Ok(HttpResponse::Unauthorized().json(errors::TOKEN_EXPIRED));
        }
    };

    Ok(
        match users_repository
            .update_user(
                claims.user_id,
                UserUpdate {
                    is_validated: Some(true),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(user) => HttpResponse::Ok().json(UserResponse::success(user)),
            Err(UsersRepositoryError::NotFound(_)) => {
                HttpResponse::NotFound().json(errors::USER_NOT_FOUND)
            }
            Err(err) => internal_error_code("Verify user", err),
        },
    )
}

#[api_v2_operation]
/// Emails a link to the password change page
pub async fn reset_password(
    users_repository: UsersRepositoryData,
    keys: Data<JwtKeys>,
    notifier: Data<Notifier>,
    request: web::Json<EmailRequest>,
) -> Result<HttpResponse, Error> {
    let email = request.email.trim().to_lowercase();
    let user = match users_repository.find_by_email(&email).await {
        Ok(Some(credentials)) => credentials.user,
        Ok(None) => return Ok(HttpResponse::Unauthorized().json(errors::UNREGISTERED_USER)),
        Err(err) => return Ok(internal_error_code("Find user by email", err)),
    };

    let token = match keys.issue_email_token(user.id) {
        Ok(token) => token,
        Err(err) => return Ok(internal_error_code("Issue password change token", err)),
    };

    Ok(match notifier.send_password_change(&user, &token).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "success" })),
        Err(err) => {
            tracing::error!("Password change email to {} failed {}", user.email, err);
            HttpResponse::InternalServerError().json(errors::EMAIL_COULD_NOT_BE_SENT)
        }
    })
}

#[api_v2_operation]
/// Sends the verification email again to a user that didn't verify yet
pub async fn resend_verification(
    users_repository: UsersRepositoryData,
    keys: Data<JwtKeys>,
    notifier: Data<Notifier>,
    request: web::Json<EmailRequest>,
) -> Result<HttpResponse, Error> {
    let email = request.email.trim().to_lowercase();
    let user = match users_repository.find_by_email(&email).await {
        Ok(Some(credentials)) => credentials.user,
        Ok(None) => return Ok(HttpResponse::Unauthorized().json(errors::UNREGISTERED_USER)),
        Err(err) => return Ok(internal_error_code("Find user by email", err)),
    };
    if user.is_validated {
        return Ok(HttpResponse::BadRequest().json(errors::ALREADY_VALIDATED));
    }

    let token = match keys.issue_email_token(user.id) {
        Ok(token) => token,
        Err(err) => return Ok(internal_error_code("Issue verification token", err)),
    };

    Ok(match notifier.send_verification(&user, &token).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "success" })),
        Err(err) => {
            tracing::error!("Verification email to {} failed {}", user.email, err);
            HttpResponse::InternalServerError().json(errors::EMAIL_COULD_NOT_BE_SENT)
        }
    })
}

#[api_v2_operation]
/// Updates a profile. Users may update themselves, admins anybody.
/// Only admins may change admin rights
pub async fn update_user(
    caller: AuthenticatedUser,
    users_repository: UsersRepositoryData,
    hasher: Data<PasswordHasher>,
    patch: web::Json<UserPatch>,
) -> Result<HttpResponse, Error> {
    let patch = patch.into_inner();
    let caller = caller.0;
    if !caller.is_admin && caller.id != patch.id {
        return Ok(HttpResponse::Forbidden().json(errors::UNAUTHORIZED));
    }

    let password_hash = match patch.password {
        Some(password) => match hasher.hash(password).await {
            Ok(hash) => Some(hash),
            Err(err) => return Ok(internal_error_code("Hash password", err)),
        },
        None => None,
    };

    let update = UserUpdate {
        name: patch.name,
        password_hash,
        birthdate: patch.birthdate,
        is_admin: patch.is_admin.filter(|_| caller.is_admin),
        is_validated: None,
    };

    Ok(match users_repository.update_user(patch.id, update).await {
        Ok(user) => HttpResponse::Ok().json(UserResponse::success(user)),
        Err(err) => {
            tracing::warn!("Update user {} failed {}", patch.id, err);
            HttpResponse::BadRequest().json(errors::BAD_REQUEST)
        }
    })
}

#[api_v2_operation]
pub async fn delete_user(
    _admin: AdminUser,
    users_repository: UsersRepositoryData,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match users_repository.delete_user(user_id.into_inner()).await {
            Ok(user) => HttpResponse::Ok().json(UserResponse::success(user)),
            Err(UsersRepositoryError::NotFound(_)) => {
                HttpResponse::NotFound().json(errors::USER_NOT_FOUND)
            }
            Err(err) => internal_error_code("Delete user", err),
        },
    )
}

#[api_v2_operation]
/// All interactions of given user, admins only
pub async fn get_user_interactions(
    _admin: AdminUser,
    interactions_repository: InteractionsRepositoryData,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match interactions_repository
            .list_for_user(user_id.into_inner())
            .await
        {
            Ok(interactions) => HttpResponse::Ok().json(interactions),
            Err(err) => internal_error_code("List user interactions", err),
        },
    )
}
