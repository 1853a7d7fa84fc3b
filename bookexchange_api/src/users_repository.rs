pub use in_memory_users_repository::InMemoryUsersRepository;
pub use postgres_users_repository::PostgresUsersRepository;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::{User, UserId};

mod in_memory_users_repository;
mod postgres_users_repository;

#[derive(Debug, thiserror::Error)]
pub enum UsersRepositoryError {
    #[error("User {0} not found")]
    NotFound(UserId),

    #[error("Email {0} already registered")]
    EmailAlreadyRegistered(String),

    #[error("Failed to deserialize user: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

/// Account to be created. Email is expected to be already lower-cased and validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserRecord {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub birthdate: Option<NaiveDate>,
    pub is_admin: bool,
    pub is_validated: bool,
}

impl NewUserRecord {
    pub fn new(name: &str, email: &str, password_hash: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            birthdate: None,
            is_admin: false,
            is_validated: false,
        }
    }
}

/// Merge patch for a stored user, fields set to None stay untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_validated: Option<bool>,
}

/// User together with the password hash, only used to check credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[async_trait::async_trait]
pub trait UsersRepository: Send + Sync {
    /// Stores a new account, emails are unique
    async fn add_user(&self, user: NewUserRecord) -> Result<User, UsersRepositoryError>;

    async fn get_user(&self, id: UserId) -> Result<User, UsersRepositoryError>;

    /// Returns the users that exist among `ids`, in no particular order
    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, UsersRepositoryError>;

    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, UsersRepositoryError>;

    /// Lists users newest first
    async fn list_users(
        &self,
        skip: usize,
        take: Option<usize>,
    ) -> Result<Vec<User>, UsersRepositoryError>;

    async fn update_user(
        &self,
        id: UserId,
        update: UserUpdate,
    ) -> Result<User, UsersRepositoryError>;

    /// Removes the account and returns it
    async fn delete_user(&self, id: UserId) -> Result<User, UsersRepositoryError>;
}
