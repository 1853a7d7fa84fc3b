use actix_web::web;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UPPERCASE: Regex = Regex::new(r"[A-Z]").unwrap();
    static ref LOWERCASE: Regex = Regex::new(r"[a-z]").unwrap();
    static ref DIGIT: Regex = Regex::new(r"\d").unwrap();
    static ref MIN_LENGTH: Regex = Regex::new(r".{8}").unwrap();
    static ref EMAIL: Regex = Regex::new(r"^[\w\-.]+@([\w-]+\.)+[\w-]{2,4}$").unwrap();
}

#[derive(thiserror::Error, Debug)]
pub enum CredentialsError {
    #[error("Failed to hash password {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Blocking task failed {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

/// Password needs an upper-case letter, a lower-case letter, a digit and at least 8 characters
pub fn is_safe_password(password: &str) -> bool {
    UPPERCASE.is_match(password)
        && LOWERCASE.is_match(password)
        && DIGIT.is_match(password)
        && MIN_LENGTH.is_match(password)
}

/// Expects an already lower-cased email
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Rules applied when a user logs in
#[derive(Debug, Clone, Copy, Default)]
pub struct LoginPolicy {
    /// Refuse login until the email address was verified
    pub require_validated_login: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hashes on the blocking thread pool, bcrypt is deliberately slow
    pub async fn hash(&self, password: String) -> Result<String, CredentialsError> {
        let cost = self.cost;
        Ok(web::block(move || bcrypt::hash(password, cost)).await??)
    }

    pub async fn verify(&self, password: String, hash: String) -> Result<bool, CredentialsError> {
        Ok(web::block(move || bcrypt::verify(password, &hash)).await??)
    }
}
