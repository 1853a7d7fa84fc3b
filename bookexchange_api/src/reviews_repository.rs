pub use in_memory_reviews_repository::InMemoryReviewsRepository;
pub use postgres_reviews_repository::PostgresReviewsRepository;

use crate::api::{NewReview, Review, ReviewId, UserId};

mod in_memory_reviews_repository;
mod postgres_reviews_repository;

#[derive(thiserror::Error, Debug)]
pub enum ReviewsRepositoryError {
    #[error("Review {0} not found")]
    NotFound(ReviewId),

    #[error("Failed to deserialize review: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait ReviewsRepository: Send + Sync {
    /// Stores a review written by `author_id`
    async fn add_review(
        &self,
        author_id: UserId,
        review: NewReview,
    ) -> Result<Review, ReviewsRepositoryError>;

    async fn get_review(&self, id: ReviewId) -> Result<Review, ReviewsRepositoryError>;

    /// All reviews, oldest first
    async fn list_reviews(&self) -> Result<Vec<Review>, ReviewsRepositoryError>;

    /// Reviews about `user_id`
    async fn list_received(&self, user_id: UserId) -> Result<Vec<Review>, ReviewsRepositoryError>;

    /// Reviews written by `user_id`
    async fn list_given(&self, user_id: UserId) -> Result<Vec<Review>, ReviewsRepositoryError>;
}
