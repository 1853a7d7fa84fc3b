use std::collections::HashMap;

use chrono::Utc;
use itertools::Itertools;
use uuid::Uuid;

use crate::api::{NewReview, Review, ReviewId, UserId};
use crate::reviews_repository::{ReviewsRepository, ReviewsRepositoryError};

#[derive(Default)]
pub struct InMemoryReviewsRepository {
    reviews: parking_lot::RwLock<HashMap<ReviewId, Review>>,
}

impl InMemoryReviewsRepository {
    fn filtered<F>(&self, predicate: F) -> Vec<Review>
    where
        F: Fn(&Review) -> bool,
    {
        self.reviews
            .read()
            .values()
            .filter(|review| predicate(review))
            .cloned()
            .sorted_by_key(|review| review.created_at)
            .collect()
    }
}

#[async_trait::async_trait]
impl ReviewsRepository for InMemoryReviewsRepository {
    async fn add_review(
        &self,
        author_id: UserId,
        review: NewReview,
    ) -> Result<Review, ReviewsRepositoryError> {
        let review = Review {
            id: Uuid::new_v4(),
            rating: review.rating,
            comment: review.comment,
            user_id: author_id,
            reviewed_user_id: review.reviewed_user_id,
            publication_id: review.publication_id,
            created_at: Utc::now(),
        };
        self.reviews.write().insert(review.id, review.clone());
        Ok(review)
    }

    async fn get_review(&self, id: ReviewId) -> Result<Review, ReviewsRepositoryError> {
        self.reviews
            .read()
            .get(&id)
            .cloned()
            .ok_or(ReviewsRepositoryError::NotFound(id))
    }

    async fn list_reviews(&self) -> Result<Vec<Review>, ReviewsRepositoryError> {
        Ok(self.filtered(|_| true))
    }

    async fn list_received(&self, user_id: UserId) -> Result<Vec<Review>, ReviewsRepositoryError> {
        Ok(self.filtered(|review| review.reviewed_user_id == user_id))
    }

    async fn list_given(&self, user_id: UserId) -> Result<Vec<Review>, ReviewsRepositoryError> {
        Ok(self.filtered(|review| review.user_id == user_id))
    }
}
