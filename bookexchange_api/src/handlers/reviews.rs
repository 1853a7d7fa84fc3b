use actix_web::{Error, HttpResponse};
use paperclip::actix::{api_v2_operation, web};

use crate::api::{ErrorResponse, NewReview, RatingResponse, Review, ReviewId, UserId};
use crate::auth::AuthenticatedUser;
use crate::errors;
use crate::handlers::{internal_error, ReviewsRepositoryData};
use crate::reviews_repository::ReviewsRepositoryError;

const RATING_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

/// Mean of the ratings, 0 for no reviews
pub fn average_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    reviews.iter().map(|review| review.rating as f64).sum::<f64>() / reviews.len() as f64
}

#[api_v2_operation]
pub async fn get_all_reviews(
    reviews_repository: ReviewsRepositoryData,
) -> Result<HttpResponse, Error> {
    Ok(match reviews_repository.list_reviews().await {
        Ok(reviews) => HttpResponse::Ok().json(reviews),
        Err(err) => internal_error("List reviews", err),
    })
}

#[api_v2_operation]
pub async fn get_review(
    reviews_repository: ReviewsRepositoryData,
    review_id: web::Path<ReviewId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match reviews_repository.get_review(review_id.into_inner()).await {
            Ok(review) => HttpResponse::Ok().json(review),
            Err(ReviewsRepositoryError::NotFound(_)) => {
                HttpResponse::NotFound().json(ErrorResponse::new("Review not found"))
            }
            Err(err) => internal_error("Get review", err),
        },
    )
}

#[api_v2_operation]
/// Reviews another user, the caller is the author
pub async fn create_review(
    user: AuthenticatedUser,
    reviews_repository: ReviewsRepositoryData,
    new_review: web::Json<NewReview>,
) -> Result<HttpResponse, Error> {
    let new_review = new_review.into_inner();
    if !RATING_RANGE.contains(&new_review.rating) || new_review.reviewed_user_id == user.0.id {
        return Ok(HttpResponse::BadRequest().json(errors::BAD_REQUEST));
    }

    Ok(
        match reviews_repository.add_review(user.0.id, new_review).await {
            Ok(review) => {
                tracing::info!(
                    "User {} reviewed user {}",
                    review.user_id,
                    review.reviewed_user_id
                );
                HttpResponse::Created().json(review)
            }
            Err(err) => internal_error("Create review", err),
        },
    )
}

#[api_v2_operation]
/// Reviews written about given user
pub async fn get_reviews_received(
    reviews_repository: ReviewsRepositoryData,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match reviews_repository.list_received(user_id.into_inner()).await {
            Ok(reviews) => HttpResponse::Ok().json(reviews),
            Err(err) => internal_error("List received reviews", err),
        },
    )
}

#[api_v2_operation]
/// Reviews written by given user
pub async fn get_reviews_given(
    reviews_repository: ReviewsRepositoryData,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match reviews_repository.list_given(user_id.into_inner()).await {
            Ok(reviews) => HttpResponse::Ok().json(reviews),
            Err(err) => internal_error("List given reviews", err),
        },
    )
}

#[api_v2_operation]
pub async fn get_user_rating(
    reviews_repository: ReviewsRepositoryData,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match reviews_repository.list_received(user_id.into_inner()).await {
            Ok(reviews) => HttpResponse::Ok().json(RatingResponse {
                average: average_rating(&reviews),
            }),
            Err(err) => internal_error("Compute rating", err),
        },
    )
}
