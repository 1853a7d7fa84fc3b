use anyhow::Context;
use chrono::Utc;
use tokio_postgres::{Client, Row, Statement};
use uuid::Uuid;

use crate::api::{NewReview, Review, ReviewId, UserId};
use crate::postgres::{connect, PostgresConfig};
use crate::reviews_repository::{ReviewsRepository, ReviewsRepositoryError};

const REVIEW_COLUMNS: &str =
    "id, rating, comment, user_id, reviewed_user_id, publication_id, created_at";

pub struct PostgresReviewsRepository {
    client: Client,
}

impl PostgresReviewsRepository {
    pub async fn init(config: PostgresConfig) -> anyhow::Result<Self> {
        let client = connect(&config).await?;

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS reviews (
            id                  UUID PRIMARY KEY,
            rating              INTEGER NOT NULL,
            comment             TEXT NOT NULL,
            user_id             UUID NOT NULL,
            reviewed_user_id    UUID NOT NULL,
            publication_id      UUID,
            created_at          TIMESTAMPTZ NOT NULL
            )
        ",
            )
            .await
            .context("Failed to setup reviews table")?;

        Ok(Self { client })
    }

    async fn list_where(
        &self,
        condition: &str,
        user_id: Option<UserId>,
    ) -> Result<Vec<Review>, ReviewsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "SELECT {REVIEW_COLUMNS} FROM reviews {condition} ORDER BY created_at"
            ))
            .await?;

        let rows = match user_id {
            Some(user_id) => self.client.query(&stmt, &[&user_id]).await?,
            None => self.client.query(&stmt, &[]).await?,
        };
        rows.iter().map(review_from_row).collect()
    }
}

fn review_from_row(row: &Row) -> Result<Review, ReviewsRepositoryError> {
    Ok(Review {
        id: row.try_get(0)?,
        rating: row.try_get(1)?,
        comment: row.try_get(2)?,
        user_id: row.try_get(3)?,
        reviewed_user_id: row.try_get(4)?,
        publication_id: row.try_get(5)?,
        created_at: row.try_get(6)?,
    })
}

#[async_trait::async_trait]
impl ReviewsRepository for PostgresReviewsRepository {
    async fn add_review(
        &self,
        author_id: UserId,
        review: NewReview,
    ) -> Result<Review, ReviewsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 RETURNING {REVIEW_COLUMNS}"
            ))
            .await?;

        let id = Uuid::new_v4();
        let rows = self
            .client
            .query(
                &stmt,
                &[
                    &id,
                    &review.rating,
                    &review.comment,
                    &author_id,
                    &review.reviewed_user_id,
                    &review.publication_id,
                    &Utc::now(),
                ],
            )
            .await?;

        review_from_row(rows.first().ok_or_else(|| {
            ReviewsRepositoryError::Other("Review not returned".to_string())
        })?)
    }

    async fn get_review(&self, id: ReviewId) -> Result<Review, ReviewsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"))
            .await?;

        let rows = self.client.query(&stmt, &[&id]).await?;
        review_from_row(rows.first().ok_or(ReviewsRepositoryError::NotFound(id))?)
    }

    async fn list_reviews(&self) -> Result<Vec<Review>, ReviewsRepositoryError> {
        self.list_where("", None).await
    }

    async fn list_received(&self, user_id: UserId) -> Result<Vec<Review>, ReviewsRepositoryError> {
        self.list_where("WHERE reviewed_user_id = $1", Some(user_id))
            .await
    }

    async fn list_given(&self, user_id: UserId) -> Result<Vec<Review>, ReviewsRepositoryError> {
        self.list_where("WHERE user_id = $1", Some(user_id)).await
    }
}

#[cfg(test)]
mod tests_postgres_reviews_repository {
    use serial_test::file_serial;

    use super::*;
    use crate::postgres::test_support::start_postgres_container_and_init;

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    /// 1. Lists reviews - expects empty
    /// 2. Adds reviews between three users
    /// 3. Checks received and given reviews of each
    async fn test_review_management() {
        let (_container, repository) =
            start_postgres_container_and_init(PostgresReviewsRepository::init).await;
        assert_eq!(repository.list_reviews().await.unwrap(), vec![]);

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();

        let alice_about_bob = repository
            .add_review(
                alice,
                NewReview {
                    rating: 4,
                    comment: "Friendly".to_string(),
                    reviewed_user_id: bob,
                    publication_id: None,
                },
            )
            .await
            .unwrap();
        let carol_about_alice = repository
            .add_review(
                carol,
                NewReview {
                    rating: 1,
                    comment: String::new(),
                    reviewed_user_id: alice,
                    publication_id: Some(Uuid::new_v4()),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            repository.get_review(carol_about_alice.id).await.unwrap(),
            carol_about_alice
        );
        assert_eq!(
            repository.list_received(bob).await.unwrap(),
            vec![alice_about_bob.clone()]
        );
        assert_eq!(
            repository.list_given(alice).await.unwrap(),
            vec![alice_about_bob]
        );
        assert_eq!(
            repository.list_received(alice).await.unwrap(),
            vec![carol_about_alice]
        );
        assert_eq!(repository.list_reviews().await.unwrap().len(), 2);
        assert!(matches!(
            repository.get_review(Uuid::new_v4()).await,
            Err(ReviewsRepositoryError::NotFound(..))
        ));
    }
}
