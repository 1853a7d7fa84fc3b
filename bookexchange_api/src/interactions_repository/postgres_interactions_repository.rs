use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio_postgres::{Client, Row, Statement};
use uuid::Uuid;

use crate::api::{
    Interaction, InteractionId, InteractionStatus, InteractionType, PublicationId, UserId,
};
use crate::interactions_repository::{InteractionsRepository, InteractionsRepositoryError};
use crate::postgres::{connect, PostgresConfig};

const INTERACTION_COLUMNS: &str = "id, user_id, publication_id, interaction_type, status, \
     email_sent, email_sent_at, created_at, updated_at";

pub struct PostgresInteractionsRepository {
    client: Client,
}

impl PostgresInteractionsRepository {
    pub async fn init(config: PostgresConfig) -> anyhow::Result<Self> {
        let client = connect(&config).await?;

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS interactions (
            id                  UUID PRIMARY KEY,
            user_id             UUID NOT NULL,
            publication_id      UUID,
            interaction_type    TEXT NOT NULL,
            status              TEXT NOT NULL,
            email_sent          BOOLEAN NOT NULL DEFAULT FALSE,
            email_sent_at       TIMESTAMPTZ,
            created_at          TIMESTAMPTZ NOT NULL,
            updated_at          TIMESTAMPTZ NOT NULL,
            UNIQUE (user_id, publication_id)
            )
        ",
            )
            .await
            .context("Failed to setup interactions table")?;

        Ok(Self { client })
    }

    async fn single(
        &self,
        query: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        id: InteractionId,
    ) -> Result<Interaction, InteractionsRepositoryError> {
        let stmt: Statement = self.client.prepare(query).await?;
        let rows = self.client.query(&stmt, params).await?;
        interaction_from_row(
            rows.first()
                .ok_or(InteractionsRepositoryError::NotFound(id))?,
        )
    }

    async fn many(
        &self,
        query: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<Interaction>, InteractionsRepositoryError> {
        let stmt: Statement = self.client.prepare(query).await?;
        let rows = self.client.query(&stmt, params).await?;
        rows.iter().map(interaction_from_row).collect()
    }
}

fn interaction_from_row(row: &Row) -> Result<Interaction, InteractionsRepositoryError> {
    let interaction_type: String = row.try_get(3)?;
    let status: String = row.try_get(4)?;

    Ok(Interaction {
        id: row.try_get(0)?,
        user_id: row.try_get(1)?,
        publication_id: row.try_get(2)?,
        interaction_type: InteractionType::from_code(&interaction_type).ok_or_else(|| {
            InteractionsRepositoryError::Other(format!(
                "Unknown interaction type {interaction_type}"
            ))
        })?,
        status: InteractionStatus::from_code(&status).ok_or_else(|| {
            InteractionsRepositoryError::Other(format!("Unknown interaction status {status}"))
        })?,
        email_sent: row.try_get(5)?,
        email_sent_at: row.try_get(6)?,
        created_at: row.try_get(7)?,
        updated_at: row.try_get(8)?,
    })
}

#[async_trait::async_trait]
impl InteractionsRepository for PostgresInteractionsRepository {
    async fn upsert_interaction(
        &self,
        user_id: UserId,
        publication_id: PublicationId,
        interaction_type: InteractionType,
    ) -> Result<Interaction, InteractionsRepositoryError> {
        let id = Uuid::new_v4();
        self.single(
            &format!(
                "INSERT INTO interactions \
                 (id, user_id, publication_id, interaction_type, status, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $6) \
                 ON CONFLICT (user_id, publication_id) DO UPDATE SET \
                 interaction_type = EXCLUDED.interaction_type, updated_at = EXCLUDED.updated_at \
                 RETURNING {INTERACTION_COLUMNS}"
            ),
            &[
                &id,
                &user_id,
                &publication_id,
                &interaction_type.code(),
                &InteractionStatus::Pending.code(),
                &Utc::now(),
            ],
            id,
        )
        .await
    }

    async fn get_interaction(
        &self,
        id: InteractionId,
    ) -> Result<Interaction, InteractionsRepositoryError> {
        self.single(
            &format!("SELECT {INTERACTION_COLUMNS} FROM interactions WHERE id = $1"),
            &[&id],
            id,
        )
        .await
    }

    async fn list_for_publication(
        &self,
        publication_id: PublicationId,
    ) -> Result<Vec<Interaction>, InteractionsRepositoryError> {
        self.many(
            &format!(
                "SELECT {INTERACTION_COLUMNS} FROM interactions \
                 WHERE publication_id = $1 ORDER BY created_at"
            ),
            &[&publication_id],
        )
        .await
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Interaction>, InteractionsRepositoryError> {
        self.many(
            &format!(
                "SELECT {INTERACTION_COLUMNS} FROM interactions \
                 WHERE user_id = $1 ORDER BY created_at DESC"
            ),
            &[&user_id],
        )
        .await
    }

    async fn completed_by_others(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PublicationId>, InteractionsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(
                "SELECT DISTINCT publication_id FROM interactions \
                 WHERE status = $1 AND user_id <> $2 AND publication_id IS NOT NULL",
            )
            .await?;

        let rows = self
            .client
            .query(&stmt, &[&InteractionStatus::Completed.code(), &user_id])
            .await?;
        rows.iter().map(|row| Ok(row.try_get(0)?)).collect()
    }

    async fn set_status(
        &self,
        id: InteractionId,
        status: InteractionStatus,
    ) -> Result<Interaction, InteractionsRepositoryError> {
        self.single(
            &format!(
                "UPDATE interactions SET status = $1, updated_at = $2 \
                 WHERE id = $3 RETURNING {INTERACTION_COLUMNS}"
            ),
            &[&status.code(), &Utc::now(), &id],
            id,
        )
        .await
    }

    async fn mark_email_sent(
        &self,
        id: InteractionId,
        sent_at: DateTime<Utc>,
    ) -> Result<Interaction, InteractionsRepositoryError> {
        self.single(
            &format!(
                "UPDATE interactions SET email_sent = TRUE, email_sent_at = $1, updated_at = $2 \
                 WHERE id = $3 RETURNING {INTERACTION_COLUMNS}"
            ),
            &[&sent_at, &Utc::now(), &id],
            id,
        )
        .await
    }

    async fn detach_publication(
        &self,
        publication_id: PublicationId,
    ) -> Result<u64, InteractionsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(
                "UPDATE interactions SET publication_id = NULL, updated_at = $1 \
                 WHERE publication_id = $2",
            )
            .await?;

        Ok(self
            .client
            .execute(&stmt, &[&Utc::now(), &publication_id])
            .await?)
    }

    async fn interaction_counts(
        &self,
    ) -> Result<HashMap<PublicationId, usize>, InteractionsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(
                "SELECT publication_id, COUNT(*) FROM interactions \
                 WHERE publication_id IS NOT NULL GROUP BY publication_id",
            )
            .await?;

        let rows = self.client.query(&stmt, &[]).await?;
        rows.iter()
            .map(|row| {
                let publication_id: PublicationId = row.try_get(0)?;
                let count: i64 = row.try_get(1)?;
                Ok((publication_id, count as usize))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests_postgres_interactions_repository {
    use serial_test::file_serial;

    use super::*;
    use crate::postgres::test_support::start_postgres_container_and_init;

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    /// Covers the interaction lifecycle
    /// 1. Creates interaction, it starts PENDING without email sent
    /// 2. Marks email as sent, upserts it again with other type - same id, flag kept
    /// 3. Completes it, it's listed as completed for others only
    /// 4. Detaches the publication
    async fn test_interaction_lifecycle() {
        let (_container, repository) =
            start_postgres_container_and_init(PostgresInteractionsRepository::init).await;
        let user_id = Uuid::new_v4();
        let other_user_id = Uuid::new_v4();
        let publication_id = Uuid::new_v4();

        let created = repository
            .upsert_interaction(user_id, publication_id, InteractionType::Like)
            .await
            .unwrap();
        assert_eq!(created.status, InteractionStatus::Pending);
        assert!(!created.email_sent);
        assert_eq!(created.email_sent_at, None);

        let marked = repository
            .mark_email_sent(created.id, Utc::now())
            .await
            .unwrap();
        assert!(marked.email_sent);

        let upserted = repository
            .upsert_interaction(user_id, publication_id, InteractionType::Trade)
            .await
            .unwrap();
        assert_eq!(upserted.id, created.id);
        assert_eq!(upserted.interaction_type, InteractionType::Trade);
        assert!(upserted.email_sent);
        assert_eq!(upserted.email_sent_at, marked.email_sent_at);

        repository
            .upsert_interaction(other_user_id, publication_id, InteractionType::Like)
            .await
            .unwrap();
        assert_eq!(
            repository.list_for_publication(publication_id).await.unwrap().len(),
            2
        );
        assert_eq!(
            repository.interaction_counts().await.unwrap(),
            HashMap::from([(publication_id, 2)])
        );

        repository
            .set_status(created.id, InteractionStatus::Completed)
            .await
            .unwrap();
        assert_eq!(
            repository.completed_by_others(other_user_id).await.unwrap(),
            vec![publication_id]
        );
        assert!(repository
            .completed_by_others(user_id)
            .await
            .unwrap()
            .is_empty());

        assert_eq!(repository.detach_publication(publication_id).await.unwrap(), 2);
        assert!(repository
            .list_for_publication(publication_id)
            .await
            .unwrap()
            .is_empty());
        let user_interactions = repository.list_for_user(user_id).await.unwrap();
        assert_eq!(user_interactions.len(), 1);
        assert_eq!(user_interactions[0].publication_id, None);
        assert_eq!(
            user_interactions[0].status,
            InteractionStatus::Completed
        );

        assert!(matches!(
            repository.get_interaction(Uuid::new_v4()).await,
            Err(InteractionsRepositoryError::NotFound(..))
        ));
    }
}
