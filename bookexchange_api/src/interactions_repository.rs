pub use in_memory_interactions_repository::InMemoryInteractionsRepository;
pub use postgres_interactions_repository::PostgresInteractionsRepository;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::api::{
    Interaction, InteractionId, InteractionStatus, InteractionType, PublicationId, UserId,
};

mod in_memory_interactions_repository;
mod postgres_interactions_repository;

#[derive(thiserror::Error, Debug)]
pub enum InteractionsRepositoryError {
    #[error("Interaction {0} not found")]
    NotFound(InteractionId),

    #[error("Failed to deserialize interaction: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait InteractionsRepository: Send + Sync {
    /// Creates the interaction of `user_id` with the publication, or refreshes the type of the
    /// existing one. An existing interaction keeps its id, status and email flags
    async fn upsert_interaction(
        &self,
        user_id: UserId,
        publication_id: PublicationId,
        interaction_type: InteractionType,
    ) -> Result<Interaction, InteractionsRepositoryError>;

    async fn get_interaction(
        &self,
        id: InteractionId,
    ) -> Result<Interaction, InteractionsRepositoryError>;

    /// Interactions with given publication, oldest first
    async fn list_for_publication(
        &self,
        publication_id: PublicationId,
    ) -> Result<Vec<Interaction>, InteractionsRepositoryError>;

    /// Interactions of given user, newest first. Includes detached ones
    async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Interaction>, InteractionsRepositoryError>;

    /// Publications for which some user other than `user_id` has a COMPLETED interaction
    async fn completed_by_others(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PublicationId>, InteractionsRepositoryError>;

    async fn set_status(
        &self,
        id: InteractionId,
        status: InteractionStatus,
    ) -> Result<Interaction, InteractionsRepositoryError>;

    async fn mark_email_sent(
        &self,
        id: InteractionId,
        sent_at: DateTime<Utc>,
    ) -> Result<Interaction, InteractionsRepositoryError>;

    /// Clears the publication of all its interactions, returns how many were detached
    async fn detach_publication(
        &self,
        publication_id: PublicationId,
    ) -> Result<u64, InteractionsRepositoryError>;

    /// Number of interactions per publication, detached ones are not counted
    async fn interaction_counts(
        &self,
    ) -> Result<HashMap<PublicationId, usize>, InteractionsRepositoryError>;
}
