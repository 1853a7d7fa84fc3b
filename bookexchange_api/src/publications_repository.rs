pub use in_memory_publications_repository::InMemoryPublicationsRepository;
pub use postgres_publications_repository::PostgresPublicationsRepository;

use crate::api::{
    NewPublication, Publication, PublicationId, PublicationStatus, PublicationUpdate, UserId,
};

mod in_memory_publications_repository;
mod postgres_publications_repository;

#[derive(thiserror::Error, Debug)]
pub enum PublicationsRepositoryError {
    #[error("Publication {0} not found")]
    NotFound(PublicationId),

    #[error("Failed to deserialize publication: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait PublicationsRepository: Send + Sync {
    /// Stores a new AVAILABLE publication owned by `owner_id`
    async fn add_publication(
        &self,
        owner_id: UserId,
        details: NewPublication,
    ) -> Result<Publication, PublicationsRepositoryError>;

    async fn get_publication(
        &self,
        id: PublicationId,
    ) -> Result<Publication, PublicationsRepositoryError>;

    /// Lists all publications, newest first
    async fn list_publications(&self) -> Result<Vec<Publication>, PublicationsRepositoryError>;

    /// Returns the publications that exist among `ids`
    async fn get_publications(
        &self,
        ids: &[PublicationId],
    ) -> Result<Vec<Publication>, PublicationsRepositoryError>;

    async fn update_publication(
        &self,
        id: PublicationId,
        update: PublicationUpdate,
    ) -> Result<Publication, PublicationsRepositoryError>;

    async fn set_status(
        &self,
        id: PublicationId,
        status: PublicationStatus,
    ) -> Result<Publication, PublicationsRepositoryError>;

    /// Removes the publication and returns it
    async fn delete_publication(
        &self,
        id: PublicationId,
    ) -> Result<Publication, PublicationsRepositoryError>;

    /// Distinct genres of all publications, sorted
    async fn list_genres(&self) -> Result<Vec<String>, PublicationsRepositoryError>;
}
