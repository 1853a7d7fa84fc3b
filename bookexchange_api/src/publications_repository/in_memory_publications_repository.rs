use std::collections::HashMap;

use chrono::Utc;
use itertools::Itertools;
use uuid::Uuid;

use crate::api::{
    NewPublication, Publication, PublicationId, PublicationStatus, PublicationUpdate, UserId,
};
use crate::publications_repository::{PublicationsRepository, PublicationsRepositoryError};

#[derive(Default)]
pub struct InMemoryPublicationsRepository {
    publications: parking_lot::RwLock<HashMap<PublicationId, Publication>>,
}

#[async_trait::async_trait]
impl PublicationsRepository for InMemoryPublicationsRepository {
    async fn add_publication(
        &self,
        owner_id: UserId,
        details: NewPublication,
    ) -> Result<Publication, PublicationsRepositoryError> {
        let now = Utc::now();
        let publication = Publication {
            id: Uuid::new_v4(),
            title: details.title,
            author: details.author,
            language: details.language,
            genres: details.genres,
            book_state: details.book_state,
            description: details.description,
            publication_type: details.publication_type,
            price: details.price,
            image: details.image,
            book_id: details.book_id,
            owner_id,
            status: PublicationStatus::Available,
            created_at: now,
            updated_at: now,
        };
        self.publications
            .write()
            .insert(publication.id, publication.clone());
        Ok(publication)
    }

    async fn get_publication(
        &self,
        id: PublicationId,
    ) -> Result<Publication, PublicationsRepositoryError> {
        self.publications
            .read()
            .get(&id)
            .cloned()
            .ok_or(PublicationsRepositoryError::NotFound(id))
    }

    async fn list_publications(&self) -> Result<Vec<Publication>, PublicationsRepositoryError> {
        Ok(self
            .publications
            .read()
            .values()
            .cloned()
            .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
            .collect())
    }

    async fn get_publications(
        &self,
        ids: &[PublicationId],
    ) -> Result<Vec<Publication>, PublicationsRepositoryError> {
        let locked_publications = self.publications.read();
        Ok(ids
            .iter()
            .unique()
            .filter_map(|id| locked_publications.get(id).cloned())
            .collect())
    }

    async fn update_publication(
        &self,
        id: PublicationId,
        update: PublicationUpdate,
    ) -> Result<Publication, PublicationsRepositoryError> {
        let mut locked_publications = self.publications.write();
        let publication = locked_publications
            .get_mut(&id)
            .ok_or(PublicationsRepositoryError::NotFound(id))?;

        if let Some(description) = update.description {
            publication.description = description;
        }
        if let Some(state) = update.state {
            publication.book_state = state;
        }
        if let Some(publication_type) = update.publication_type {
            publication.publication_type = publication_type;
        }
        if let Some(language) = update.language {
            publication.language = language;
        }
        if let Some(price) = update.price {
            publication.price = price;
        }
        publication.updated_at = Utc::now();

        Ok(publication.clone())
    }

    async fn set_status(
        &self,
        id: PublicationId,
        status: PublicationStatus,
    ) -> Result<Publication, PublicationsRepositoryError> {
        let mut locked_publications = self.publications.write();
        let publication = locked_publications
            .get_mut(&id)
            .ok_or(PublicationsRepositoryError::NotFound(id))?;
        publication.status = status;
        publication.updated_at = Utc::now();
        Ok(publication.clone())
    }

    async fn delete_publication(
        &self,
        id: PublicationId,
    ) -> Result<Publication, PublicationsRepositoryError> {
        self.publications
            .write()
            .remove(&id)
            .ok_or(PublicationsRepositoryError::NotFound(id))
    }

    async fn list_genres(&self) -> Result<Vec<String>, PublicationsRepositoryError> {
        Ok(self
            .publications
            .read()
            .values()
            .flat_map(|publication| publication.genres.iter().cloned())
            .sorted()
            .dedup()
            .collect())
    }
}

#[cfg(test)]
mod tests_in_memory_publications_repository {
    use crate::api::{BookState, PublicationType};

    use super::*;

    fn sample_publication(title: &str, genres: &[&str]) -> NewPublication {
        NewPublication {
            title: title.to_string(),
            author: "Ursula K. Le Guin".to_string(),
            language: "English".to_string(),
            genres: genres.iter().map(|genre| genre.to_string()).collect(),
            book_state: BookState::Used,
            description: "Some pages are folded".to_string(),
            publication_type: PublicationType::Trade,
            price: 0.0,
            image: "https://example.com/cover.png".to_string(),
            book_id: None,
        }
    }

    #[tokio::test]
    /// Simple test to cover publication management
    /// Combined into big unit test to avoid duplicate setup
    /// 1. Lists publications - expects empty
    /// 2. Adds two publications, lists them newest first
    /// 3. Updates one of them partially
    /// 4. Completes it
    /// 5. Lists genres
    /// 6. Deletes one, the other one stays
    async fn test_publication_management() {
        let repository = InMemoryPublicationsRepository::default();
        assert_eq!(repository.list_publications().await.unwrap(), vec![]);

        let owner_id = Uuid::new_v4();
        let first = repository
            .add_publication(owner_id, sample_publication("Earthsea", &["fantasy", "classic"]))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = repository
            .add_publication(owner_id, sample_publication("The Dispossessed", &["sci-fi", "classic"]))
            .await
            .unwrap();
        assert_eq!(first.status, PublicationStatus::Available);
        assert_eq!(first.owner_id, owner_id);

        assert_eq!(
            repository.list_publications().await.unwrap(),
            vec![second.clone(), first.clone()]
        );

        let updated = repository
            .update_publication(
                first.id,
                PublicationUpdate {
                    price: Some(12.5),
                    state: Some(BookState::VeryUsed),
                    publication_type: Some(PublicationType::SellTrade),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 12.5);
        assert_eq!(updated.book_state, BookState::VeryUsed);
        assert_eq!(updated.publication_type, PublicationType::SellTrade);
        assert_eq!(updated.description, first.description);
        assert_eq!(updated.title, first.title);

        let completed = repository
            .set_status(first.id, PublicationStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.status, PublicationStatus::Completed);
        assert_eq!(repository.get_publication(first.id).await.unwrap(), completed);

        assert_eq!(
            repository.list_genres().await.unwrap(),
            vec!["classic", "fantasy", "sci-fi"]
        );

        repository.delete_publication(first.id).await.unwrap();
        assert!(matches!(
            repository.get_publication(first.id).await,
            Err(PublicationsRepositoryError::NotFound(..))
        ));
        assert!(matches!(
            repository.update_publication(first.id, Default::default()).await,
            Err(PublicationsRepositoryError::NotFound(..))
        ));
        assert_eq!(
            repository
                .get_publications(&[first.id, second.id])
                .await
                .unwrap(),
            vec![second]
        );
    }
}
