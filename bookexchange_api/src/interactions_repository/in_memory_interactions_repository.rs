use std::collections::HashMap;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use uuid::Uuid;

use crate::api::{
    Interaction, InteractionId, InteractionStatus, InteractionType, PublicationId, UserId,
};
use crate::interactions_repository::{InteractionsRepository, InteractionsRepositoryError};

#[derive(Default)]
pub struct InMemoryInteractionsRepository {
    interactions: parking_lot::RwLock<HashMap<InteractionId, Interaction>>,
}

impl InMemoryInteractionsRepository {
    fn update<F>(
        &self,
        id: InteractionId,
        apply: F,
    ) -> Result<Interaction, InteractionsRepositoryError>
    where
        F: FnOnce(&mut Interaction),
    {
        let mut locked_interactions = self.interactions.write();
        let interaction = locked_interactions
            .get_mut(&id)
            .ok_or(InteractionsRepositoryError::NotFound(id))?;
        apply(interaction);
        interaction.updated_at = Utc::now();
        Ok(interaction.clone())
    }
}

#[async_trait::async_trait]
impl InteractionsRepository for InMemoryInteractionsRepository {
    async fn upsert_interaction(
        &self,
        user_id: UserId,
        publication_id: PublicationId,
        interaction_type: InteractionType,
    ) -> Result<Interaction, InteractionsRepositoryError> {
        let mut locked_interactions = self.interactions.write();
        let now = Utc::now();

        if let Some(existing) = locked_interactions.values_mut().find(|interaction| {
            interaction.user_id == user_id && interaction.publication_id == Some(publication_id)
        }) {
            existing.interaction_type = interaction_type;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let interaction = Interaction {
            id: Uuid::new_v4(),
            user_id,
            publication_id: Some(publication_id),
            interaction_type,
            status: InteractionStatus::Pending,
            email_sent: false,
            email_sent_at: None,
            created_at: now,
            updated_at: now,
        };
        locked_interactions.insert(interaction.id, interaction.clone());
        Ok(interaction)
    }

    async fn get_interaction(
        &self,
        id: InteractionId,
    ) -> Result<Interaction, InteractionsRepositoryError> {
        self.interactions
            .read()
            .get(&id)
            .cloned()
            .ok_or(InteractionsRepositoryError::NotFound(id))
    }

    async fn list_for_publication(
        &self,
        publication_id: PublicationId,
    ) -> Result<Vec<Interaction>, InteractionsRepositoryError> {
        Ok(self
            .interactions
            .read()
            .values()
            .filter(|interaction| interaction.publication_id == Some(publication_id))
            .cloned()
            .sorted_by_key(|interaction| interaction.created_at)
            .collect())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Interaction>, InteractionsRepositoryError> {
        Ok(self
            .interactions
            .read()
            .values()
            .filter(|interaction| interaction.user_id == user_id)
            .cloned()
            .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
            .collect())
    }

    async fn completed_by_others(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PublicationId>, InteractionsRepositoryError> {
        Ok(self
            .interactions
            .read()
            .values()
            .filter(|interaction| {
                interaction.user_id != user_id
                    && interaction.status == InteractionStatus::Completed
            })
            .filter_map(|interaction| interaction.publication_id)
            .unique()
            .collect())
    }

    async fn set_status(
        &self,
        id: InteractionId,
        status: InteractionStatus,
    ) -> Result<Interaction, InteractionsRepositoryError> {
        self.update(id, |interaction| interaction.status = status)
    }

    async fn mark_email_sent(
        &self,
        id: InteractionId,
        sent_at: DateTime<Utc>,
    ) -> Result<Interaction, InteractionsRepositoryError> {
        self.update(id, |interaction| {
            interaction.email_sent = true;
            interaction.email_sent_at = Some(sent_at);
        })
    }

    async fn detach_publication(
        &self,
        publication_id: PublicationId,
    ) -> Result<u64, InteractionsRepositoryError> {
        let mut detached = 0;
        for interaction in self
            .interactions
            .write()
            .values_mut()
            .filter(|interaction| interaction.publication_id == Some(publication_id))
        {
            interaction.publication_id = None;
            detached += 1;
        }
        Ok(detached)
    }

    async fn interaction_counts(
        &self,
    ) -> Result<HashMap<PublicationId, usize>, InteractionsRepositoryError> {
        Ok(self
            .interactions
            .read()
            .values()
            .filter_map(|interaction| interaction.publication_id)
            .counts())
    }
}

#[cfg(test)]
mod tests_in_memory_interactions_repository {
    use super::*;

    #[tokio::test]
    /// Covers the interaction lifecycle
    /// 1. Creates interaction, it starts PENDING without email sent
    /// 2. Upserts it again with other type - same id, type refreshed
    /// 3. Marks email as sent, upsert keeps the flag
    /// 4. Completes it, it's listed as completed for others only
    /// 5. Detaches the publication
    async fn test_interaction_lifecycle() {
        let repository = InMemoryInteractionsRepository::default();
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
        assert_eq!(created.publication_id, Some(publication_id));

        let sent_at = Utc::now();
        repository.mark_email_sent(created.id, sent_at).await.unwrap();

        let upserted = repository
            .upsert_interaction(user_id, publication_id, InteractionType::Trade)
            .await
            .unwrap();
        assert_eq!(upserted.id, created.id);
        assert_eq!(upserted.interaction_type, InteractionType::Trade);
        assert!(upserted.email_sent);
        assert_eq!(upserted.email_sent_at, Some(sent_at));
        assert_eq!(
            repository.list_for_publication(publication_id).await.unwrap(),
            vec![upserted.clone()]
        );

        let other = repository
            .upsert_interaction(other_user_id, publication_id, InteractionType::Like)
            .await
            .unwrap();
        assert_ne!(other.id, created.id);
        assert_eq!(
            repository.interaction_counts().await.unwrap(),
            HashMap::from([(publication_id, 2)])
        );

        let completed = repository
            .set_status(created.id, InteractionStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.status, InteractionStatus::Completed);
        assert_eq!(
            repository.completed_by_others(other_user_id).await.unwrap(),
            vec![publication_id]
        );
        assert_eq!(
            repository.completed_by_others(user_id).await.unwrap(),
            Vec::<PublicationId>::new()
        );

        assert_eq!(repository.detach_publication(publication_id).await.unwrap(), 2);
        assert_eq!(
            repository.list_for_publication(publication_id).await.unwrap(),
            vec![]
        );
        let user_interactions = repository.list_for_user(user_id).await.unwrap();
        assert_eq!(user_interactions.len(), 1);
        assert_eq!(user_interactions[0].publication_id, None);
        assert!(repository.interaction_counts().await.unwrap().is_empty());

        assert!(matches!(
            repository.get_interaction(Uuid::new_v4()).await,
            Err(InteractionsRepositoryError::NotFound(..))
        ));
    }
}
