use std::collections::HashMap;

use chrono::Utc;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::{User, UserId};
use crate::users_repository::{
    NewUserRecord, UserCredentials, UserUpdate, UsersRepository, UsersRepositoryError,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    #[serde(flatten)]
    user: User,
    password_hash: String,
}

#[derive(Default)]
pub struct InMemoryUsersRepository {
    users: parking_lot::RwLock<HashMap<UserId, StoredUser>>,
}

#[async_trait::async_trait]
impl UsersRepository for InMemoryUsersRepository {
    async fn add_user(&self, new_user: NewUserRecord) -> Result<User, UsersRepositoryError> {
        let mut locked_users = self.users.write();
        if locked_users
            .values()
            .any(|stored| stored.user.email == new_user.email)
        {
            return Err(UsersRepositoryError::EmailAlreadyRegistered(new_user.email));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            birthdate: new_user.birthdate,
            is_admin: new_user.is_admin,
            is_validated: new_user.is_validated,
            created_at: now,
            updated_at: now,
        };
        locked_users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: new_user.password_hash,
            },
        );
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<User, UsersRepositoryError> {
        self.users
            .read()
            .get(&id)
            .map(|stored| stored.user.clone())
            .ok_or(UsersRepositoryError::NotFound(id))
    }

    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, UsersRepositoryError> {
        let locked_users = self.users.read();
        Ok(ids
            .iter()
            .unique()
            .filter_map(|id| locked_users.get(id).map(|stored| stored.user.clone()))
            .collect())
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, UsersRepositoryError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|stored| stored.user.email == email)
            .map(|stored| UserCredentials {
                user: stored.user.clone(),
                password_hash: stored.password_hash.clone(),
            }))
    }

    async fn list_users(
        &self,
        skip: usize,
        take: Option<usize>,
    ) -> Result<Vec<User>, UsersRepositoryError> {
        let users = self
            .users
            .read()
            .values()
            .map(|stored| stored.user.clone())
            .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
            .skip(skip);
        Ok(match take {
            Some(take) => users.take(take).collect(),
            None => users.collect(),
        })
    }

    async fn update_user(
        &self,
        id: UserId,
        update: UserUpdate,
    ) -> Result<User, UsersRepositoryError> {
        let mut locked_users = self.users.write();
        let stored = locked_users
            .get_mut(&id)
            .ok_or(UsersRepositoryError::NotFound(id))?;

        let mut result_user = json!(stored);
        json_patch::merge(&mut result_user, &json!(update));
        let mut result_user: StoredUser = serde_json::from_value(result_user)?;
        result_user.user.updated_at = Utc::now();
        *stored = result_user;

        Ok(stored.user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<User, UsersRepositoryError> {
        self.users
            .write()
            .remove(&id)
            .map(|stored| stored.user)
            .ok_or(UsersRepositoryError::NotFound(id))
    }
}

#[cfg(test)]
mod tests_in_memory_users_repository {
    use super::*;

    #[tokio::test]
    /// Simple test to cover user management
    /// Combined into big unit test to avoid duplicate setup
    /// 1. Lists users - expects empty
    /// 2. Creates user, gets it by id and by email
    /// 3. Creates user with the same email - gets rejected
    /// 4. Updates the user, email and creation date stay
    /// 5. Deletes the user, it's gone afterwards
    async fn test_user_management() {
        let repository = InMemoryUsersRepository::default();
        assert_eq!(repository.list_users(0, None).await.unwrap(), vec![]);

        let user = repository
            .add_user(NewUserRecord::new("Reader", "reader@example.com", "hash1"))
            .await
            .unwrap();
        assert_eq!(user.name, "Reader");
        assert!(!user.is_admin);
        assert!(!user.is_validated);

        assert_eq!(repository.get_user(user.id).await.unwrap(), user);
        let credentials = repository
            .find_by_email("reader@example.com")
            .await
            .unwrap()
            .expect("User not found by email");
        assert_eq!(credentials.user, user);
        assert_eq!(credentials.password_hash, "hash1");
        assert_eq!(
            repository.find_by_email("other@example.com").await.unwrap(),
            None
        );

        let duplicate = repository
            .add_user(NewUserRecord::new("Other", "reader@example.com", "hash2"))
            .await;
        assert!(matches!(
            duplicate,
            Err(UsersRepositoryError::EmailAlreadyRegistered(..))
        ));

        let updated = repository
            .update_user(
                user.id,
                UserUpdate {
                    name: Some("Renamed".to_string()),
                    password_hash: Some("hash3".to_string()),
                    is_validated: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.email, "reader@example.com");
        assert_eq!(updated.created_at, user.created_at);
        assert!(updated.is_validated);
        assert!(!updated.is_admin);
        assert_eq!(
            repository
                .find_by_email("reader@example.com")
                .await
                .unwrap()
                .unwrap()
                .password_hash,
            "hash3"
        );

        assert_eq!(repository.delete_user(user.id).await.unwrap().id, user.id);
        assert!(matches!(
            repository.get_user(user.id).await,
            Err(UsersRepositoryError::NotFound(..))
        ));
        assert!(matches!(
            repository.delete_user(user.id).await,
            Err(UsersRepositoryError::NotFound(..))
        ));
    }

    #[tokio::test]
    /// Lists users newest first, with paging and lookups by many ids
    async fn test_list_and_get_many() {
        let repository = InMemoryUsersRepository::default();
        let mut ids = vec![];
        for i in 0..4 {
            let user = repository
                .add_user(NewUserRecord::new(
                    &format!("user{i}"),
                    &format!("user{i}@example.com"),
                    "hash",
                ))
                .await
                .unwrap();
            ids.push(user.id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let names = |users: Vec<User>| users.into_iter().map(|u| u.name).collect::<Vec<_>>();

        assert_eq!(
            names(repository.list_users(0, None).await.unwrap()),
            vec!["user3", "user2", "user1", "user0"]
        );
        assert_eq!(
            names(repository.list_users(1, Some(2)).await.unwrap()),
            vec!["user2", "user1"]
        );

        let mut found = repository
            .get_users(&[ids[0], ids[2], ids[0], Uuid::new_v4()])
            .await
            .unwrap();
        found.sort_by_key(|user| user.name.clone());
        assert_eq!(names(found), vec!["user0", "user2"]);
    }
}
