use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_postgres::{Client, Row, Statement};
use uuid::Uuid;

use crate::api::{User, UserId};
use crate::postgres::{connect, is_unique_violation, PostgresConfig};
use crate::users_repository::{
    NewUserRecord, UserCredentials, UserUpdate, UsersRepository, UsersRepositoryError,
};

const USER_COLUMNS: &str = "id, email, profile, created_at, updated_at";

/// Part of the user kept as JSONB, so that updates are a plain merge
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProfile {
    name: String,
    birthdate: Option<NaiveDate>,
    is_admin: bool,
    is_validated: bool,
}

pub struct PostgresUsersRepository {
    client: Client,
}

impl PostgresUsersRepository {
    pub async fn init(config: PostgresConfig) -> anyhow::Result<Self> {
        let client = connect(&config).await?;

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS users (
            id              UUID PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            password_hash   TEXT NOT NULL,
            profile         JSONB NOT NULL,
            created_at      TIMESTAMPTZ NOT NULL,
            updated_at      TIMESTAMPTZ NOT NULL
            )
        ",
            )
            .await
            .context("Failed to setup users table")?;

        Ok(Self { client })
    }
}

fn user_from_row(row: &Row) -> Result<User, UsersRepositoryError> {
    let profile: serde_json::Value = row.try_get(2)?;
    let profile: UserProfile = serde_json::from_value(profile)?;
    Ok(User {
        id: row.try_get(0)?,
        email: row.try_get(1)?,
        name: profile.name,
        birthdate: profile.birthdate,
        is_admin: profile.is_admin,
        is_validated: profile.is_validated,
        created_at: row.try_get(3)?,
        updated_at: row.try_get(4)?,
    })
}

#[async_trait::async_trait]
impl UsersRepository for PostgresUsersRepository {
    async fn add_user(&self, new_user: NewUserRecord) -> Result<User, UsersRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "INSERT INTO users (id, email, password_hash, profile, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $5) RETURNING {USER_COLUMNS}"
            ))
            .await?;

        let profile = json!(UserProfile {
            name: new_user.name,
            birthdate: new_user.birthdate,
            is_admin: new_user.is_admin,
            is_validated: new_user.is_validated,
        });

        let rows = self
            .client
            .query(
                &stmt,
                &[
                    &Uuid::new_v4(),
                    &new_user.email,
                    &new_user.password_hash,
                    &profile,
                    &Utc::now(),
                ],
            )
            .await;

        match rows {
            Ok(rows) => user_from_row(rows.first().ok_or_else(|| {
                UsersRepositoryError::Other("User not returned".to_string())
            })?),
            Err(err) if is_unique_violation(&err) => {
                Err(UsersRepositoryError::EmailAlreadyRegistered(new_user.email))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_user(&self, id: UserId) -> Result<User, UsersRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .await?;

        let rows = self.client.query(&stmt, &[&id]).await?;
        user_from_row(rows.first().ok_or(UsersRepositoryError::NotFound(id))?)
    }

    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, UsersRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
            ))
            .await?;

        let rows = self.client.query(&stmt, &[&ids]).await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, UsersRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
            ))
            .await?;

        let rows = self.client.query(&stmt, &[&email]).await?;
        rows.first()
            .map(|row| {
                Ok(UserCredentials {
                    user: user_from_row(row)?,
                    password_hash: row.try_get(5)?,
                })
            })
            .transpose()
    }

    async fn list_users(
        &self,
        skip: usize,
        take: Option<usize>,
    ) -> Result<Vec<User>, UsersRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC OFFSET $1 LIMIT $2"
            ))
            .await?;

        let skip = skip as i64;
        let take = take.map(|take| take as i64);
        let rows = self.client.query(&stmt, &[&skip, &take]).await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn update_user(
        &self,
        id: UserId,
        update: UserUpdate,
    ) -> Result<User, UsersRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "UPDATE users SET profile = profile || ($1)::JSONB, \
                 password_hash = COALESCE($2, password_hash), updated_at = $3 \
                 WHERE id = $4 RETURNING {USER_COLUMNS}"
            ))
            .await?;

        let password_hash = update.password_hash.clone();
        let profile_patch = json!(UserUpdate {
            password_hash: None,
            ..update
        });

        let rows = self
            .client
            .query(&stmt, &[&profile_patch, &password_hash, &Utc::now(), &id])
            .await?;
        user_from_row(rows.first().ok_or(UsersRepositoryError::NotFound(id))?)
    }

    async fn delete_user(&self, id: UserId) -> Result<User, UsersRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
            ))
            .await?;

        let rows = self.client.query(&stmt, &[&id]).await?;
        user_from_row(rows.first().ok_or(UsersRepositoryError::NotFound(id))?)
    }
}

#[cfg(test)]
mod tests_postgres_users_repository {
    use serial_test::file_serial;

    use super::*;
    use crate::postgres::test_support::start_postgres_container_and_init;

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    /// Simple test to cover user management
    /// Combined into big unit test to avoid duplicate setup
    /// 1. Lists users - expects empty
    /// 2. Creates user, gets it by id and by email
    /// 3. Creates user with the same email - gets rejected
    /// 4. Updates the user, email and creation date stay
    /// 5. Lists users newest first with paging
    /// 6. Deletes the user, it's gone afterwards
    async fn test_user_management() {
        let (_container, repository) =
            start_postgres_container_and_init(PostgresUsersRepository::init).await;
        assert_eq!(repository.list_users(0, None).await.unwrap(), vec![]);

        let user = repository
            .add_user(NewUserRecord {
                birthdate: NaiveDate::from_ymd_opt(1990, 5, 17),
                ..NewUserRecord::new("Reader", "reader@example.com", "hash1")
            })
            .await
            .unwrap();
        assert_eq!(user.name, "Reader");
        assert_eq!(user.birthdate, NaiveDate::from_ymd_opt(1990, 5, 17));

        assert_eq!(repository.get_user(user.id).await.unwrap(), user);
        let credentials = repository
            .find_by_email("reader@example.com")
            .await
            .unwrap()
            .expect("User not found by email");
        assert_eq!(credentials.user, user);
        assert_eq!(credentials.password_hash, "hash1");

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
                    is_admin: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.email, "reader@example.com");
        assert_eq!(updated.birthdate, user.birthdate);
        assert_eq!(updated.created_at, user.created_at);
        assert!(updated.is_admin);
        assert_eq!(
            repository
                .find_by_email("reader@example.com")
                .await
                .unwrap()
                .unwrap()
                .password_hash,
            "hash3"
        );

        let second = repository
            .add_user(NewUserRecord::new("Second", "second@example.com", "hash"))
            .await
            .unwrap();
        let listed: Vec<UserId> = repository
            .list_users(0, None)
            .await
            .unwrap()
            .into_iter()
            .map(|user| user.id)
            .collect();
        assert_eq!(listed, vec![second.id, user.id]);
        let paged = repository.list_users(1, Some(5)).await.unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].id, user.id);
        assert_eq!(
            repository
                .get_users(&[second.id, Uuid::new_v4()])
                .await
                .unwrap(),
            vec![second]
        );

        assert_eq!(repository.delete_user(user.id).await.unwrap().id, user.id);
        assert!(matches!(
            repository.get_user(user.id).await,
            Err(UsersRepositoryError::NotFound(..))
        ));
    }
}
