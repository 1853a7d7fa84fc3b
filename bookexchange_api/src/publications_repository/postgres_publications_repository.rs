use anyhow::Context;
use chrono::Utc;
use tokio_postgres::{Client, Row, Statement};
use uuid::Uuid;

use crate::api::{
    BookState, NewPublication, Publication, PublicationId, PublicationStatus, PublicationType,
    PublicationUpdate, UserId,
};
use crate::postgres::{connect, PostgresConfig};
use crate::publications_repository::{PublicationsRepository, PublicationsRepositoryError};

const PUBLICATION_COLUMNS: &str = "id, title, author, language, genres, book_state, description, \
     publication_type, price, image, book_id, owner_id, status, created_at, updated_at";

pub struct PostgresPublicationsRepository {
    client: Client,
}

impl PostgresPublicationsRepository {
    pub async fn init(config: PostgresConfig) -> anyhow::Result<Self> {
        let client = connect(&config).await?;

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS publications (
            id                  UUID PRIMARY KEY,
            title               TEXT NOT NULL,
            author              TEXT NOT NULL,
            language            TEXT NOT NULL,
            genres              TEXT[] NOT NULL,
            book_state          TEXT NOT NULL,
            description         TEXT NOT NULL,
            publication_type    TEXT NOT NULL,
            price               DOUBLE PRECISION NOT NULL,
            image               TEXT NOT NULL,
            book_id             TEXT,
            owner_id            UUID NOT NULL,
            status              TEXT NOT NULL,
            created_at          TIMESTAMPTZ NOT NULL,
            updated_at          TIMESTAMPTZ NOT NULL
            )
        ",
            )
            .await
            .context("Failed to setup publications table")?;

        Ok(Self { client })
    }
}

fn publication_from_row(row: &Row) -> Result<Publication, PublicationsRepositoryError> {
    let book_state: String = row.try_get(5)?;
    let publication_type: String = row.try_get(7)?;
    let status: String = row.try_get(12)?;

    Ok(Publication {
        id: row.try_get(0)?,
        title: row.try_get(1)?,
        author: row.try_get(2)?,
        language: row.try_get(3)?,
        genres: row.try_get(4)?,
        book_state: BookState::from_code(&book_state).ok_or_else(|| {
            PublicationsRepositoryError::Other(format!("Unknown book state {book_state}"))
        })?,
        description: row.try_get(6)?,
        publication_type: PublicationType::from_code(&publication_type).ok_or_else(|| {
            PublicationsRepositoryError::Other(format!(
                "Unknown publication type {publication_type}"
            ))
        })?,
        price: row.try_get(8)?,
        image: row.try_get(9)?,
        book_id: row.try_get(10)?,
        owner_id: row.try_get(11)?,
        status: PublicationStatus::from_code(&status).ok_or_else(|| {
            PublicationsRepositoryError::Other(format!("Unknown publication status {status}"))
        })?,
        created_at: row.try_get(13)?,
        updated_at: row.try_get(14)?,
    })
}

fn single_publication(
    rows: &[Row],
    id: PublicationId,
) -> Result<Publication, PublicationsRepositoryError> {
    publication_from_row(
        rows.first()
            .ok_or(PublicationsRepositoryError::NotFound(id))?,
    )
}

#[async_trait::async_trait]
impl PublicationsRepository for PostgresPublicationsRepository {
    async fn add_publication(
        &self,
        owner_id: UserId,
        details: NewPublication,
    ) -> Result<Publication, PublicationsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "INSERT INTO publications ({PUBLICATION_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14) \
                 RETURNING {PUBLICATION_COLUMNS}"
            ))
            .await?;

        let id = Uuid::new_v4();
        let rows = self
            .client
            .query(
                &stmt,
                &[
                    &id,
                    &details.title,
                    &details.author,
                    &details.language,
                    &details.genres,
                    &details.book_state.code(),
                    &details.description,
                    &details.publication_type.code(),
                    &details.price,
                    &details.image,
                    &details.book_id,
                    &owner_id,
                    &PublicationStatus::Available.code(),
                    &Utc::now(),
                ],
            )
            .await?;

        single_publication(&rows, id)
    }

    async fn get_publication(
        &self,
        id: PublicationId,
    ) -> Result<Publication, PublicationsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "SELECT {PUBLICATION_COLUMNS} FROM publications WHERE id = $1"
            ))
            .await?;

        let rows = self.client.query(&stmt, &[&id]).await?;
        single_publication(&rows, id)
    }

    async fn list_publications(&self) -> Result<Vec<Publication>, PublicationsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "SELECT {PUBLICATION_COLUMNS} FROM publications ORDER BY created_at DESC"
            ))
            .await?;

        let rows = self.client.query(&stmt, &[]).await?;
        rows.iter().map(publication_from_row).collect()
    }

    async fn get_publications(
        &self,
        ids: &[PublicationId],
    ) -> Result<Vec<Publication>, PublicationsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "SELECT {PUBLICATION_COLUMNS} FROM publications WHERE id = ANY($1) \
                 ORDER BY created_at DESC"
            ))
            .await?;

        let rows = self.client.query(&stmt, &[&ids]).await?;
        rows.iter().map(publication_from_row).collect()
    }

    async fn update_publication(
        &self,
        id: PublicationId,
        update: PublicationUpdate,
    ) -> Result<Publication, PublicationsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "UPDATE publications SET \
                 description = COALESCE($1, description), \
                 book_state = COALESCE($2, book_state), \
                 publication_type = COALESCE($3, publication_type), \
                 language = COALESCE($4, language), \
                 price = COALESCE($5, price), \
                 updated_at = $6 \
                 WHERE id = $7 RETURNING {PUBLICATION_COLUMNS}"
            ))
            .await?;

        let rows = self
            .client
            .query(
                &stmt,
                &[
                    &update.description,
                    &update.state.map(|state| state.code()),
                    &update
                        .publication_type
                        .map(|publication_type| publication_type.code()),
                    &update.language,
                    &update.price,
                    &Utc::now(),
                    &id,
                ],
            )
            .await?;

        single_publication(&rows, id)
    }

    async fn set_status(
        &self,
        id: PublicationId,
        status: PublicationStatus,
    ) -> Result<Publication, PublicationsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "UPDATE publications SET status = $1, updated_at = $2 \
                 WHERE id = $3 RETURNING {PUBLICATION_COLUMNS}"
            ))
            .await?;

        let rows = self
            .client
            .query(&stmt, &[&status.code(), &Utc::now(), &id])
            .await?;
        single_publication(&rows, id)
    }

    async fn delete_publication(
        &self,
        id: PublicationId,
    ) -> Result<Publication, PublicationsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "DELETE FROM publications WHERE id = $1 RETURNING {PUBLICATION_COLUMNS}"
            ))
            .await?;

        let rows = self.client.query(&stmt, &[&id]).await?;
        single_publication(&rows, id)
    }

    async fn list_genres(&self) -> Result<Vec<String>, PublicationsRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(
                "SELECT DISTINCT genre FROM publications, unnest(genres) AS genre ORDER BY genre",
            )
            .await?;

        let rows = self.client.query(&stmt, &[]).await?;
        rows.iter().map(|row| Ok(row.try_get(0)?)).collect()
    }
}
