use anyhow::{bail, Context};
use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use reqwest_tracing::TracingMiddleware;

use crate::api::{
    InteractionCreated, InteractionId, InteractionType, InteractionWithUser, LoginRequest,
    LoginResponse, MeResponse, NewInteraction, NewPublication, NewReview, NewUser,
    PublicationDetails, PublicationId, PublicationListItem, RatingResponse, Review, User, UserId,
    UserResponse,
};

const MAX_RETRIES: u32 = 3;

/// HTTP client of the book exchange API. Calls needing a session take the
/// token returned by [`BookExchangeClient::login`]
pub struct BookExchangeClient {
    url: String,
    client: ClientWithMiddleware,
}

async fn failure(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{status} {body}")
}

impl BookExchangeClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);
        let client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn authorized(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder.header(AUTHORIZATION, format!("Bearer {token}"))
    }

    /// Calls POST /user endpoint
    pub async fn register(&self, new_user: &NewUser) -> anyhow::Result<User> {
        let response = self
            .client
            .post(format!("{}/user", self.url))
            .json(new_user)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("Failed to register user {}", failure(response).await)
        }
        let registered: UserResponse<User> = response.json().await?;
        Ok(registered.user)
    }

    /// Calls POST /user/login endpoint
    /// Returns the session token
    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .post(format!("{}/user/login", self.url))
            .json(&LoginRequest {
                email: Some(email.to_string()),
                password: Some(password.to_string()),
            })
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("Failed to login {}", failure(response).await)
        }
        let login: LoginResponse = response.json().await?;
        Ok(login.authorization)
    }

    /// Calls GET /user/me endpoint
    pub async fn me(&self, token: &str) -> anyhow::Result<User> {
        let response = self
            .authorized(self.client.get(format!("{}/user/me", self.url)), token)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("Failed to get current user {}", failure(response).await)
        }
        let me: MeResponse = response.json().await?;
        Ok(me.user)
    }

    /// Calls POST /publications endpoint
    /// Returns id of the publication taken from the location header
    pub async fn create_publication(
        &self,
        token: &str,
        publication: &NewPublication,
    ) -> anyhow::Result<PublicationId> {
        let response = self
            .authorized(
                self.client.post(format!("{}/publications", self.url)),
                token,
            )
            .json(publication)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("Failed to create publication {}", failure(response).await)
        }

        response
            .headers()
            .get(LOCATION)
            .context("No location header")?
            .to_str()
            .context("Failed to convert header to str")?
            .strip_prefix("/publications/")
            .context("Invalid location header")?
            .parse()
            .context("Failed to parse publication id")
    }

    /// Calls GET /publications/{id} endpoint
    /// None if the publication doesn't exist
    pub async fn get_publication(
        &self,
        publication_id: PublicationId,
    ) -> anyhow::Result<Option<PublicationDetails>> {
        let response = self
            .client
            .get(format!("{}/publications/{}", self.url, publication_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to get publication {}", failure(response).await)
        }
    }

    /// Calls GET /publications endpoint
    pub async fn list_publications(&self) -> anyhow::Result<Vec<PublicationListItem>> {
        let response = self
            .client
            .get(format!("{}/publications", self.url))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to list publications {}", failure(response).await)
        }
    }

    /// Calls DELETE /publications/{id} endpoint
    /// Returns false when the publication can't be deleted by the caller
    pub async fn delete_publication(
        &self,
        token: &str,
        publication_id: PublicationId,
    ) -> anyhow::Result<bool> {
        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/publications/{}", self.url, publication_id)),
                token,
            )
            .send()
            .await?;
        if response.status() == StatusCode::FORBIDDEN {
            Ok(false)
        } else if response.status().is_success() {
            Ok(true)
        } else {
            bail!("Failed to delete publication {}", failure(response).await)
        }
    }

    /// Calls POST /publications/{id}/interactions endpoint
    pub async fn interact(
        &self,
        token: &str,
        publication_id: PublicationId,
        interaction_type: InteractionType,
    ) -> anyhow::Result<InteractionCreated> {
        let response = self
            .authorized(
                self.client.post(format!(
                    "{}/publications/{}/interactions",
                    self.url, publication_id
                )),
                token,
            )
            .json(&NewInteraction { interaction_type })
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to interact {}", failure(response).await)
        }
    }

    /// Calls GET /publications/{id}/interactions endpoint
    pub async fn list_publication_interactions(
        &self,
        token: &str,
        publication_id: PublicationId,
    ) -> anyhow::Result<Vec<InteractionWithUser>> {
        let response = self
            .authorized(
                self.client.get(format!(
                    "{}/publications/{}/interactions",
                    self.url, publication_id
                )),
                token,
            )
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to list interactions {}", failure(response).await)
        }
    }

    /// Calls PATCH /publications/interactions/{id} endpoint
    /// Returns false when the caller doesn't own the publication
    pub async fn complete_interaction(
        &self,
        token: &str,
        interaction_id: InteractionId,
    ) -> anyhow::Result<bool> {
        let response = self
            .authorized(
                self.client.patch(format!(
                    "{}/publications/interactions/{}",
                    self.url, interaction_id
                )),
                token,
            )
            .send()
            .await?;
        if response.status() == StatusCode::FORBIDDEN {
            Ok(false)
        } else if response.status().is_success() {
            Ok(true)
        } else {
            bail!("Failed to complete interaction {}", failure(response).await)
        }
    }

    /// Calls POST /reviews endpoint
    pub async fn create_review(&self, token: &str, review: &NewReview) -> anyhow::Result<Review> {
        let response = self
            .authorized(self.client.post(format!("{}/reviews", self.url)), token)
            .json(review)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to create review {}", failure(response).await)
        }
    }

    /// Calls GET /reviews/rating/{id} endpoint
    pub async fn rating(&self, user_id: UserId) -> anyhow::Result<f64> {
        let response = self
            .client
            .get(format!("{}/reviews/rating/{}", self.url, user_id))
            .send()
            .await?;
        if response.status().is_success() {
            let rating: RatingResponse = response.json().await?;
            Ok(rating.average)
        } else {
            bail!("Failed to get rating {}", failure(response).await)
        }
    }
}
