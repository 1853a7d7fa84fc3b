use std::collections::HashMap;

use actix_web::http::header::LOCATION;
use actix_web::{Error, HttpResponse};
use paperclip::actix::{api_v2_operation, web};

use crate::api::{
    ErrorResponse, MessageResponse, NewPublication, OwnerName, PublicationDetails, PublicationId,
    PublicationListItem, PublicationUpdate,
};
use crate::auth::AuthenticatedUser;
use crate::handlers::{
    internal_error, InteractionsRepositoryData, PublicationsRepositoryData, UsersRepositoryData,
};
use crate::publications_repository::PublicationsRepositoryError;
use crate::recommendations::recommend;

#[api_v2_operation]
pub async fn get_genres(
    publications_repository: PublicationsRepositoryData,
) -> Result<HttpResponse, Error> {
    Ok(match publications_repository.list_genres().await {
        Ok(genres) => HttpResponse::Ok().json(genres),
        Err(err) => internal_error("List genres", err),
    })
}

#[api_v2_operation]
/// All publications newest first, each with the name of its owner
pub async fn get_all_publications(
    publications_repository: PublicationsRepositoryData,
    users_repository: UsersRepositoryData,
) -> Result<HttpResponse, Error> {
    let publications = match publications_repository.list_publications().await {
        Ok(publications) => publications,
        Err(err) => return Ok(internal_error("List publications", err)),
    };

    let mut owner_ids: Vec<_> = publications.iter().map(|p| p.owner_id).collect();
    owner_ids.sort();
    owner_ids.dedup();
    let owner_names: HashMap<_, _> = match users_repository.get_users(&owner_ids).await {
        Ok(owners) => owners
            .into_iter()
            .map(|owner| (owner.id, owner.name))
            .collect(),
        Err(err) => return Ok(internal_error("Get publication owners", err)),
    };

    let listing: Vec<PublicationListItem> = publications
        .into_iter()
        .map(|publication| PublicationListItem {
            owner: OwnerName {
                name: owner_names
                    .get(&publication.owner_id)
                    .cloned()
                    .unwrap_or_default(),
            },
            publication,
        })
        .collect();

    Ok(HttpResponse::Ok().json(listing))
}

#[api_v2_operation]
pub async fn get_recommendations(
    user: AuthenticatedUser,
    publications_repository: PublicationsRepositoryData,
    interactions_repository: InteractionsRepositoryData,
) -> Result<HttpResponse, Error> {
    let user_id = user.0.id;
    let publications = match publications_repository.list_publications().await {
        Ok(publications) => publications,
        Err(err) => return Ok(internal_error("List publications", err)),
    };
    let user_interactions = match interactions_repository.list_for_user(user_id).await {
        Ok(interactions) => interactions,
        Err(err) => return Ok(internal_error("List user interactions", err)),
    };
    let interaction_counts = match interactions_repository.interaction_counts().await {
        Ok(counts) => counts,
        Err(err) => return Ok(internal_error("Count interactions", err)),
    };

    Ok(HttpResponse::Ok().json(recommend(
        user_id,
        &publications,
        &user_interactions,
        &interaction_counts,
    )))
}

#[api_v2_operation]
pub async fn get_publication(
    publications_repository: PublicationsRepositoryData,
    users_repository: UsersRepositoryData,
    publication_id: web::Path<PublicationId>,
) -> Result<HttpResponse, Error> {
    let publication = match publications_repository
        .get_publication(publication_id.into_inner())
        .await
    {
        Ok(publication) => publication,
        Err(PublicationsRepositoryError::NotFound(_)) => {
            return Ok(HttpResponse::NotFound().json(ErrorResponse::new("Publication not found")))
        }
        Err(err) => return Ok(internal_error("Get publication", err)),
    };

    let owner = match users_repository.get_users(&[publication.owner_id]).await {
        Ok(owners) => owners
            .into_iter()
            .next()
            .map(|owner| owner.name)
            .unwrap_or_default(),
        Err(err) => return Ok(internal_error("Get publication owner", err)),
    };

    Ok(HttpResponse::Ok().json(PublicationDetails { publication, owner }))
}

#[api_v2_operation]
/// Publishes a book owned by the caller
pub async fn create_publication(
    user: AuthenticatedUser,
    publications_repository: PublicationsRepositoryData,
    new_publication: web::Json<NewPublication>,
) -> Result<HttpResponse, Error> {
    Ok(
        match publications_repository
            .add_publication(user.0.id, new_publication.into_inner())
            .await
        {
            Ok(publication) => {
                tracing::info!("User {} published {}", user.0.id, publication.id);
                HttpResponse::Created()
                    .append_header((LOCATION, format!("/publications/{}", publication.id)))
                    .json(publication)
            }
            Err(err) => internal_error("Create publication", err),
        },
    )
}

#[api_v2_operation]
pub async fn update_publication(
    user: AuthenticatedUser,
    publications_repository: PublicationsRepositoryData,
    publication_id: web::Path<PublicationId>,
    update: web::Json<PublicationUpdate>,
) -> Result<HttpResponse, Error> {
    let publication_id = publication_id.into_inner();
    match publications_repository.get_publication(publication_id).await {
        Ok(publication) if publication.owner_id != user.0.id => {
            return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
                "You don't have permission to update this publication",
            )))
        }
        Ok(_) => {}
        Err(PublicationsRepositoryError::NotFound(_)) => {
            return Ok(HttpResponse::NotFound().json(ErrorResponse::new("Publication doesn't exist")))
        }
        Err(err) => return Ok(internal_error("Get publication", err)),
    }

    Ok(
        match publications_repository
            .update_publication(publication_id, update.into_inner())
            .await
        {
            Ok(publication) => HttpResponse::Ok().json(publication),
            Err(PublicationsRepositoryError::NotFound(_)) => {
                HttpResponse::NotFound().json(ErrorResponse::new("Publication doesn't exist"))
            }
            Err(err) => internal_error("Update publication", err),
        },
    )
}

#[api_v2_operation]
/// Deletes own publication. Its interactions are kept but lose the reference to it
pub async fn delete_publication(
    user: AuthenticatedUser,
    publications_repository: PublicationsRepositoryData,
    interactions_repository: InteractionsRepositoryData,
    publication_id: web::Path<PublicationId>,
) -> Result<HttpResponse, Error> {
    let publication_id = publication_id.into_inner();
    let forbidden = || {
        HttpResponse::Forbidden().json(ErrorResponse::new(
            "You don't have permission to delete this publication",
        ))
    };
    match publications_repository.get_publication(publication_id).await {
        Ok(publication) if publication.owner_id == user.0.id => {}
        Ok(_) | Err(PublicationsRepositoryError::NotFound(_)) => return Ok(forbidden()),
        Err(err) => return Ok(internal_error("Get publication", err)),
    }

    match publications_repository
        .delete_publication(publication_id)
        .await
    {
        Ok(_) => {}
        Err(PublicationsRepositoryError::NotFound(_)) => return Ok(forbidden()),
        Err(err) => return Ok(internal_error("Delete publication", err)),
    }
    tracing::info!("User {} deleted publication {}", user.0.id, publication_id);

    // A failed detach leaves interactions to a missing publication, those can't be completed
    Ok(
        match interactions_repository
            .detach_publication(publication_id)
            .await
        {
            Ok(detached) => {
                tracing::debug!(
                    "Detached {} interactions from publication {}",
                    detached,
                    publication_id
                );
                HttpResponse::Ok().json(MessageResponse::new("Publication deleted successfully"))
            }
            Err(err) => internal_error("Detach interactions", err),
        },
    )
}

#[cfg(test)]
pub(crate) mod publications_handler_tests {
    use std::sync::Arc;

    use actix_web::http::header::AUTHORIZATION;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{json, Value};

    use super::*;
    use crate::api::{
        InteractionType, Publication, PublicationStatus, PublicationType, Recommendations, UserId,
    };
    use crate::handlers::test_context::{init_test_app, TestContext};
    use crate::publications_repository::{InMemoryPublicationsRepository, PublicationsRepository};

    pub(crate) fn dune_json() -> Value {
        json!({
            "title": "Dune",
            "author": "Frank Herbert",
            "language": "English",
            "genres": ["sci-fi", "classic"],
            "bookState": "Usado",
            "description": "Paperback",
            "type": "Venta",
            "price": "12000",
            "image": "https://example.com/dune.png",
        })
    }

    #[actix_web::test]
    /// Covers the life of a publication
    /// 1. Anonymous user can't publish
    /// 2. Owner publishes, gets 201 with location
    /// 3. Everybody sees it with the owner name, in listing and by id
    /// 4. Genres are listed
    /// 5. Another user can't update nor delete it
    /// 6. Owner updates it, price given as text, and deletes it
    async fn test_publication_lifecycle() {
        let ctx = TestContext::new();
        let app = init_test_app!(ctx);
        let (owner, owner_token) = ctx.add_user("Owner", "owner@example.com", false).await;
        let (_, other_token) = ctx.add_user("Other", "other@example.com", false).await;

        let request = test::TestRequest::post()
            .uri("/publications")
            .set_json(dune_json())
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = test::TestRequest::post()
            .uri("/publications")
            .insert_header((AUTHORIZATION, owner_token.clone()))
            .set_json(dune_json())
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let location = response
            .headers()
            .get(LOCATION)
            .expect("No location header")
            .to_str()
            .unwrap()
            .to_string();
        let publication: Publication = test::read_body_json(response).await;
        assert_eq!(location, format!("/publications/{}", publication.id));
        assert_eq!(publication.owner_id, owner.id);
        assert_eq!(publication.price, 12000.0);
        assert_eq!(publication.status, PublicationStatus::Available);

        let request = test::TestRequest::get().uri("/publications").to_request();
        let listing: Vec<PublicationListItem> = test::call_and_read_body_json(&app, request).await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].owner.name, "Owner");
        assert_eq!(listing[0].publication, publication);

        let request = test::TestRequest::get().uri(&location).to_request();
        let details: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(details["owner"], "Owner");
        assert_eq!(details["title"], "Dune");
        assert_eq!(details["bookState"], "Usado");

        let request = test::TestRequest::get()
            .uri("/publications/genres")
            .to_request();
        let genres: Vec<String> = test::call_and_read_body_json(&app, request).await;
        assert_eq!(genres, vec!["classic", "sci-fi"]);

        let request = test::TestRequest::put()
            .uri(&location)
            .insert_header((AUTHORIZATION, other_token.clone()))
            .set_json(json!({"price": 1.0}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(
            body["error"],
            "You don't have permission to update this publication"
        );

        let request = test::TestRequest::delete()
            .uri(&location)
            .insert_header((AUTHORIZATION, other_token))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let request = test::TestRequest::put()
            .uri(&location)
            .insert_header((AUTHORIZATION, owner_token.clone()))
            .set_json(json!({"price": "9000", "type": "Permuta", "state": "Muy Usado"}))
            .to_request();
        let updated: Publication = test::call_and_read_body_json(&app, request).await;
        assert_eq!(updated.price, 9000.0);
        assert_eq!(updated.publication_type, PublicationType::Trade);
        assert_eq!(updated.description, "Paperback");

        let request = test::TestRequest::delete()
            .uri(&location)
            .insert_header((AUTHORIZATION, owner_token.clone()))
            .to_request();
        let body: MessageResponse = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body.message, "Publication deleted successfully");

        let request = test::TestRequest::get().uri(&location).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body, json!({"error": "Publication not found"}));

        let request = test::TestRequest::put()
            .uri(&location)
            .insert_header((AUTHORIZATION, owner_token.clone()))
            .set_json(json!({"price": 1.0}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let request = test::TestRequest::delete()
            .uri(&location)
            .insert_header((AUTHORIZATION, owner_token))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    /// Deleting a publication keeps the interactions with it, detached
    async fn test_delete_detaches_interactions() {
        let ctx = TestContext::new();
        let app = init_test_app!(ctx);
        let (owner, owner_token) = ctx.add_user("Owner", "owner@example.com", false).await;
        let (reader, _) = ctx.add_user("Reader", "reader@example.com", false).await;
        let publication = ctx
            .publications_repository
            .add_publication(owner.id, serde_json::from_value(dune_json()).unwrap())
            .await
            .unwrap();
        let interaction = ctx
            .interactions_repository
            .upsert_interaction(reader.id, publication.id, InteractionType::Like)
            .await
            .unwrap();

        let request = test::TestRequest::delete()
            .uri(&format!("/publications/{}", publication.id))
            .insert_header((AUTHORIZATION, owner_token))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let detached = ctx
            .interactions_repository
            .get_interaction(interaction.id)
            .await
            .unwrap();
        assert_eq!(detached.publication_id, None);
    }

    /// Publications store whose deletes always fail
    struct FailingDeletePublications(InMemoryPublicationsRepository);

    #[async_trait::async_trait]
    impl PublicationsRepository for FailingDeletePublications {
        async fn add_publication(
            &self,
            owner_id: UserId,
            details: NewPublication,
        ) -> Result<Publication, PublicationsRepositoryError> {
            self.0.add_publication(owner_id, details).await
        }

        async fn get_publication(
            &self,
            id: PublicationId,
        ) -> Result<Publication, PublicationsRepositoryError> {
            self.0.get_publication(id).await
        }

        async fn list_publications(&self) -> Result<Vec<Publication>, PublicationsRepositoryError> {
            self.0.list_publications().await
        }

        async fn get_publications(
            &self,
            ids: &[PublicationId],
        ) -> Result<Vec<Publication>, PublicationsRepositoryError> {
            self.0.get_publications(ids).await
        }

        async fn update_publication(
            &self,
            id: PublicationId,
            update: PublicationUpdate,
        ) -> Result<Publication, PublicationsRepositoryError> {
            self.0.update_publication(id, update).await
        }

        async fn set_status(
            &self,
            id: PublicationId,
            status: PublicationStatus,
        ) -> Result<Publication, PublicationsRepositoryError> {
            self.0.set_status(id, status).await
        }

        async fn delete_publication(
            &self,
            _id: PublicationId,
        ) -> Result<Publication, PublicationsRepositoryError> {
            Err(PublicationsRepositoryError::Other("db down".to_string()))
        }

        async fn list_genres(&self) -> Result<Vec<String>, PublicationsRepositoryError> {
            self.0.list_genres().await
        }
    }

    #[actix_web::test]
    /// A delete failing in the store leaves the publication and its interactions untouched
    async fn test_failed_delete_keeps_interactions() {
        let mut ctx = TestContext::new();
        ctx.publications_repository = Arc::new(FailingDeletePublications(
            InMemoryPublicationsRepository::default(),
        ));
        let app = init_test_app!(ctx);
        let (owner, owner_token) = ctx.add_user("Owner", "owner@example.com", false).await;
        let (reader, _) = ctx.add_user("Reader", "reader@example.com", false).await;
        let publication = ctx
            .publications_repository
            .add_publication(owner.id, serde_json::from_value(dune_json()).unwrap())
            .await
            .unwrap();
        let interaction = ctx
            .interactions_repository
            .upsert_interaction(reader.id, publication.id, InteractionType::Trade)
            .await
            .unwrap();

        let request = test::TestRequest::delete()
            .uri(&format!("/publications/{}", publication.id))
            .insert_header((AUTHORIZATION, owner_token))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert!(ctx
            .publications_repository
            .get_publication(publication.id)
            .await
            .is_ok());
        let kept = ctx
            .interactions_repository
            .get_interaction(interaction.id)
            .await
            .unwrap();
        assert_eq!(kept.publication_id, Some(publication.id));
    }

    #[actix_web::test]
    /// Recommendations skip own and already liked publications
    async fn test_recommendations() {
        let ctx = TestContext::new();
        let app = init_test_app!(ctx);
        let (owner, _) = ctx.add_user("Owner", "owner@example.com", false).await;
        let (reader, reader_token) = ctx.add_user("Reader", "reader@example.com", false).await;

        let liked = ctx
            .publications_repository
            .add_publication(owner.id, serde_json::from_value(dune_json()).unwrap())
            .await
            .unwrap();
        let mut sequel = dune_json();
        sequel["title"] = json!("Dune Messiah");
        sequel["genres"] = json!(["sci-fi"]);
        let sequel = ctx
            .publications_repository
            .add_publication(owner.id, serde_json::from_value(sequel).unwrap())
            .await
            .unwrap();
        ctx.publications_repository
            .add_publication(reader.id, serde_json::from_value(dune_json()).unwrap())
            .await
            .unwrap();
        ctx.interactions_repository
            .upsert_interaction(reader.id, liked.id, InteractionType::Like)
            .await
            .unwrap();

        let request = test::TestRequest::get()
            .uri("/publications/recommendations")
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = test::TestRequest::get()
            .uri("/publications/recommendations")
            .insert_header((AUTHORIZATION, reader_token))
            .to_request();
        let recommendations: Recommendations = test::call_and_read_body_json(&app, request).await;
        assert_eq!(recommendations.genre_match, vec![sequel.clone()]);
        assert!(recommendations.author_match.is_empty());
        assert_eq!(recommendations.most_popular, vec![sequel]);
    }
}
