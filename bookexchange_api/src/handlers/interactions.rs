use std::collections::HashMap;

use actix_web::web::Data;
use actix_web::{Error, HttpResponse};
use paperclip::actix::{api_v2_operation, web};

use crate::api::{
    ErrorResponse, InteractionCreated, InteractionId, InteractionStatus, InteractionWithUser,
    MessageResponse, NewInteraction, PublicationId, PublicationStatus, UserSummary,
};
use crate::auth::AuthenticatedUser;
use crate::handlers::{
    internal_error, InteractionsRepositoryData, PublicationsRepositoryData, UsersRepositoryData,
};
use crate::interactions_repository::InteractionsRepositoryError;
use crate::notifications::Notifier;
use crate::publications_repository::PublicationsRepositoryError;

fn publication_missing() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::new("Publication doesn't exist"))
}

#[api_v2_operation]
/// Likes or offers a trade for somebody else's publication.
/// The owner is emailed in the background unless they were emailed recently
pub async fn create_interaction(
    user: AuthenticatedUser,
    publications_repository: PublicationsRepositoryData,
    interactions_repository: InteractionsRepositoryData,
    notifier: Data<Notifier>,
    publication_id: web::Path<PublicationId>,
    new_interaction: web::Json<NewInteraction>,
) -> Result<HttpResponse, Error> {
    let user = user.0;
    let publication = match publications_repository
        .get_publication(publication_id.into_inner())
        .await
    {
        Ok(publication) => publication,
        Err(PublicationsRepositoryError::NotFound(_)) => return Ok(publication_missing()),
        Err(err) => return Ok(internal_error("Get publication", err)),
    };
    if publication.owner_id == user.id {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "You can't interact with your own publication",
        )));
    }

    let interaction = match interactions_repository
        .upsert_interaction(user.id, publication.id, new_interaction.interaction_type)
        .await
    {
        Ok(interaction) => interaction,
        Err(err) => return Ok(internal_error("Store interaction", err)),
    };
    tracing::info!(
        "User {} interacted with publication {} ({})",
        user.id,
        publication.id,
        interaction.interaction_type.code()
    );

    let response = InteractionCreated {
        interaction: interaction.clone(),
    };
    actix_web::rt::spawn(async move {
        notifier
            .notify_interaction(interaction, publication, user)
            .await;
    });

    Ok(HttpResponse::Created().json(response))
}

#[api_v2_operation]
/// Interactions with a publication, visible to its owner and to admins
pub async fn get_publication_interactions(
    user: AuthenticatedUser,
    publications_repository: PublicationsRepositoryData,
    interactions_repository: InteractionsRepositoryData,
    users_repository: UsersRepositoryData,
    publication_id: web::Path<PublicationId>,
) -> Result<HttpResponse, Error> {
    let publication = match publications_repository
        .get_publication(publication_id.into_inner())
        .await
    {
        Ok(publication) => publication,
        Err(PublicationsRepositoryError::NotFound(_)) => return Ok(publication_missing()),
        Err(err) => return Ok(internal_error("Get publication", err)),
    };
    if publication.owner_id != user.0.id && !user.0.is_admin {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "You don't have permission to see this publication interactions",
        )));
    }

    let interactions = match interactions_repository
        .list_for_publication(publication.id)
        .await
    {
        Ok(interactions) => interactions,
        Err(err) => return Ok(internal_error("List publication interactions", err)),
    };
    let user_ids: Vec<_> = interactions.iter().map(|i| i.user_id).collect();
    let users: HashMap<_, _> = match users_repository.get_users(&user_ids).await {
        Ok(users) => users
            .iter()
            .map(|user| (user.id, UserSummary::from(user)))
            .collect(),
        Err(err) => return Ok(internal_error("Get interacting users", err)),
    };

    // Interactions of removed accounts are left out
    let result: Vec<InteractionWithUser> = interactions
        .into_iter()
        .filter_map(|interaction| {
            users
                .get(&interaction.user_id)
                .cloned()
                .map(|user| InteractionWithUser { interaction, user })
        })
        .collect();

    Ok(HttpResponse::Ok().json(result))
}

#[api_v2_operation]
/// Closes the deal, marking both the interaction and the publication as completed
pub async fn complete_interaction(
    user: AuthenticatedUser,
    publications_repository: PublicationsRepositoryData,
    interactions_repository: InteractionsRepositoryData,
    interaction_id: web::Path<InteractionId>,
) -> Result<HttpResponse, Error> {
    let missing = || {
        HttpResponse::NotFound().json(ErrorResponse::new(
            "Interaction or publication doesn't exist",
        ))
    };
    let interaction = match interactions_repository
        .get_interaction(interaction_id.into_inner())
        .await
    {
        Ok(interaction) => interaction,
        Err(InteractionsRepositoryError::NotFound(_)) => return Ok(missing()),
        Err(err) => return Ok(internal_error("Get interaction", err)),
    };
    let Some(publication_id) = interaction.publication_id else {
        return Ok(missing());
    };
    let publication = match publications_repository.get_publication(publication_id).await {
        Ok(publication) => publication,
        Err(PublicationsRepositoryError::NotFound(_)) => return Ok(missing()),
        Err(err) => return Ok(internal_error("Get publication", err)),
    };
    if publication.owner_id != user.0.id {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "You don't have permission to complete this interaction",
        )));
    }

    if let Err(err) = interactions_repository
        .set_status(interaction.id, InteractionStatus::Completed)
        .await
    {
        return Ok(internal_error("Complete interaction", err));
    }
    if let Err(err) = publications_repository
        .set_status(publication.id, PublicationStatus::Completed)
        .await
    {
        return Ok(internal_error("Complete publication", err));
    }

    tracing::info!(
        "Publication {} completed with user {}",
        publication.id,
        interaction.user_id
    );
    Ok(HttpResponse::Ok().json(MessageResponse::new("Interaction completed successfully")))
}
