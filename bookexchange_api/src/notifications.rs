//! Emails sent as a side effect of requests.
//!
//! Handlers spawn these after the response is produced, so every failure here
//! ends up in the logs only.
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::api::{Interaction, InteractionType, Publication, User};
use crate::interactions_repository::InteractionsRepository;
use crate::mailer::{Mailer, MailerError, OutgoingEmail};
use crate::users_repository::UsersRepository;

pub const VERIFICATION_SUBJECT: &str = "Verificación de correo electrónico";
pub const PASSWORD_CHANGE_SUBJECT: &str = "Cambio de contraseña";
pub const INTERACTION_SUBJECT: &str = "Alguien está interesado en tu publicación";

/// Time after which an interaction may notify the publication owner again
pub fn email_cooldown() -> Duration {
    Duration::days(2)
}

/// Owner is notified about the first interaction and again once the cooldown has passed
pub fn should_notify(interaction: &Interaction, now: DateTime<Utc>) -> bool {
    match (interaction.email_sent, interaction.email_sent_at) {
        (false, _) => true,
        (true, Some(sent_at)) => now - sent_at >= email_cooldown(),
        (true, None) => true,
    }
}

pub fn verification_email(user: &User, frontend_url: &str, token: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: user.email.clone(),
        subject: VERIFICATION_SUBJECT.to_string(),
        html: format!(
            "<p>Hola {},</p>\
             <p>Para verificar tu correo electrónico haz click en el siguiente link:</p>\
             <p><a href=\"{frontend_url}/verify?token={token}\">Verificar correo</a></p>\
             <p>El link expira en una hora.</p>",
            user.name
        ),
    }
}

pub fn password_change_email(user: &User, frontend_url: &str, token: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: user.email.clone(),
        subject: PASSWORD_CHANGE_SUBJECT.to_string(),
        html: format!(
            "<p>Hola {},</p>\
             <p>Para cambiar tu contraseña haz click en el siguiente link:</p>\
             <p><a href=\"{frontend_url}/change-password?token={token}\">Cambiar contraseña</a></p>\
             <p>Si no pediste este cambio puedes ignorar este correo.</p>",
            user.name
        ),
    }
}

pub fn interaction_email(
    owner: &User,
    interested: &User,
    publication: &Publication,
    interaction_type: InteractionType,
    frontend_url: &str,
) -> OutgoingEmail {
    let action = match interaction_type {
        InteractionType::Like => "le dio me gusta a",
        InteractionType::Trade => "quiere intercambiar",
    };
    OutgoingEmail {
        to: owner.email.clone(),
        subject: INTERACTION_SUBJECT.to_string(),
        html: format!(
            "<p>Hola {},</p>\
             <p>{} {action} tu publicación <b>{}</b>.</p>\
             <p><a href=\"{frontend_url}/publications/{}\">Ver publicación</a></p>",
            owner.name, interested.name, publication.title, publication.id
        ),
    }
}

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    users_repository: Arc<dyn UsersRepository>,
    interactions_repository: Arc<dyn InteractionsRepository>,
    frontend_url: String,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        users_repository: Arc<dyn UsersRepository>,
        interactions_repository: Arc<dyn InteractionsRepository>,
        frontend_url: &str,
    ) -> Self {
        Self {
            mailer,
            users_repository,
            interactions_repository,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn send_verification(&self, user: &User, token: &str) -> Result<(), MailerError> {
        self.mailer
            .send(verification_email(user, &self.frontend_url, token))
            .await
    }

    /// Sends the verification email of a freshly registered user.
    /// A user that can't be reached is removed so that the email can register again
    pub async fn welcome_or_remove(&self, user: User, token: String) {
        if let Err(err) = self.send_verification(&user, &token).await {
            tracing::error!("Verification email to {} failed {}", user.email, err);
            match self.users_repository.delete_user(user.id).await {
                Ok(_) => tracing::warn!("Removed unreachable user {}", user.id),
                Err(err) => tracing::error!("Failed to remove user {} {}", user.id, err),
            }
        }
    }

    pub async fn send_password_change(&self, user: &User, token: &str) -> Result<(), MailerError> {
        self.mailer
            .send(password_change_email(user, &self.frontend_url, token))
            .await
    }

    /// Lets the owner of the publication know about the interaction, respecting the cooldown
    pub async fn notify_interaction(
        &self,
        interaction: Interaction,
        publication: Publication,
        interested: User,
    ) {
        let now = Utc::now();
        if !should_notify(&interaction, now) {
            tracing::debug!("Interaction {} still in email cooldown", interaction.id);
            return;
        }

        let owner = match self.users_repository.get_user(publication.owner_id).await {
            Ok(owner) => owner,
            Err(err) => {
                tracing::error!(
                    "Failed to load owner of publication {} {}",
                    publication.id,
                    err
                );
                return;
            }
        };

        let email = interaction_email(
            &owner,
            &interested,
            &publication,
            interaction.interaction_type,
            &self.frontend_url,
        );
        if let Err(err) = self.mailer.send(email).await {
            tracing::error!("Interaction email to {} failed {}", owner.email, err);
            return;
        }

        if let Err(err) = self
            .interactions_repository
            .mark_email_sent(interaction.id, now)
            .await
        {
            tracing::error!(
                "Failed to mark email sent for interaction {} {}",
                interaction.id,
                err
            );
        }
    }
}
