pub mod api;
pub mod errors;

#[cfg(any(feature = "client", test))]
pub mod client;

#[cfg(any(feature = "server", test))]
pub mod app_config;

#[cfg(any(feature = "server", test))]
pub mod auth;

#[cfg(any(feature = "server", test))]
pub mod credentials;

#[cfg(any(feature = "server", test))]
mod handlers;

#[cfg(any(feature = "server", test))]
pub mod interactions_repository;

#[cfg(any(feature = "server", test))]
pub mod mailer;

#[cfg(any(feature = "server", test))]
pub mod notifications;

#[cfg(any(feature = "server", test))]
pub mod postgres;

#[cfg(any(feature = "server", test))]
pub mod publications_repository;

#[cfg(any(feature = "server", test))]
pub mod recommendations;

#[cfg(any(feature = "server", test))]
pub mod reviews_repository;

#[cfg(any(feature = "server", test))]
pub mod settings;

#[cfg(any(feature = "server", test))]
pub mod users_repository;
