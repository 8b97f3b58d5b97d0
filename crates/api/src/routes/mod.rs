pub mod auth;
pub mod crew;
pub mod documents;
pub mod engines;
pub mod health;
pub mod jobs;
pub mod logbook;
pub mod manifest;
pub mod notifications;
pub mod purchase_orders;
pub mod rules;
pub mod sync;
pub mod users;
pub mod yachts;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(users::router())
        .merge(yachts::router())
        .merge(logbook::router())
        .merge(manifest::router())
        .merge(engines::router())
        .merge(crew::router())
        .merge(purchase_orders::router())
        .merge(documents::router())
        .merge(rules::router())
        .merge(jobs::router())
        .merge(notifications::router())
        .merge(sync::router())
        .with_state(state)
}
