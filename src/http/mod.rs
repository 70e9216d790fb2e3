//! JSON service API over the mail store.

use crate::app::AppState;
use axum::{Router, routing::get};

pub mod attachments;
pub mod mail;
pub mod search;

/// Assemble the HTTP router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/mail",
            get(mail::list_mail).delete(mail::delete_mail),
        )
        .route("/mail/:id", get(mail::get_mail))
        .route(
            "/mail/:id/attachment/:attachment_id",
            get(attachments::download_attachment),
        )
        .route("/search", get(search::search_mail))
        .route("/mailcount", get(search::mail_count))
        .with_state(state)
}
