//! Search and count.

use crate::{app::AppState, models::search::MailSearch};
use axum::{
  Json,
  extract::{Query, State},
  response::IntoResponse,
};
use serde::Serialize;

use super::mail::storage_failure;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailCount {
  pub mail_count: i64,
}

pub async fn search_mail(
  State(state): State<AppState>,
  Query(criteria): Query<MailSearch>,
) -> impl IntoResponse {
  match state.storage.search(&criteria).await {
    Ok(items) => Json(items).into_response(),
    Err(e) => storage_failure("search", e),
  }
}

pub async fn mail_count(
  State(state): State<AppState>,
  Query(criteria): Query<MailSearch>,
) -> impl IntoResponse {
  match state.storage.count(&criteria).await {
    Ok(mail_count) => Json(MailCount { mail_count }).into_response(),
    Err(e) => storage_failure("mail_count", e),
  }
}
