//! Mail collection, single item, and pruning.

use crate::{app::AppState, models::mail::MailItem, storage::StorageError};
use axum::{
  Json,
  extract::{Path as AxumPath, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

const DEFAULT_PAGE_LENGTH: u64 = 50;
const MAX_PAGE_LENGTH: u64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub offset: Option<u64>,
  pub length: Option<u64>,
}

impl PageParams {
  pub fn resolve(&self) -> (u64, u64) {
    let offset = self.offset.unwrap_or(0);
    let length = self
      .length
      .unwrap_or(DEFAULT_PAGE_LENGTH)
      .clamp(1, MAX_PAGE_LENGTH);
    (offset, length)
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailCollection {
  pub mail_items: Vec<MailItem>,
  pub total_records: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
  #[serde(default)]
  pub cutoff: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
  pub deleted: u64,
}

pub(crate) fn storage_failure(context: &str, e: StorageError) -> Response {
  error!("{context} error: {e}");
  (StatusCode::INTERNAL_SERVER_ERROR, "storage error").into_response()
}

pub async fn list_mail(
  State(state): State<AppState>,
  Query(params): Query<PageParams>,
) -> impl IntoResponse {
  let (offset, length) = params.resolve();
  match state.storage.get_collection(offset, length).await {
    Ok((mail_items, total_records)) => Json(MailCollection {
      mail_items,
      total_records,
    })
    .into_response(),
    Err(e) => storage_failure("list_mail", e),
  }
}

pub async fn get_mail(
  State(state): State<AppState>,
  AxumPath(id): AxumPath<String>,
) -> impl IntoResponse {
  match state.storage.get_by_id(&id).await {
    Ok(item) if item.is_empty() => (StatusCode::NOT_FOUND, "mail item not found").into_response(),
    Ok(item) => Json(item).into_response(),
    Err(e) => storage_failure("get_mail", e),
  }
}

pub async fn delete_mail(
  State(state): State<AppState>,
  Query(params): Query<DeleteParams>,
) -> impl IntoResponse {
  match state.storage.delete(&params.cutoff).await {
    Ok(deleted) => Json(DeleteResponse { deleted }).into_response(),
    Err(StorageError::InvalidDate(d)) => {
      (StatusCode::BAD_REQUEST, format!("invalid cutoff date {d:?}")).into_response()
    }
    Err(e) => storage_failure("delete_mail", e),
  }
}
