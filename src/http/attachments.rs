//! Attachment download.

use crate::app::AppState;
use axum::{
  extract::{Path as AxumPath, State},
  http::{HeaderMap, HeaderValue, StatusCode, header},
  response::IntoResponse,
};

use super::mail::storage_failure;

pub async fn download_attachment(
  State(state): State<AppState>,
  AxumPath((mail_id, attachment_id)): AxumPath<(String, String)>,
) -> impl IntoResponse {
  match state.storage.get_attachment(&mail_id, &attachment_id).await {
    Ok(Some(a)) => {
      let mut headers = HeaderMap::new();
      headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&a.content_type)
          .unwrap_or(HeaderValue::from_static("application/octet-stream")),
      );
      if !a.file_name.is_empty() {
        if let Ok(v) = HeaderValue::from_str(&format!("inline; filename=\"{}\"", a.file_name)) {
          headers.insert(header::CONTENT_DISPOSITION, v);
        }
      }
      (headers, a.content).into_response()
    }
    Ok(None) => (StatusCode::NOT_FOUND, "attachment not found").into_response(),
    Err(e) => storage_failure("download_attachment", e),
  }
}
