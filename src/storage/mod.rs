//! Transactional mail storage and search.
//!
//! One [`Storage`] handle is built at start-up and cloned into every
//! component that needs it. It wraps a `sqlx` any-driver pool, so the same
//! queries run on sqlite and mysql.

pub mod search;

use crate::{
  db,
  models::{
    attachment::{
      Attachment,
      attachment_row::{AttachmentMetaRow, AttachmentRow},
    },
    mail::{DATE_FORMAT, MailItem, db_mail_item::DbMailItem, join_addresses},
    search::MailSearch,
  },
  sanitize::{Sanitizer, XssSanitizer},
  server::{MailReceiver, ReceiverError},
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use search::{build_filter, start_of_day};
use serde::{Deserialize, Serialize};
use sqlx::{
  Any, AnyPool, Transaction,
  any::{AnyPoolOptions, install_default_drivers},
};
use std::{collections::HashMap, fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upper bound on ids per `IN (...)` list when batching attachment reads.
const ATTACHMENT_BATCH: usize = 500;

const MAIL_COLUMNS: &str = "mailitem.id, mailitem.dateSent, mailitem.fromAddress, mailitem.toAddressList, mailitem.subject, mailitem.xmailer, mailitem.body, mailitem.contentType, mailitem.boundary";

const INSERT_MAIL: &str = "INSERT INTO mailitem (id, dateSent, fromAddress, toAddressList, subject, xmailer, body, contentType, boundary) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

const INSERT_ATTACHMENT: &str =
  "INSERT INTO attachment (id, mailItemId, fileName, contentType, content) VALUES (?, ?, ?, ?, ?)";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
  #[default]
  Sqlite,
  Mysql,
  Mssql,
}

impl StorageType {
  /// Unknown names fall back to sqlite.
  pub fn from_name(name: &str) -> Self {
    match name.trim().to_ascii_lowercase().as_str() {
      "mysql" => StorageType::Mysql,
      "mssql" => StorageType::Mssql,
      _ => StorageType::Sqlite,
    }
  }

  pub fn from_url(url: &str) -> Result<Self, StorageError> {
    if url.starts_with("sqlite:") {
      Ok(StorageType::Sqlite)
    } else if url.starts_with("mysql:") || url.starts_with("mariadb:") {
      Ok(StorageType::Mysql)
    } else {
      let scheme = url.split(':').next().unwrap_or_default();
      Err(StorageError::UnsupportedEngine(scheme.to_string()))
    }
  }
}

impl fmt::Display for StorageType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      StorageType::Sqlite => "sqlite",
      StorageType::Mysql => "mysql",
      StorageType::Mssql => "mssql",
    })
  }
}

#[derive(Debug, Error)]
pub enum StorageError {
  #[error("{context}: {source}")]
  Query {
    context: &'static str,
    #[source]
    source: sqlx::Error,
  },

  #[error("unable to prepare sqlite file: {0}")]
  File(#[from] std::io::Error),

  #[error("invalid date {0:?}, expected YYYY-MM-DD")]
  InvalidDate(String),

  #[error("unsupported storage engine: {0}")]
  UnsupportedEngine(String),
}

fn query_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> StorageError {
  move |source| StorageError::Query { context, source }
}

#[derive(Clone)]
pub struct Storage {
  pool: AnyPool,
  sanitizer: Arc<dyn Sanitizer>,
}

impl Storage {
  pub fn new(pool: AnyPool, sanitizer: Arc<dyn Sanitizer>) -> Self {
    Self { pool, sanitizer }
  }

  /// Open a pool for `database_url`, create the schema and use the default
  /// XSS sanitizer for reads.
  pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
    install_default_drivers();
    let engine = StorageType::from_url(database_url)?;
    if engine == StorageType::Sqlite {
      db::ensure_sqlite_file(database_url)?;
    }
    info!(%engine, "connecting to storage");

    let pool = AnyPoolOptions::new()
      .max_connections(max_connections)
      .connect(database_url)
      .await
      .map_err(query_err("error connecting to storage"))?;
    db::run_migrations(&pool, engine)
      .await
      .map_err(query_err("error creating schema"))?;

    Ok(Self::new(pool, Arc::new(XssSanitizer)))
  }

  pub fn pool(&self) -> &AnyPool {
    &self.pool
  }

  pub async fn close(&self) {
    self.pool.close().await;
  }

  /// Persist a mail item and its attachments in one transaction.
  /// Returns the item id. Nothing is written unless every insert succeeds.
  pub async fn store(&self, item: &MailItem) -> Result<String, StorageError> {
    let mut tx = self
      .pool
      .begin()
      .await
      .map_err(query_err("error starting transaction in store"))?;

    match insert_mail_item(&mut tx, item).await {
      Ok(attachment_ids) => {
        tx.commit()
          .await
          .map_err(query_err("error committing mail item in store"))?;
        info!(
          id = %item.id,
          attachments = attachment_ids.len(),
          "new mail item written to storage"
        );
        Ok(item.id.clone())
      }
      Err(e) => {
        if let Err(rollback) = tx.rollback().await {
          warn!(id = %item.id, "rollback failed in store: {rollback}");
        }
        Err(e)
      }
    }
  }

  /// Fetch one item with its attachment list. An unknown id yields an
  /// item whose `id` is empty.
  pub async fn get_by_id(&self, id: &str) -> Result<MailItem, StorageError> {
    let sql = mail_query(" AND mailitem.id = ?", "");
    let row: Option<DbMailItem> = sqlx::query_as(&sql)
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(query_err("error running query to get mail item"))?;

    let Some(row) = row else {
      debug!(id, "mail item not found");
      return Ok(MailItem::default());
    };

    let mut items = vec![MailItem::from(row)];
    self.load_attachments(&mut items).await?;
    Ok(items.pop().map(|i| self.sanitize(i)).unwrap_or_default())
  }

  /// Newest first. `length == 0` reads everything from `offset` on. The
  /// second value is the total number of stored items, not the page size.
  pub async fn get_collection(
    &self,
    offset: u64,
    length: u64,
  ) -> Result<(Vec<MailItem>, i64), StorageError> {
    let limit = if length == 0 {
      i64::MAX
    } else {
      i64::try_from(length).unwrap_or(i64::MAX)
    };
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);

    let sql = mail_query("", " LIMIT ? OFFSET ?");
    let rows: Vec<DbMailItem> = sqlx::query_as(&sql)
      .bind(limit)
      .bind(offset)
      .fetch_all(&self.pool)
      .await
      .map_err(query_err("error running query to get mail collection"))?;

    let mut items: Vec<MailItem> = rows.into_iter().map(MailItem::from).collect();
    self.load_attachments(&mut items).await?;
    let total = self.count(&MailSearch::default()).await?;

    Ok((items.into_iter().map(|i| self.sanitize(i)).collect(), total))
  }

  /// Delete items sent on or before the start of `cutoff` (`YYYY-MM-DD`, or
  /// a full `YYYY-MM-DD HH:MM:SS`), or every item when `cutoff` is blank.
  /// Attachments go with their items. Returns the number of items removed.
  pub async fn delete(&self, cutoff: &str) -> Result<u64, StorageError> {
    let bound = parse_cutoff(cutoff)?;
    let (attachment_sql, mail_sql) = match bound {
      Some(_) => (
        "DELETE FROM attachment WHERE mailItemId IN (SELECT id FROM mailitem WHERE dateSent <= ?)",
        "DELETE FROM mailitem WHERE dateSent <= ?",
      ),
      None => ("DELETE FROM attachment", "DELETE FROM mailitem"),
    };

    let mut tx = self
      .pool
      .begin()
      .await
      .map_err(query_err("error starting transaction in delete"))?;

    let mut attachments = sqlx::query(attachment_sql);
    let mut mail = sqlx::query(mail_sql);
    if let Some(bound) = bound.as_deref() {
      attachments = attachments.bind(bound);
      mail = mail.bind(bound);
    }

    attachments
      .execute(&mut *tx)
      .await
      .map_err(query_err("error deleting attachments"))?;
    let removed = mail
      .execute(&mut *tx)
      .await
      .map_err(query_err("error deleting mail items"))?
      .rows_affected();
    tx.commit()
      .await
      .map_err(query_err("error committing delete"))?;

    info!(removed, cutoff = bound.as_deref().unwrap_or("(all)"), "deleted mail items");
    Ok(removed)
  }

  pub async fn count(&self, criteria: &MailSearch) -> Result<i64, StorageError> {
    let filter = build_filter(criteria);
    let sql = format!(
      "SELECT COUNT(mailitem.id) AS mailItemCount FROM mailitem WHERE 1=1{}",
      filter.clause
    );
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for param in &filter.params {
      query = query.bind(param.as_str());
    }
    query
      .fetch_one(&self.pool)
      .await
      .map_err(query_err("error running mail count query"))
  }

  /// Items matching `criteria`, newest first, with attachment lists.
  pub async fn search(&self, criteria: &MailSearch) -> Result<Vec<MailItem>, StorageError> {
    let filter = build_filter(criteria);
    let sql = mail_query(&filter.clause, "");
    let mut query = sqlx::query_as::<_, DbMailItem>(&sql);
    for param in &filter.params {
      query = query.bind(param.as_str());
    }
    let rows = query
      .fetch_all(&self.pool)
      .await
      .map_err(query_err("error running mail search query"))?;

    let mut items: Vec<MailItem> = rows.into_iter().map(MailItem::from).collect();
    self.load_attachments(&mut items).await?;
    Ok(items.into_iter().map(|i| self.sanitize(i)).collect())
  }

  /// One attachment with its content, if it belongs to `mail_id`.
  pub async fn get_attachment(
    &self,
    mail_id: &str,
    attachment_id: &str,
  ) -> Result<Option<Attachment>, StorageError> {
    let row: Option<AttachmentRow> = sqlx::query_as(
      "SELECT id, mailItemId, fileName, contentType, content FROM attachment WHERE id = ? AND mailItemId = ?",
    )
    .bind(attachment_id)
    .bind(mail_id)
    .fetch_optional(&self.pool)
    .await
    .map_err(query_err("error running query to get attachment"))?;

    Ok(row.map(|r| {
      let mut a = Attachment::from(r);
      a.file_name = self.sanitizer.sanitize(&a.file_name);
      a
    }))
  }

  /// Fill `attachments` for every item with batched `IN (...)` reads.
  async fn load_attachments(&self, items: &mut [MailItem]) -> Result<(), StorageError> {
    if items.is_empty() {
      return Ok(());
    }

    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    let mut by_mail: HashMap<String, Vec<Attachment>> = HashMap::new();

    for chunk in ids.chunks(ATTACHMENT_BATCH) {
      let placeholders = vec!["?"; chunk.len()].join(", ");
      let sql = format!(
        "SELECT id, mailItemId, fileName, contentType FROM attachment WHERE mailItemId IN ({placeholders}) ORDER BY fileName"
      );
      let mut query = sqlx::query_as::<_, AttachmentMetaRow>(&sql);
      for id in chunk {
        query = query.bind(*id);
      }
      let rows = query
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("error running query to get attachments"))?;
      for row in rows {
        by_mail
          .entry(row.mail_item_id.clone())
          .or_default()
          .push(Attachment::from(row));
      }
    }

    for item in items.iter_mut() {
      item.attachments = by_mail.remove(&item.id).unwrap_or_default();
    }
    Ok(())
  }

  fn sanitize(&self, mut item: MailItem) -> MailItem {
    item.subject = self.sanitizer.sanitize(&item.subject);
    item.xmailer = self.sanitizer.sanitize(&item.xmailer);
    item.body = self.sanitizer.sanitize(&item.body);
    for a in &mut item.attachments {
      a.file_name = self.sanitizer.sanitize(&a.file_name);
    }
    item
  }
}

#[async_trait]
impl MailReceiver for Storage {
  fn name(&self) -> &str {
    "storage"
  }

  async fn receive(&self, item: &MailItem) -> Result<(), ReceiverError> {
    self
      .store(item)
      .await
      .map(|_| ())
      .map_err(|e| ReceiverError::new(e.to_string()))
  }
}

/// Inserts the item row, then each attachment under a fresh id.
async fn insert_mail_item(
  tx: &mut Transaction<'static, Any>,
  item: &MailItem,
) -> Result<Vec<String>, StorageError> {
  sqlx::query(INSERT_MAIL)
    .bind(item.id.as_str())
    .bind(item.date_sent.as_str())
    .bind(item.from_address.as_str())
    .bind(join_addresses(&item.to_addresses))
    .bind(item.subject.as_str())
    .bind(item.xmailer.as_str())
    .bind(item.body.as_str())
    .bind(item.content_type.as_str())
    .bind(item.boundary.as_str())
    .execute(&mut **tx)
    .await
    .map_err(query_err("error executing insert for mail item in store"))?;

  let mut ids = Vec::with_capacity(item.attachments.len());
  for a in &item.attachments {
    let id = Uuid::new_v4().to_string();
    sqlx::query(INSERT_ATTACHMENT)
      .bind(id.as_str())
      .bind(item.id.as_str())
      .bind(a.file_name.as_str())
      .bind(a.content_type.as_str())
      .bind(a.content.as_slice())
      .execute(&mut **tx)
      .await
      .map_err(query_err("error executing insert attachment in store"))?;
    ids.push(id);
  }
  Ok(ids)
}

fn mail_query(where_clause: &str, tail: &str) -> String {
  format!(
    "SELECT {MAIL_COLUMNS} FROM mailitem WHERE 1=1{where_clause} ORDER BY mailitem.dateSent DESC{tail}"
  )
}

fn parse_cutoff(cutoff: &str) -> Result<Option<String>, StorageError> {
  let cutoff = cutoff.trim();
  if cutoff.is_empty() {
    return Ok(None);
  }
  if let Some(day) = start_of_day(cutoff) {
    return Ok(Some(day));
  }
  NaiveDateTime::parse_from_str(cutoff, DATE_FORMAT)
    .map(|dt| Some(dt.format(DATE_FORMAT).to_string()))
    .map_err(|_| StorageError::InvalidDate(cutoff.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn engine_names_default_to_sqlite() {
    assert_eq!(StorageType::from_name("MySQL"), StorageType::Mysql);
    assert_eq!(StorageType::from_name("mssql"), StorageType::Mssql);
    assert_eq!(StorageType::from_name(""), StorageType::Sqlite);
    assert_eq!(StorageType::from_name("postgres"), StorageType::Sqlite);
  }

  #[test]
  fn engine_from_url() {
    assert_eq!(
      StorageType::from_url("sqlite://mail.db").unwrap(),
      StorageType::Sqlite
    );
    assert_eq!(
      StorageType::from_url("mysql://root@localhost/mail").unwrap(),
      StorageType::Mysql
    );
    assert!(matches!(
      StorageType::from_url("mssql://sa@localhost/mail"),
      Err(StorageError::UnsupportedEngine(s)) if s == "mssql"
    ));
  }

  #[test]
  fn cutoff_parsing() {
    assert_eq!(parse_cutoff("  ").unwrap(), None);
    assert_eq!(
      parse_cutoff("2020-01-01").unwrap().as_deref(),
      Some("2020-01-01 00:00:00")
    );
    assert_eq!(
      parse_cutoff("2020-01-01 12:30:00").unwrap().as_deref(),
      Some("2020-01-01 12:30:00")
    );
    assert!(matches!(
      parse_cutoff("yesterday"),
      Err(StorageError::InvalidDate(_))
    ));
  }

  #[test]
  fn mail_query_orders_newest_first() {
    let sql = mail_query(" AND mailitem.id = ?", "");
    assert!(sql.contains("WHERE 1=1 AND mailitem.id = ?"));
    assert!(sql.ends_with("ORDER BY mailitem.dateSent DESC"));
  }
}
