//! Fixed-size pool of session handlers.
//!
//! When every handler is busy, `next_worker` waits for one to be released.
//! Waiters are served in arrival order, and the connection they carry stays
//! open in the meantime.

use super::{DispatchError, SessionParser};
use crate::models::mail::MailItem;
use std::{
  net::SocketAddr,
  sync::{Arc, Mutex, PoisonError},
};
use tokio::{
  net::TcpStream,
  sync::{OwnedSemaphorePermit, Semaphore, mpsc},
};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct WorkerPool {
  parser: Arc<dyn SessionParser>,
  permits: Arc<Semaphore>,
  idle: Arc<Mutex<Vec<usize>>>,
  size: usize,
}

impl WorkerPool {
  pub fn new(max_workers: usize, parser: Arc<dyn SessionParser>) -> Self {
    let size = max_workers.max(1);
    Self {
      parser,
      permits: Arc::new(Semaphore::new(size)),
      idle: Arc::new(Mutex::new((0..size).rev().collect())),
      size,
    }
  }

  pub fn size(&self) -> usize {
    self.size
  }

  /// Handlers not currently bound to a connection.
  pub fn available(&self) -> usize {
    self.permits.available_permits()
  }

  /// Bind a free handler to `connection`. Waits while all are busy.
  pub async fn next_worker(
    &self,
    connection: TcpStream,
    peer: SocketAddr,
    queue: mpsc::Sender<MailItem>,
  ) -> Result<Worker, DispatchError> {
    if self.available() == 0 {
      debug!(%peer, size = self.size, "all workers busy, waiting");
    }
    let permit = self
      .permits
      .clone()
      .acquire_owned()
      .await
      .map_err(|_| DispatchError::PoolClosed)?;
    let id = self
      .idle
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .pop()
      .ok_or(DispatchError::PoolClosed)?;

    Ok(Worker {
      id,
      peer,
      connection,
      queue,
      parser: self.parser.clone(),
      slot: Slot {
        id,
        idle: self.idle.clone(),
        _permit: permit,
      },
    })
  }
}

/// Returns its handler id to the pool before the permit is released.
struct Slot {
  id: usize,
  idle: Arc<Mutex<Vec<usize>>>,
  _permit: OwnedSemaphorePermit,
}

impl Drop for Slot {
  fn drop(&mut self) {
    self
      .idle
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(self.id);
  }
}

/// A handler bound to one connection.
pub struct Worker {
  id: usize,
  peer: SocketAddr,
  connection: TcpStream,
  queue: mpsc::Sender<MailItem>,
  parser: Arc<dyn SessionParser>,
  slot: Slot,
}

impl Worker {
  pub fn id(&self) -> usize {
    self.id
  }

  /// Run the session; on success queue the message. Waits while the
  /// queue is full. Failures are logged and stay local to this worker.
  pub async fn work(self) {
    let Worker {
      id,
      peer,
      connection,
      queue,
      parser,
      slot,
    } = self;
    debug!(worker = id, %peer, "session started");

    match parser.parse(connection, peer).await {
      Ok(item) => {
        info!(worker = id, %peer, mail_id = %item.id, "mail item received");
        if queue.send(item).await.is_err() {
          warn!(worker = id, "outbound mail queue closed, dropping item");
        }
      }
      Err(e) => warn!(worker = id, %peer, "session failed: {e}"),
    }

    drop(slot);
  }
}
