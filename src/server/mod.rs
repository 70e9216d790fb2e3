//! Connection dispatch and fan-out.
//!
//! - `dispatcher`: accept loop, owns the outbound mail queue
//! - `pool`: fixed set of session handlers
//! - `distributor`: drains the queue into every receiver

pub mod dispatcher;
pub mod distributor;
pub mod pool;

use crate::models::mail::MailItem;
use async_trait::async_trait;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpStream;

pub use dispatcher::{Dispatcher, MAIL_QUEUE_CAPACITY, mail_queue};
pub use distributor::{DeliveryReport, Distributor};
pub use pool::{Worker, WorkerPool};

#[derive(Debug, Error)]
pub enum SessionError {
  #[error("connection error: {0}")]
  Io(#[from] std::io::Error),

  #[error("client closed the session before a message was sent")]
  Incomplete,

  #[error("malformed message: {0}")]
  Malformed(String),
}

/// Drives one protocol session on an accepted connection and yields the
/// message it carried.
#[async_trait]
pub trait SessionParser: Send + Sync {
  async fn parse(&self, stream: TcpStream, peer: SocketAddr) -> Result<MailItem, SessionError>;
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ReceiverError(String);

impl ReceiverError {
  pub fn new(message: impl Into<String>) -> Self {
    Self(message.into())
  }
}

/// Subscriber to distributed mail.
#[async_trait]
pub trait MailReceiver: Send + Sync {
  fn name(&self) -> &str;

  async fn receive(&self, item: &MailItem) -> Result<(), ReceiverError>;
}

#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("unable to bind {addr}: {source}")]
  Bind {
    addr: String,
    #[source]
    source: std::io::Error,
  },

  #[error("error while accepting SMTP connections: {0}")]
  Accept(#[source] std::io::Error),

  #[error("worker pool is closed")]
  PoolClosed,
}
