//! Accept loop.
//!
//! Each accepted connection gets a worker from the pool and runs as its own
//! task. Workers push finished mail onto a bounded queue that a single
//! distributor drains. An accept failure stops the loop and is returned to
//! the caller.

use super::{DispatchError, Distributor, WorkerPool};
use crate::models::mail::MailItem;
use std::future::Future;
use tokio::{net::TcpListener, sync::mpsc};
use tracing::{error, info};

pub const MAIL_QUEUE_CAPACITY: usize = 1000;

/// Bounded FIFO between workers (many producers) and the distributor.
/// A push waits while the queue is full.
pub fn mail_queue() -> (mpsc::Sender<MailItem>, mpsc::Receiver<MailItem>) {
  mpsc::channel(MAIL_QUEUE_CAPACITY)
}

pub async fn listen(addr: &str) -> Result<TcpListener, DispatchError> {
  TcpListener::bind(addr)
    .await
    .map_err(|source| DispatchError::Bind {
      addr: addr.to_string(),
      source,
    })
}

pub struct Dispatcher {
  pool: WorkerPool,
  distributor: Distributor,
}

impl Dispatcher {
  pub fn new(pool: WorkerPool, distributor: Distributor) -> Self {
    Self { pool, distributor }
  }

  /// Accept connections until accepting fails.
  pub async fn run(self, listener: TcpListener) -> Result<(), DispatchError> {
    self.run_until(listener, std::future::pending()).await
  }

  /// Accept connections until `shutdown` resolves (returns `Ok`) or
  /// accepting fails. Sessions already running are left to finish, and
  /// the distributor drains the queue once their workers are done.
  pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> Result<(), DispatchError>
  where
    F: Future<Output = ()>,
  {
    let (queue, inbox) = mail_queue();
    tokio::spawn(self.distributor.run(inbox));

    if let Ok(addr) = listener.local_addr() {
      info!(%addr, workers = self.pool.size(), "SMTP listener running");
    }

    tokio::pin!(shutdown);
    loop {
      let (stream, peer) = tokio::select! {
        _ = &mut shutdown => break,
        accepted = listener.accept() => accepted.map_err(|e| {
          error!("error while accepting SMTP requests: {e}");
          DispatchError::Accept(e)
        })?,
      };

      let worker = tokio::select! {
        _ = &mut shutdown => break,
        worker = self.pool.next_worker(stream, peer, queue.clone()) => worker?,
      };
      tokio::spawn(worker.work());
    }

    info!("SMTP listener stopped");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::server::{MailReceiver, ReceiverError, SessionError, SessionParser};
  use async_trait::async_trait;
  use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
  };
  use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::oneshot,
  };

  #[tokio::test]
  async fn full_queue_blocks_until_an_item_is_taken() {
    let (tx, mut rx) = mail_queue();
    for _ in 0..MAIL_QUEUE_CAPACITY {
      tx.send(MailItem::new()).await.unwrap();
    }

    let blocked = tokio::time::timeout(Duration::from_millis(50), tx.send(MailItem::new())).await;
    assert!(blocked.is_err(), "push past capacity should wait");

    let first = rx.recv().await.unwrap();
    assert!(!first.is_empty());
    tokio::time::timeout(Duration::from_secs(1), tx.send(MailItem::new()))
      .await
      .expect("space freed")
      .unwrap();
  }

  #[tokio::test]
  async fn queue_is_fifo() {
    let (tx, mut rx) = mail_queue();
    let items: Vec<MailItem> = (0..10).map(|_| MailItem::new()).collect();
    for item in &items {
      tx.send(item.clone()).await.unwrap();
    }
    for item in &items {
      assert_eq!(rx.recv().await.unwrap().id, item.id);
    }
  }

  struct LineParser;

  #[async_trait]
  impl SessionParser for LineParser {
    async fn parse(&self, mut stream: TcpStream, _peer: SocketAddr) -> Result<MailItem, SessionError> {
      let mut buf = String::new();
      stream.read_to_string(&mut buf).await?;
      let mut item = MailItem::new();
      item.subject = buf;
      Ok(item)
    }
  }

  #[derive(Default)]
  struct Collect(Mutex<Vec<String>>);

  #[async_trait]
  impl MailReceiver for Collect {
    fn name(&self) -> &str {
      "collect"
    }

    async fn receive(&self, item: &MailItem) -> Result<(), ReceiverError> {
      self.0.lock().unwrap().push(item.subject.clone());
      Ok(())
    }
  }

  #[tokio::test]
  async fn accepted_sessions_reach_receivers_and_shutdown_is_clean() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let collect = Arc::new(Collect::default());
    let dispatcher = Dispatcher::new(
      WorkerPool::new(2, Arc::new(LineParser)),
      Distributor::new(vec![collect.clone() as Arc<dyn MailReceiver>]),
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(dispatcher.run_until(listener, async move {
      let _ = stop_rx.await;
    }));

    for subject in ["one", "two", "three"] {
      let mut client = TcpStream::connect(addr).await.unwrap();
      client.write_all(subject.as_bytes()).await.unwrap();
      client.shutdown().await.unwrap();
    }

    for _ in 0..100 {
      if collect.0.lock().unwrap().len() == 3 {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let mut got = collect.0.lock().unwrap().clone();
    got.sort();
    assert_eq!(got, vec!["one", "three", "two"]);

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(1), server)
      .await
      .expect("dispatcher stopped")
      .unwrap();
    assert!(result.is_ok());
  }
}
