//! Fan-out of queued mail to every receiver.
//!
//! The drain loop never waits on a delivery. Each message's deliveries run as
//! a task group that a separate supervisor joins under a deadline, so slow or
//! failing receivers are reported without holding up the queue.

use super::{MailReceiver, ReceiverError};
use crate::models::mail::MailItem;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
  sync::mpsc,
  task::{Id, JoinHandle, JoinSet},
  time::{Instant, timeout_at},
};
use tracing::{debug, info, warn};

pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of delivering one message to every receiver.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
  pub mail_id: String,
  pub delivered: usize,
  /// Receiver name and error text.
  pub failed: Vec<(String, String)>,
  pub timed_out: usize,
}

impl DeliveryReport {
  pub fn is_complete(&self) -> bool {
    self.failed.is_empty() && self.timed_out == 0
  }
}

#[derive(Clone)]
pub struct Distributor {
  receivers: Arc<[Arc<dyn MailReceiver>]>,
  timeout: Duration,
}

impl Distributor {
  pub fn new(receivers: Vec<Arc<dyn MailReceiver>>) -> Self {
    Self {
      receivers: receivers.into(),
      timeout: DEFAULT_DELIVERY_TIMEOUT,
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Drain `inbox` in FIFO order until every sender is gone.
  pub async fn run(self, mut inbox: mpsc::Receiver<MailItem>) {
    info!(receivers = self.receivers.len(), "receiver(s) listening");
    while let Some(item) = inbox.recv().await {
      let _ = self.publish(item);
    }
    debug!("mail queue closed, distributor stopping");
  }

  /// Start one delivery per receiver and hand the group to a supervisor.
  /// The returned handle resolves once every delivery finished or the
  /// deadline passed.
  pub fn publish(&self, item: MailItem) -> JoinHandle<DeliveryReport> {
    let item = Arc::new(item);
    let mut deliveries = JoinSet::new();
    let mut owners = HashMap::with_capacity(self.receivers.len());
    for (index, receiver) in self.receivers.iter().enumerate() {
      let receiver = receiver.clone();
      let item = item.clone();
      let handle = deliveries.spawn(async move { receiver.receive(&item).await });
      owners.insert(handle.id(), index);
    }

    let names: Vec<String> = self.receivers.iter().map(|r| r.name().to_string()).collect();
    let deadline = Instant::now() + self.timeout;
    tokio::spawn(supervise(
      item.id.clone(),
      names,
      owners,
      deliveries,
      deadline,
    ))
  }
}

/// Joins one message's deliveries. `owners` maps each task to the index of
/// its receiver in `names`.
async fn supervise(
  mail_id: String,
  names: Vec<String>,
  owners: HashMap<Id, usize>,
  mut deliveries: JoinSet<Result<(), ReceiverError>>,
  deadline: Instant,
) -> DeliveryReport {
  let mut report = DeliveryReport {
    mail_id,
    ..Default::default()
  };
  let mut pending = vec![true; names.len()];

  loop {
    let (id, outcome) = match timeout_at(deadline, deliveries.join_next_with_id()).await {
      Ok(None) => break,
      Ok(Some(Ok((id, result)))) => (id, result.map_err(|e| e.to_string())),
      Ok(Some(Err(join))) => (join.id(), Err(format!("delivery task failed: {join}"))),
      Err(_) => {
        deliveries.abort_all();
        for (index, still) in pending.iter().enumerate() {
          if *still {
            report.timed_out += 1;
            warn!(mail_id = %report.mail_id, receiver = %names[index], "delivery timed out");
          }
        }
        break;
      }
    };

    let Some(&index) = owners.get(&id) else {
      continue;
    };
    pending[index] = false;
    match outcome {
      Ok(()) => report.delivered += 1,
      Err(e) => {
        warn!(mail_id = %report.mail_id, receiver = %names[index], "delivery failed: {e}");
        report.failed.push((names[index].clone(), e));
      }
    }
  }

  debug!(
    mail_id = %report.mail_id,
    delivered = report.delivered,
    failed = report.failed.len(),
    timed_out = report.timed_out,
    "delivery finished"
  );
  report
}
