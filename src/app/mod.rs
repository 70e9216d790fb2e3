//! Application setup and runtime.

use crate::{
  config::Configuration,
  http,
  server::{Dispatcher, Distributor, MailReceiver, WorkerPool, dispatcher},
  smtp::SmtpParser,
  storage::Storage,
};
use std::{future::IntoFuture, sync::Arc};
use tracing::info;

const STORAGE_CONNECTIONS: u32 = 5;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
  pub storage: Storage,
}

/// Build the SMTP dispatcher with storage as its only receiver.
pub fn build_dispatcher(config: &Configuration, storage: &Storage) -> Dispatcher {
  let receivers: Vec<Arc<dyn MailReceiver>> = vec![Arc::new(storage.clone())];
  Dispatcher::new(
    WorkerPool::new(config.max_workers, Arc::new(SmtpParser::default())),
    Distributor::new(receivers).with_timeout(config.receiver_timeout()),
  )
}

/// Start the SMTP listener and the service API; stop on Ctrl-C or when
/// either fails.
pub async fn run(config_path: Option<&str>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
  crate::util::init_tracing();

  let config = Configuration::load(config_path)?;
  let storage = Storage::connect(&config.database_url()?, STORAGE_CONNECTIONS).await?;
  let state = AppState {
    storage: storage.clone(),
  };

  let smtp_listener = dispatcher::listen(&config.smtp_binding_address()).await?;
  let smtp = build_dispatcher(&config, &storage);

  let service_addr = config.service_binding_address();
  let service_listener = tokio::net::TcpListener::bind(&service_addr).await?;
  let app = http::build_router(state);
  info!("slurper service API: http://{}/mail", service_addr);

  tokio::select! {
    result = smtp.run(smtp_listener) => result?,
    result = axum::serve(service_listener, app).into_future() => result?,
    _ = tokio::signal::ctrl_c() => info!("shutting down"),
  }

  storage.close().await;
  Ok(())
}
