//! slurper library entrypoint.
//!
//! Modules:
//! - `app`: startup and shared state
//! - `config`: JSON configuration and environment overrides
//! - `server`: accept loop, worker pool, fan-out to receivers
//! - `smtp`: the SMTP session that turns a connection into a mail item
//! - `storage`: transactional mail store and search
//! - `db`: schema setup and sqlite file handling
//! - `http`: JSON service API
//! - `models`: typed records used across layers
//! - `sanitize`: output sanitization for stored text
//! - `util`: tracing, HTML escaping, MIME helpers

pub mod app;
pub mod config;
pub mod db;
pub mod http;
pub mod models;
pub mod sanitize;
pub mod server;
pub mod smtp;
pub mod storage;
pub mod util;
