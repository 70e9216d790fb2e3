//! Typed records shared by the pipeline, storage and service layers.

pub mod attachment;
pub mod mail;
pub mod search;
