//! HTTP backend for the MobiCare support assistant: document-store
//! persistence proxy, chat and analysis endpoints, health and the web
//! client shell.

pub mod api;
pub mod bootstrap;
pub mod gateway;
pub mod health;
pub mod spa;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
