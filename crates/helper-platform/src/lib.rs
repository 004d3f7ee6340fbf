// Platform-neutral service types and the traits each OS backend implements

pub mod config_store;
pub mod error;
pub mod event_log;
pub mod service;

pub use error::{ConfigError, ServiceError};
