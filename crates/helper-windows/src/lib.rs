// Windows backend: SCM client, registry store, event log, service host

mod registration;

#[cfg(target_os = "windows")]
pub mod registry;

#[cfg(target_os = "windows")]
pub mod event_log;

#[cfg(target_os = "windows")]
pub mod service;

#[cfg(target_os = "windows")]
pub mod session_detect;

#[cfg(target_os = "windows")]
pub mod service_host;
