pub mod config;
pub mod dispatch;
pub mod events;
pub mod execution;
pub mod host;
pub mod lifecycle;
pub mod payload;

#[cfg(test)]
pub(crate) mod testing;
