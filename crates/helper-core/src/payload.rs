//! Launching and waiting for the external installer.

use async_trait::async_trait;
use tokio::process::{Child, Command};

use helper_platform::ServiceError;

/// A payload process that has been started.
#[async_trait]
pub trait PayloadProcess: Send {
    /// Wait for the process to exit. A non-zero exit status is an error.
    async fn wait(&mut self) -> Result<(), ServiceError>;
}

/// Starts payload processes.
pub trait PayloadLauncher: Send + Sync {
    fn spawn(&self, program: &str, args: &[&str]) -> Result<Box<dyn PayloadProcess>, ServiceError>;
}

/// Launcher backed by `tokio::process`.
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl PayloadLauncher for ProcessLauncher {
    fn spawn(&self, program: &str, args: &[&str]) -> Result<Box<dyn PayloadProcess>, ServiceError> {
        let child = Command::new(program)
            .args(args)
            .spawn()
            .map_err(|e| ServiceError::Spawn {
                path: program.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(ChildPayload {
            path: program.to_string(),
            child,
        }))
    }
}

struct ChildPayload {
    path: String,
    child: Child,
}

#[async_trait]
impl PayloadProcess for ChildPayload {
    async fn wait(&mut self) -> Result<(), ServiceError> {
        let status = self.child.wait().await.map_err(|e| ServiceError::Run {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        if !status.success() {
            return Err(ServiceError::Run {
                path: self.path.clone(),
                reason: format!("exited with {}", status),
            });
        }
        Ok(())
    }
}
