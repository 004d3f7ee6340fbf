//! Maps a command verb to a lifecycle or store operation.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use helper_platform::config_store::ConfigStore;

use crate::lifecycle::{LifecycleController, StatusSummary};

/// Process exit code for any reported failure.
pub const EXIT_FAILURE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Install,
    Remove,
    Start,
    Stop,
    InstallStart,
    Deploy,
    MkRegKey,
    Status,
}

impl Verb {
    pub const ALL: [Verb; 8] = [
        Verb::Install,
        Verb::Remove,
        Verb::Start,
        Verb::Stop,
        Verb::InstallStart,
        Verb::Deploy,
        Verb::MkRegKey,
        Verb::Status,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Install => "install",
            Verb::Remove => "remove",
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::InstallStart => "installstart",
            Verb::Deploy => "deploy",
            Verb::MkRegKey => "mkregkey",
            Verb::Status => "status",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = Verb::ALL.iter().map(|v| v.as_str()).collect();
                format!("unknown command '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

pub struct Dispatcher {
    controller: LifecycleController,
    store: Arc<dyn ConfigStore>,
}

impl Dispatcher {
    pub fn new(controller: LifecycleController, store: Arc<dyn ConfigStore>) -> Self {
        Self { controller, store }
    }

    /// Run `verb`. Success markers are written to `out` without a newline.
    pub async fn dispatch(
        &self,
        verb: Verb,
        argument: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<()> {
        let name = &self.controller.identity().name;
        match verb {
            Verb::Install => self
                .controller
                .install()
                .with_context(|| format!("failed to install {}", name))?,
            Verb::Remove => self
                .controller
                .remove()
                .with_context(|| format!("failed to remove {}", name))?,
            Verb::Start => self
                .controller
                .start()
                .with_context(|| format!("failed to start {}", name))?,
            Verb::Stop => self
                .controller
                .stop()
                .await
                .with_context(|| format!("failed to stop {}", name))?,
            Verb::InstallStart => self
                .controller
                .install_and_start()
                .with_context(|| format!("failed to install and start {}", name))?,
            Verb::Deploy => {
                self.controller
                    .deploy()
                    .await
                    .with_context(|| format!("failed to deploy {}", name))?;
                write!(out, "--StoppedRemoved")?;
            }
            Verb::MkRegKey => {
                let path = argument
                    .filter(|p| !p.trim().is_empty())
                    .context("mkregkey needs the payload path as second argument")?;
                self.store
                    .write_payload_location(path)
                    .context("failed to store payload location")?;
                info!("payload location set to {}", path);
            }
            Verb::Status => {
                let summary = self
                    .controller
                    .status()
                    .with_context(|| format!("failed to query {}", name))?;
                match summary {
                    StatusSummary::Running => write!(out, "--Running")?,
                    StatusSummary::NotRunning(state) => {
                        write!(out, "--Not running ({})", state.code())?
                    }
                }
            }
        }
        out.flush()?;
        Ok(())
    }
}

/// Exit code for the outcome of a dispatched command.
pub fn exit_code(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => EXIT_FAILURE,
    }
}
