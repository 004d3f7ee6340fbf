//! The install run executed inside the service process.
//!
//! The service host hands the run two channels: control requests coming from
//! the service manager, and status reports going back to it. A run reports
//! StartPending, then Running (accepting no controls), installs the payload,
//! pads short runs to a minimum duration and finally reports StopPending.
//! The host reports Stopped once `execute` returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use helper_platform::config_store::ConfigStore;
use helper_platform::event_log::EventLog;
use helper_platform::service::{ControlCommand, ServiceState};
use helper_platform::ServiceError;

use crate::events;
use crate::payload::PayloadLauncher;

/// Runs shorter than this are padded up to it before stopping.
pub const MIN_RUN_TIME: Duration = Duration::from_secs(5);
/// Arguments the payload installer is started with.
pub const PAYLOAD_ARGS: &[&str] = &["/silent", "/accepteula"];

/// A status transition reported to the service manager. The service accepts
/// no control requests in any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub state: ServiceState,
    /// Service-specific exit code, non-zero only on a failed stop
    pub exit_code: u32,
}

impl StatusReport {
    pub fn new(state: ServiceState) -> Self {
        Self { state, exit_code: 0 }
    }

    pub fn stopped_with(exit_code: u32) -> Self {
        Self {
            state: ServiceState::Stopped,
            exit_code,
        }
    }
}

pub struct InstallRun {
    store: Arc<dyn ConfigStore>,
    launcher: Arc<dyn PayloadLauncher>,
    events: Arc<dyn EventLog>,
}

impl InstallRun {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        launcher: Arc<dyn PayloadLauncher>,
        events: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            store,
            launcher,
            events,
        }
    }

    /// Run one install pass. Payload and configuration failures are written to
    /// the event log; the StartPending -> Running -> StopPending sequence is
    /// always completed.
    pub async fn execute(
        &self,
        status: mpsc::UnboundedSender<StatusReport>,
        mut controls: mpsc::UnboundedReceiver<ControlCommand>,
    ) {
        report(&status, ServiceState::StartPending);
        report(&status, ServiceState::Running);
        let started = Instant::now();

        let work = self.install_payload();
        tokio::pin!(work);
        let mut controls_open = true;

        loop {
            tokio::select! {
                _ = &mut work => break,
                request = controls.recv(), if controls_open => match request {
                    Some(command) => self.events.warning(
                        events::CONTROL_IGNORED,
                        &format!("Ignoring {} request, no controls accepted while installing", command),
                    ),
                    None => controls_open = false,
                },
            }
        }

        self.pad_short_run(started).await;

        report(&status, ServiceState::StopPending);
    }

    async fn install_payload(&self) {
        if let Err(e) = self.try_install_payload().await {
            let id = match e {
                ServiceError::ConfigMissing(_) => events::PAYLOAD_LOCATION_MISSING,
                ServiceError::Spawn { .. } => events::PAYLOAD_SPAWN_FAILED,
                _ => events::PAYLOAD_RUN_FAILED,
            };
            self.events.error(id, &e.to_string());
        }
    }

    async fn try_install_payload(&self) -> Result<(), ServiceError> {
        let path = self.store.read_payload_location()?;
        self.events
            .info(events::PAYLOAD_INSTALLING, &format!("Installing from {}", path));

        let mut process = self.launcher.spawn(&path, PAYLOAD_ARGS)?;
        self.events.info(events::PAYLOAD_STARTED, "Exec Started");

        process.wait().await?;
        self.events.info(events::PAYLOAD_FINISHED, "Exec Finished");
        Ok(())
    }

    async fn pad_short_run(&self, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed < MIN_RUN_TIME {
            let remaining = MIN_RUN_TIME - elapsed;
            self.events.info(
                events::SHORT_RUN_PADDED,
                &format!(
                    "Sleeping {:.3}s because only did {:.3}s of work",
                    remaining.as_secs_f64(),
                    elapsed.as_secs_f64()
                ),
            );
            tokio::time::sleep(remaining).await;
        } else {
            self.events.info(
                events::RUN_DURATION,
                &format!("Executed in {:.3} seconds", elapsed.as_secs_f64()),
            );
        }
    }
}

fn report(status: &mpsc::UnboundedSender<StatusReport>, state: ServiceState) {
    debug!("reporting service state {:?}", state);
    if status.send(StatusReport::new(state)).is_err() {
        warn!("service host stopped listening for status reports ({:?} dropped)", state);
    }
}
