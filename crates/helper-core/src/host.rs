//! Glue between a service framework and an [`InstallRun`].

use tokio::sync::mpsc;
use tracing::info;

use helper_platform::event_log::EventLog;
use helper_platform::service::{ControlCommand, ServiceState};

use crate::events;
use crate::execution::{InstallRun, StatusReport};

/// Drive one install run to completion.
///
/// Every status report the run produces is handed to `on_status` as soon as
/// it is produced, followed by a final Stopped report after the run returns.
pub async fn drive<F>(
    name: &str,
    run: &InstallRun,
    events: &dyn EventLog,
    controls: mpsc::UnboundedReceiver<ControlCommand>,
    mut on_status: F,
) where
    F: FnMut(&StatusReport),
{
    events.info(events::SERVICE_STARTING, &format!("starting {} service", name));

    let (status_tx, mut status_rx) = mpsc::unbounded_channel();
    let forward = async {
        while let Some(report) = status_rx.recv().await {
            on_status(&report);
        }
    };
    tokio::join!(run.execute(status_tx, controls), forward);

    on_status(&StatusReport::new(ServiceState::Stopped));
    events.info(events::SERVICE_STOPPED, &format!("{} service stopped", name));
}

/// Service-specific exit code reported when the host cannot set up a run.
pub const SETUP_FAILED_EXIT_CODE: u32 = 1;

/// Give up before the install run starts: the reason goes to the event log
/// and the service manager is told the service stopped with
/// [`SETUP_FAILED_EXIT_CODE`].
pub fn abort_setup<F>(name: &str, reason: &str, events: &dyn EventLog, mut on_status: F)
where
    F: FnMut(&StatusReport),
{
    events.error(
        events::SERVICE_SETUP_FAILED,
        &format!("cannot run {} service: {}", name, reason),
    );
    on_status(&StatusReport::stopped_with(SETUP_FAILED_EXIT_CODE));
}

/// Interactive (debug) run: status changes are logged and Ctrl+C is
/// delivered as a stop request, as the service manager would.
pub async fn run_interactive(name: &str, run: &InstallRun, events: &dyn EventLog) {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let ctrl_c = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, delivering stop request");
            if control_tx.send(ControlCommand::Stop).is_err() {
                break;
            }
        }
    });

    drive(name, run, events, control_rx, |report| {
        info!("{} service state -> {:?}", name, report.state);
    })
    .await;

    ctrl_c.abort();
}
