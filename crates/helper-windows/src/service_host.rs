//! Entry point for the service process: hands control to the SCM dispatcher,
//! or runs the install pass directly when started from a console.

#[cfg(target_os = "windows")]
use std::ffi::OsString;
#[cfg(target_os = "windows")]
use std::sync::{Arc, OnceLock};
#[cfg(target_os = "windows")]
use std::time::Duration;

#[cfg(target_os = "windows")]
use anyhow::{anyhow, Context, Result};
#[cfg(target_os = "windows")]
use tokio::sync::mpsc;
#[cfg(target_os = "windows")]
use tracing::{error, info, warn};
#[cfg(target_os = "windows")]
use windows_service::service::{
    ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceStatus, ServiceType,
};
#[cfg(target_os = "windows")]
use windows_service::service_control_handler::{self, ServiceControlHandlerResult};
#[cfg(target_os = "windows")]
use windows_service::{define_windows_service, service_dispatcher};

#[cfg(target_os = "windows")]
use helper_core::config::HelperConfig;
#[cfg(target_os = "windows")]
use helper_core::events::TracingEventLog;
#[cfg(target_os = "windows")]
use helper_core::execution::{InstallRun, StatusReport};
#[cfg(target_os = "windows")]
use helper_core::host;
#[cfg(target_os = "windows")]
use helper_core::payload::ProcessLauncher;
#[cfg(target_os = "windows")]
use helper_platform::event_log::EventLog;
#[cfg(target_os = "windows")]
use helper_platform::service::ControlCommand;

#[cfg(target_os = "windows")]
use crate::event_log::WindowsEventLog;
#[cfg(target_os = "windows")]
use crate::registry::RegistryConfigStore;
#[cfg(target_os = "windows")]
use crate::service::to_windows_state;
#[cfg(target_os = "windows")]
use crate::session_detect;

// service_main is called by the dispatcher without context
#[cfg(target_os = "windows")]
static HOST_CONFIG: OnceLock<HelperConfig> = OnceLock::new();

#[cfg(target_os = "windows")]
define_windows_service!(ffi_service_main, service_main);

/// Run the install pass: under the SCM when started as a service, directly
/// with console logging when started from an interactive session.
#[cfg(target_os = "windows")]
pub fn run(config: HelperConfig) -> Result<()> {
    if session_detect::is_interactive_session() {
        info!("Is interactive, running debug");
        return run_interactive(&config);
    }

    let name = config.service_name.clone();
    HOST_CONFIG
        .set(config)
        .map_err(|_| anyhow!("service host already started"))?;
    service_dispatcher::start(&name, ffi_service_main)
        .context("failed to connect to the service control dispatcher")?;
    Ok(())
}

#[cfg(target_os = "windows")]
fn service_main(_arguments: Vec<OsString>) {
    let Some(config) = HOST_CONFIG.get() else {
        return;
    };
    if let Err(e) = run_service(config) {
        error!("service run failed: {:#}", e);
    }
}

#[cfg(target_os = "windows")]
fn run_service(config: &HelperConfig) -> Result<()> {
    let name = config.service_name.as_str();

    // Registered first so every later failure can still be reported as Stopped
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let status_handle =
        service_control_handler::register(name, move |control| match control {
            ServiceControl::Interrogate => ServiceControlHandlerResult::NoError,
            other => {
                if let Some(command) = to_command(other) {
                    let _ = control_tx.send(command);
                }
                ServiceControlHandlerResult::NotImplemented
            }
        })
        .context("failed to register service control handler")?;
    let on_status = |report: &StatusReport| {
        if let Err(e) = status_handle.set_service_status(to_service_status(report)) {
            warn!("failed to report {:?} to the SCM: {}", report.state, e);
        }
    };

    let events = open_event_sink(name);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let reason = format!("failed to build runtime: {}", e);
            host::abort_setup(name, &reason, events.as_ref(), on_status);
            return Err(e).context("failed to build runtime");
        }
    };

    let run = InstallRun::new(
        Arc::new(RegistryConfigStore::from_config(config)),
        Arc::new(ProcessLauncher::new()),
        events.clone(),
    );
    runtime.block_on(host::drive(name, &run, events.as_ref(), control_rx, on_status));
    Ok(())
}

/// Application event log under the service name, or the tracing sink when
/// the event source cannot be opened.
#[cfg(target_os = "windows")]
fn open_event_sink(name: &str) -> Arc<dyn EventLog> {
    match WindowsEventLog::open(name) {
        Ok(log) => Arc::new(log),
        Err(e) => {
            warn!("event log unavailable, logging to tracing instead: {:#}", e);
            Arc::new(TracingEventLog::new(name))
        }
    }
}

#[cfg(target_os = "windows")]
fn run_interactive(config: &HelperConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    let events = Arc::new(TracingEventLog::new(config.service_name.clone()));
    let event_sink: Arc<dyn EventLog> = events.clone();
    let run = InstallRun::new(
        Arc::new(RegistryConfigStore::from_config(config)),
        Arc::new(ProcessLauncher::new()),
        event_sink,
    );

    runtime.block_on(host::run_interactive(&config.service_name, &run, events.as_ref()));
    Ok(())
}

#[cfg(target_os = "windows")]
fn to_command(control: ServiceControl) -> Option<ControlCommand> {
    match control {
        ServiceControl::Stop | ServiceControl::Shutdown => Some(ControlCommand::Stop),
        ServiceControl::Pause => Some(ControlCommand::Pause),
        ServiceControl::Continue => Some(ControlCommand::Continue),
        _ => None,
    }
}

#[cfg(target_os = "windows")]
fn to_service_status(report: &StatusReport) -> ServiceStatus {
    let exit_code = match report.exit_code {
        0 => ServiceExitCode::Win32(0),
        code => ServiceExitCode::ServiceSpecific(code),
    };

    ServiceStatus {
        service_type: ServiceType::OWN_PROCESS,
        current_state: to_windows_state(report.state),
        controls_accepted: ServiceControlAccept::empty(),
        exit_code,
        checkpoint: 0,
        wait_hint: Duration::default(),
        process_id: None,
    }
}
