use std::fmt;
use std::path::Path;

use crate::error::ServiceError;

/// Name pair under which the helper is registered with the service manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    /// Internal (key) name, e.g. `vawinstallhelper`
    pub name: String,
    /// Name shown in the services console
    pub display_name: String,
}

impl ServiceIdentity {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
        }
    }
}

/// Service state as reported by the OS service manager.
///
/// Discriminants follow the Win32 `SERVICE_*` state values so the numeric
/// form printed by `status` matches what `sc query` shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ServiceState {
    Stopped = 1,
    StartPending = 2,
    StopPending = 3,
    Running = 4,
    ContinuePending = 5,
    PausePending = 6,
    Paused = 7,
}

impl ServiceState {
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Control request sent to a running service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Stop,
    Pause,
    Continue,
    Interrogate,
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Continue => "continue",
            Self::Interrogate => "interrogate",
        };
        f.write_str(name)
    }
}

/// Synchronous client for the OS service-control manager.
///
/// Every call acquires its own manager connection and releases it before
/// returning; implementations never hold a handle across calls.
pub trait ServiceRegistry: Send + Sync {
    /// Register a new service for `identity` running `executable`, together with
    /// an event-log source of the same name. Either both exist afterwards or neither.
    fn install(&self, identity: &ServiceIdentity, executable: &Path) -> Result<(), ServiceError>;

    /// Delete the registration and its event-log source.
    fn remove(&self, identity: &ServiceIdentity) -> Result<(), ServiceError>;

    /// Ask the manager to start the service with the given arguments.
    fn start(&self, identity: &ServiceIdentity, args: &[&str]) -> Result<(), ServiceError>;

    /// Current state of the service.
    fn query(&self, identity: &ServiceIdentity) -> Result<ServiceState, ServiceError>;

    /// Send a control request, returning the state reported right after acceptance.
    fn send_control(
        &self,
        identity: &ServiceIdentity,
        command: ControlCommand,
    ) -> Result<ServiceState, ServiceError>;
}
