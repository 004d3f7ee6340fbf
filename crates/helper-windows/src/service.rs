//! Windows Service Control Manager (SCM) client.

#[cfg(target_os = "windows")]
use std::ffi::OsString;
#[cfg(target_os = "windows")]
use std::path::Path;

#[cfg(target_os = "windows")]
use tracing::{debug, info};
#[cfg(target_os = "windows")]
use windows_service::service::{
    Service, ServiceAccess, ServiceErrorControl, ServiceInfo, ServiceStartType, ServiceType,
};
#[cfg(target_os = "windows")]
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

#[cfg(target_os = "windows")]
use helper_platform::service::{ControlCommand, ServiceIdentity, ServiceRegistry, ServiceState};
#[cfg(target_os = "windows")]
use helper_platform::ServiceError;

#[cfg(target_os = "windows")]
use crate::event_log;
#[cfg(target_os = "windows")]
use crate::registration::{self, RegistrationSteps};

#[cfg(target_os = "windows")]
const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;

#[cfg(target_os = "windows")]
pub(crate) fn from_windows_state(state: windows_service::service::ServiceState) -> ServiceState {
    use windows_service::service::ServiceState as Win;
    match state {
        Win::Stopped => ServiceState::Stopped,
        Win::StartPending => ServiceState::StartPending,
        Win::StopPending => ServiceState::StopPending,
        Win::Running => ServiceState::Running,
        Win::ContinuePending => ServiceState::ContinuePending,
        Win::PausePending => ServiceState::PausePending,
        Win::Paused => ServiceState::Paused,
    }
}

#[cfg(target_os = "windows")]
pub(crate) fn to_windows_state(state: ServiceState) -> windows_service::service::ServiceState {
    use windows_service::service::ServiceState as Win;
    match state {
        ServiceState::Stopped => Win::Stopped,
        ServiceState::StartPending => Win::StartPending,
        ServiceState::StopPending => Win::StopPending,
        ServiceState::Running => Win::Running,
        ServiceState::ContinuePending => Win::ContinuePending,
        ServiceState::PausePending => Win::PausePending,
        ServiceState::Paused => Win::Paused,
    }
}

#[cfg(target_os = "windows")]
fn is_missing_service(e: &windows_service::Error) -> bool {
    matches!(e, windows_service::Error::Winapi(io) if io.raw_os_error() == Some(ERROR_SERVICE_DOES_NOT_EXIST))
}

/// SCM client. Holds no handles: every call connects, works and disconnects.
#[cfg(target_os = "windows")]
#[derive(Debug, Default)]
pub struct WindowsServiceRegistry;

#[cfg(target_os = "windows")]
impl WindowsServiceRegistry {
    pub fn new() -> Self {
        Self
    }

    fn connect(&self, name: &str, access: ServiceManagerAccess) -> Result<ServiceManager, ServiceError> {
        ServiceManager::local_computer(None::<&str>, access).map_err(|e| ServiceError::Access {
            name: name.to_string(),
            reason: format!("cannot connect to service manager: {}", e),
        })
    }

    fn open(&self, identity: &ServiceIdentity, access: ServiceAccess) -> Result<Service, ServiceError> {
        let manager = self.connect(&identity.name, ServiceManagerAccess::CONNECT)?;
        manager
            .open_service(&identity.name, access)
            .map_err(|e| ServiceError::Access {
                name: identity.name.clone(),
                reason: e.to_string(),
            })
    }
}

#[cfg(target_os = "windows")]
impl RegistrationSteps for WindowsServiceRegistry {
    type Entry = Service;

    fn create_entry(&self, identity: &ServiceIdentity, executable: &Path) -> Result<Service, ServiceError> {
        let manager = self.connect(
            &identity.name,
            ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE,
        )?;

        if manager
            .open_service(&identity.name, ServiceAccess::QUERY_STATUS)
            .is_ok()
        {
            return Err(ServiceError::AlreadyExists {
                name: identity.name.clone(),
            });
        }

        let info = ServiceInfo {
            name: OsString::from(&identity.name),
            display_name: OsString::from(&identity.display_name),
            service_type: ServiceType::OWN_PROCESS,
            start_type: ServiceStartType::OnDemand,
            error_control: ServiceErrorControl::Normal,
            executable_path: executable.to_path_buf(),
            launch_arguments: vec![],
            dependencies: vec![],
            account_name: None, // LocalSystem
            account_password: None,
        };
        let service = manager
            .create_service(&info, ServiceAccess::DELETE)
            .map_err(|e| ServiceError::Registration {
                name: identity.name.clone(),
                reason: e.to_string(),
            })?;
        debug!("service entry created for {}", identity.name);
        Ok(service)
    }

    fn open_entry(&self, identity: &ServiceIdentity) -> Result<Service, ServiceError> {
        let manager = self.connect(&identity.name, ServiceManagerAccess::CONNECT)?;
        manager
            .open_service(&identity.name, ServiceAccess::DELETE)
            .map_err(|e| {
                if is_missing_service(&e) {
                    ServiceError::NotInstalled {
                        name: identity.name.clone(),
                    }
                } else {
                    ServiceError::Access {
                        name: identity.name.clone(),
                        reason: e.to_string(),
                    }
                }
            })
    }

    fn delete_entry(&self, entry: Service) -> Result<(), String> {
        entry.delete().map_err(|e| e.to_string())
    }

    fn install_source(&self, name: &str) -> Result<(), String> {
        event_log::install_source(name)
    }

    fn remove_source(&self, name: &str) -> Result<(), String> {
        event_log::remove_source(name)
    }
}

#[cfg(target_os = "windows")]
impl ServiceRegistry for WindowsServiceRegistry {
    fn install(&self, identity: &ServiceIdentity, executable: &Path) -> Result<(), ServiceError> {
        registration::install(self, identity, executable)?;
        info!("registered service {} and its event source", identity.name);
        Ok(())
    }

    fn remove(&self, identity: &ServiceIdentity) -> Result<(), ServiceError> {
        registration::remove(self, identity)
    }

    fn start(&self, identity: &ServiceIdentity, args: &[&str]) -> Result<(), ServiceError> {
        let service = self.open(identity, ServiceAccess::START)?;
        service.start(args).map_err(|e| ServiceError::Start {
            name: identity.name.clone(),
            reason: e.to_string(),
        })
    }

    fn query(&self, identity: &ServiceIdentity) -> Result<ServiceState, ServiceError> {
        let service = self.open(identity, ServiceAccess::QUERY_STATUS)?;
        let status = service.query_status().map_err(|e| ServiceError::Query {
            name: identity.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(from_windows_state(status.current_state))
    }

    fn send_control(
        &self,
        identity: &ServiceIdentity,
        command: ControlCommand,
    ) -> Result<ServiceState, ServiceError> {
        let service = self.open(
            identity,
            ServiceAccess::STOP
                | ServiceAccess::PAUSE_CONTINUE
                | ServiceAccess::INTERROGATE
                | ServiceAccess::QUERY_STATUS,
        )?;
        let status = match command {
            ControlCommand::Stop => service.stop(),
            ControlCommand::Pause => service.pause(),
            ControlCommand::Continue => service.resume(),
            ControlCommand::Interrogate => service.query_status(),
        }
        .map_err(|e| ServiceError::Control {
            name: identity.name.clone(),
            command: command.to_string(),
            reason: e.to_string(),
        })?;
        Ok(from_windows_state(status.current_state))
    }
}
