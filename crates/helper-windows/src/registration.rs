//! Ordering of the two registrations a service install consists of: the
//! service entry and the event-log source of the same name. Either both
//! exist afterwards or neither does.

#![cfg_attr(not(target_os = "windows"), allow(dead_code))]

use std::path::Path;

use tracing::warn;

use helper_platform::service::ServiceIdentity;
use helper_platform::ServiceError;

/// Individual registry operations behind install and remove.
pub(crate) trait RegistrationSteps {
    /// Handle to a service entry, consumed when the entry is deleted.
    type Entry;

    /// Create the service entry. Fails with `AlreadyExists` if one exists.
    fn create_entry(
        &self,
        identity: &ServiceIdentity,
        executable: &Path,
    ) -> Result<Self::Entry, ServiceError>;

    /// Open an existing entry for deletion. Fails with `NotInstalled` if none exists.
    fn open_entry(&self, identity: &ServiceIdentity) -> Result<Self::Entry, ServiceError>;

    fn delete_entry(&self, entry: Self::Entry) -> Result<(), String>;

    fn install_source(&self, name: &str) -> Result<(), String>;

    fn remove_source(&self, name: &str) -> Result<(), String>;
}

/// Create the entry, then the event source. A failed source registration
/// deletes the entry again.
pub(crate) fn install<S: RegistrationSteps>(
    steps: &S,
    identity: &ServiceIdentity,
    executable: &Path,
) -> Result<(), ServiceError> {
    let entry = steps.create_entry(identity, executable)?;

    if let Err(reason) = steps.install_source(&identity.name) {
        let mut reason = format!("SetupEventLogSource() failed: {}", reason);
        if let Err(e) = steps.delete_entry(entry) {
            warn!("rollback of service {} failed: {}", identity.name, e);
            reason.push_str(&format!("; rollback failed: {}", e));
        }
        return Err(ServiceError::Registration {
            name: identity.name.clone(),
            reason,
        });
    }
    Ok(())
}

/// Delete the entry, then its event source. Anything but a missing entry is
/// a `Registration` failure.
pub(crate) fn remove<S: RegistrationSteps>(
    steps: &S,
    identity: &ServiceIdentity,
) -> Result<(), ServiceError> {
    let entry = steps.open_entry(identity).map_err(|e| match e {
        ServiceError::NotInstalled { .. } => e,
        other => ServiceError::Registration {
            name: identity.name.clone(),
            reason: other.to_string(),
        },
    })?;

    steps
        .delete_entry(entry)
        .map_err(|reason| ServiceError::Registration {
            name: identity.name.clone(),
            reason,
        })?;

    steps
        .remove_source(&identity.name)
        .map_err(|reason| ServiceError::Registration {
            name: identity.name.clone(),
            reason: format!("RemoveEventLogSource() failed: {}", reason),
        })
}
