//! Application event log: source registration and the event sink used in
//! service mode.

#[cfg(target_os = "windows")]
use anyhow::{Context, Result};
#[cfg(target_os = "windows")]
use windows::core::PCWSTR;
#[cfg(target_os = "windows")]
use windows::Win32::Foundation::{HANDLE, PSID};
#[cfg(target_os = "windows")]
use windows::Win32::System::EventLog::{
    DeregisterEventSource, RegisterEventSourceW, ReportEventW, EVENTLOG_ERROR_TYPE,
    EVENTLOG_INFORMATION_TYPE, EVENTLOG_WARNING_TYPE,
};
#[cfg(target_os = "windows")]
use windows::Win32::System::Registry::{KEY_SET_VALUE, REG_EXPAND_SZ};
#[cfg(target_os = "windows")]
use tracing::warn;

#[cfg(target_os = "windows")]
use helper_platform::event_log::{EventKind, EventLog};

#[cfg(target_os = "windows")]
use crate::registry::{describe, to_wide, RegKey};

#[cfg(target_os = "windows")]
const APPLICATION_LOG_KEY: &str = r"SYSTEM\CurrentControlSet\Services\EventLog\Application";
#[cfg(target_os = "windows")]
const EVENT_MESSAGE_FILE: &str = r"%SystemRoot%\System32\EventCreate.exe";
// Error | Warning | Information
#[cfg(target_os = "windows")]
const TYPES_SUPPORTED: u32 = 0x1 | 0x2 | 0x4;

#[cfg(target_os = "windows")]
fn source_key(name: &str) -> String {
    format!(r"{}\{}", APPLICATION_LOG_KEY, name)
}

/// Register `name` as an Application event-log source. Fails if the source
/// already exists; a partially written source is removed again.
#[cfg(target_os = "windows")]
pub fn install_source(name: &str) -> Result<(), String> {
    let path = source_key(name);
    let (key, created) = RegKey::create(&path, KEY_SET_VALUE).map_err(describe)?;
    if !created {
        return Err(format!("{} registry key already exists", path));
    }

    let written = key
        .set_string("EventMessageFile", EVENT_MESSAGE_FILE, REG_EXPAND_SZ)
        .and_then(|_| key.set_dword("CustomSource", 1))
        .and_then(|_| key.set_dword("TypesSupported", TYPES_SUPPORTED));
    drop(key);

    if let Err(status) = written {
        let _ = RegKey::delete(&path);
        return Err(describe(status));
    }
    Ok(())
}

/// Remove the event-log source registered by [`install_source`].
#[cfg(target_os = "windows")]
pub fn remove_source(name: &str) -> Result<(), String> {
    RegKey::delete(&source_key(name)).map_err(describe)
}

/// Event sink writing to the Application event log.
#[cfg(target_os = "windows")]
pub struct WindowsEventLog {
    handle: HANDLE,
}

// The event source handle may be used from any thread
#[cfg(target_os = "windows")]
unsafe impl Send for WindowsEventLog {}
#[cfg(target_os = "windows")]
unsafe impl Sync for WindowsEventLog {}

#[cfg(target_os = "windows")]
impl WindowsEventLog {
    pub fn open(source: &str) -> Result<Self> {
        let wide = to_wide(source);
        let handle = unsafe { RegisterEventSourceW(PCWSTR::null(), PCWSTR(wide.as_ptr())) }
            .with_context(|| format!("failed to open event log source {}", source))?;
        Ok(Self { handle })
    }
}

#[cfg(target_os = "windows")]
impl EventLog for WindowsEventLog {
    fn write(&self, kind: EventKind, id: u32, message: &str) {
        let event_type = match kind {
            EventKind::Info => EVENTLOG_INFORMATION_TYPE,
            EventKind::Warning => EVENTLOG_WARNING_TYPE,
            EventKind::Error => EVENTLOG_ERROR_TYPE,
        };
        let wide = to_wide(message);
        let strings = [PCWSTR(wide.as_ptr())];
        let result = unsafe {
            ReportEventW(
                self.handle,
                event_type,
                0,
                id,
                PSID::default(),
                1,
                0,
                Some(strings.as_ptr()),
                None,
            )
        };
        if let Err(e) = result {
            warn!("failed to write event {}: {}", id, e);
        }
    }
}

#[cfg(target_os = "windows")]
impl Drop for WindowsEventLog {
    fn drop(&mut self) {
        unsafe {
            let _ = DeregisterEventSource(self.handle);
        }
    }
}
