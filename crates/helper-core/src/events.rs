use tracing::{error, info, warn};

use helper_platform::event_log::{EventKind, EventLog};

// Event ids written by the service host and the install run.
pub const SERVICE_STARTING: u32 = 1001;
pub const SERVICE_STOPPED: u32 = 1002;
pub const SHORT_RUN_PADDED: u32 = 1003;
pub const RUN_DURATION: u32 = 1004;
pub const CONTROL_IGNORED: u32 = 1005;
pub const PAYLOAD_INSTALLING: u32 = 1010;
pub const PAYLOAD_STARTED: u32 = 1011;
pub const PAYLOAD_FINISHED: u32 = 1012;
pub const PAYLOAD_LOCATION_MISSING: u32 = 2001;
pub const PAYLOAD_SPAWN_FAILED: u32 = 2002;
pub const PAYLOAD_RUN_FAILED: u32 = 2003;
pub const SERVICE_SETUP_FAILED: u32 = 2004;

/// Event sink for interactive runs: events go to the tracing subscriber.
#[derive(Debug, Default)]
pub struct TracingEventLog {
    source: String,
}

impl TracingEventLog {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl EventLog for TracingEventLog {
    fn write(&self, kind: EventKind, id: u32, message: &str) {
        match kind {
            EventKind::Info => info!(source = %self.source, event_id = id, "{}", message),
            EventKind::Warning => warn!(source = %self.source, event_id = id, "{}", message),
            EventKind::Error => error!(source = %self.source, event_id = id, "{}", message),
        }
    }
}
