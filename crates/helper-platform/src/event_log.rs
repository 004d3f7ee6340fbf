/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Info,
    Warning,
    Error,
}

/// Sink for the run-time handler's numbered diagnostic events.
pub trait EventLog: Send + Sync {
    fn write(&self, kind: EventKind, id: u32, message: &str);

    fn info(&self, id: u32, message: &str) {
        self.write(EventKind::Info, id, message);
    }

    fn warning(&self, id: u32, message: &str) {
        self.write(EventKind::Warning, id, message);
    }

    fn error(&self, id: u32, message: &str) {
        self.write(EventKind::Error, id, message);
    }
}
