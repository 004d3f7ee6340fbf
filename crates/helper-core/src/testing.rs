//! In-memory stand-ins for the platform traits, shared by the unit tests.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use helper_platform::config_store::ConfigStore;
use helper_platform::event_log::{EventKind, EventLog};
use helper_platform::service::{ControlCommand, ServiceIdentity, ServiceRegistry, ServiceState};
use helper_platform::{ConfigError, ServiceError};

use crate::payload::{PayloadLauncher, PayloadProcess};

#[derive(Default)]
struct RegistryState {
    installed: HashSet<String>,
    calls: Vec<String>,
    scripted: VecDeque<ServiceState>,
    steady: Option<ServiceState>,
    control_reply: Option<ServiceState>,
    fail_start: bool,
    fail_query: bool,
}

/// Service registry keeping registrations in memory. `query` replays the
/// scripted states first, then keeps returning the steady state.
#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<RegistryState>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_installed(self, name: &str) -> Self {
        self.state.lock().unwrap().installed.insert(name.to_string());
        self
    }

    pub fn script_states(self, states: &[ServiceState], steady: ServiceState) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            s.scripted = states.iter().copied().collect();
            s.steady = Some(steady);
        }
        self
    }

    pub fn control_reply(self, state: ServiceState) -> Self {
        self.state.lock().unwrap().control_reply = Some(state);
        self
    }

    pub fn failing_start(self) -> Self {
        self.state.lock().unwrap().fail_start = true;
        self
    }

    pub fn failing_query(self) -> Self {
        self.state.lock().unwrap().fail_query = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.state.lock().unwrap().installed.contains(name)
    }
}

impl ServiceRegistry for FakeRegistry {
    fn install(&self, identity: &ServiceIdentity, _executable: &Path) -> Result<(), ServiceError> {
        let mut s = self.state.lock().unwrap();
        s.calls.push("install".to_string());
        if !s.installed.insert(identity.name.clone()) {
            return Err(ServiceError::AlreadyExists {
                name: identity.name.clone(),
            });
        }
        Ok(())
    }

    fn remove(&self, identity: &ServiceIdentity) -> Result<(), ServiceError> {
        let mut s = self.state.lock().unwrap();
        s.calls.push("remove".to_string());
        if !s.installed.remove(&identity.name) {
            return Err(ServiceError::NotInstalled {
                name: identity.name.clone(),
            });
        }
        Ok(())
    }

    fn start(&self, identity: &ServiceIdentity, args: &[&str]) -> Result<(), ServiceError> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(format!("start {}", args.join(" ")));
        if s.fail_start {
            return Err(ServiceError::Start {
                name: identity.name.clone(),
                reason: "start rejected".to_string(),
            });
        }
        Ok(())
    }

    fn query(&self, identity: &ServiceIdentity) -> Result<ServiceState, ServiceError> {
        let mut s = self.state.lock().unwrap();
        s.calls.push("query".to_string());
        if s.fail_query {
            return Err(ServiceError::Query {
                name: identity.name.clone(),
                reason: "query rejected".to_string(),
            });
        }
        let state = match s.scripted.pop_front() {
            Some(state) => state,
            None => s.steady.unwrap_or(ServiceState::Stopped),
        };
        Ok(state)
    }

    fn send_control(
        &self,
        _identity: &ServiceIdentity,
        command: ControlCommand,
    ) -> Result<ServiceState, ServiceError> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(format!("control {}", command));
        Ok(s.control_reply.unwrap_or(ServiceState::StopPending))
    }
}

/// Configuration store backed by two optional levels: namespace and value.
pub struct FakeStore {
    namespace_present: Mutex<bool>,
    value: Mutex<Option<String>>,
    writes: Mutex<usize>,
}

impl FakeStore {
    pub fn empty() -> Self {
        Self {
            namespace_present: Mutex::new(false),
            value: Mutex::new(None),
            writes: Mutex::new(0),
        }
    }

    pub fn namespace_only() -> Self {
        let store = Self::empty();
        *store.namespace_present.lock().unwrap() = true;
        store
    }

    pub fn with_value(path: &str) -> Self {
        let store = Self::namespace_only();
        *store.value.lock().unwrap() = Some(path.to_string());
        store
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    pub fn value(&self) -> Option<String> {
        self.value.lock().unwrap().clone()
    }
}

impl ConfigStore for FakeStore {
    fn read_payload_location(&self) -> Result<String, ConfigError> {
        if !*self.namespace_present.lock().unwrap() {
            return Err(ConfigError::NamespaceMissing {
                namespace: r"SOFTWARE\VeeamHub".to_string(),
            });
        }
        self.value.lock().unwrap().clone().ok_or(ConfigError::ValueMissing {
            namespace: r"SOFTWARE\VeeamHub".to_string(),
            value: "VAWExecSrc".to_string(),
        })
    }

    fn write_payload_location(&self, path: &str) -> Result<(), ConfigError> {
        *self.writes.lock().unwrap() += 1;
        *self.namespace_present.lock().unwrap() = true;
        *self.value.lock().unwrap() = Some(path.to_string());
        Ok(())
    }
}

/// Event sink that remembers every event.
#[derive(Default)]
pub struct RecordingEventLog {
    events: Mutex<Vec<(EventKind, u32, String)>>,
}

impl RecordingEventLog {
    pub fn ids(&self) -> Vec<u32> {
        self.events.lock().unwrap().iter().map(|(_, id, _)| *id).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(_, _, m)| m.clone()).collect()
    }

    pub fn kind_of(&self, id: u32) -> Option<EventKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|(_, event_id, _)| *event_id == id)
            .map(|(kind, _, _)| *kind)
    }
}

impl EventLog for RecordingEventLog {
    fn write(&self, kind: EventKind, id: u32, message: &str) {
        self.events.lock().unwrap().push((kind, id, message.to_string()));
    }
}

#[derive(Clone, Copy)]
pub enum PayloadOutcome {
    SpawnFails,
    RunFails,
    Succeeds,
}

/// Launcher whose payload "runs" for a fixed (tokio) duration.
pub struct FakeLauncher {
    work: Duration,
    outcome: PayloadOutcome,
    launched: Mutex<Vec<String>>,
}

impl FakeLauncher {
    pub fn new(work: Duration, outcome: PayloadOutcome) -> Self {
        Self {
            work,
            outcome,
            launched: Mutex::new(Vec::new()),
        }
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

struct FakeProcess {
    path: String,
    work: Duration,
    fails: bool,
}

#[async_trait]
impl PayloadProcess for FakeProcess {
    async fn wait(&mut self) -> Result<(), ServiceError> {
        tokio::time::sleep(self.work).await;
        if self.fails {
            return Err(ServiceError::Run {
                path: self.path.clone(),
                reason: "exit code 1603".to_string(),
            });
        }
        Ok(())
    }
}

impl PayloadLauncher for FakeLauncher {
    fn spawn(&self, program: &str, args: &[&str]) -> Result<Box<dyn PayloadProcess>, ServiceError> {
        self.launched
            .lock()
            .unwrap()
            .push(format!("{} {}", program, args.join(" ")));
        match self.outcome {
            PayloadOutcome::SpawnFails => Err(ServiceError::Spawn {
                path: program.to_string(),
                reason: "file not found".to_string(),
            }),
            outcome => Ok(Box::new(FakeProcess {
                path: program.to_string(),
                work: self.work,
                fails: matches!(outcome, PayloadOutcome::RunFails),
            })),
        }
    }
}
