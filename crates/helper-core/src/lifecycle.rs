//! Multi-step service sequences and bounded state-convergence polling.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use helper_platform::service::{ControlCommand, ServiceIdentity, ServiceRegistry, ServiceState};
use helper_platform::ServiceError;

/// Poll interval while waiting for a control request to take effect.
pub const CONTROL_POLL_INTERVAL: Duration = Duration::from_millis(300);
/// Upper bound for a control request to converge.
pub const CONTROL_MAX_WAIT: Duration = Duration::from_secs(10);
/// Tick of the stop-wait loop.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// How long `deploy` waits for the payload run to finish.
pub const DEPLOY_STOP_TIMEOUT: Duration = Duration::from_secs(500);
/// Arguments passed with a start request.
pub const START_ARGS: &[&str] = &["is", "manual-started"];

/// Outcome of a status query, collapsed to running / not running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSummary {
    Running,
    NotRunning(ServiceState),
}

pub struct LifecycleController {
    registry: Arc<dyn ServiceRegistry>,
    identity: ServiceIdentity,
    /// Executable registered on install (normally the current binary)
    executable: PathBuf,
}

impl LifecycleController {
    pub fn new(
        registry: Arc<dyn ServiceRegistry>,
        identity: ServiceIdentity,
        executable: PathBuf,
    ) -> Self {
        Self {
            registry,
            identity,
            executable,
        }
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn install(&self) -> Result<(), ServiceError> {
        info!(
            "installing service {} ({}) -> {}",
            self.identity.name,
            self.identity.display_name,
            self.executable.display()
        );
        self.registry.install(&self.identity, &self.executable)?;
        info!("service installed: {}", self.identity.name);
        Ok(())
    }

    pub fn remove(&self) -> Result<(), ServiceError> {
        info!("removing service {}", self.identity.name);
        self.registry.remove(&self.identity)?;
        info!("service removed: {}", self.identity.name);
        Ok(())
    }

    pub fn start(&self) -> Result<(), ServiceError> {
        info!("starting service {}", self.identity.name);
        self.registry.start(&self.identity, START_ARGS)
    }

    pub fn install_and_start(&self) -> Result<(), ServiceError> {
        self.install()?;
        self.start()
    }

    /// Send `command` and poll until the service reports `target`.
    ///
    /// Query failures end the wait immediately.
    pub async fn control_and_wait_for(
        &self,
        command: ControlCommand,
        target: ServiceState,
        max_wait: Duration,
    ) -> Result<(), ServiceError> {
        let mut state = self.registry.send_control(&self.identity, command)?;
        let deadline = Instant::now() + max_wait;

        while state != target {
            if Instant::now() >= deadline {
                return Err(ServiceError::Timeout {
                    name: self.identity.name.clone(),
                    target: format!("state={}", target),
                    waited: max_wait,
                });
            }
            tokio::time::sleep(CONTROL_POLL_INTERVAL).await;
            state = self.registry.query(&self.identity)?;
            debug!("service {} in state {} after {}", self.identity.name, state, command);
        }

        Ok(())
    }

    pub async fn stop(&self) -> Result<(), ServiceError> {
        info!("stopping service {}", self.identity.name);
        self.control_and_wait_for(ControlCommand::Stop, ServiceState::Stopped, CONTROL_MAX_WAIT)
            .await
    }

    /// Poll once per tick until the service is stopped or `timeout` elapses.
    /// The first query happens immediately. A tick that falls on the deadline
    /// still gets its query.
    pub async fn wait_for_stop(&self, timeout: Duration) -> Result<(), ServiceError> {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut tick = tokio::time::interval(STOP_POLL_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = tick.tick() => {
                    let state = self.registry.query(&self.identity)?;
                    if state == ServiceState::Stopped {
                        return Ok(());
                    }
                    debug!("waiting for {} to stop (state={})", self.identity.name, state);
                }
                _ = &mut deadline => {
                    return Err(ServiceError::Timeout {
                        name: self.identity.name.clone(),
                        target: "stopped".to_string(),
                        waited: timeout,
                    });
                }
            }
        }
    }

    /// Install, start, wait for the payload run to stop the service, remove.
    /// The first failing step ends the sequence.
    pub async fn deploy(&self) -> Result<(), ServiceError> {
        self.install()?;
        self.start()?;
        info!(
            "waiting up to {}s for {} to stop",
            DEPLOY_STOP_TIMEOUT.as_secs(),
            self.identity.name
        );
        self.wait_for_stop(DEPLOY_STOP_TIMEOUT).await?;
        self.remove()
    }

    pub fn status(&self) -> Result<StatusSummary, ServiceError> {
        let state = self.registry.query(&self.identity)?;
        Ok(match state {
            ServiceState::Running => StatusSummary::Running,
            other => StatusSummary::NotRunning(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRegistry;

    fn controller(registry: &Arc<FakeRegistry>) -> LifecycleController {
        let registry: Arc<dyn ServiceRegistry> = registry.clone();
        LifecycleController::new(
            registry,
            ServiceIdentity::new("vawinstallhelper", "VAW Install Helper"),
            PathBuf::from(r"C:\tools\vawinstallhelper.exe"),
        )
    }

    #[test]
    fn install_then_remove_leaves_registry_unchanged() {
        let registry = Arc::new(FakeRegistry::new());
        let ctl = controller(&registry);

        ctl.install().unwrap();
        assert!(registry.is_installed("vawinstallhelper"));
        ctl.remove().unwrap();
        assert!(!registry.is_installed("vawinstallhelper"));
    }

    #[test]
    fn second_install_reports_already_exists() {
        let registry = Arc::new(FakeRegistry::new());
        let ctl = controller(&registry);

        ctl.install().unwrap();
        let err = ctl.install().unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists { .. }));
    }

    #[test]
    fn remove_without_install_reports_not_installed() {
        let registry = Arc::new(FakeRegistry::new());
        let err = controller(&registry).remove().unwrap_err();
        assert!(matches!(err, ServiceError::NotInstalled { .. }));
    }

    #[test]
    fn start_passes_fixed_arguments() {
        let registry = Arc::new(FakeRegistry::new());
        controller(&registry).start().unwrap();
        assert_eq!(registry.calls(), vec!["start is manual-started"]);
    }

    #[test]
    fn install_and_start_skips_start_when_install_fails() {
        let registry = Arc::new(FakeRegistry::new().with_installed("vawinstallhelper"));
        assert!(controller(&registry).install_and_start().is_err());
        assert_eq!(registry.calls(), vec!["install"]);
    }

    #[test]
    fn status_collapses_non_running_states() {
        let registry = Arc::new(FakeRegistry::new().script_states(&[], ServiceState::Running));
        assert_eq!(controller(&registry).status().unwrap(), StatusSummary::Running);

        let registry = Arc::new(FakeRegistry::new().script_states(&[], ServiceState::Paused));
        assert_eq!(
            controller(&registry).status().unwrap(),
            StatusSummary::NotRunning(ServiceState::Paused)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn control_returns_immediately_when_already_at_target() {
        let registry = Arc::new(FakeRegistry::new().control_reply(ServiceState::Stopped));
        let begin = Instant::now();

        controller(&registry)
            .control_and_wait_for(ControlCommand::Stop, ServiceState::Stopped, CONTROL_MAX_WAIT)
            .await
            .unwrap();

        assert_eq!(begin.elapsed(), Duration::ZERO);
        assert_eq!(registry.calls(), vec!["control stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn control_polls_until_target_state() {
        let registry = Arc::new(
            FakeRegistry::new()
                .control_reply(ServiceState::StopPending)
                .script_states(&[ServiceState::StopPending], ServiceState::Stopped),
        );
        let begin = Instant::now();

        controller(&registry).stop().await.unwrap();

        assert_eq!(begin.elapsed(), CONTROL_POLL_INTERVAL * 2);
        assert_eq!(registry.calls(), vec!["control stop", "query", "query"]);
    }

    #[tokio::test(start_paused = true)]
    async fn control_times_out_when_state_never_changes() {
        let registry = Arc::new(
            FakeRegistry::new()
                .control_reply(ServiceState::StopPending)
                .script_states(&[], ServiceState::StopPending),
        );
        let begin = Instant::now();

        let err = controller(&registry)
            .control_and_wait_for(ControlCommand::Stop, ServiceState::Stopped, CONTROL_MAX_WAIT)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Timeout { .. }));
        assert!(begin.elapsed() >= CONTROL_MAX_WAIT);
        assert!(begin.elapsed() < CONTROL_MAX_WAIT + CONTROL_POLL_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn control_stops_on_query_error() {
        let registry = Arc::new(
            FakeRegistry::new()
                .control_reply(ServiceState::StopPending)
                .failing_query(),
        );

        let err = controller(&registry).stop().await.unwrap_err();
        assert!(matches!(err, ServiceError::Query { .. }));
        assert_eq!(registry.calls(), vec!["control stop", "query"]);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_stop_polls_once_per_second() {
        let running = ServiceState::Running;
        let registry = Arc::new(
            FakeRegistry::new().script_states(&[running, running, running], ServiceState::Stopped),
        );
        let begin = Instant::now();

        controller(&registry)
            .wait_for_stop(Duration::from_secs(30))
            .await
            .unwrap();

        let elapsed = begin.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
        assert_eq!(registry.calls().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_stop_times_out() {
        let registry = Arc::new(FakeRegistry::new().script_states(&[], ServiceState::Running));
        let begin = Instant::now();

        let err = controller(&registry)
            .wait_for_stop(Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Timeout { .. }));
        assert_eq!(begin.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_stop_queries_on_a_tick_that_meets_the_deadline() {
        let running = ServiceState::Running;
        let registry = Arc::new(
            FakeRegistry::new().script_states(&[running, running, running], ServiceState::Stopped),
        );
        let begin = Instant::now();

        controller(&registry)
            .wait_for_stop(Duration::from_secs(3))
            .await
            .unwrap();

        assert_eq!(begin.elapsed(), Duration::from_secs(3));
        assert_eq!(registry.calls().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_stop_fails_on_query_error() {
        let registry = Arc::new(FakeRegistry::new().failing_query());

        let err = controller(&registry)
            .wait_for_stop(Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Query { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_runs_all_steps_in_order() {
        let running = ServiceState::Running;
        let registry = Arc::new(FakeRegistry::new().script_states(&[running, running], ServiceState::Stopped));

        controller(&registry).deploy().await.unwrap();

        assert_eq!(
            registry.calls(),
            vec!["install", "start is manual-started", "query", "query", "query", "remove"]
        );
        assert!(!registry.is_installed("vawinstallhelper"));
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_stops_at_first_failure() {
        let registry = Arc::new(FakeRegistry::new().failing_start());

        let err = controller(&registry).deploy().await.unwrap_err();

        assert!(matches!(err, ServiceError::Start { .. }));
        assert_eq!(registry.calls(), vec!["install", "start is manual-started"]);
        // no rollback of the install step
        assert!(registry.is_installed("vawinstallhelper"));
    }
}
