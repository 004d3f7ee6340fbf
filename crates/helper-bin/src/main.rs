use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use helper_core::config::HelperConfig;
use helper_core::dispatch::{self, Dispatcher, Verb};
use helper_core::lifecycle::LifecycleController;
use helper_platform::config_store::ConfigStore;
use helper_platform::service::ServiceRegistry;

#[derive(Parser, Debug)]
#[command(name = "vawinstallhelper")]
#[command(about = "Self-installing service that runs an installer payload once")]
#[command(version)]
struct Cli {
    /// Command: install, remove, start, stop, installstart, deploy, mkregkey, status.
    /// Without a command the process runs as the service.
    verb: Option<Verb>,

    /// Payload installer path (mkregkey only)
    argument: Option<String>,

    /// Path to config file (default: vawinstallhelper.json next to the executable)
    #[arg(long, env = "HELPER_CONFIG_PATH")]
    config_path: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "HELPER_LOG_LEVEL")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!(
        "vawinstallhelper v{} (os={}, arch={})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    );

    let result = run(cli);
    if let Err(e) = &result {
        eprintln!("ERROR: {:#}", e);
    }
    ExitCode::from(dispatch::exit_code(&result))
}

fn run(cli: Cli) -> Result<()> {
    let config = HelperConfig::resolve(cli.config_path.as_deref())?;

    let Some(verb) = cli.verb else {
        return run_service(config);
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    let executable = std::env::current_exe().context("failed to get current exe path")?;
    let controller = LifecycleController::new(create_platform_registry()?, config.identity(), executable);
    let dispatcher = Dispatcher::new(controller, create_platform_store(&config)?);

    let mut stdout = std::io::stdout();
    runtime.block_on(dispatcher.dispatch(verb, cli.argument.as_deref(), &mut stdout))
}

#[cfg(target_os = "windows")]
fn run_service(config: HelperConfig) -> Result<()> {
    helper_windows::service_host::run(config)
}

#[cfg(not(target_os = "windows"))]
fn run_service(config: HelperConfig) -> Result<()> {
    anyhow::bail!(
        "running as the {} service is only supported on Windows",
        config.service_name
    )
}

#[cfg(target_os = "windows")]
fn create_platform_registry() -> Result<Arc<dyn ServiceRegistry>> {
    Ok(Arc::new(helper_windows::service::WindowsServiceRegistry::new()))
}

#[cfg(not(target_os = "windows"))]
fn create_platform_registry() -> Result<Arc<dyn ServiceRegistry>> {
    anyhow::bail!("service management not supported on this platform")
}

#[cfg(target_os = "windows")]
fn create_platform_store(config: &HelperConfig) -> Result<Arc<dyn ConfigStore>> {
    Ok(Arc::new(helper_windows::registry::RegistryConfigStore::from_config(config)))
}

#[cfg(not(target_os = "windows"))]
fn create_platform_store(_config: &HelperConfig) -> Result<Arc<dyn ConfigStore>> {
    anyhow::bail!("configuration store not supported on this platform")
}
