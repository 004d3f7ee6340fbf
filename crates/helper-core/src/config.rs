use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use helper_platform::service::ServiceIdentity;

const CONFIG_FILE_NAME: &str = "vawinstallhelper.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HelperConfig {
    /// Internal service name registered with the service manager
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Display name shown in the services console
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Registry key (under HKLM) holding the payload location
    #[serde(default = "default_store_namespace")]
    pub store_namespace: String,

    /// Value name of the payload location inside `store_namespace`
    #[serde(default = "default_store_value")]
    pub store_value: String,
}

fn default_service_name() -> String {
    "vawinstallhelper".to_string()
}
fn default_display_name() -> String {
    "VAW Install Helper".to_string()
}
fn default_store_namespace() -> String {
    r"SOFTWARE\VeeamHub".to_string()
}
fn default_store_value() -> String {
    "VAWExecSrc".to_string()
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            display_name: default_display_name(),
            store_namespace: default_store_namespace(),
            store_value: default_store_value(),
        }
    }
}

impl HelperConfig {
    /// Default config file path: next to the executable, so the service
    /// process started by the SCM (without arguments) finds the same file.
    pub fn default_path() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe) => exe.with_file_name(CONFIG_FILE_NAME),
            Err(_) => PathBuf::from(CONFIG_FILE_NAME),
        }
    }

    /// Load config from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from the default path if it exists,
    /// else fall back to built-in defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::load(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity::new(self.service_name.clone(), self.display_name.clone())
    }

    fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            anyhow::bail!("service_name cannot be empty");
        }
        // Service names end up in registry paths
        if self.service_name.contains(&['\\', '/'][..]) {
            anyhow::bail!("service_name must not contain path separators");
        }
        if self.store_namespace.trim().is_empty() || self.store_value.trim().is_empty() {
            anyhow::bail!("store_namespace and store_value cannot be empty");
        }
        Ok(())
    }
}
