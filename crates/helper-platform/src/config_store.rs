use crate::error::ConfigError;

/// Key/value store holding the payload installer location.
///
/// On Windows this is a registry key under `HKLM`; the namespace and value
/// names are fixed per installation.
pub trait ConfigStore: Send + Sync {
    /// Read the payload path. Absence of the namespace and absence of the
    /// value are reported as distinct errors.
    fn read_payload_location(&self) -> Result<String, ConfigError>;

    /// Create the namespace if needed and store `path` in it.
    fn write_payload_location(&self, path: &str) -> Result<(), ConfigError>;
}
