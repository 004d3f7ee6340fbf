//! Minimal HKLM registry access and the registry-backed configuration store.

#[cfg(target_os = "windows")]
use windows::core::PCWSTR;
#[cfg(target_os = "windows")]
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, ERROR_UNSUPPORTED_TYPE, WIN32_ERROR};
#[cfg(target_os = "windows")]
use windows::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegDeleteKeyW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
    HKEY, HKEY_LOCAL_MACHINE, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_CREATED_NEW_KEY,
    REG_CREATE_KEY_DISPOSITION, REG_DWORD, REG_EXPAND_SZ, REG_OPTION_NON_VOLATILE, REG_SAM_FLAGS,
    REG_SZ, REG_VALUE_TYPE,
};

#[cfg(target_os = "windows")]
use helper_core::config::HelperConfig;
#[cfg(target_os = "windows")]
use helper_platform::config_store::ConfigStore;
#[cfg(target_os = "windows")]
use helper_platform::ConfigError;

#[cfg(target_os = "windows")]
pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    std::ffi::OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

/// Human-readable form of a Win32 status code.
#[cfg(target_os = "windows")]
pub(crate) fn describe(status: WIN32_ERROR) -> String {
    format!("{} (code {})", windows::core::Error::from(status.to_hresult()), status.0)
}

/// Open registry key, closed on drop.
#[cfg(target_os = "windows")]
pub(crate) struct RegKey(HKEY);

#[cfg(target_os = "windows")]
impl Drop for RegKey {
    fn drop(&mut self) {
        unsafe {
            let _ = RegCloseKey(self.0);
        }
    }
}

#[cfg(target_os = "windows")]
impl RegKey {
    /// Open `HKLM\<path>`. `Ok(None)` if the key does not exist.
    pub(crate) fn open(path: &str, access: REG_SAM_FLAGS) -> Result<Option<Self>, WIN32_ERROR> {
        let wide = to_wide(path);
        let mut key = HKEY::default();
        let status =
            unsafe { RegOpenKeyExW(HKEY_LOCAL_MACHINE, PCWSTR(wide.as_ptr()), 0, access, &mut key) };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status != ERROR_SUCCESS {
            return Err(status);
        }
        Ok(Some(Self(key)))
    }

    /// Open or create `HKLM\<path>`. The flag tells whether the key was newly created.
    pub(crate) fn create(path: &str, access: REG_SAM_FLAGS) -> Result<(Self, bool), WIN32_ERROR> {
        let wide = to_wide(path);
        let mut key = HKEY::default();
        let mut disposition = REG_CREATE_KEY_DISPOSITION::default();
        let status = unsafe {
            RegCreateKeyExW(
                HKEY_LOCAL_MACHINE,
                PCWSTR(wide.as_ptr()),
                0,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                access,
                None,
                &mut key,
                Some(&mut disposition as *mut _),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(status);
        }
        Ok((Self(key), disposition == REG_CREATED_NEW_KEY))
    }

    /// Delete the (leaf) key `HKLM\<path>`.
    pub(crate) fn delete(path: &str) -> Result<(), WIN32_ERROR> {
        let wide = to_wide(path);
        let status = unsafe { RegDeleteKeyW(HKEY_LOCAL_MACHINE, PCWSTR(wide.as_ptr())) };
        if status != ERROR_SUCCESS {
            return Err(status);
        }
        Ok(())
    }

    /// Read a string value. `Ok(None)` if the value does not exist.
    pub(crate) fn get_string(&self, name: &str) -> Result<Option<String>, WIN32_ERROR> {
        let wide_name = to_wide(name);
        let mut kind = REG_VALUE_TYPE::default();
        let mut size = 0u32;
        let status = unsafe {
            RegQueryValueExW(
                self.0,
                PCWSTR(wide_name.as_ptr()),
                None,
                Some(&mut kind as *mut _),
                None,
                Some(&mut size as *mut _),
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status != ERROR_SUCCESS {
            return Err(status);
        }
        if kind != REG_SZ && kind != REG_EXPAND_SZ {
            return Err(ERROR_UNSUPPORTED_TYPE);
        }

        // Stored strings are not guaranteed to be NUL terminated
        let mut buf = vec![0u16; size as usize / 2 + 1];
        let mut size = (buf.len() * 2) as u32;
        let status = unsafe {
            RegQueryValueExW(
                self.0,
                PCWSTR(wide_name.as_ptr()),
                None,
                None,
                Some(buf.as_mut_ptr() as *mut u8),
                Some(&mut size as *mut _),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(status);
        }

        let mut chars = &buf[..size as usize / 2];
        while let [rest @ .., 0] = chars {
            chars = rest;
        }
        Ok(Some(String::from_utf16_lossy(chars)))
    }

    pub(crate) fn set_string(&self, name: &str, value: &str, kind: REG_VALUE_TYPE) -> Result<(), WIN32_ERROR> {
        let wide_name = to_wide(name);
        let data: Vec<u8> = to_wide(value).iter().flat_map(|c| c.to_le_bytes()).collect();
        let status =
            unsafe { RegSetValueExW(self.0, PCWSTR(wide_name.as_ptr()), 0, kind, Some(&data)) };
        if status != ERROR_SUCCESS {
            return Err(status);
        }
        Ok(())
    }

    pub(crate) fn set_dword(&self, name: &str, value: u32) -> Result<(), WIN32_ERROR> {
        let wide_name = to_wide(name);
        let status = unsafe {
            RegSetValueExW(
                self.0,
                PCWSTR(wide_name.as_ptr()),
                0,
                REG_DWORD,
                Some(&value.to_le_bytes()),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(status);
        }
        Ok(())
    }
}

/// Payload location stored as a string value under `HKLM\<namespace>`.
#[cfg(target_os = "windows")]
pub struct RegistryConfigStore {
    namespace: String,
    value: String,
}

#[cfg(target_os = "windows")]
impl RegistryConfigStore {
    pub fn new(namespace: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            value: value.into(),
        }
    }

    pub fn from_config(config: &HelperConfig) -> Self {
        Self::new(config.store_namespace.clone(), config.store_value.clone())
    }

    fn access_error(&self, status: WIN32_ERROR) -> ConfigError {
        ConfigError::Access {
            namespace: format!(r"HKLM:\{}", self.namespace),
            reason: describe(status),
        }
    }
}

#[cfg(target_os = "windows")]
impl ConfigStore for RegistryConfigStore {
    fn read_payload_location(&self) -> Result<String, ConfigError> {
        let key = RegKey::open(&self.namespace, KEY_QUERY_VALUE)
            .map_err(|s| self.access_error(s))?
            .ok_or_else(|| ConfigError::NamespaceMissing {
                namespace: format!(r"HKLM:\{}", self.namespace),
            })?;

        key.get_string(&self.value)
            .map_err(|s| self.access_error(s))?
            .ok_or_else(|| ConfigError::ValueMissing {
                namespace: format!(r"HKLM:\{}", self.namespace),
                value: self.value.clone(),
            })
    }

    fn write_payload_location(&self, path: &str) -> Result<(), ConfigError> {
        let (key, _) = RegKey::create(&self.namespace, KEY_SET_VALUE | KEY_QUERY_VALUE)
            .map_err(|s| self.access_error(s))?;
        key.set_string(&self.value, path, REG_SZ)
            .map_err(|s| self.access_error(s))
    }
}
