//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] and [`SettingsPort`] for the CORE Test
//! firmware on top of a small blob store.
//!
//! | Namespace       | Key       | Contents                          |
//! |-----------------|-----------|-----------------------------------|
//! | `coretest`      | `syscfg`  | [`SystemConfig`] (postcard)       |
//! | `core-settings` | `network` | [`NetworkSettings`] (postcard)    |
//! | `core-settings` | `broker`  | [`BrokerSettings`] (postcard)     |
//!
//! Factory reset erases `core-settings` only; tuning survives it.
//!
//! - Validation: every blob is validated before they are written.
//! - Atomic writes: ESP-IDF NVS commits are atomic per nvs_commit().

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, SettingsPort, StorageError};
use crate::config::{BrokerSettings, NetworkSettings, SystemConfig};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "coretest";
const CONFIG_KEY: &str = "syscfg";

pub const SETTINGS_NAMESPACE: &str = "core-settings";
const SETTINGS_KEY: &str = "network";
const BROKER_KEY: &str = "broker";

/// NVS limits namespace and key names to 15 bytes.
const MAX_NAME_LEN: usize = 15;

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 4000;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as i32 {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns_buf = c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: ns_buf is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns_buf.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        // SAFETY: handle was opened above and is closed exactly once.
        unsafe {
            nvs_close(handle);
        }
        result
    }

    // ── Blob primitives ───────────────────────────────────────

    /// Whole blob, or `None` when the key does not exist.
    fn get_blob(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            Ok(self.store.borrow().get(&Self::composite_key(namespace, key)).cloned())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size: usize = 0;
                // First call: get size
                // SAFETY: a null data pointer asks NVS for the length only.
                let ret = unsafe {
                    nvs_get_blob(handle, key_buf.as_ptr().cast(), core::ptr::null_mut(), &mut size)
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                if size > MAX_BLOB_SIZE {
                    return Err(ESP_ERR_NVS_INVALID_LENGTH as i32);
                }
                let mut buf = vec![0u8; size];
                // SAFETY: buf holds exactly `size` bytes.
                let ret = unsafe {
                    nvs_get_blob(handle, key_buf.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(buf)
            });
            match result {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(None),
                Err(e) => {
                    warn!("NvsAdapter: read {}/{} failed ({})", namespace, key, e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    fn put_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        check_names(namespace, key)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                // SAFETY: data is a valid slice for the length passed.
                let ret = unsafe {
                    nvs_set_blob(handle, key_buf.as_ptr().cast(), data.as_ptr().cast(), data.len())
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                // SAFETY: handle is open for writing.
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                warn!("NvsAdapter: write {}/{} failed ({})", namespace, key, e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    /// Erase every key in `namespace`.
    pub fn erase_namespace(&self, namespace: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let prefix = format!("{}::", namespace);
            self.store.borrow_mut().retain(|k, _| !k.starts_with(&prefix));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                // SAFETY: handle is open for writing.
                let ret = unsafe { nvs_erase_all(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                // SAFETY: handle is open for writing.
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => Ok(()),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(()),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }
}

fn check_names(namespace: &str, key: &str) -> Result<(), StorageError> {
    if namespace.is_empty() || key.is_empty() || namespace.len() > MAX_NAME_LEN || key.len() > MAX_NAME_LEN {
        return Err(StorageError::IoError);
    }
    Ok(())
}

/// NUL-terminated copy of an NVS name, truncated to the NVS limit.
#[cfg(target_os = "espidf")]
fn c_name(name: &str) -> [u8; MAX_NAME_LEN + 1] {
    let mut buf = [0u8; MAX_NAME_LEN + 1];
    let bytes = name.as_bytes();
    let len = bytes.len().min(MAX_NAME_LEN);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

fn storage_to_config(e: StorageError) -> ConfigError {
    match e {
        StorageError::Full => ConfigError::StorageFull,
        StorageError::IoError => ConfigError::IoError,
    }
}

// ── ConfigPort ────────────────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        match self.get_blob(CONFIG_NAMESPACE, CONFIG_KEY).map_err(storage_to_config)? {
            Some(bytes) => {
                let cfg: SystemConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                cfg.validate()?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.put_blob(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)
            .map_err(storage_to_config)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

// ── SettingsPort ──────────────────────────────────────────────

impl SettingsPort for NvsAdapter {
    fn load_settings(&self) -> Result<NetworkSettings, ConfigError> {
        match self
            .get_blob(SETTINGS_NAMESPACE, SETTINGS_KEY)
            .map_err(storage_to_config)?
        {
            Some(bytes) => {
                let settings: NetworkSettings =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                settings.validate()?;
                info!("NvsAdapter: loaded network settings (SSID='{}')", settings.ssid);
                Ok(settings)
            }
            None => Ok(NetworkSettings::default()),
        }
    }

    fn save_settings(&mut self, settings: &NetworkSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        let bytes = postcard::to_allocvec(settings).map_err(|_| ConfigError::IoError)?;
        self.put_blob(SETTINGS_NAMESPACE, SETTINGS_KEY, &bytes)
            .map_err(storage_to_config)
    }

    fn load_broker(&self) -> Result<BrokerSettings, ConfigError> {
        match self
            .get_blob(SETTINGS_NAMESPACE, BROKER_KEY)
            .map_err(storage_to_config)?
        {
            Some(bytes) => {
                let broker: BrokerSettings =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                broker.validate()?;
                Ok(broker)
            }
            None => Ok(BrokerSettings::default()),
        }
    }

    fn save_broker(&mut self, broker: &BrokerSettings) -> Result<(), ConfigError> {
        broker.validate()?;
        let bytes = postcard::to_allocvec(broker).map_err(|_| ConfigError::IoError)?;
        self.put_blob(SETTINGS_NAMESPACE, BROKER_KEY, &bytes)
            .map_err(storage_to_config)
    }

    fn factory_reset(&mut self) -> Result<(), ConfigError> {
        self.erase_namespace(SETTINGS_NAMESPACE)
            .map_err(storage_to_config)?;
        warn!("NvsAdapter: '{}' erased", SETTINGS_NAMESPACE);
        Ok(())
    }
}
