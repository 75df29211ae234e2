//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] over an in-memory
//! block map, standing in for the flash partition on the host.
//!
//! - Config validation: fields are range-checked before persistence.
//! - Block isolation: each subsystem owns one logical index
//!   ([`CONFIG_INDEX`], [`CREDENTIALS_INDEX`](crate::credentials::CREDENTIALS_INDEX)).
//! - Atomic writes: a block is replaced as a whole.

use std::cell::RefCell;
use std::collections::HashMap;

use log::{info, warn};

use crate::app::ports::{CONFIG_INDEX, ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::TrackerConfig;

/// Largest block the partition accepts.
const MAX_BLOB_SIZE: usize = 4000;

#[derive(Default)]
pub struct NvsAdapter {
    store: RefCell<HashMap<u16, Vec<u8>>>,
}

impl NvsAdapter {
    pub fn new() -> Self {
        info!("NvsAdapter: simulation backend");
        Self::default()
    }

    /// Number of blocks currently stored.
    pub fn block_count(&self) -> usize {
        self.store.borrow().len()
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<TrackerConfig, ConfigError> {
        match self.store.borrow().get(&CONFIG_INDEX) {
            Some(bytes) => {
                let cfg: TrackerConfig =
                    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(TrackerConfig::default())
            }
        }
    }

    fn save(&self, config: &TrackerConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::StorageFull);
        }
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        self.store.borrow_mut().insert(CONFIG_INDEX, bytes);
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, index: u16, buf: &mut [u8]) -> Result<usize, StorageError> {
        let store = self.store.borrow();
        let data = store.get(&index).ok_or(StorageError::NotFound)?;
        if data.len() > buf.len() {
            warn!(
                "NvsAdapter: block {} is {} bytes, buffer holds {}",
                index,
                data.len(),
                buf.len()
            );
            return Err(StorageError::IoError);
        }
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn write(&mut self, index: u16, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }
        self.store.get_mut().insert(index, data.to_vec());
        Ok(())
    }

    fn delete(&mut self, index: u16) -> Result<(), StorageError> {
        self.store.get_mut().remove(&index);
        Ok(())
    }

    fn exists(&self, index: u16) -> bool {
        self.store.borrow().contains_key(&index)
    }
}
