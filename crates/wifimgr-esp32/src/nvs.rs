//! The durable region as an NVS blob.
//!
//! NVS has no byte-addressable storage, so the whole region is kept in RAM
//! and written back as one blob on commit. A missing blob reads as zeros.

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use log::{debug, info};
use wifimgr_core::{StorageError, StorageMedium};

/// NVS key holding the region image.
pub const REGION_KEY: &str = "region";

pub struct NvsMedium {
    nvs: EspNvs<NvsDefault>,
    staged: Vec<u8>,
}

impl NvsMedium {
    /// Open (or create) `namespace` on the default NVS partition.
    pub fn new(partition: EspDefaultNvsPartition, namespace: &str) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, namespace, true)?;
        Ok(Self {
            nvs,
            staged: Vec::new(),
        })
    }
}

impl StorageMedium for NvsMedium {
    fn begin(&mut self, capacity: usize) -> Result<(), StorageError> {
        let stored = self
            .nvs
            .blob_len(REGION_KEY)
            .map_err(|e| StorageError::Medium(format!("NVS length query failed: {}", e)))?;

        let mut image = vec![0u8; stored.unwrap_or(0).max(capacity)];
        let len = self
            .nvs
            .get_blob(REGION_KEY, &mut image)
            .map_err(|e| StorageError::Medium(format!("NVS read failed: {}", e)))?
            .map(|data| data.len());

        match len {
            Some(len) => {
                info!("Loaded {} byte region from NVS", len);
                image.truncate(len);
            }
            None => {
                info!("No region in NVS, starting blank");
                image.clear();
            }
        }
        image.resize(capacity, 0);
        self.staged = image;
        Ok(())
    }

    fn read_byte(&self, addr: usize) -> u8 {
        self.staged.get(addr).copied().unwrap_or(0)
    }

    fn write_byte(&mut self, addr: usize, value: u8) {
        if let Some(byte) = self.staged.get_mut(addr) {
            *byte = value;
        }
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.nvs
            .set_blob(REGION_KEY, &self.staged)
            .map_err(|e| StorageError::Medium(format!("NVS write failed: {}", e)))?;
        debug!("Committed {} byte region to NVS", self.staged.len());
        Ok(())
    }
}
