//! Routing control commands to devices by id.
//!
//! A [`DeviceDirectory`] maps caller-chosen device ids to shared clients.
//! It is a plain value owned by the application; there is no process-wide
//! registry.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use venus_udp::{Client, ClientConfig, DeviceDirectory, ModeIntent};
//!
//! # async fn run() -> venus_udp::Result<()> {
//! let mut directory = DeviceDirectory::new();
//! directory.insert("garage", Arc::new(Client::new(ClientConfig::new("192.168.1.50"))?));
//! directory.insert("attic", Arc::new(Client::new(ClientConfig::new("192.168.1.51"))?));
//!
//! directory.set_mode("garage", &ModeIntent::Ai).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::client::Client;
use crate::error::{Result, VenusError};
use crate::mode::ModeIntent;
use crate::transport::{Transport, UdpTransport};

/// Clients indexed by device id.
#[derive(Debug)]
pub struct DeviceDirectory<T = UdpTransport> {
    devices: BTreeMap<String, Arc<Client<T>>>,
}

impl<T> Default for DeviceDirectory<T> {
    fn default() -> Self {
        Self {
            devices: BTreeMap::new(),
        }
    }
}

impl<T: Transport> DeviceDirectory<T> {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client, returning the one previously under `device_id`.
    pub fn insert(&mut self, device_id: impl Into<String>, client: Arc<Client<T>>) -> Option<Arc<Client<T>>> {
        self.devices.insert(device_id.into(), client)
    }

    /// Unregisters a device.
    pub fn remove(&mut self, device_id: &str) -> Option<Arc<Client<T>>> {
        self.devices.remove(device_id)
    }

    /// Looks up a device.
    pub fn get(&self, device_id: &str) -> Option<&Arc<Client<T>>> {
        self.devices.get(device_id)
    }

    /// Whether a device is registered.
    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }

    /// Registered ids in sorted order.
    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Sends a mode change to one device.
    ///
    /// # Errors
    ///
    /// Returns `VenusError::UnknownDevice` if `device_id` is not registered,
    /// otherwise whatever [`Client::set_mode`] returns.
    pub async fn set_mode(&self, device_id: &str, intent: &ModeIntent) -> Result<bool> {
        let client = self.get(device_id).ok_or_else(|| VenusError::UnknownDevice {
            device_id: device_id.to_string(),
        })?;
        client.set_mode(intent).await
    }

    /// Like [`set_mode`](DeviceDirectory::set_mode), but logs any error and
    /// reports it as `false`.
    pub async fn try_set_mode(&self, device_id: &str, intent: &ModeIntent) -> bool {
        match self.set_mode(device_id, intent).await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(device_id, mode = %intent.mode(), error = %err.report(), "mode change failed");
                false
            }
        }
    }
}
