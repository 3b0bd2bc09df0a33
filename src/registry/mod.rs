// Copyright (c) 2025 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Device registry: persisted, deduplicated list of smart bulb IPv4 addresses.
//!
//! The settings store is the single source of truth. Every read loads the list from the store,
//! every mutation is a compare-and-swap of the whole list.

mod store;

pub use store::{FileStore, MemoryStore, SettingsStore};

use crate::errors::ServiceError;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use std::sync::Arc;

/// Settings key of the JSON encoded address list.
const KEY_IP_LIST: &str = "ipList";

/// Max compare-and-swap attempts of a single mutation.
const MAX_UPDATE_ATTEMPTS: usize = 64;

lazy_static! {
    static ref IPV4_PATTERN: Regex = Regex::new(
        r"^((25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$"
    )
    .expect("valid IPv4 pattern");
}

/// Check if the given string is a dotted-quad IPv4 address with octets in 0..=255.
pub fn is_valid_ipv4(address: &str) -> bool {
    IPV4_PATTERN.is_match(address)
}

#[derive(Clone)]
pub struct DeviceRegistry {
    store: Arc<dyn SettingsStore>,
}

impl DeviceRegistry {
    /// Open the registry and seed the `defaults` if the store has never been initialized.
    pub fn new(store: Arc<dyn SettingsStore>, defaults: &[String]) -> Result<Self, ServiceError> {
        let registry = Self { store };
        if registry.store.get(KEY_IP_LIST)?.is_none() {
            let json = serde_json::to_string(defaults)?;
            if registry.store.compare_and_swap(KEY_IP_LIST, None, &json)? {
                info!("Initialized device registry with {} default address(es)", defaults.len());
            }
        }
        Ok(registry)
    }

    /// Current address list in insertion order.
    ///
    /// Storage errors or corrupt data are logged and result in an empty list.
    pub fn list(&self) -> Vec<String> {
        match self.store.get(KEY_IP_LIST) {
            Ok(json) => decode(json.as_deref()),
            Err(e) => {
                warn!("Error loading device addresses: {e}");
                Vec::new()
            }
        }
    }

    pub fn count(&self) -> usize {
        self.list().len()
    }

    /// Add a new device address.
    ///
    /// Returns `Ok(false)` if the address is empty, not a valid IPv4 address or already registered.
    pub fn add(&self, address: &str) -> Result<bool, ServiceError> {
        let address = address.trim();
        if address.is_empty() || !is_valid_ipv4(address) {
            debug!("Rejecting invalid device address: '{address}'");
            return Ok(false);
        }

        self.update(|addresses| {
            if addresses.iter().any(|a| a == address) {
                return false;
            }
            addresses.push(address.to_string());
            true
        })
    }

    /// Remove a device address.
    ///
    /// Returns `Ok(false)` if the address is not registered.
    pub fn remove(&self, address: &str) -> Result<bool, ServiceError> {
        let address = address.trim();
        self.update(|addresses| {
            let len = addresses.len();
            addresses.retain(|a| a != address);
            addresses.len() != len
        })
    }

    /// Overwrite the complete address list. The addresses are not validated.
    pub fn replace_all(&self, addresses: &[String]) -> Result<(), ServiceError> {
        self.store
            .put(KEY_IP_LIST, &serde_json::to_string(addresses)?)?;
        debug!("Device address list replaced. Total: {}", addresses.len());
        Ok(())
    }

    /// Short human readable status of the registered devices, see [`summary`].
    pub fn summary(&self) -> String {
        summary(&self.list())
    }

    /// Read-modify-write the address list with a compare-and-swap against the store.
    ///
    /// `modify` returns false if nothing changed, then nothing is written.
    fn update<F>(&self, mut modify: F) -> Result<bool, ServiceError>
    where
        F: FnMut(&mut Vec<String>) -> bool,
    {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let current = self.store.get(KEY_IP_LIST)?;
            let mut addresses = decode(current.as_deref());
            if !modify(&mut addresses) {
                return Ok(false);
            }
            let json = serde_json::to_string(&addresses)?;
            if self
                .store
                .compare_and_swap(KEY_IP_LIST, current.as_deref(), &json)?
            {
                debug!("Device address list saved. Total: {}", addresses.len());
                return Ok(true);
            }
            debug!("Concurrent device list modification, retrying");
        }

        Err(ServiceError::Storage(
            "Too many concurrent device list modifications".into(),
        ))
    }
}

/// Short human readable status of an address list, e.g. `192.168.0.50 (+2 more)`.
pub fn summary(addresses: &[String]) -> String {
    match addresses.split_first() {
        None => "no devices registered".to_string(),
        Some((first, [])) => first.clone(),
        Some((first, rest)) => format!("{first} (+{} more)", rest.len()),
    }
}

fn decode(json: Option<&str>) -> Vec<String> {
    match json {
        None => Vec::new(),
        Some(json) => serde_json::from_str::<Option<Vec<String>>>(json)
            .unwrap_or_else(|e| {
                warn!("Corrupt device address list, ignoring it: {e}");
                None
            })
            .unwrap_or_default(),
    }
}
