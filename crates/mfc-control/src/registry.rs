//! Name and address bookkeeping for registered devices.

use std::collections::{BTreeMap, HashMap};

use mfc_core::{NodeAddress, PortName};

use crate::device::Mfc;
use crate::error::{ControlError, ControlResult};

/// Devices keyed by name, with a (port, node) index.
///
/// Both keys are unique; a failed insert leaves the registry unchanged.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, Mfc>,
    addresses: HashMap<(PortName, NodeAddress), String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks both uniqueness constraints without inserting.
    pub fn check_free(&self, name: &str, port: &PortName, node: NodeAddress) -> ControlResult<()> {
        if self.devices.contains_key(name) {
            return Err(ControlError::DuplicateName {
                name: name.to_string(),
            });
        }
        if let Some(existing) = self.addresses.get(&(port.clone(), node)) {
            return Err(ControlError::DuplicateAddress {
                port: port.clone(),
                node,
                existing: existing.clone(),
            });
        }
        Ok(())
    }

    pub fn insert(&mut self, device: Mfc) -> ControlResult<()> {
        self.check_free(&device.name, &device.port, device.node)?;
        self.addresses
            .insert((device.port.clone(), device.node), device.name.clone());
        self.devices.insert(device.name.clone(), device);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> ControlResult<Mfc> {
        let device = self
            .devices
            .remove(name)
            .ok_or_else(|| ControlError::NotFound {
                name: name.to_string(),
            })?;
        self.addresses.remove(&(device.port.clone(), device.node));
        Ok(device)
    }

    pub fn get(&self, name: &str) -> ControlResult<&Mfc> {
        self.devices.get(name).ok_or_else(|| ControlError::NotFound {
            name: name.to_string(),
        })
    }

    pub fn get_mut(&mut self, name: &str) -> ControlResult<&mut Mfc> {
        self.devices
            .get_mut(name)
            .ok_or_else(|| ControlError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    /// True while any device still references `port`.
    pub fn port_in_use(&self, port: &PortName) -> bool {
        self.addresses.keys().any(|(p, _)| p == port)
    }

    /// Devices in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Mfc> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Mfc> {
        self.addresses.clear();
        std::mem::take(&mut self.devices).into_values().collect()
    }
}
