use std::path::PathBuf;

use crate::interface::DeviceDescriptor;
use crate::layer::DeviceMap;

/// Bounded table of registered devices.
///
/// Results follow the device-table convention: the slot index on success,
/// `-1` on failure. Slots grow on demand up to `capacity`; freed slots are
/// reused first.
#[derive(Debug, Clone)]
pub struct DeviceTable {
    slots: Vec<Option<DeviceDescriptor>>,
    capacity: usize,
}

impl DeviceTable {
    pub fn new(capacity: usize) -> Self {
        Self { slots: Vec::new(), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register `device`. A device with the same name is replaced in place.
    pub fn add(&mut self, device: &DeviceDescriptor) -> i32 {
        if !device.has_valid_name() {
            return -1;
        }

        let slot = self
            .position(&device.name)
            .or_else(|| self.slots.iter().position(Option::is_none));

        let index = match slot {
            Some(index) => {
                self.slots[index] = Some(device.clone());
                index
            }
            None if self.slots.len() < self.capacity => {
                self.slots.push(Some(device.clone()));
                self.slots.len() - 1
            }
            None => return -1,
        };
        i32::try_from(index).unwrap_or(-1)
    }

    pub fn remove(&mut self, name: &str) -> i32 {
        match self.position(name) {
            Some(index) => {
                self.slots[index] = None;
                0
            }
            None => -1,
        }
    }

    pub fn get(&self, name: &str) -> Option<&DeviceDescriptor> {
        self.slots.iter().flatten().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.slots.iter().flatten()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.as_ref().is_some_and(|d| d.name == name))
    }
}

impl DeviceMap for DeviceTable {
    fn host_root(&self, device: &str) -> Option<PathBuf> {
        self.get(device).map(|d| d.root.clone())
    }
}
