//! Camera registry: component id to camera component

use thiserror::Error;

use crate::camera::CameraComponent;
use crate::protocol::{CAMERA_COMPONENT_SLOTS, MAV_COMP_ID_CAMERA};

const SLOTS: usize = CAMERA_COMPONENT_SLOTS as usize;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("all {0} camera component ids are in use")]
    NoFreeSlot(u8),

    #[error("component id {0} is not a camera component id")]
    OutOfRange(u8),

    #[error("component id {0} is already registered")]
    SlotOccupied(u8),
}

/// Six camera slots starting at MAV_COMP_ID_CAMERA
///
/// Automatic assignment scans for the first free slot. A registry built
/// with [`ComponentRegistry::with_reserved_slot`] keeps the first slot for
/// an explicit [`insert`](ComponentRegistry::insert), so scanning starts one
/// slot later.
pub struct ComponentRegistry {
    base: u8,
    reserved: u8,
    slots: [Option<Box<dyn CameraComponent>>; SLOTS],
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            base: MAV_COMP_ID_CAMERA,
            reserved: 0,
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Keeps the first slot out of automatic assignment
    pub fn with_reserved_slot(mut self) -> Self {
        self.reserved = 1;
        self
    }

    pub fn base(&self) -> u8 {
        self.base
    }

    /// Whether `id` lies in the camera component range
    pub fn is_camera_id(&self, id: u8) -> bool {
        self.index(id).is_some()
    }

    fn index(&self, id: u8) -> Option<usize> {
        let offset = id.checked_sub(self.base)? as usize;
        (offset < SLOTS).then_some(offset)
    }

    /// Registers at the first free slot and returns its component id
    pub fn add(&mut self, component: Box<dyn CameraComponent>) -> Result<u8, RegistryError> {
        let start = self.reserved as usize;
        let free = (start..SLOTS)
            .find(|&i| self.slots[i].is_none())
            .ok_or(RegistryError::NoFreeSlot(CAMERA_COMPONENT_SLOTS))?;
        self.slots[free] = Some(component);
        Ok(self.base + free as u8)
    }

    /// Registers at a specific component id
    pub fn insert(&mut self, id: u8, component: Box<dyn CameraComponent>) -> Result<(), RegistryError> {
        let index = self.index(id).ok_or(RegistryError::OutOfRange(id))?;
        if self.slots[index].is_some() {
            return Err(RegistryError::SlotOccupied(id));
        }
        self.slots[index] = Some(component);
        Ok(())
    }

    pub fn remove(&mut self, id: u8) -> Option<Box<dyn CameraComponent>> {
        let index = self.index(id)?;
        self.slots[index].take()
    }

    pub fn contains(&self, id: u8) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: u8) -> Option<&dyn CameraComponent> {
        let index = self.index(id)?;
        self.slots[index].as_deref()
    }

    pub fn get_mut(&mut self, id: u8) -> Option<&mut (dyn CameraComponent + 'static)> {
        let index = self.index(id)?;
        self.slots[index].as_deref_mut()
    }

    /// Registered ids in ascending order, read fresh on every call
    pub fn ids(&self) -> Vec<u8> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &dyn CameraComponent)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(move |(i, slot)| slot.as_deref().map(|c| (self.base + i as u8, c)))
    }

    /// Component driving the given device
    pub fn find_by_device(&self, device_id: &str) -> Option<(u8, &dyn CameraComponent)> {
        self.iter().find(|(_, c)| c.device_id() == device_id)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::DeviceCameraComponent;
    use crate::camera::CustomDevice;

    fn component(dir: &tempfile::TempDir) -> Box<dyn CameraComponent> {
        Box::new(
            DeviceCameraComponent::with_raw_capture(CustomDevice::new(), dir.path(), dir.path(), 25)
                .unwrap(),
        )
    }

    #[test]
    fn test_first_free_slot_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ComponentRegistry::new();
        let base = registry.base();

        let ids: Vec<u8> = (0..3).map(|_| registry.add(component(&dir)).unwrap()).collect();
        assert_eq!(ids, vec![base, base + 1, base + 2]);

        assert!(registry.remove(base + 1).is_some());
        assert_eq!(registry.add(component(&dir)).unwrap(), base + 1);
        assert_eq!(registry.ids(), vec![base, base + 1, base + 2]);
    }

    #[test]
    fn test_reserved_slot_shifts_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ComponentRegistry::new().with_reserved_slot();
        let base = registry.base();

        assert_eq!(registry.add(component(&dir)).unwrap(), base + 1);
        registry.insert(base, component(&dir)).unwrap();
        assert_eq!(
            registry.insert(base, component(&dir)).unwrap_err(),
            RegistryError::SlotOccupied(base)
        );
        assert_eq!(registry.ids(), vec![base, base + 1]);
    }

    #[test]
    fn test_full_registry_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ComponentRegistry::new();
        for _ in 0..CAMERA_COMPONENT_SLOTS {
            registry.add(component(&dir)).unwrap();
        }
        assert_eq!(
            registry.add(component(&dir)).unwrap_err(),
            RegistryError::NoFreeSlot(6)
        );

        assert!(!registry.is_camera_id(99));
        assert!(registry.is_camera_id(105));
        assert!(!registry.is_camera_id(106));
        assert_eq!(
            registry.insert(1, component(&dir)).unwrap_err(),
            RegistryError::OutOfRange(1)
        );
    }

    #[test]
    fn test_lookup_by_device() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ComponentRegistry::new();
        let id = registry.add(component(&dir)).unwrap();

        assert_eq!(registry.find_by_device("custom").map(|(i, _)| i), Some(id));
        assert!(registry.find_by_device("/dev/video9").is_none());
        assert!(registry.get_mut(id).is_some());
        assert!(registry.get(id + 1).is_none());
    }
}
