//! Named value slots that parameters, targets and drivers bind to.

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, SfResult};

/// Opaque handle to a value slot owned by a [`SlotRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotHandle(usize);

impl SlotHandle {
    /// Build a handle from a raw slot index. Only meaningful against the
    /// registry that issued the index.
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SlotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Registry of named `f64` slots. The model under calibration reads its
/// inputs from and writes its outputs to these slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotRegistry {
    names: Vec<String>,
    values: Vec<f64>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new slot initialised to zero. Re-registering an existing
    /// name returns the existing handle.
    pub fn register(&mut self, name: impl Into<String>) -> SlotHandle {
        let name = name.into();
        if let Some(handle) = self.find(&name) {
            return handle;
        }
        self.names.push(name);
        self.values.push(0.0);
        SlotHandle(self.values.len() - 1)
    }

    pub fn find(&self, name: &str) -> Option<SlotHandle> {
        self.names.iter().position(|n| n == name).map(SlotHandle)
    }

    pub fn contains(&self, handle: SlotHandle) -> bool {
        handle.0 < self.values.len()
    }

    pub fn get(&self, handle: SlotHandle) -> SfResult<f64> {
        self.values
            .get(handle.0)
            .copied()
            .ok_or_else(|| ConfigError::UnknownSlot { slot: handle.0 }.into())
    }

    pub fn set(&mut self, handle: SlotHandle, value: f64) -> SfResult<()> {
        let slot = self
            .values
            .get_mut(handle.0)
            .ok_or(ConfigError::UnknownSlot { slot: handle.0 })?;
        *slot = value;
        Ok(())
    }

    pub fn name(&self, handle: SlotHandle) -> Option<&str> {
        self.names.get(handle.0).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
