//! Descriptors for input devices shared across the network boundary.

use serde::{Deserialize, Serialize};

/// Describes a physical input device on a remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Derived handle identifying the physical device across devices.
    pub dhid: String,
    /// Human-readable name (e.g. "Logitech MX Master 3").
    pub name: String,
    /// What this device can do.
    pub capabilities: Vec<DeviceCapability>,
}

impl DeviceInfo {
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        self.capabilities
            .iter()
            .any(|c| matches!(c, DeviceCapability::Pointer | DeviceCapability::Touchpad))
    }

    #[must_use]
    pub fn is_keyboard(&self) -> bool {
        self.capabilities.contains(&DeviceCapability::Keyboard)
    }
}

/// What kind of input a device supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceCapability {
    Keyboard,
    Pointer,
    Touchpad,
}

/// Direction of a remote hot-plug notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HotPlugKind {
    Added,
    Removed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_capability_queries() {
        let mouse = DeviceInfo {
            dhid: "dhid-mouse".to_string(),
            name: "Gaming Mouse".to_string(),
            capabilities: vec![DeviceCapability::Pointer],
        };
        assert!(mouse.is_pointer());
        assert!(!mouse.is_keyboard());

        let keyboard = DeviceInfo {
            dhid: "dhid-kbd".to_string(),
            name: "Test Keyboard".to_string(),
            capabilities: vec![DeviceCapability::Keyboard],
        };
        assert!(!keyboard.is_pointer());
        assert!(keyboard.is_keyboard());
    }
}
