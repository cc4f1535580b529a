use interchip_frame::{device_name, KNOWN_DEVICES};

/// Static mapping of the device ids that may appear on this link.
///
/// Read-only after construction. Used by the receive path to drop transport
/// echo (frames claiming to come from this chip) and frames from device ids
/// outside the closed namespace; used nowhere for routing, since the physical
/// topology is fixed point-to-point.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    own: u8,
    known: Vec<u8>,
}

impl DeviceRegistry {
    /// Registry for the default device namespace.
    pub fn new(own: u8) -> Self {
        Self::with_devices(own, KNOWN_DEVICES)
    }

    /// Registry with an explicit device set (must include `own`).
    pub fn with_devices(own: u8, devices: &[u8]) -> Self {
        let mut known = devices.to_vec();
        if !known.contains(&own) {
            known.push(own);
        }
        Self { own, known }
    }

    /// This chip's device id.
    pub fn own_id(&self) -> u8 {
        self.own
    }

    /// True if the id belongs to the closed device namespace (including self).
    pub fn is_known(&self, device: u8) -> bool {
        self.known.contains(&device)
    }

    /// True if the id is this chip's own id.
    pub fn is_self(&self, device: u8) -> bool {
        device == self.own
    }

    /// Human label for logs.
    pub fn label(&self, device: u8) -> &'static str {
        device_name(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interchip_frame::{DEVICE_DISPLAY, DEVICE_RADIO, DEVICE_TOUCH};

    #[test]
    fn default_namespace_is_known() {
        let registry = DeviceRegistry::new(DEVICE_TOUCH);
        assert!(registry.is_known(DEVICE_TOUCH));
        assert!(registry.is_known(DEVICE_RADIO));
        assert!(registry.is_known(DEVICE_DISPLAY));
        assert!(!registry.is_known(0x55));
    }

    #[test]
    fn self_detection() {
        let registry = DeviceRegistry::new(DEVICE_DISPLAY);
        assert!(registry.is_self(DEVICE_DISPLAY));
        assert!(!registry.is_self(DEVICE_TOUCH));
    }

    #[test]
    fn explicit_device_set_always_contains_own() {
        let registry = DeviceRegistry::with_devices(0x09, &[DEVICE_RADIO]);
        assert!(registry.is_known(0x09));
        assert!(registry.is_known(DEVICE_RADIO));
        assert!(!registry.is_known(DEVICE_TOUCH));
    }
}
