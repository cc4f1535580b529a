//! Message-type and device-id namespaces.
//!
//! Both namespaces are small, closed sets of compile-time constants shared by
//! every chip on the link. There is no version negotiation, so these values
//! must be identical on all participating firmware builds.

/// Control: acknowledges a data frame. Never itself acknowledged.
pub const MSG_ACK: u8 = 0x01;

/// Control: rejects a data frame. Never itself acknowledged.
pub const MSG_NACK: u8 = 0x02;

/// Touch/UI chip event stream.
pub const MSG_TOUCH_EVENT: u8 = 0x10;

/// Payload relayed from the wireless-radio chip.
pub const MSG_RADIO_DATA: u8 = 0x11;

/// Periodic device status report.
pub const MSG_STATUS_UPDATE: u8 = 0x12;

/// User-facing notification for the display chip.
pub const MSG_NOTIFICATION: u8 = 0x13;

/// Touch/UI controller chip.
pub const DEVICE_TOUCH: u8 = 0x01;

/// Wireless-radio chip.
pub const DEVICE_RADIO: u8 = 0x02;

/// Display chip.
pub const DEVICE_DISPLAY: u8 = 0x03;

/// Every device id that may appear as a frame source.
pub const KNOWN_DEVICES: &[u8] = &[DEVICE_TOUCH, DEVICE_RADIO, DEVICE_DISPLAY];

/// Returns true for the reserved reliability-control message types.
pub fn is_control(msg_type: u8) -> bool {
    msg_type == MSG_ACK || msg_type == MSG_NACK
}

/// Human-readable message type name for logs and CLI output.
pub fn msg_type_name(msg_type: u8) -> &'static str {
    match msg_type {
        MSG_ACK => "ACK",
        MSG_NACK => "NACK",
        MSG_TOUCH_EVENT => "TOUCH_EVENT",
        MSG_RADIO_DATA => "RADIO_DATA",
        MSG_STATUS_UPDATE => "STATUS_UPDATE",
        MSG_NOTIFICATION => "NOTIFICATION",
        _ => "UNKNOWN",
    }
}

/// Human-readable device label for logs and CLI output.
pub fn device_name(device: u8) -> &'static str {
    match device {
        DEVICE_TOUCH => "TOUCH",
        DEVICE_RADIO => "RADIO",
        DEVICE_DISPLAY => "DISPLAY",
        _ => "UNKNOWN",
    }
}
