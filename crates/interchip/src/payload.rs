//! Payload construction and name/id parsing for the CLI surface.

use clap::ValueEnum;
use interchip_frame::{
    DEVICE_DISPLAY, DEVICE_RADIO, DEVICE_TOUCH, MSG_NOTIFICATION, MSG_RADIO_DATA,
    MSG_STATUS_UPDATE, MSG_TOUCH_EVENT,
};
use serde::Serialize;

use crate::exit::{CliError, CliResult, USAGE};

/// On-screen notification payload carried by notification messages,
/// serialized as JSON.
#[derive(Serialize, Debug)]
pub struct Notification<'a> {
    pub severity: &'a str,
    pub duration_sec: u16,
    pub title: &'a str,
    pub message: &'a str,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Accepts a device name ("touch", "radio", "display") or a numeric id
/// (decimal or 0x-prefixed hex).
pub fn parse_device(input: &str) -> CliResult<u8> {
    match input.to_ascii_lowercase().as_str() {
        "touch" => Ok(DEVICE_TOUCH),
        "radio" => Ok(DEVICE_RADIO),
        "display" => Ok(DEVICE_DISPLAY),
        other => parse_u8(other)
            .ok_or_else(|| CliError::new(USAGE, format!("unknown device: {input}"))),
    }
}

/// Accepts a message type name or a numeric id (decimal or 0x-prefixed hex).
pub fn parse_msg_type(input: &str) -> CliResult<u8> {
    match input.to_ascii_lowercase().as_str() {
        "touch-event" => Ok(MSG_TOUCH_EVENT),
        "radio-data" => Ok(MSG_RADIO_DATA),
        "status-update" => Ok(MSG_STATUS_UPDATE),
        "notification" => Ok(MSG_NOTIFICATION),
        other => parse_u8(other)
            .ok_or_else(|| CliError::new(USAGE, format!("unknown message type: {input}"))),
    }
}

fn parse_u8(input: &str) -> Option<u8> {
    if let Some(hex) = input.strip_prefix("0x") {
        u8::from_str_radix(hex, 16).ok()
    } else {
        input.parse().ok()
    }
}
