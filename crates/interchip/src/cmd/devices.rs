use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use interchip_frame::{
    device_name, msg_type_name, KNOWN_DEVICES, MSG_ACK, MSG_NACK, MSG_NOTIFICATION,
    MSG_RADIO_DATA, MSG_STATUS_UPDATE, MSG_TOUCH_EVENT,
};
use serde::Serialize;

use crate::cmd::DevicesArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

const MESSAGE_TYPES: &[u8] = &[
    MSG_ACK,
    MSG_NACK,
    MSG_TOUCH_EVENT,
    MSG_RADIO_DATA,
    MSG_STATUS_UPDATE,
    MSG_NOTIFICATION,
];

#[derive(Serialize)]
struct NamespaceOutput {
    devices: Vec<EntryOutput>,
    message_types: Vec<EntryOutput>,
}

#[derive(Serialize)]
struct EntryOutput {
    id: u8,
    name: String,
}

pub fn run(_args: DevicesArgs, format: OutputFormat) -> CliResult<i32> {
    match format {
        OutputFormat::Json => {
            let out = NamespaceOutput {
                devices: entries(KNOWN_DEVICES, device_name),
                message_types: entries(MESSAGE_TYPES, msg_type_name),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        _ => {
            println!("{}", table("DEVICE", KNOWN_DEVICES, device_name));
            println!("{}", table("MESSAGE TYPE", MESSAGE_TYPES, msg_type_name));
        }
    }
    Ok(SUCCESS)
}

fn entries(ids: &[u8], name: fn(u8) -> &'static str) -> Vec<EntryOutput> {
    ids.iter()
        .map(|&id| EntryOutput {
            id,
            name: name(id).to_string(),
        })
        .collect()
}

fn table(header: &str, ids: &[u8], name: fn(u8) -> &'static str) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", header]);
    for &id in ids {
        table.add_row(vec![format!("0x{id:02X}"), name(id).to_string()]);
    }
    table
}
