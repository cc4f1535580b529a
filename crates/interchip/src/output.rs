use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use interchip_frame::{device_name, msg_type_name, Packet};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    source: u8,
    source_name: &'a str,
    msg_type: u8,
    msg_type_name: &'a str,
    seq: u8,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

pub fn print_packet(packet: &Packet, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                source: packet.source,
                source_name: device_name(packet.source),
                msg_type: packet.msg_type,
                msg_type_name: msg_type_name(packet.msg_type),
                seq: packet.seq,
                payload_size: packet.payload.len(),
                payload: payload_preview(packet.payload.as_ref()),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SOURCE", "TYPE", "SEQ", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    device_name(packet.source).to_string(),
                    msg_type_name(packet.msg_type).to_string(),
                    packet.seq.to_string(),
                    packet.payload.len().to_string(),
                    payload_preview(packet.payload.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "source=0x{:02X} ({}) type=0x{:02X} ({}) seq={} size={} payload={}",
                packet.source,
                device_name(packet.source),
                packet.msg_type,
                msg_type_name(packet.msg_type),
                packet.seq,
                packet.payload.len(),
                payload_preview(packet.payload.as_ref())
            );
        }
        OutputFormat::Raw => {
            print_raw(packet.payload.as_ref());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
