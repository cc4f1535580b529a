use std::fs;
use std::time::Duration;

use interchip_node::{error_name, Delivery, Node, NodeConfig};
use interchip_transport::LinkSocket;

use crate::cmd::SendArgs;
use crate::exit::{
    node_error, transport_error, CliError, CliResult, NACKED, SUCCESS, TIMEOUT, USAGE,
};
use crate::output::OutputFormat;
use crate::payload::{parse_device, parse_msg_type};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let own_id = parse_device(&args.from)?;
    let dest = parse_device(&args.dest)?;
    let msg_type = parse_msg_type(&args.msg_type)?;
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args)?;

    let link =
        LinkSocket::connect(&args.path).map_err(|err| transport_error("connect failed", err))?;
    let node = Node::start(link, NodeConfig::for_device(own_id))
        .map_err(|err| node_error("node start failed", err))?;

    let mut handle = node
        .send(dest, msg_type, &payload)
        .map_err(|err| node_error("send failed", err))?;

    let result = report_delivery(handle.wait(timeout), &args.dest, format);
    node.shutdown();
    result
}

pub(crate) fn report_delivery(
    delivery: Option<Delivery>,
    dest: &str,
    format: OutputFormat,
) -> CliResult<i32> {
    match delivery {
        Some(Delivery::Acked) => {
            match format {
                OutputFormat::Json => println!("{{\"delivered\":true}}"),
                _ => println!("acknowledged by {dest}"),
            }
            Ok(SUCCESS)
        }
        Some(Delivery::Nacked { code }) => Err(CliError::new(
            NACKED,
            format!("rejected by {dest}: {} (0x{code:02X})", error_name(code)),
        )),
        Some(Delivery::TimedOut) | None => Err(CliError::new(
            TIMEOUT,
            format!("no acknowledgment from {dest}"),
        )),
        Some(Delivery::Canceled) => Err(CliError::new(
            crate::exit::INTERNAL,
            "send was canceled before a result arrived",
        )),
    }
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
