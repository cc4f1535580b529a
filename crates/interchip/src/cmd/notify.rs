use interchip_frame::{DEVICE_DISPLAY, MSG_NOTIFICATION};
use interchip_node::{Node, NodeConfig};
use interchip_transport::LinkSocket;

use crate::cmd::send::{parse_duration, report_delivery};
use crate::cmd::NotifyArgs;
use crate::exit::{node_error, transport_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;
use crate::payload::{parse_device, Notification};

pub fn run(args: NotifyArgs, format: OutputFormat) -> CliResult<i32> {
    let own_id = parse_device(&args.from)?;
    let timeout = parse_duration(&args.timeout)?;

    let note = Notification {
        severity: args.severity.as_str(),
        duration_sec: args.duration,
        title: &args.title,
        message: &args.message,
    };
    let payload = serde_json::to_vec(&note)
        .map_err(|err| CliError::new(INTERNAL, format!("notification encoding failed: {err}")))?;

    let link =
        LinkSocket::connect(&args.path).map_err(|err| transport_error("connect failed", err))?;
    let node = Node::start(link, NodeConfig::for_device(own_id))
        .map_err(|err| node_error("node start failed", err))?;

    let mut handle = node
        .send(DEVICE_DISPLAY, MSG_NOTIFICATION, &payload)
        .map_err(|err| node_error("send failed", err))?;

    let result = report_delivery(handle.wait(timeout), "display", format);
    node.shutdown();
    result
}
