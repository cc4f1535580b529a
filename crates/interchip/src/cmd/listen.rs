use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use interchip_frame::{MSG_NOTIFICATION, MSG_RADIO_DATA, MSG_STATUS_UPDATE, MSG_TOUCH_EVENT};
use interchip_node::{Node, NodeConfig};
use interchip_transport::LinkSocket;

use crate::cmd::ListenArgs;
use crate::exit::{node_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_packet, OutputFormat};
use crate::payload::{parse_device, parse_msg_type};

const ALL_DATA_TYPES: &[u8] = &[
    MSG_TOUCH_EVENT,
    MSG_RADIO_DATA,
    MSG_STATUS_UPDATE,
    MSG_NOTIFICATION,
];

/// Serves a single point-to-point peer: the first connection on the socket.
pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let own_id = parse_device(&args.device)?;
    let types = resolve_types(&args)?;

    let socket =
        LinkSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let link = socket
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    let node = Node::start(link, NodeConfig::for_device(own_id))
        .map_err(|err| node_error("node start failed", err))?;

    let printed = Arc::new(AtomicUsize::new(0));
    for msg_type in types {
        let printed = Arc::clone(&printed);
        node.register_handler(msg_type, move |packet| {
            print_packet(packet, format);
            printed.fetch_add(1, Ordering::SeqCst);
        })
        .map_err(|err| node_error("handler registration failed", err))?;
    }

    while running.load(Ordering::SeqCst) {
        if let Some(count) = args.count {
            if printed.load(Ordering::SeqCst) >= count {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    node.shutdown();
    Ok(SUCCESS)
}

fn resolve_types(args: &ListenArgs) -> CliResult<Vec<u8>> {
    match &args.types {
        Some(names) => names.iter().map(|name| parse_msg_type(name)).collect(),
        None => Ok(ALL_DATA_TYPES.to_vec()),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
