use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;
use crate::payload::Severity;

pub mod devices;
pub mod listen;
pub mod notify;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a single message and wait for its acknowledgment.
    Send(SendArgs),
    /// Send an on-screen notification to the display device.
    Notify(NotifyArgs),
    /// Run a receiving node and print delivered messages.
    Listen(ListenArgs),
    /// List the known device addresses and message types.
    Devices(DevicesArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Notify(args) => notify::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Devices(args) => devices::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Device to act as (name or numeric id).
    #[arg(long, default_value = "touch")]
    pub from: String,
    /// Destination device (name or numeric id).
    #[arg(long)]
    pub dest: String,
    /// Message type (name or numeric id).
    #[arg(long = "type", value_name = "TYPE")]
    pub msg_type: String,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Maximum time to wait for the acknowledgment (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Device to act as (name or numeric id).
    #[arg(long, default_value = "touch")]
    pub from: String,
    /// Notification title.
    #[arg(long)]
    pub title: String,
    /// Notification body text.
    #[arg(long)]
    pub message: String,
    /// Notification severity.
    #[arg(long, default_value = "info")]
    pub severity: Severity,
    /// Seconds the notification stays on screen.
    #[arg(long, default_value = "5")]
    pub duration: u16,
    /// Maximum time to wait for the acknowledgment (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Device to act as (name or numeric id).
    #[arg(long, default_value = "display")]
    pub device: String,
    /// Filter to specific message types (comma-separated names or ids).
    #[arg(long, value_delimiter = ',')]
    pub types: Option<Vec<String>>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct DevicesArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
