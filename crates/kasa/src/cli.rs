//! Clap derive structures for the `kasa` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// kasa -- control Kasa smart plugs and bulbs on the local network
#[derive(Debug, Parser)]
#[command(
    name = "kasa",
    version,
    about = "Discover, monitor and control Kasa smart plugs and bulbs",
    long_about = "Talks to Kasa smart plugs and bulbs directly over their local TCP protocol.\n\n\
        One-shot commands operate on devices remembered in the device store;\n\
        `kasa serve` keeps them monitored and exposes an HTTP API.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "KASA_CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Device database file (overrides `store.path` from the config)
    #[arg(long, env = "KASA_STORE_FILE", global = true)]
    pub store: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "KASA_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Device connect timeout in milliseconds (overrides the config)
    #[arg(long, env = "KASA_CONNECT_TIMEOUT", global = true)]
    pub connect_timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API with background monitoring
    Serve(ServeArgs),

    /// Probe candidate addresses and remember every device that answers
    #[command(alias = "scan")]
    Discover(DiscoverArgs),

    /// Probe one address and remember the device
    Add(AddArgs),

    /// Forget a device
    #[command(alias = "rm")]
    Remove(DeviceIdArg),

    /// List remembered devices
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show one device
    Get(DeviceIdArg),

    /// Switch a device on or off, or toggle it
    Power(PowerArgs),

    /// Set bulb brightness
    Brightness(BrightnessArgs),

    /// Set bulb color
    Color(ColorArgs),

    /// Set bulb white color temperature
    ColorTemp(ColorTempArgs),

    /// Device totals
    Stats,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Arguments ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// HTTP port (overrides `server.port`)
    #[arg(long)]
    pub port: Option<u16>,

    /// HTTP bind address (overrides `server.bind`)
    #[arg(long)]
    pub bind: Option<String>,

    /// Do not re-probe offline devices in the background
    #[arg(long)]
    pub no_monitoring: bool,

    /// Run one discovery sweep, print the result and exit
    #[arg(long)]
    pub discover_only: bool,
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Addresses to probe (`ip` or `ip:port`); defaults to the configured candidates
    pub addresses: Vec<String>,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Device address (`ip` or `ip:port`)
    pub address: String,
}

#[derive(Debug, Args)]
pub struct DeviceIdArg {
    /// Device ID as reported by the device
    pub id: String,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only devices that answered their last probe
    #[arg(long, conflicts_with = "offline")]
    pub online: bool,

    /// Only devices that did not answer their last probe
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerAction {
    On,
    Off,
    Toggle,
}

#[derive(Debug, Args)]
pub struct PowerArgs {
    /// Device ID
    pub id: String,

    pub action: PowerAction,
}

#[derive(Debug, Args)]
pub struct BrightnessArgs {
    /// Device ID
    pub id: String,

    /// Brightness in percent; 0 switches the light off
    #[arg(value_parser = clap::value_parser!(i64).range(0..=100))]
    pub brightness: i64,
}

#[derive(Debug, Args)]
pub struct ColorArgs {
    /// Device ID
    pub id: String,

    /// Hue in degrees
    #[arg(value_parser = clap::value_parser!(i64).range(0..=360))]
    pub hue: i64,

    /// Saturation in percent
    #[arg(value_parser = clap::value_parser!(i64).range(0..=100))]
    pub saturation: i64,

    /// Brightness in percent
    #[arg(value_parser = clap::value_parser!(i64).range(0..=100))]
    pub value: i64,
}

#[derive(Debug, Args)]
pub struct ColorTempArgs {
    /// Device ID
    pub id: String,

    /// Color temperature in kelvin
    #[arg(value_parser = clap::value_parser!(i64).range(2700..=6500))]
    pub kelvin: i64,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
