//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};

/// Terminal console for the Sentio IoT observability platform.
#[derive(Parser, Debug)]
#[command(name = "sentio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Override the configured API base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the session token
    Login(LoginArgs),
    /// Sign out and forget the session token
    Logout,
    /// Aggregated component health
    Status,
    /// Device inventory
    #[command(subcommand)]
    Devices(DeviceCommand),
    /// Alert rules
    #[command(subcommand)]
    Alerts(AlertCommand),
    /// Recent anomaly detections
    Anomalies,
    /// Failure risk predictions per device
    Predictions,
    /// Metrics queries
    #[command(subcommand)]
    Metrics(MetricsCommand),
    /// Log queries
    #[command(subcommand)]
    Logs(LogsCommand),
    /// Trace search
    #[command(subcommand)]
    Traces(TracesCommand),
    /// Keep status, anomalies and predictions live until interrupted
    Watch,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account name (defaults to the last one used)
    #[arg(long, env = "SENTIO_USERNAME")]
    pub username: Option<String>,

    /// Password (prompted for when omitted)
    #[arg(long, env = "SENTIO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
    /// List devices
    List,
    /// Show one device
    Get { id: String },
    /// Register a device
    Create(DeviceArgs),
    /// Change a device
    Update {
        id: String,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Remove a device
    Delete { id: String },
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    #[arg(long)]
    pub name: String,
    /// Device type, e.g. sensor or gateway
    #[arg(long = "type", value_name = "TYPE")]
    pub kind: String,
    /// mqtt, modbus, opcua, http, ...
    #[arg(long)]
    pub protocol: String,
    #[arg(long)]
    pub endpoint: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum AlertCommand {
    /// List alert rules
    List,
    /// Show one alert rule
    Get { id: String },
    /// Create an alert rule
    Create(AlertArgs),
    /// Enable an alert rule
    Enable { id: String },
    /// Disable an alert rule
    Disable { id: String },
    /// Delete an alert rule
    Delete { id: String },
}

#[derive(Args, Debug)]
pub struct AlertArgs {
    #[arg(long)]
    pub name: String,
    /// Metrics query the rule evaluates
    #[arg(long)]
    pub query: String,
    #[arg(long)]
    pub threshold: f64,
    #[arg(long, default_value = "warning")]
    pub severity: String,
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Subcommand, Debug)]
pub enum MetricsCommand {
    /// Run a metrics query over a recent window
    Query {
        query: String,
        #[command(flatten)]
        window: Window,
        /// Resolution step
        #[arg(long, default_value = "15s")]
        step: String,
    },
    /// List available metric series
    Series,
}

#[derive(Subcommand, Debug)]
pub enum LogsCommand {
    /// Run a log query over a recent window
    Query {
        query: String,
        #[command(flatten)]
        window: Window,
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
    /// List available log labels
    Labels,
}

#[derive(Subcommand, Debug)]
pub enum TracesCommand {
    /// Search recent traces
    Search {
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        operation: Option<String>,
        #[command(flatten)]
        window: Window,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Show one trace
    Get { id: String },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct Window {
    /// How far back to look, in minutes (at most a year)
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_MINUTES))]
    pub since: i64,
}

/// One year.
pub const MAX_WINDOW_MINUTES: i64 = 525_600;
