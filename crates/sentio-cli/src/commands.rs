//! Command implementations.

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use sentio_core::models::{AlertRule, Device, LogsQuery, MetricsQuery, TracesQuery};
use sentio_core::cache::Payload;
use sentio_core::{CacheEntry, Config, Console, SessionGate, Subscription};

use crate::cli::{AlertCommand, DeviceCommand, LoginArgs, LogsCommand, MetricsCommand, TracesCommand, Window};
use crate::output;

/// State shared by every command.
pub struct App {
    pub config: Config,
    pub gate: SessionGate,
    pub json: bool,
}

impl App {
    fn console(&self) -> Result<Console> {
        self.gate
            .admit(&self.config)
            .context("Not signed in. Run `sentio login` first.")
    }

    fn print<T: Serialize>(&self, value: &T, table: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            output::json_pretty(value)
        } else {
            table(value);
            Ok(())
        }
    }

    /// Wait for a subscription to settle and print whatever it can show.
    async fn show<T: Payload + Serialize>(
        &self,
        mut subscription: Subscription<T>,
        table: impl FnOnce(&T),
    ) -> Result<()> {
        let entry = subscription.settled().await;
        self.show_entry(&entry, table)
    }

    fn show_entry<T: Serialize>(&self, entry: &CacheEntry<T>, table: impl FnOnce(&T)) -> Result<()> {
        let Some(value) = entry.value() else {
            // Nothing to fall back on
            match entry.error {
                Some(ref err) => bail!("{}", err),
                None => bail!("No data for {}", entry.key),
            }
        };
        output::entry_notes(entry);
        self.print(value, table)
    }
}

fn prompt(label: &str) -> std::io::Result<String> {
    use std::io::Write;

    eprint!("{}", label);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn window(window: Window) -> Result<(chrono::DateTime<Utc>, chrono::DateTime<Utc>)> {
    let span = Duration::try_minutes(window.since.max(1))
        .with_context(|| format!("--since {} is out of range", window.since))?;
    let end = Utc::now();
    let start = end
        .checked_sub_signed(span)
        .with_context(|| format!("--since {} is out of range", window.since))?;
    Ok((start, end))
}

// ===== Session =====

pub async fn login(ctx: &mut App, args: LoginArgs) -> Result<()> {
    let username = match args.username.or_else(|| ctx.config.last_username.clone()) {
        Some(u) => u,
        None => prompt("Username: ").context("Failed to read username")?,
    };
    if username.is_empty() {
        bail!("Username is required");
    }
    let password = match args.password {
        Some(p) => p,
        None => rpassword::prompt_password(format!("Password for {}: ", username))
            .context("Failed to read password")?,
    };

    eprintln!("Signing in to {}...", ctx.config.api_url);
    ctx.gate
        .login(&username, &password)
        .await
        .context("Login failed")?;

    if ctx.config.last_username.as_deref() != Some(username.as_str()) {
        if let Err(e) = ctx.config.remember_username(&username) {
            debug!(error = %e, "Failed to remember username");
        }
    }

    output::success(&format!("Signed in as {}", username));
    Ok(())
}

pub fn logout(ctx: &App) -> Result<()> {
    if !ctx.gate.is_authenticated() {
        output::warn("Not signed in");
        return Ok(());
    }
    ctx.gate.logout().context("Failed to remove stored session")?;
    output::success("Signed out");
    Ok(())
}

// ===== Dashboard resources =====

pub async fn status(ctx: &App) -> Result<()> {
    let console = ctx.console()?;
    ctx.show(console.status(), output::status).await
}

pub async fn anomalies(ctx: &App) -> Result<()> {
    let console = ctx.console()?;
    ctx.show(console.anomalies(), output::anomalies).await
}

pub async fn predictions(ctx: &App) -> Result<()> {
    let console = ctx.console()?;
    ctx.show(console.predictions(), output::predictions).await
}

pub async fn devices(ctx: &App, command: DeviceCommand) -> Result<()> {
    let console = ctx.console()?;
    match command {
        DeviceCommand::List => ctx.show(console.devices(), output::devices).await,
        DeviceCommand::Get { id } => {
            let device = console.api().get_device(&id).await?;
            ctx.print(&device, output::device)
        }
        DeviceCommand::Create(args) => {
            let mut device = Device::new(args.name, args.kind, args.protocol);
            device.endpoint = args.endpoint;
            let created = console.create_device(&device).await?;
            output::success(&format!("Created device {}", created.id.as_deref().unwrap_or(&created.name)));
            ctx.print(&created, output::device)
        }
        DeviceCommand::Update { id, device: args } => {
            let mut device = console.api().get_device(&id).await?;
            device.name = args.name;
            device.kind = args.kind;
            device.protocol = args.protocol;
            if args.endpoint.is_some() {
                device.endpoint = args.endpoint;
            }
            let updated = console.update_device(&id, &device).await?;
            output::success(&format!("Updated device {}", id));
            ctx.print(&updated, output::device)
        }
        DeviceCommand::Delete { id } => {
            let deleted = console.delete_device(&id).await?;
            output::success(&format!("Deleted device {} ({})", deleted.id, deleted.status));
            Ok(())
        }
    }
}

pub async fn alerts(ctx: &App, command: AlertCommand) -> Result<()> {
    let console = ctx.console()?;
    match command {
        AlertCommand::List => ctx.show(console.alerts(), output::alerts).await,
        AlertCommand::Get { id } => {
            let alert = console.api().get_alert(&id).await?;
            ctx.print(&alert, output::alert)
        }
        AlertCommand::Create(args) => {
            let mut rule = AlertRule::new(args.name, args.query, args.threshold);
            rule.severity = args.severity;
            rule.description = args.description;
            let created = console.create_alert(&rule).await?;
            output::success(&format!("Created alert rule {}", created.name));
            ctx.print(&created, output::alert)
        }
        AlertCommand::Enable { id } => set_enabled(ctx, &console, &id, true).await,
        AlertCommand::Disable { id } => set_enabled(ctx, &console, &id, false).await,
        AlertCommand::Delete { id } => {
            let deleted = console.delete_alert(&id).await?;
            output::success(&format!("Deleted alert rule {} ({})", deleted.id, deleted.status));
            Ok(())
        }
    }
}

async fn set_enabled(ctx: &App, console: &Console, id: &str, enabled: bool) -> Result<()> {
    let mut rule = console.api().get_alert(id).await?;
    if rule.enabled == enabled {
        output::warn(&format!("Alert rule {} is already {}", id, if enabled { "enabled" } else { "disabled" }));
        return Ok(());
    }
    rule.enabled = enabled;
    let updated = console.update_alert(id, &rule).await?;
    output::success(&format!("{} alert rule {}", if enabled { "Enabled" } else { "Disabled" }, id));
    ctx.print(&updated, output::alert)
}

// ===== Telemetry =====

pub async fn metrics(ctx: &App, command: MetricsCommand) -> Result<()> {
    let console = ctx.console()?;
    let result = match command {
        MetricsCommand::Query { query, window: w, step } => {
            let (start, end) = window(w)?;
            let query = MetricsQuery::new(query).range(start, end).step(step);
            console.api().query_metrics(&query).await?
        }
        MetricsCommand::Series => console.api().list_metric_series().await?,
    };
    output::json_pretty(&result)
}

pub async fn logs(ctx: &App, command: LogsCommand) -> Result<()> {
    let console = ctx.console()?;
    let result = match command {
        LogsCommand::Query { query, window: w, limit } => {
            let (start, end) = window(w)?;
            let query = LogsQuery::new(query).range(start, end).limit(limit);
            console.api().query_logs(&query).await?
        }
        LogsCommand::Labels => console.api().list_log_labels().await?,
    };
    output::json_pretty(&result)
}

pub async fn traces(ctx: &App, command: TracesCommand) -> Result<()> {
    let console = ctx.console()?;
    let result = match command {
        TracesCommand::Search {
            service,
            operation,
            window: w,
            limit,
        } => {
            let (start, end) = window(w)?;
            let mut query = TracesQuery::default().range(start, end).limit(limit);
            if let Some(service) = service {
                query = query.service(service);
            }
            if let Some(operation) = operation {
                query = query.operation(operation);
            }
            console.api().query_traces(&query).await?
        }
        TracesCommand::Get { id } => console.api().get_trace(&id).await?,
    };
    output::json_pretty(&result)
}

// ===== Live view =====

/// Poll the time-sensitive resources and print every settled change until
/// Ctrl-C or until the server ends the session.
pub async fn watch(ctx: &App) -> Result<()> {
    let console = ctx.console()?;
    console.start_polling();

    let mut status = console.status();
    let mut anomalies = console.anomalies();
    let mut predictions = console.predictions();
    info!("Watching dashboard resources");
    eprintln!("Watching for changes (Ctrl-C to stop)...");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ctx.gate.signed_out() => {
                output::warn("Session ended. Run `sentio login` to sign in again.");
                break;
            }
            Some(entry) = status.changed() => {
                if entry.is_settled() {
                    println!("\n== status ({}) ==", entry.age_display());
                    if let Err(e) = ctx.show_entry(&entry, output::status) {
                        output::warn(&e.to_string());
                    }
                }
            }
            Some(entry) = anomalies.changed() => {
                if entry.is_settled() {
                    println!("\n== anomalies ({}) ==", entry.age_display());
                    if let Err(e) = ctx.show_entry(&entry, output::anomalies) {
                        output::warn(&e.to_string());
                    }
                }
            }
            Some(entry) = predictions.changed() => {
                if entry.is_settled() {
                    println!("\n== predictions ({}) ==", entry.age_display());
                    if let Err(e) = ctx.show_entry(&entry, output::predictions) {
                        output::warn(&e.to_string());
                    }
                }
            }
            else => break,
        }
    }

    console.stop_polling();
    Ok(())
}
