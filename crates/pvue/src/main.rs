//! # pvue
//!
//! pvue dispatch server binary: loads settings, registers the selected
//! handler sets, and serves them over WebSocket until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pvue_core::logging::{LogFormat, init_subscriber};
use pvue_rpc::HandlerRegistry;
use pvue_rpc::handlers::{calculator, notes, todo};
use pvue_server::host::open_frontend;
use pvue_server::{DispatchServer, LogOnlyHost, ServerConfig, WindowHost};
use pvue_settings::{ErrorFormat, PvueSettings};

/// pvue dispatch server.
#[derive(Parser, Debug)]
#[command(name = "pvue", about = "pvue WebSocket dispatch server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the settings file [default: ~/.pvue/settings.json].
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `pvue_server=trace`.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,

    /// Error response shape.
    #[arg(long, value_enum)]
    error_format: Option<ErrorShape>,

    /// Example application handlers to register next to the text builtins.
    #[arg(long, value_enum, default_value = "all")]
    app: App,

    /// File the notes app saves to and loads from.
    #[arg(long)]
    notes_file: Option<PathBuf>,

    /// Frontend URL to hand to the window host.
    #[arg(long)]
    frontend_url: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum App {
    Text,
    Todo,
    Notes,
    Calculator,
    All,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ErrorShape {
    Legacy,
    Tagged,
}

impl Cli {
    /// Apply flags on top of the loaded settings.
    fn apply(&self, settings: &mut PvueSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.ws_port = port;
        }
        if self.json_logs {
            settings.logging.json = true;
        }
        if let Some(shape) = self.error_format {
            settings.server.error_format = match shape {
                ErrorShape::Legacy => ErrorFormat::Legacy,
                ErrorShape::Tagged => ErrorFormat::Tagged,
            };
        }
        if let Some(ref path) = self.notes_file {
            settings.apps.notes_file = Some(path.display().to_string());
        }
    }

    fn wants(&self, app: App) -> bool {
        self.app == App::All || self.app == app
    }
}

/// Register the example apps selected on the command line.
async fn register_apps(cli: &Cli, settings: &PvueSettings, registry: &HandlerRegistry) {
    if cli.wants(App::Todo) {
        todo::register(registry, &Arc::new(todo::TodoList::with_samples()));
    }
    if cli.wants(App::Notes) {
        let path = settings.apps.notes_file.as_ref().map(PathBuf::from);
        let book = Arc::new(notes::NoteBook::with_welcome(path));
        if book.path().is_some() {
            match book.load().await {
                Ok(loaded) => tracing::info!(count = loaded.len(), "notes loaded"),
                Err(e) => tracing::warn!(error = %e, "could not load notes, starting with defaults"),
            }
        }
        notes::register(registry, &book);
    }
    if cli.wants(App::Calculator) {
        calculator::register(registry);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings first: the log level comes from them
    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(pvue_settings::settings_path);
    let mut settings = pvue_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    cli.apply(&mut settings);

    let format = if settings.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    let level = cli
        .log_level
        .as_deref()
        .unwrap_or_else(|| settings.logging.level.as_filter_str());
    init_subscriber(level, format);
    tracing::info!(path = %settings_path.display(), "settings loaded");

    let metrics_handle =
        pvue_server::metrics::install_recorder().context("Failed to install metrics recorder")?;

    let registry = Arc::new(HandlerRegistry::with_builtins());
    register_apps(&cli, &settings, &registry).await;
    tracing::info!(handlers = ?registry.handler_names(), "handlers registered");

    let config = ServerConfig::from_settings(&settings.server);
    let server = Arc::new(DispatchServer::new(config, registry.clone()).with_metrics(metrics_handle));

    let mut run = {
        let server = server.clone();
        tokio::spawn(async move { server.start_default().await })
    };

    let host = LogOnlyHost::new();
    if let Some(ref url) = cli.frontend_url {
        tokio::select! {
            addr = server.wait_until_running() => {
                tracing::info!(%addr, "dispatch server ready");
                open_frontend(&host, &registry, url).context("Failed to open frontend")?;
            }
            finished = &mut run => {
                finished.context("Server task panicked")??;
                return Ok(());
            }
        }
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            tracing::info!("shutdown signal received");
            server.stop().await;
        }
        finished = &mut run => {
            finished.context("Server task panicked")??;
            return Ok(());
        }
    }
    run.await.context("Server task panicked")??;

    if host.current_url().is_some() {
        let _ = host.close();
    }
    tracing::info!("pvue stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "pvue",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--json-logs",
            "--error-format",
            "tagged",
            "--notes-file",
            "/tmp/notes.json",
        ]);
        let mut settings = PvueSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.ws_port, 9000);
        assert!(settings.logging.json);
        assert_eq!(settings.server.error_format, ErrorFormat::Tagged);
        assert_eq!(settings.apps.notes_file.as_deref(), Some("/tmp/notes.json"));
    }

    #[test]
    fn no_flags_keep_settings() {
        let cli = Cli::parse_from(["pvue"]);
        let mut settings = PvueSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.ws_port, 8765);
        assert!(!settings.logging.json);
        assert!(settings.apps.notes_file.is_none());
        assert_eq!(cli.app, App::All);
    }

    #[test]
    fn app_selection() {
        let cli = Cli::parse_from(["pvue", "--app", "calculator"]);
        assert!(cli.wants(App::Calculator));
        assert!(!cli.wants(App::Todo));
        assert!(!cli.wants(App::Notes));
    }

    #[tokio::test]
    async fn text_only_registers_builtins() {
        let cli = Cli::parse_from(["pvue", "--app", "text"]);
        let registry = HandlerRegistry::with_builtins();
        register_apps(&cli, &PvueSettings::default(), &registry).await;
        assert_eq!(registry.handler_names(), ["lowercase", "reverse", "uppercase"]);
    }

    #[tokio::test]
    async fn all_apps_register_their_handlers() {
        let cli = Cli::parse_from(["pvue"]);
        let registry = HandlerRegistry::with_builtins();
        register_apps(&cli, &PvueSettings::default(), &registry).await;
        for name in ["get_todos", "add_note", "save_notes", "calculate", "factorial"] {
            assert!(registry.has_handler(name), "{name} missing");
        }
    }
}
