//! `reflex-cli` – the bridge process.
//!
//! This binary wires the whole relay together:
//!
//! 1. Initializes structured logging (`RUST_LOG`, `REFLEX_LOG_FORMAT`).
//! 2. Loads `~/.reflex/config.toml` (defaults apply when absent).
//! 3. Opens the serial device **once**; on failure the bridge immediately
//!    falls back to simulated telemetry and never retries.
//! 4. Runs the command loop and the client-facing WebSocket gateway.
//!
//! Only a gateway bind failure is fatal; every other error degrades into
//! "no data" or "simulated data" without terminating the process.

mod config;

use std::sync::Arc;

use colored::Colorize;
use tracing::{error, info, warn};

use reflex_bridge::{BridgeCore, EventBus};
use reflex_gateway::GatewayServer;
use reflex_link::{DeviceLink, TelemetrySink};

#[tokio::main]
async fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // Initialise tracing-subscriber using RUST_LOG (defaults to "info").
    // Set REFLEX_LOG_FORMAT=json to emit newline-delimited JSON logs
    // suitable for log aggregators.  User-facing startup output still uses
    // println! for UX consistency.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("REFLEX_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => config::Config::default(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    // ── Core wiring ───────────────────────────────────────────────────────
    let bus = Arc::new(EventBus::default());
    let core = BridgeCore::new(Arc::clone(&bus));

    // The serial open is attempted exactly once; a failure is not fatal,
    // it just means every client sees synthetic telemetry.
    print!(
        "  Opening device {} @ {} baud … ",
        cfg.device.dimmed(),
        cfg.baud_rate
    );
    match DeviceLink::open(&cfg.device, cfg.baud_rate) {
        Ok((link, reader)) => {
            println!("{}", "connected".green());
            core.attach_device(Arc::new(link));
            let sink: Arc<dyn TelemetrySink> = core.clone();
            tokio::spawn(reader.run(sink));
        }
        Err(e) => {
            println!("{}", "unavailable".yellow());
            println!(
                "  {}  Serving simulated telemetry instead.",
                "No device detected.".dimmed()
            );
            warn!(error = %e, "device open failed at startup");
            core.fall_back(e);
        }
    }

    tokio::spawn(Arc::clone(&core).run_command_loop());

    println!(
        "\n  Gateway on {} – clients may connect.\n",
        format!("ws://0.0.0.0:{}", cfg.listen_port).bold().cyan()
    );

    // ── Gateway + shutdown ────────────────────────────────────────────────
    let gateway = GatewayServer::new(Arc::clone(&bus)).with_port(cfg.listen_port);
    tokio::select! {
        result = gateway.run() => {
            // run() only returns on a bind failure, the one fatal error.
            if let Err(e) = result {
                error!(error = %e, "gateway failed to start");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            info!("Ctrl-C received; shutting down");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___ ___ ___ _    ___ __  __"#.bold().cyan());
    println!("{}", r#"  | _ \ __| __| |  | __|\ \/ /"#.bold().cyan());
    println!("{}", r#"  |   / _|| _|| |__| _|  >  < "#.bold().cyan());
    println!("{}", r#"  |_|_\___|_| |____|___|/_/\_\"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Reflex".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Training Device Telemetry Bridge");
    println!();
}
