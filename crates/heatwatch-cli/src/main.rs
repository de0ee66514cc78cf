//! `heatwatch` – host-side heat-stress decision service.
//!
//! This binary bridges a field microcontroller and a pretrained classifier.
//! It:
//!
//! 1. Loads `~/.heatwatch/config.toml` (or `--config`), then applies
//!    `HEATWATCH_*` overrides and command-line flags.
//! 2. Loads the classifier artifact.  A missing or broken artifact is logged
//!    and the service runs without a model (every reply is decision 0).
//! 3. Opens the serial link.  This is the only startup failure that stops
//!    the process.
//! 4. Runs the inference loop until **Ctrl-C** / SIGTERM.

mod args;
mod config;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use colored::Colorize;
use heatwatch_hal::{SerialLink, available_ports};
use heatwatch_runtime::{ClassifierAdapter, InferenceLoop, init_tracing, load_classifier};
use tracing::{error, warn};

use crate::args::CliArgs;

fn main() -> ExitCode {
    // Hold the guard for the whole process so pending spans are flushed.
    let _tracing = init_tracing("heatwatch");

    // Exits with usage on bad arguments and handles --help / --version.
    let cli = CliArgs::parse();
    if cli.list_ports {
        return list_ports();
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let path = cli.config.clone().unwrap_or_else(config::config_path);

    if cli.init_config {
        return init_config(&path);
    }

    print_banner();

    let mut cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            println!(
                "  No config at {}; using defaults.",
                path.display().to_string().dimmed()
            );
            config::Config::default()
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    config::apply_env_overrides(&mut cfg);
    cli.apply(&mut cfg);
    if let Err(e) = cfg.validate() {
        eprintln!("{}: {}", "Config error".red().bold(), e);
        return ExitCode::FAILURE;
    }

    // ── Classifier ────────────────────────────────────────────────────────
    let model = match load_classifier(Path::new(&cfg.model_path)) {
        Ok(model) => model,
        Err(e) if !e.is_fatal() => {
            error!(error = %e, "model artifact rejected; running without a model");
            None
        }
        Err(e) => {
            error!(error = %e, "cannot load model artifact");
            eprintln!("{}: {}", "CRITICAL".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    let classifier = ClassifierAdapter::new(model);
    if classifier.has_model() {
        println!(
            "  Model: {} ({})",
            cfg.model_path.bold(),
            classifier.capability().green()
        );
    } else {
        println!(
            "  Model: {}  every reply will be decision 0",
            "none".yellow()
        );
    }

    // ── Serial link ───────────────────────────────────────────────────────
    let link = match SerialLink::open(&cfg.port, cfg.baud_rate, cfg.read_timeout()) {
        Ok(link) => link,
        Err(e) => {
            error!(error = %e, "cannot open serial link");
            eprintln!("{}: {}", "CRITICAL".red().bold(), e);
            eprintln!("  Use {} to see available ports.", "--list-ports".bold());
            return ExitCode::FAILURE;
        }
    };
    println!(
        "  Listening on {} @ {} baud (threshold {}, duration {}s)\n",
        cfg.port.bold(),
        cfg.baud_rate,
        cfg.threshold,
        cfg.duration_secs
    );

    // ── Shutdown flag ─────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::Release);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop the process externally");
    }

    // ── Inference loop ────────────────────────────────────────────────────
    let mut inference = InferenceLoop::new(link, classifier, cfg.loop_config());
    let stats = inference.run(&shutdown);

    println!();
    println!("{}", "  Shutting down heatwatch.".yellow().bold());
    println!(
        "  {} lines, {} replies, {} rejected, {} faults",
        stats.lines, stats.replied, stats.rejected, stats.faults
    );
    ExitCode::SUCCESS
}

// ─────────────────────────────────────────────────────────────────────────────
// Subcommands
// ─────────────────────────────────────────────────────────────────────────────

fn list_ports() -> ExitCode {
    match available_ports() {
        Ok(ports) if ports.is_empty() => {
            println!("No serial ports found.");
            ExitCode::SUCCESS
        }
        Ok(ports) => {
            println!("Available serial ports:");
            for p in ports {
                match p.product {
                    Some(product) => println!("  {} [{}] {}", p.name.bold(), p.kind, product),
                    None => println!("  {} [{}]", p.name.bold(), p.kind),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_config(path: &Path) -> ExitCode {
    if path.exists() {
        println!("Config already exists at {}", path.display().to_string().bold());
        return ExitCode::SUCCESS;
    }
    match config::save_to(&config::Config::default(), path) {
        Ok(()) => {
            println!(
                "{} Config written to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error saving config".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn print_banner() {
    println!();
    println!("  {} {}",
        "Heatwatch".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Field heat-stress decision service");
    println!();
}
