// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod registry;
pub mod types;
pub mod watch;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_dir, ExecutorConfig, OverseerConfig, WatcherConfig};
use crate::engine::Manager;
use crate::registry::Registry;

pub use crate::types::Change;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config directory loading
/// - the component registry
/// - the manager and its overseers
/// - SIGINT / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    let configs = load_dir(&args.config_dir)?;

    if args.dry_run {
        print_dry_run(&configs);
        return Ok(());
    }

    let registry = Registry::with_builtins();
    let manager = Manager::new(configs);
    manager.run(&registry)?;

    let signal = wait_for_shutdown_signal().await?;
    info!(signal, "received signal; shutting down");

    manager.stop().await;
    info!("shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Simple dry-run output: print every pipeline and its components.
fn print_dry_run(configs: &[OverseerConfig]) {
    println!("overseer dry-run");
    println!("pipelines ({}):", configs.len());

    for cfg in configs {
        println!("  - {}", cfg.name());
        println!("      change_buffer: {}", cfg.change_buffer());

        match cfg.watcher() {
            WatcherConfig::Time(c) => {
                println!("      watcher: time (every {}s)", c.poll_seconds);
            }
            WatcherConfig::File(c) => {
                println!(
                    "      watcher: file {} (every {}s)",
                    c.path.display(),
                    c.poll_seconds
                );
            }
            WatcherConfig::GceMetadata(c) => {
                println!(
                    "      watcher: gce_metadata {}/{}/{} (recursive: {})",
                    c.metadata_url, c.source, c.key, c.recursive
                );
            }
            WatcherConfig::GcpSecrets(c) => {
                println!(
                    "      watcher: gcp_secrets projects/{}/secrets/{} every {}s -> {}",
                    c.project_id,
                    c.secret_name,
                    c.check_interval_seconds,
                    c.secrets_file_path.display()
                );
            }
        }

        match cfg.executor() {
            ExecutorConfig::Log(c) => {
                if c.tag.is_empty() {
                    println!("      executor: log");
                } else {
                    println!("      executor: log (tag: {})", c.tag);
                }
            }
            ExecutorConfig::Command(c) => {
                println!("      executor: command");
                println!("          cmd: {}", c.command);
                println!("          shell: {}", c.shell);
                println!("          work_dir: {}", c.work_dir.display());
                if c.persist_data {
                    println!("          persist_data: true");
                }
            }
        }
    }

    debug!("dry-run complete (nothing started)");
}
