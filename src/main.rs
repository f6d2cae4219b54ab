//! rebels-progress binary
//!
//! `serve` reads one JSON command per stdin line and writes one JSON
//! response per stdout line. Commands run concurrently; responses are
//! written in completion order and matched by `request_id`.

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info};

use rebels_progress::cli::{Cli, Commands, ConfigSubcommand};
use rebels_progress::commands::CommandHandler;
use rebels_progress::config::{self, LoggingSettings, ServiceConfig};
use rebels_progress::error::{Error, Result};
use rebels_progress::logging;
use rebels_progress::notify::LogNotifier;
use rebels_progress::roles::InMemoryRoleDirectory;
use rebels_progress::version;
use rebels_progress::Progression;

/// Bound on responses waiting for the stdout writer
const RESPONSE_BUFFER: usize = 256;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(())
        }
        Commands::Config { subcommand } => {
            let settings = LoggingSettings {
                level: "warn".to_string(),
                ..Default::default()
            };
            let _log_guards = logging::init_logging(&settings, cli.verbose, cli.quiet)?;
            handle_config_command(subcommand)
        }
        Commands::Serve { config } => {
            let config = ServiceConfig::load(config.as_deref())?;
            let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

            let build = version::build_info();
            info!(
                version = %build.full_version(),
                target = %build.target,
                profile = %build.profile,
                "Starting rebels-progress"
            );

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .thread_name("rebels-progress")
                .build()
                .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;
            runtime.block_on(serve(config))
        }
        Commands::Ranks { config } => {
            let config = ServiceConfig::load(config.as_deref())?;
            print_ranks(&config)
        }
        Commands::Leaderboard { config, limit } => {
            let config = ServiceConfig::load(config.as_deref())?;
            let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;
            runtime.block_on(print_leaderboard(&config, limit))
        }
    }
}

/// Execute stdin commands until EOF or Ctrl-C
async fn serve(config: ServiceConfig) -> Result<()> {
    let progression = Progression::from_config(
        &config,
        Arc::new(InMemoryRoleDirectory::new()),
        Arc::new(LogNotifier),
    )?;
    let handler = Arc::new(CommandHandler::new(Arc::new(progression)));

    let (tx, mut rx) = mpsc::channel::<String>(RESPONSE_BUFFER);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    let handler = handler.clone();
                    let tx = tx.clone();
                    tasks.spawn(async move {
                        let response = handler.handle_line(&line).await;
                        match serde_json::to_string(&response) {
                            Ok(json) => {
                                if tx.send(json).await.is_err() {
                                    error!("Response writer stopped");
                                }
                            }
                            Err(e) => error!(error = %e, "Failed to encode response"),
                        }
                    });
                }
                None => break,
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "Command task failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, finishing in-flight commands");
                break;
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Command task failed");
        }
    }

    drop(tx);
    writer
        .await
        .map_err(|e| Error::Internal(format!("Response writer failed: {}", e)))??;

    info!("Input closed, shutting down");
    Ok(())
}

fn print_ranks(config: &ServiceConfig) -> Result<()> {
    let table = config.rank_table()?;

    println!("{:<4} {:<12} {:>10}  {}", "#", "Rank", "Threshold", "Role");
    for (index, tier) in table.tiers().iter().enumerate() {
        println!(
            "{:<4} {:<12} {:>10}  {}",
            index + 1,
            tier.name,
            tier.threshold,
            tier.role_id
        );
    }
    Ok(())
}

async fn print_leaderboard(config: &ServiceConfig, limit: Option<usize>) -> Result<()> {
    let progression = Progression::from_config(
        config,
        Arc::new(InMemoryRoleDirectory::new()),
        Arc::new(LogNotifier),
    )?;
    let leaderboard = progression.leaderboard();
    let entries = match limit {
        Some(n) => leaderboard.top(n).await?,
        None => leaderboard.top_default().await?,
    };

    if entries.is_empty() {
        println!("No members yet.");
        return Ok(());
    }

    println!("{:<4} {:<24} {:>8}  {}", "#", "Member", "Points", "Rank");
    for entry in &entries {
        println!(
            "{:<4} {:<24} {:>8}  {}",
            entry.position, entry.display_name, entry.points, entry.rank
        );
    }
    Ok(())
}

fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = ServiceConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let path = config::init_config(path.as_deref(), force)?;
            println!("Configuration file created: {}", path.display());
        }
        ConfigSubcommand::Validate { config } => {
            let cfg = ServiceConfig::load(config.as_deref())?;
            println!(
                "Configuration is valid: {} ranks, {} schools.",
                cfg.ranks.len(),
                cfg.schools.len()
            );
        }
    }

    Ok(())
}
