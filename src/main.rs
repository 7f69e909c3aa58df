// ABOUTME: Entry point for the container-wait CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use container_wait::config::{self, WaitConfig};
use container_wait::error::Result;
use container_wait::target::BollardTarget;
use container_wait::types::ContainerId;
use container_wait::wait::{Strategy, WaitContext};
use std::env;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init { port, force } => {
            config::init_config(&cwd, port.as_deref(), force)?;
            println!("Created {}", config::CONFIG_FILENAME);
            Ok(())
        }
        Commands::Check { config } => {
            let (path, plan) = load_plan(&cwd, config)?;
            let strategy = plan.into_strategy()?;
            println!("{}: {}", path.display(), strategy.description());
            Ok(())
        }
        Commands::Wait {
            container,
            config,
            timeout_secs,
            host,
        } => {
            let (_, mut plan) = load_plan(&cwd, config)?;
            if let Some(secs) = timeout_secs {
                plan.deadline = Some(Duration::from_secs(secs));
            }
            wait(plan, ContainerId::new(container), host).await
        }
    }
}

fn load_plan(cwd: &Path, path: Option<PathBuf>) -> Result<(PathBuf, WaitConfig)> {
    let path = match path {
        Some(path) => path,
        None => WaitConfig::find(cwd)
            .ok_or_else(|| container_wait::error::Error::ConfigNotFound(cwd.to_path_buf()))?,
    };
    let plan = WaitConfig::load(&path)?;
    Ok((path, plan))
}

/// Run the plan against a container on the local engine; Ctrl-C cancels.
async fn wait(plan: WaitConfig, container: ContainerId, host: Option<String>) -> Result<()> {
    let strategy = plan.into_strategy()?;

    let mut target = BollardTarget::connect_local(container.clone())?;
    if let Some(host) = host {
        target = target.with_host(host);
    }

    let interrupt = CancellationToken::new();
    let ctx = WaitContext::with_cancellation(interrupt.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    println!("Waiting for {} ({})", container, strategy.description());
    let started = Instant::now();
    strategy.wait_until_ready(&ctx, &target).await?;
    println!(
        "{} is ready after {:.1}s",
        container,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
