//! Slipway - reproducible application server images
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use slipway::cli::{Cli, Commands};
use slipway::config::{Config, ConfigManager};
use slipway::error::{SlipwayError, SlipwayResult};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(stage) = e.stage() {
                eprintln!("{} {}", style("Stage:").red(), stage);
            }
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> SlipwayResult<()> {
    let cli = Cli::parse();

    // Commands that need neither config nor a project
    match cli.command {
        Commands::Init(args) => {
            init_logging(cli.verbose, None);
            return slipway::cli::commands::init(args).await;
        }
        Commands::Completions(args) => return slipway::cli::commands::completions(args),
        _ => {}
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let project_dir = match cli.command.project() {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()
            .map_err(|e| SlipwayError::io("getting current directory", e))?,
    };

    // Find the project recipe unless --no-local is set
    let local_config_path = if cli.no_local {
        None
    } else {
        ConfigManager::find_local_config(&project_dir)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;
    init_logging(cli.verbose, Some(&config));

    if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
    } else if let Some(ref path) = local_config_path {
        debug!("Found local config: {}", path.display());
    }

    // Relative recipe paths resolve against the recipe's directory
    let root: PathBuf = local_config_path
        .as_deref()
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or(project_dir);
    debug!("Project root: {}", root.display());

    match cli.command {
        Commands::Init(_) | Commands::Completions(_) => {
            Err(SlipwayError::Internal("command dispatched twice".to_string()))
        }
        Commands::Build(args) => slipway::cli::commands::build(args, &config, &root).await,
        Commands::Plan(args) => slipway::cli::commands::plan(args, &config, &root).await,
        Commands::Layers(args) => slipway::cli::commands::layers(args, &config, &root).await,
        Commands::Smoke(args) => slipway::cli::commands::smoke(args, &config, &root).await,
        Commands::Config(args) => {
            slipway::cli::commands::config(args, &config_manager, &config).await
        }
    }
}

/// Initialize logging: 0 = warn (progress only), 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: Option<&Config>) {
    let filter = match verbose {
        0 => EnvFilter::new("slipway=warn"),
        1 => EnvFilter::new("slipway=info"),
        _ => EnvFilter::new("slipway=debug"),
    };

    let json = config.is_some_and(|c| c.general.log_format == "json");
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
