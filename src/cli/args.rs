//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::{Path, PathBuf};

/// Slipway - reproducible application server images
///
/// Plans a Python web service image as five ordered, content-addressed
/// layers and builds it with Podman or Docker.
#[derive(Parser, Debug)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SLIPWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip project slipway.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the application image
    Build(BuildArgs),

    /// Print the planned Containerfile
    Plan(PlanArgs),

    /// Show the planned layers and their digests
    Layers(LayersArgs),

    /// Start the built image and wait for its port to accept connections
    Smoke(SmokeArgs),

    /// Initialize a project slipway.toml
    Init(InitArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

impl Commands {
    /// Project directory named on the command line, if the command takes one
    pub fn project(&self) -> Option<&Path> {
        let project = match self {
            Commands::Build(args) => &args.project,
            Commands::Plan(args) => &args.project,
            Commands::Layers(args) => &args.project,
            Commands::Smoke(args) => &args.project,
            Commands::Init(_) | Commands::Config(_) | Commands::Completions(_) => return None,
        };
        project.project.as_deref()
    }
}

/// Project selection shared by the pipeline commands
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Project directory (defaults to current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Additional tag for the built image (repeatable)
    #[arg(short, long, value_parser = parse_image_tag)]
    pub tag: Vec<String>,

    /// Rebuild even if the image exists, without the engine's layer cache
    #[arg(long)]
    pub no_cache: bool,

    /// Validate and plan only, do not invoke the engine
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output format
    #[arg(short, long, default_value = "containerfile")]
    pub format: PlanFormat,
}

/// Arguments for the layers command
#[derive(Parser, Debug)]
pub struct LayersArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the smoke command
#[derive(Parser, Debug)]
pub struct SmokeArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Host port to publish the runtime port on (defaults to the runtime port)
    #[arg(long)]
    pub host_port: Option<u16>,

    /// Seconds to wait for the port to accept connections
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite existing slipway.toml
    #[arg(short, long)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}

/// Output format for the plan command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlanFormat {
    /// Containerfile text
    Containerfile,
    /// JSON layer plan
    Json,
}

/// Output format for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Validate an image reference given to `--tag`
fn parse_image_tag(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("tag must not be empty".to_string());
    }
    if s.chars().any(|c| c.is_whitespace() || c.is_ascii_uppercase()) {
        return Err(format!(
            "invalid tag '{s}': use lowercase without whitespace"
        ));
    }
    if s.starts_with(['.', '-', ':', '/']) || s.ends_with([':', '/']) {
        return Err(format!("invalid tag '{s}'"));
    }
    Ok(s.to_string())
}
