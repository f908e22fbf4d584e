//! Init command - create a project slipway.toml

use crate::cli::args::InitArgs;
use crate::config::LOCAL_CONFIG_FILE;
use crate::error::{SlipwayError, SlipwayResult};
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;

/// Template for the project recipe
const INIT_TEMPLATE: &str = r#"# Slipway project configuration
# Settings here override your global config (~/.config/slipway/config.toml)

[image]
name = "slipway-app"
# app_dir = "/app"

[base]
# Must be a full release tag or an @sha256 digest
image = "python:3.12.7-slim-bookworm"

[toolchain]
packages = ["build-essential", "libssl-dev", "libffi-dev", "libuv1-dev"]

[dependencies]
manifest = "requirements.txt"
# require_pins = true

[source]
# path = "."
exclude = ["__pycache__/", "*.db"]

[runtime]
port = 8000
command = "uvicorn"
args = ["main:app", "--host", "0.0.0.0", "--port", "8000"]

# [engine]
# kind = "podman"                    # auto, podman, docker
# build_args = ["--platform=linux/amd64"]
"#;

/// Execute the init command
pub async fn execute(args: InitArgs) -> SlipwayResult<()> {
    let ctx = UiContext::detect();

    let target_dir = match args.path {
        Some(ref p) => p.clone(),
        None => std::env::current_dir()
            .map_err(|e| SlipwayError::io("getting current directory", e))?,
    };

    let config_path = target_dir.join(LOCAL_CONFIG_FILE);

    if config_path.exists() && !args.force {
        return Err(SlipwayError::User(format!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        )));
    }

    ensure_dir(&target_dir).await?;

    fs::write(&config_path, INIT_TEMPLATE)
        .await
        .map_err(|e| SlipwayError::io(format!("writing {}", config_path.display()), e))?;

    ui::step_ok_detail(
        &ctx,
        "Created project config",
        &config_path.display().to_string(),
    );

    if !target_dir.join("requirements.txt").exists() {
        ui::step_info(&ctx, "No requirements.txt yet; builds need one");
    }

    Ok(())
}

async fn ensure_dir(dir: &Path) -> SlipwayResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| SlipwayError::io(format!("creating directory {}", dir.display()), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    #[tokio::test]
    async fn init_creates_config() {
        let temp = TempDir::new().unwrap();
        let args = InitArgs {
            force: false,
            path: Some(temp.path().to_path_buf()),
        };
        execute(args).await.unwrap();

        let content = std::fs::read_to_string(temp.path().join("slipway.toml")).unwrap();
        assert!(content.contains("[base]"));
        assert!(content.contains("[runtime]"));
    }

    #[tokio::test]
    async fn init_refuses_overwrite_without_force() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("slipway.toml"), "existing").unwrap();

        let args = InitArgs {
            force: false,
            path: Some(temp.path().to_path_buf()),
        };
        let err = execute(args).await.unwrap_err().to_string();
        assert!(err.contains("already exists"));
    }

    #[tokio::test]
    async fn init_overwrites_with_force() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("slipway.toml"), "old content").unwrap();

        let args = InitArgs {
            force: true,
            path: Some(temp.path().to_path_buf()),
        };
        execute(args).await.unwrap();

        let content = std::fs::read_to_string(temp.path().join("slipway.toml")).unwrap();
        assert!(content.contains("[image]"));
    }

    #[test]
    fn template_matches_defaults() {
        let parsed: Config = toml::from_str(INIT_TEMPLATE).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.base.image, defaults.base.image);
        assert_eq!(parsed.toolchain.packages, defaults.toolchain.packages);
        assert_eq!(parsed.runtime.args, defaults.runtime.args);
        assert_eq!(parsed.runtime.port, defaults.runtime.port);
    }
}
