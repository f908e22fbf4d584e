//! Engine CLI container runtime
//!
//! Implements the ContainerRuntime trait by executing the `podman` or
//! `docker` binary directly. Both share the subset of commands used here.

use crate::error::{SlipwayError, SlipwayResult};
use crate::orchestration::factory::Engine;
use crate::orchestration::runtime::{BuildOutput, BuildRequest, ContainerRuntime, RunConfig};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Container runtime backed by an engine CLI
pub struct CliRuntime {
    engine: Engine,
    binary: PathBuf,
}

impl CliRuntime {
    /// Create a runtime for `engine`, optionally at an explicit binary path
    pub fn new(engine: Engine, binary: Option<PathBuf>) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| PathBuf::from(engine.binary())),
            engine,
        }
    }

    /// Build the argument list for `<engine> build`
    pub(crate) fn build_args(request: &BuildRequest<'_>) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "-f".to_string(),
            request.containerfile.display().to_string(),
            "-t".to_string(),
            request.tag.to_string(),
        ];
        if request.no_cache {
            args.push("--no-cache".to_string());
        }
        args.extend(request.extra_args.iter().cloned());
        args.push(request.context_dir.display().to_string());
        args
    }

    /// Build the argument list for `<engine> run -d`
    pub(crate) fn run_args(config: &RunConfig) -> Vec<String> {
        let mut args = vec!["run".to_string(), "-d".to_string()];

        if let Some(ref name) = config.name {
            args.push("--name".to_string());
            args.push(name.clone());
        }

        for (host, container) in &config.ports {
            args.push("-p".to_string());
            args.push(format!("{}:{}", host, container));
        }

        args.push(config.image.clone());
        args
    }

    /// Execute an engine command and return the output
    async fn exec(&self, args: &[&str]) -> SlipwayResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.binary.display(), args);

        Command::new(&self.binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                SlipwayError::command_failed(format!("{} {:?}", self.binary.display(), args), e)
            })
    }

    /// Run an engine command that must succeed
    async fn exec_ok(&self, args: &[&str]) -> SlipwayResult<String> {
        let output = self.exec(args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SlipwayError::command_exec(
                format!("{} {}", self.engine.binary(), args.first().unwrap_or(&"")),
                stderr.trim(),
            ))
        }
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    async fn is_available(&self) -> SlipwayResult<bool> {
        let status = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        Ok(status.map(|s| s.success()).unwrap_or(false))
    }

    async fn ensure_ready(&self) -> SlipwayResult<()> {
        if !self.is_available().await? {
            return Err(SlipwayError::EngineUnavailable {
                engine: self.engine.binary().to_string(),
                reason: format!("{} not found", self.binary.display()),
            });
        }

        let output = self.exec(&["info"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SlipwayError::EngineUnavailable {
                engine: self.engine.binary().to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        Ok(())
    }

    async fn image_exists(&self, image: &str) -> SlipwayResult<bool> {
        let output = self.exec(&["image", "inspect", image]).await?;
        Ok(output.status.success())
    }

    async fn build_image(
        &self,
        request: &BuildRequest<'_>,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> SlipwayResult<BuildOutput> {
        let args = Self::build_args(request);
        debug!("Building: {} {:?}", self.binary.display(), args);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SlipwayError::command_failed(format!("{} build", self.engine.binary()), e)
            })?;

        let lines = super::stream_child_output(&mut child, on_output).await;

        let status = child
            .wait()
            .await
            .map_err(|e| {
                SlipwayError::command_failed(format!("{} build", self.engine.binary()), e)
            })?;

        Ok(BuildOutput {
            code: status.code(),
            lines,
        })
    }

    async fn tag_image(&self, image: &str, tag: &str) -> SlipwayResult<()> {
        let output = self.exec(&["tag", image, tag]).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SlipwayError::ImageTag {
                image: image.to_string(),
                tag: tag.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn run_detached(&self, config: &RunConfig) -> SlipwayResult<String> {
        let args = Self::run_args(config);
        let args_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.exec(&args_refs).await?;

        if output.status.success() {
            let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
            info!(
                "Container started: {}",
                &container_id[..12.min(container_id.len())]
            );
            Ok(container_id)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SlipwayError::ContainerStart(stderr.trim().to_string()))
        }
    }

    async fn is_running(&self, container_id: &str) -> SlipwayResult<bool> {
        let output = self
            .exec(&["inspect", "--format", "{{.State.Running}}", container_id])
            .await?;
        // A container that is already gone is not running
        Ok(output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    async fn stop(&self, container_id: &str) -> SlipwayResult<()> {
        debug!("Stopping container: {}", container_id);
        self.exec_ok(&["stop", container_id]).await.map(|_| ())
    }

    async fn remove(&self, container_id: &str) -> SlipwayResult<()> {
        debug!("Removing container: {}", container_id);

        let output = self.exec(&["rm", "-f", container_id]).await?;

        if output.status.success() {
            Ok(())
        } else {
            // Ignore error if container doesn't exist
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_lowercase().contains("no such container") {
                Ok(())
            } else {
                Err(SlipwayError::command_exec(
                    format!("{} rm", self.engine.binary()),
                    stderr,
                ))
            }
        }
    }

    async fn logs(&self, container_id: &str, lines: u32) -> SlipwayResult<String> {
        let tail_arg = if lines == 0 {
            "all".to_string()
        } else {
            lines.to_string()
        };

        let output = self.exec(&["logs", "--tail", &tail_arg, container_id]).await?;

        // Engines split container output across both streams
        let mut logs = String::from_utf8_lossy(&output.stdout).to_string();
        logs.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(logs)
    }

    fn runtime_name(&self) -> &'static str {
        self.engine.name()
    }
}
