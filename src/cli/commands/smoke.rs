//! Smoke command - start the built image and check that its port is served

use crate::cli::args::SmokeArgs;
use crate::config::Config;
use crate::error::{SlipwayError, SlipwayResult};
use crate::orchestration::{create_runtime, ContainerRuntime, RunConfig};
use crate::pipeline::plan_project;
use crate::ui::{self, TaskSpinner, UiContext};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Delay between connection attempts
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long an accepted connection must stay open to count as served
const SETTLE_WINDOW: Duration = Duration::from_millis(200);

/// Container log lines included in a failure
const LOG_TAIL_LINES: u32 = 40;

/// One image to start and check
#[derive(Debug, Clone)]
pub(crate) struct SmokeTarget {
    pub image: String,
    pub container_port: u16,
    pub host_port: u16,
    pub timeout: Duration,
}

#[derive(Debug, PartialEq, Eq)]
enum Readiness {
    Ready,
    Exited,
    TimedOut,
}

/// Execute the smoke command
pub async fn execute(args: SmokeArgs, config: &Config, root: &Path) -> SlipwayResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "slipway smoke");

    let plan = plan_project(config, root)?;
    let target = SmokeTarget {
        image: plan.image_tag(),
        container_port: plan.runtime.port,
        host_port: args.host_port.unwrap_or(plan.runtime.port),
        timeout: Duration::from_secs(args.timeout),
    };

    let runtime = create_runtime(config).await?;
    runtime.ensure_ready().await?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Waiting for port {}...", target.host_port));
    match run_smoke(runtime.as_ref(), &target).await {
        Ok(()) => spinner.stop(&format!("Port {} accepts connections", target.host_port)),
        Err(e) => {
            spinner.stop_error(&format!("Port {} never served", target.host_port));
            return Err(e);
        }
    }

    ui::outro_success(
        &ctx,
        &format!("{} serves on port {}", target.image, target.container_port),
    );
    Ok(())
}

/// Start `target.image`, wait until its port is served, then tear it down.
///
/// The container is stopped and removed whether or not the check passed.
pub(crate) async fn run_smoke(
    runtime: &dyn ContainerRuntime,
    target: &SmokeTarget,
) -> SlipwayResult<()> {
    if !runtime.image_exists(&target.image).await? {
        return Err(SlipwayError::User(format!(
            "Image {} has not been built. Run: slipway build",
            target.image
        )));
    }

    let run_config = RunConfig {
        image: target.image.clone(),
        name: Some(format!(
            "slipway-smoke-{}",
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        )),
        ports: vec![(target.host_port, target.container_port)],
    };
    let container_id = runtime.run_detached(&run_config).await?;

    let readiness = wait_for_app(runtime, &container_id, target.host_port, target.timeout).await;
    let outcome = match readiness {
        Ok(Readiness::Ready) => Ok(()),
        Ok(readiness) => {
            let logs = runtime
                .logs(&container_id, LOG_TAIL_LINES)
                .await
                .unwrap_or_default();
            Err(match readiness {
                Readiness::Exited => SlipwayError::ContainerExited {
                    port: target.host_port,
                    logs,
                },
                _ => SlipwayError::SmokeTimeout {
                    port: target.host_port,
                    secs: target.timeout.as_secs(),
                    logs,
                },
            })
        }
        Err(e) => Err(e),
    };

    cleanup(runtime, &container_id).await;
    outcome
}

/// Poll until the application serves `port`, the container exits, or the
/// timeout elapses
async fn wait_for_app(
    runtime: &dyn ContainerRuntime,
    container_id: &str,
    port: u16,
    timeout: Duration,
) -> SlipwayResult<Readiness> {
    let deadline = Instant::now() + timeout;
    loop {
        if accepts_connection(port).await {
            return Ok(Readiness::Ready);
        }
        if !runtime.is_running(container_id).await? {
            return Ok(Readiness::Exited);
        }
        if Instant::now() >= deadline {
            return Ok(Readiness::TimedOut);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Whether a connection to `port` on localhost is accepted and kept open.
///
/// Port forwarders (docker-proxy, rootlessport) accept on the host before
/// the application listens and hang up once the forward fails, so a
/// connection closed within `SETTLE_WINDOW` does not count.
async fn accepts_connection(port: u16) -> bool {
    let mut stream = match TcpStream::connect(("127.0.0.1", port)).await {
        Ok(stream) => stream,
        Err(e) => {
            debug!("Port {} not ready: {}", port, e);
            return false;
        }
    };

    let mut buf = [0u8; 1];
    match tokio::time::timeout(SETTLE_WINDOW, stream.read(&mut buf)).await {
        // Still open and silent, as an HTTP server waiting for a request
        Err(_) => true,
        Ok(Ok(0)) => {
            debug!("Port {} closed the connection", port);
            false
        }
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("Port {} reset the connection: {}", port, e);
            false
        }
    }
}

async fn cleanup(runtime: &dyn ContainerRuntime, container_id: &str) {
    if let Err(e) = runtime.stop(container_id).await {
        warn!("Failed to stop smoke container: {}", e);
    }
    if let Err(e) = runtime.remove(container_id).await {
        warn!("Failed to remove smoke container: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::fake::FakeRuntime;
    use tokio::net::TcpListener;

    const IMAGE: &str = "slipway-app:0123456789ab";

    async fn listening() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    async fn closed_port() -> u16 {
        listening().await.1
    }

    /// Accepts every connection and hangs up at once
    async fn hanging_up() -> u16 {
        let (listener, port) = listening().await;
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });
        port
    }

    fn target(host_port: u16, timeout: Duration) -> SmokeTarget {
        SmokeTarget {
            image: IMAGE.to_string(),
            container_port: 8000,
            host_port,
            timeout,
        }
    }

    #[tokio::test]
    async fn open_port_is_served() {
        let (_listener, port) = listening().await;
        assert!(accepts_connection(port).await);
    }

    #[tokio::test]
    async fn closed_port_is_not_served() {
        assert!(!accepts_connection(closed_port().await).await);
    }

    #[tokio::test]
    async fn forwarder_hangup_is_not_served() {
        assert!(!accepts_connection(hanging_up().await).await);
    }

    #[tokio::test]
    async fn serving_container_passes_and_is_cleaned_up() {
        let (_listener, port) = listening().await;
        let runtime = FakeRuntime::with_image(IMAGE);

        run_smoke(&runtime, &target(port, Duration::from_secs(2)))
            .await
            .unwrap();

        assert_eq!(
            runtime.calls(),
            vec![
                format!("run {} {}:8000", IMAGE, port),
                "stop c0ffee".to_string(),
                "remove c0ffee".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn exited_container_fails_fast() {
        let port = hanging_up().await;
        let runtime = FakeRuntime {
            exits_after: Some(0),
            logs: "ModuleNotFoundError: No module named 'main'".to_string(),
            ..FakeRuntime::with_image(IMAGE)
        };

        let started = Instant::now();
        let err = run_smoke(&runtime, &target(port, Duration::from_secs(30)))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        match err {
            SlipwayError::ContainerExited { port: p, logs } => {
                assert_eq!(p, port);
                assert!(logs.contains("ModuleNotFoundError"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(runtime.calls().contains(&"remove c0ffee".to_string()));
    }

    #[tokio::test]
    async fn silent_port_times_out() {
        let port = closed_port().await;
        let runtime = FakeRuntime::with_image(IMAGE);

        let err = run_smoke(&runtime, &target(port, Duration::from_millis(300)))
            .await
            .unwrap_err();

        assert!(matches!(err, SlipwayError::SmokeTimeout { .. }));
        assert!(runtime.calls().contains(&"stop c0ffee".to_string()));
    }

    #[tokio::test]
    async fn unbuilt_image_is_not_started() {
        let runtime = FakeRuntime::default();
        let err = run_smoke(&runtime, &target(closed_port().await, Duration::from_secs(1)))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("has not been built"));
        assert!(runtime.calls().is_empty());
    }
}
