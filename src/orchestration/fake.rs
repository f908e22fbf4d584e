//! Scripted in-memory runtime for unit tests

use crate::error::SlipwayResult;
use crate::orchestration::runtime::{BuildOutput, BuildRequest, ContainerRuntime, RunConfig};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fs;
use std::sync::Mutex;

/// Records every call; builds and container state follow a script
#[derive(Default)]
pub(crate) struct FakeRuntime {
    pub images: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<String>>,
    pub build_script: Vec<String>,
    pub build_code: i32,
    pub containerfiles: Mutex<Vec<String>>,
    /// Extra args seen by each build
    pub build_args: Mutex<Vec<Vec<String>>>,
    /// Containers report as exited once this many state checks passed
    pub exits_after: Option<usize>,
    pub state_checks: Mutex<usize>,
    pub logs: String,
}

impl FakeRuntime {
    pub fn failing(code: i32, lines: &[&str]) -> Self {
        Self {
            build_code: code,
            build_script: lines.iter().map(|l| l.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_image(image: &str) -> Self {
        let runtime = Self::default();
        runtime.images.lock().unwrap().insert(image.to_string());
        runtime
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn is_available(&self) -> SlipwayResult<bool> {
        Ok(true)
    }

    async fn ensure_ready(&self) -> SlipwayResult<()> {
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> SlipwayResult<bool> {
        Ok(self.images.lock().unwrap().contains(image))
    }

    async fn build_image(
        &self,
        request: &BuildRequest<'_>,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> SlipwayResult<BuildOutput> {
        self.record(format!("build {}", request.tag));
        self.containerfiles
            .lock()
            .unwrap()
            .push(fs::read_to_string(request.containerfile).unwrap());
        self.build_args.lock().unwrap().push(request.extra_args.to_vec());
        for line in &self.build_script {
            on_output(line.clone());
        }
        if self.build_code == 0 {
            self.images.lock().unwrap().insert(request.tag.to_string());
        }
        Ok(BuildOutput {
            code: Some(self.build_code),
            lines: self.build_script.clone(),
        })
    }

    async fn tag_image(&self, image: &str, tag: &str) -> SlipwayResult<()> {
        self.record(format!("tag {} {}", image, tag));
        Ok(())
    }

    async fn run_detached(&self, config: &RunConfig) -> SlipwayResult<String> {
        let ports: Vec<String> = config.ports.iter().map(|(h, c)| format!("{}:{}", h, c)).collect();
        self.record(format!("run {} {}", config.image, ports.join(",")));
        Ok("c0ffee".to_string())
    }

    async fn is_running(&self, _container_id: &str) -> SlipwayResult<bool> {
        let mut checks = self.state_checks.lock().unwrap();
        *checks += 1;
        Ok(self.exits_after.is_none_or(|n| *checks <= n))
    }

    async fn stop(&self, container_id: &str) -> SlipwayResult<()> {
        self.record(format!("stop {}", container_id));
        Ok(())
    }

    async fn remove(&self, container_id: &str) -> SlipwayResult<()> {
        self.record(format!("remove {}", container_id));
        Ok(())
    }

    async fn logs(&self, _container_id: &str, _lines: u32) -> SlipwayResult<String> {
        Ok(self.logs.clone())
    }

    fn runtime_name(&self) -> &'static str {
        "Fake"
    }
}
