//! Integration tests for Slipway

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    /// Command isolated from the user's global config
    fn slipway(home: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("slipway");
        cmd.env("SLIPWAY_CONFIG", home.path().join("config.toml"));
        cmd
    }

    fn project(requirements: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), requirements).unwrap();
        fs::write(
            dir.path().join("main.py"),
            "from fastapi import FastAPI\napp = FastAPI()\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        slipway(&home)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("reproducible application server images"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        slipway(&home)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("slipway"));
    }

    #[test]
    fn plan_prints_containerfile() {
        let home = TempDir::new().unwrap();
        let dir = project("fastapi==0.115.0\nuvicorn[standard]==0.30.6\n");
        slipway(&home)
            .arg("plan")
            .arg("--project")
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("FROM python:3.12.7-slim-bookworm"))
            .stdout(predicate::str::contains("rm -rf /var/lib/apt/lists/*"))
            .stdout(predicate::str::contains("EXPOSE 8000/tcp"))
            .stdout(predicate::str::contains(
                r#"CMD ["uvicorn","main:app","--host","0.0.0.0","--port","8000"]"#,
            ));
    }

    #[test]
    fn plan_is_reproducible() {
        let home = TempDir::new().unwrap();
        let dir = project("fastapi==0.115.0\n");
        let run = || {
            slipway(&home)
                .args(["plan", "--format", "json", "--project"])
                .arg(dir.path())
                .output()
                .unwrap()
                .stdout
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn unsatisfiable_manifest_exits_with_usage_code() {
        let home = TempDir::new().unwrap();
        let dir = project("fastapi>=1.0,<0.5\n");
        slipway(&home)
            .args(["build", "--dry-run", "--project"])
            .arg(dir.path())
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Unsatisfiable"))
            .stderr(predicate::str::contains("fastapi"));
    }

    #[test]
    fn floating_base_is_rejected() {
        let home = TempDir::new().unwrap();
        let dir = project("fastapi==0.115.0\n");
        fs::write(
            dir.path().join("slipway.toml"),
            "[base]\nimage = \"python:latest\"\n",
        )
        .unwrap();
        slipway(&home)
            .args(["plan", "--project"])
            .arg(dir.path())
            .assert()
            .code(2)
            .stderr(predicate::str::contains("not pinned"));
    }

    #[test]
    fn no_local_ignores_project_recipe() {
        let home = TempDir::new().unwrap();
        let dir = project("fastapi==0.115.0\n");
        fs::write(
            dir.path().join("slipway.toml"),
            "[base]\nimage = \"python:latest\"\n",
        )
        .unwrap();
        slipway(&home)
            .args(["--no-local", "plan", "--project"])
            .arg(dir.path())
            .assert()
            .success();
    }

    #[test]
    fn dry_run_build_succeeds_without_engine() {
        let home = TempDir::new().unwrap();
        let dir = project("fastapi==0.115.0\n");
        slipway(&home)
            .args(["build", "--dry-run", "--project"])
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("dry run"));
    }

    #[test]
    fn layers_json_lists_five_stages() {
        let home = TempDir::new().unwrap();
        let dir = project("fastapi==0.115.0\n");
        let output = slipway(&home)
            .args(["layers", "--format", "json", "--project"])
            .arg(dir.path())
            .output()
            .unwrap();
        assert!(output.status.success());

        let layers: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let stages: Vec<&str> = layers
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["stage"].as_str().unwrap())
            .collect();
        assert_eq!(
            stages,
            ["base", "toolchain", "dependencies", "source", "runtime"]
        );
    }

    #[test]
    fn missing_manifest_fails() {
        let home = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        slipway(&home)
            .args(["layers", "--project"])
            .arg(dir.path())
            .assert()
            .code(2)
            .stderr(predicate::str::contains("requirements.txt"));
    }

    #[test]
    fn init_writes_recipe() {
        let home = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        slipway(&home)
            .args(["init", "--path"])
            .arg(dir.path())
            .assert()
            .success();
        assert!(dir.path().join("slipway.toml").is_file());

        slipway(&home)
            .args(["init", "--path"])
            .arg(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn config_path() {
        let home = TempDir::new().unwrap();
        slipway(&home)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let home = TempDir::new().unwrap();
        slipway(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[runtime]"))
            .stdout(predicate::str::contains("port = 8000"));
    }

    #[test]
    fn completions_generate() {
        let home = TempDir::new().unwrap();
        slipway(&home)
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("slipway"));
    }
}
