//! Container engine orchestration
//!
//! Builds and runs images through an engine CLI:
//! - Podman (preferred, rootless by default)
//! - Docker

mod cli_runtime;
mod factory;
#[cfg(test)]
pub(crate) mod fake;
mod runtime;

pub use cli_runtime::CliRuntime;
pub use factory::{create_runtime, Engine};
pub use runtime::{BuildOutput, BuildRequest, ContainerRuntime, RunConfig};

use tokio::io::{AsyncBufReadExt, BufReader};

/// Max number of output lines to include in build error messages.
const BUILD_ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of build output for error diagnostics.
///
/// Returns the last `BUILD_ERROR_TAIL_LINES` lines so error messages are
/// actionable without being overwhelming.
pub(crate) fn build_error_output(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(BUILD_ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Parse an engine step line into `(n, total, instruction)`.
///
/// Understands Podman (`STEP 3/9: RUN ...`), the classic Docker builder
/// (`Step 3/9 : RUN ...`) and BuildKit (`#7 [3/9] RUN ...`).
pub(crate) fn parse_step_line(line: &str) -> Option<(u64, u64, &str)> {
    let line = line.trim();

    if let Some(rest) = line
        .strip_prefix("STEP ")
        .or_else(|| line.strip_prefix("Step "))
    {
        let colon = rest.find(':')?;
        let (n, total) = parse_fraction(rest[..colon].trim())?;
        return Some((n, total, rest[colon + 1..].trim()));
    }

    if line.starts_with('#') {
        let open = line.find('[')?;
        let close = open + line[open..].find(']')?;
        // `[stage-name 3/9]` in multi-stage builds, `[3/9]` otherwise
        let inner = line[open + 1..close].rsplit(' ').next()?;
        let (n, total) = parse_fraction(inner)?;
        return Some((n, total, line[close + 1..].trim()));
    }

    None
}

fn parse_fraction(text: &str) -> Option<(u64, u64)> {
    let (n, total) = text.split_once('/')?;
    Some((n.trim().parse().ok()?, total.trim().parse().ok()?))
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting. This is a standalone
/// async function (not behind `async_trait`) to avoid lifetime issues with the
/// `dyn Fn` callback.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> Vec<String> {
    let mut all_output = Vec::new();
    let (Some(stderr), Some(stdout)) = (child.stderr.take(), child.stdout.take()) else {
        return all_output;
    };

    let mut stderr_reader = BufReader::new(stderr).lines();
    let mut stdout_reader = BufReader::new(stdout).lines();

    let mut stderr_done = false;
    let mut stdout_done = false;

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = stderr_reader.next_line(), if !stderr_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stderr_done = true,
                }
            }
            line = stdout_reader.next_line(), if !stdout_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stdout_done = true,
                }
            }
        }
    }

    all_output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_podman_step() {
        let (n, m, instr) = parse_step_line("STEP 3/9: RUN apt-get update").unwrap();
        assert_eq!((n, m), (3, 9));
        assert_eq!(instr, "RUN apt-get update");
    }

    #[test]
    fn parse_docker_classic_step() {
        let (n, m, instr) = parse_step_line("Step 1/9 : FROM python:3.12.7-slim").unwrap();
        assert_eq!((n, m), (1, 9));
        assert_eq!(instr, "FROM python:3.12.7-slim");
    }

    #[test]
    fn parse_buildkit_step() {
        let (n, m, instr) = parse_step_line("#8 [4/6] COPY src/ ./").unwrap();
        assert_eq!((n, m), (4, 6));
        assert_eq!(instr, "COPY src/ ./");

        let (n, _, _) = parse_step_line("#5 [build 2/6] RUN true").unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn parse_non_step_lines() {
        assert!(parse_step_line("--> Using cache abc123").is_none());
        assert!(parse_step_line("#8 DONE 0.1s").is_none());
        assert!(parse_step_line("").is_none());
    }

    #[test]
    fn error_output_keeps_tail() {
        let lines: Vec<String> = (0..80).map(|i| format!("line {i}")).collect();
        let tail = build_error_output(&lines);
        assert!(tail.starts_with("line 30"));
        assert!(tail.ends_with("line 79"));
        assert_eq!(build_error_output(&lines[..2]), "line 0\nline 1");
    }
}
