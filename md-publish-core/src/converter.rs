//! Publish Dispatcher for the `md2conf` job.
//!
//! [`Md2ConfJob`] turns a [`JobInput`] into one md2conf invocation, runs it
//! through a [`CommandRunner`] and classifies the outcome. Credentials travel
//! in the child's environment, never in argv. There are no retries.

use async_trait::async_trait;
use regex::Regex;
use std::ffi::OsString;
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use tracing::{error, info};

use crate::config::ConverterSettings;
use crate::contract::{CommandOutput, CommandRunner, CommandSpec, JobHandler, JobInput, RunError};
use crate::error::{tail, PublishError};

/// md2conf reads these when `-u` / `-a` are not given.
pub const USERNAME_ENV: &str = "CONFLUENCE_USER_NAME";
pub const API_KEY_ENV: &str = "CONFLUENCE_API_KEY";

static PAGE_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d+\s+pages?\b").expect("static page summary pattern")
});

pub struct Md2ConfJob {
    runner: Arc<dyn CommandRunner>,
    settings: ConverterSettings,
    /// `PATH` for the child with `extra_path_dirs` prepended, computed once.
    child_path: Option<String>,
}

impl Md2ConfJob {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: ConverterSettings) -> Self {
        let child_path = prepend_path(&settings.extra_path_dirs, std::env::var_os("PATH"));
        Self {
            runner,
            settings,
            child_path,
        }
    }

    pub fn build_command(&self, input: &JobInput) -> CommandSpec {
        let target = &input.target;
        let mut args = self.settings.args.clone();

        let mut push = |flag: &str, value: &Option<String>| {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value.clone());
            }
        };
        push("-d", &target.domain);
        push("-p", &target.path);
        push("-s", &target.space);
        push("-r", &target.root_page);

        args.extend(self.settings.extra_args.iter().cloned());
        if target.dry_run && !self.settings.dry_run_flag.is_empty() {
            args.push(self.settings.dry_run_flag.clone());
        }
        args.push(input.source_path().display().to_string());

        let mut envs = Vec::new();
        if let Some(username) = &target.username {
            envs.push((USERNAME_ENV.to_string(), username.clone()));
        }
        if let Some(api_key) = &target.api_key {
            envs.push((API_KEY_ENV.to_string(), api_key.clone()));
        }
        if let Some(path) = &self.child_path {
            envs.push(("PATH".to_string(), path.clone()));
        }

        CommandSpec {
            program: self.settings.program.clone(),
            args,
            envs,
            timeout: self.settings.timeout(),
        }
    }

    fn classify(&self, input: &JobInput, output: CommandOutput) -> Result<String, PublishError> {
        if output.success() {
            info!(
                source = %input.display_name,
                stdout_bytes = output.stdout.len(),
                stderr_bytes = output.stderr.len(),
                "md2conf finished successfully"
            );
            return Ok(summarize(&output.stdout).unwrap_or_else(|| {
                format!("Successfully published {} to Confluence", input.display_name)
            }));
        }

        let stderr_tail = tail(&output.stderr, self.settings.stderr_tail_limit);
        error!(
            source = %input.display_name,
            exit_code = ?output.exit_code,
            stderr = %stderr_tail,
            "md2conf failed"
        );
        Err(PublishError::ConverterFailed {
            exit_code: output.exit_code,
            stderr_tail,
        })
    }
}

#[async_trait]
impl JobHandler for Md2ConfJob {
    async fn publish(&self, input: &JobInput) -> Result<String, PublishError> {
        let command = self.build_command(input);
        info!(
            command = %command.display_line(),
            username_set = input.target.username.is_some(),
            api_key_set = input.target.api_key.is_some(),
            dry_run = input.target.dry_run,
            "Executing md2conf"
        );

        match self.runner.run(&command).await {
            Ok(output) => self.classify(input, output),
            Err(RunError::Spawn { program, source }) => {
                error!(program = %program, error = %source, "md2conf could not be launched");
                Err(PublishError::ConverterUnavailable(format!("{program}: {source}")))
            }
            Err(RunError::Timeout(elapsed)) => {
                error!(timeout = ?elapsed, "md2conf timed out");
                Err(PublishError::ConverterTimeout(elapsed.as_secs()))
            }
            Err(RunError::Io(e)) => {
                error!(error = %e, "I/O error while waiting for md2conf");
                Err(PublishError::Internal(e.to_string()))
            }
        }
    }
}

/// First stdout line that reads like "<n> page(s) ...", if any.
pub fn summarize(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| PAGE_SUMMARY.is_match(line))
        .map(str::to_string)
}

fn prepend_path(dirs: &[std::path::PathBuf], current: Option<OsString>) -> Option<String> {
    if dirs.is_empty() {
        return None;
    }
    let existing = current
        .map(|p| std::env::split_paths(&p).collect::<Vec<_>>())
        .unwrap_or_default();
    let combined = dirs
        .iter()
        .cloned()
        .chain(existing.into_iter().filter(|p| !dirs.contains(p)));
    std::env::join_paths(combined)
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

/// Runs commands with `tokio::process`, killing the child if the timeout elapses.
#[derive(Debug, Default, Clone)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, RunError> {
        let child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .envs(command.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(command.timeout, child.wait_with_output())
            .await
            .map_err(|_| RunError::Timeout(command.timeout))??;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockCommandRunner;
    use crate::request::ConfluenceTarget;
    use std::path::PathBuf;
    use std::time::Duration;

    fn target(dry_run: bool) -> ConfluenceTarget {
        ConfluenceTarget {
            domain: Some("example.atlassian.net".into()),
            path: Some("/wiki/".into()),
            username: Some("bot@example.com".into()),
            api_key: Some("s3cret".into()),
            space: Some("DOCS".into()),
            root_page: Some("4242".into()),
            dry_run,
        }
    }

    fn input(dry_run: bool) -> JobInput {
        JobInput {
            source_path: PathBuf::from("/tmp/docs/x.md"),
            display_name: "docs/x.md".into(),
            target: target(dry_run),
        }
    }

    fn job_with(runner: MockCommandRunner) -> Md2ConfJob {
        Md2ConfJob::new(Arc::new(runner), ConverterSettings::default())
    }

    #[test]
    fn command_carries_target_and_keeps_credentials_out_of_argv() {
        let job = job_with(MockCommandRunner::new());
        let command = job.build_command(&input(false));

        assert_eq!(command.program, "python3");
        assert_eq!(
            command.args,
            vec![
                "-m",
                "md2conf",
                "-d",
                "example.atlassian.net",
                "-p",
                "/wiki/",
                "-s",
                "DOCS",
                "-r",
                "4242",
                "--keep-hierarchy",
                "--render-mermaid",
                "--heading-anchors",
                "/tmp/docs/x.md",
            ]
        );
        assert!(!command.args.iter().any(|a| a.contains("s3cret")));
        assert_eq!(command.env(API_KEY_ENV), Some("s3cret"));
        assert_eq!(command.env(USERNAME_ENV), Some("bot@example.com"));
        assert_eq!(command.timeout, Duration::from_secs(60));
        assert!(!format!("{command:?}").contains("s3cret"));
    }

    #[test]
    fn dry_run_appends_flag_before_the_path() {
        let job = job_with(MockCommandRunner::new());
        let command = job.build_command(&input(true));
        let n = command.args.len();
        assert_eq!(command.args[n - 2], "--local");
        assert_eq!(command.args[n - 1], "/tmp/docs/x.md");
    }

    #[test]
    fn extra_path_dirs_lead_the_child_path() {
        let settings = ConverterSettings {
            extra_path_dirs: vec![PathBuf::from("/opt/node/bin")],
            ..Default::default()
        };
        let job = Md2ConfJob::new(Arc::new(MockCommandRunner::new()), settings);
        let command = job.build_command(&input(false));
        let path = command.env("PATH").unwrap();
        assert!(path.starts_with("/opt/node/bin"));
    }

    #[tokio::test]
    async fn exit_zero_uses_page_summary_from_stdout() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(1).returning(|_| {
            Ok(CommandOutput {
                exit_code: Some(0),
                stdout: "Processing docs/x.md\n1 page updated\n".into(),
                stderr: String::new(),
            })
        });
        let message = job_with(runner).publish(&input(true)).await.unwrap();
        assert_eq!(message, "1 page updated");
    }

    #[tokio::test]
    async fn exit_zero_without_summary_uses_generic_message() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_| Ok(CommandOutput { exit_code: Some(0), ..Default::default() }));
        let message = job_with(runner).publish(&input(false)).await.unwrap();
        assert_eq!(message, "Successfully published docs/x.md to Confluence");
    }

    #[tokio::test]
    async fn non_zero_exit_is_converter_failed_with_bounded_stderr() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_| {
            Ok(CommandOutput {
                exit_code: Some(2),
                stdout: String::new(),
                stderr: format!("{}\nPermission denied for space DOCS\n", "noise ".repeat(1000)),
            })
        });
        let err = job_with(runner).publish(&input(false)).await.unwrap_err();
        match err {
            PublishError::ConverterFailed {
                exit_code,
                stderr_tail,
            } => {
                assert_eq!(exit_code, Some(2));
                assert!(stderr_tail.ends_with("Permission denied for space DOCS"));
                assert!(stderr_tail.chars().count() <= 2003);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn spawn_failure_is_converter_unavailable() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_| {
            Err(RunError::Spawn {
                program: "python3".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            })
        });
        let err = job_with(runner).publish(&input(false)).await.unwrap_err();
        assert_eq!(err.code(), crate::request::ErrorCode::ConverterUnavailable);
    }

    #[tokio::test]
    async fn timeout_is_converter_timeout() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|cmd| Err(RunError::Timeout(cmd.timeout)));
        let err = job_with(runner).publish(&input(false)).await.unwrap_err();
        assert!(matches!(err, PublishError::ConverterTimeout(60)));
    }

    #[test]
    fn summary_matches_page_count_lines_only() {
        assert_eq!(summarize("3 pages created\n").as_deref(), Some("3 pages created"));
        assert_eq!(summarize("  1 Page updated").as_deref(), Some("1 Page updated"));
        assert_eq!(summarize("updated 1 page"), None);
        assert_eq!(summarize("12 pageviews"), None);
    }

    fn spec(program: &str, args: &[&str], timeout: Duration) -> CommandSpec {
        CommandSpec {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            envs: vec![("MD_PUBLISH_TEST".into(), "from-env".into())],
            timeout,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tokio_runner_captures_streams_and_exit_code() {
        let output = TokioCommandRunner
            .run(&spec(
                "sh",
                &["-c", "echo \"$MD_PUBLISH_TEST\"; echo oops >&2; exit 3"],
                Duration::from_secs(10),
            ))
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "from-env");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tokio_runner_times_out() {
        let err = TokioCommandRunner
            .run(&spec("sh", &["-c", "sleep 5"], Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Timeout(_)));
    }

    #[tokio::test]
    async fn tokio_runner_reports_missing_program_as_spawn_error() {
        let err = TokioCommandRunner
            .run(&spec(
                "md-publish-definitely-missing-binary",
                &[],
                Duration::from_secs(1),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }));
    }
}
