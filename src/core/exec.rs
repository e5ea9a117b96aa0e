//! External process execution.
//!
//! The orchestrators only build argv and env; running them goes through
//! [`ProcessRunner`]. A non-zero exit status is reported in
//! [`CommandOutput`], not as an error, so callers can interpret tool-specific
//! exit code contracts.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use serde::Serialize;

use crate::error::{CommandFailedDetails, Error, Result};
use crate::utils::shell;

/// Captured result of one external invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }

    /// Turns a non-zero exit into a `command.failed` error.
    pub fn require_success(self, program: &str, args: &[String]) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let command = display_command(program, args);
        Err(Error::command_failed(
            format!(
                "Command '{}' failed with exit code {}",
                command, self.exit_code
            ),
            CommandFailedDetails {
                command,
                exit_code: self.exit_code,
                stdout: self.stdout,
                stderr: self.stderr,
            },
        ))
    }
}

pub trait ProcessRunner {
    /// Adds variables on top of the inherited environment.
    fn append_env(&mut self, vars: &[(String, String)]);

    fn run(&mut self, program: &str, args: &[String]) -> Result<CommandOutput>;

    /// Feeds `script` to `interpreter` on stdin.
    fn run_shell(&mut self, interpreter: &str, script: &str) -> Result<CommandOutput>;
}

/// Runs `program` and fails with `command.failed` on a non-zero exit.
pub fn run_checked(
    runner: &mut dyn ProcessRunner,
    program: &str,
    args: &[String],
) -> Result<CommandOutput> {
    runner.run(program, args)?.require_success(program, args)
}

/// Printable command line with password values masked.
pub fn display_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, shell::quote_args(&shell::mask_secrets(args)))
    }
}

/// Spawns real child processes.
#[derive(Debug, Default)]
pub struct SystemRunner {
    env: Vec<(String, String)>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn execute(&self, mut cmd: Command, label: &str, stdin: Option<&str>) -> Result<CommandOutput> {
        cmd.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        tracing::debug!(command = %label, "running");
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::command_spawn_failed(label, e))?;

        let writer = match (stdin, child.stdin.take()) {
            (Some(script), Some(mut pipe)) => {
                let script = script.to_string();
                let label = label.to_string();
                Some(thread::spawn(move || {
                    if let Err(err) = pipe.write_all(script.as_bytes()) {
                        tracing::warn!(command = %label, error = %err, "cannot write script to stdin");
                    }
                }))
            }
            _ => None,
        };

        let stdout = child.stdout.take().map(|pipe| drain(pipe, false));
        let stderr = child.stderr.take().map(|pipe| drain(pipe, true));

        let status = child.wait();
        if status.is_err() {
            let _ = child.kill();
        }

        // Readers finish once the child has exited and the pipes are closed.
        if let Some(writer) = writer {
            let _ = writer.join();
        }
        let stdout = join_reader(stdout);
        let stderr = join_reader(stderr);

        let status = status
            .map_err(|e| Error::internal_io(e.to_string(), Some(format!("wait for {}", label))))?;

        Ok(CommandOutput {
            stdout,
            stderr,
            success: status.success(),
            exit_code: status.code().unwrap_or(-1),
        })
    }
}

/// Forwards and captures `pipe` line by line until EOF. Invalid UTF-8 is
/// replaced, never a reason to stop reading.
fn drain<R: Read + Send + 'static>(pipe: R, is_stderr: bool) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut captured = String::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim_end_matches(['\n', '\r']);
                    if is_stderr {
                        tracing::warn!(target: "deploystep::tool", "{}", line);
                    } else {
                        tracing::info!(target: "deploystep::tool", "{}", line);
                    }
                    captured.push_str(line);
                    captured.push('\n');
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!(error = %err, "cannot read tool output, discarding the rest");
                    let _ = io::copy(&mut reader, &mut io::sink());
                    break;
                }
            }
        }
        captured
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

impl ProcessRunner for SystemRunner {
    fn append_env(&mut self, vars: &[(String, String)]) {
        for (key, value) in vars {
            self.env.retain(|(k, _)| k != key);
            self.env.push((key.clone(), value.clone()));
        }
    }

    fn run(&mut self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        self.execute(cmd, &display_command(program, args), None)
    }

    fn run_shell(&mut self, interpreter: &str, script: &str) -> Result<CommandOutput> {
        self.execute(Command::new(interpreter), interpreter, Some(script))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_both_streams_and_exit_code() {
        let mut runner = SystemRunner::new();
        let out = runner
            .run(
                "sh",
                &["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
            )
            .unwrap();
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert_eq!(out.exit_code, 3);
        assert!(!out.success);
    }

    #[test]
    fn invalid_utf8_output_keeps_draining() {
        let mut runner = SystemRunner::new();
        let out = runner
            .run(
                "sh",
                &[
                    "-c".to_string(),
                    "printf 'ok\\n\\377\\n'; sleep 0.2; i=0; while [ $i -lt 2000 ]; do echo line $i; i=$((i+1)); done; exit 0".to_string(),
                ],
            )
            .unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.starts_with("ok\n\u{fffd}\n"));
        assert!(out.stdout.ends_with("line 1999\n"));
    }

    #[test]
    fn script_is_fed_on_stdin() {
        let mut runner = SystemRunner::new();
        let out = runner.run_shell("sh", "echo from-script\nexit 4\n").unwrap();
        assert_eq!(out.stdout, "from-script\n");
        assert_eq!(out.exit_code, 4);
    }

    #[test]
    fn appended_env_is_visible_to_child() {
        let mut runner = SystemRunner::new();
        runner.append_env(&[("DEPLOYSTEP_PROBE".to_string(), "42".to_string())]);
        let out = runner
            .run_shell("sh", "echo \"value=$DEPLOYSTEP_PROBE\"; echo \"path=${PATH:+set}\"")
            .unwrap();
        assert!(out.stdout.contains("value=42"));
        assert!(out.stdout.contains("path=set"));
    }

    #[test]
    fn missing_program_is_spawn_failure() {
        let mut runner = SystemRunner::new();
        let err = runner
            .run("deploystep-definitely-missing-binary", &[])
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::CommandSpawnFailed);
    }

    #[test]
    fn require_success_maps_exit_code() {
        let err = CommandOutput::failed(2, "bad credentials")
            .require_success("cf", &["login".to_string()])
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::CommandFailed);
        assert_eq!(err.details["exitCode"], 2);
        assert_eq!(err.details["stderr"], "bad credentials");
    }
}
