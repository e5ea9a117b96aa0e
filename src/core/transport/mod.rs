//! Upload actions for transport and change management backends.
//!
//! Every action is a plain record filled from step configuration and consumed
//! once by its `perform` function.

pub mod change;
pub mod cts;
pub mod labels;
pub mod solman;

use crate::error::{CommandFailedDetails, Error, Result};
use crate::exec::{display_command, CommandOutput};

pub const CMCLIENT: &str = "cmclient";
const BACKEND_TYPE: &str = "SOLMAN";
const CHECK_LOG: &str = "Check log for details";

/// Credentials for the change management client.
#[derive(Debug, Clone, Default)]
pub struct CmConnection {
    pub endpoint: String,
    pub username: String,
    pub password: String,
}

impl CmConnection {
    /// Leading `cmclient` arguments up to and including `subcommand`.
    pub fn args(&self, subcommand: &str) -> Vec<String> {
        [
            "--endpoint",
            self.endpoint.as_str(),
            "--user",
            self.username.as_str(),
            "--password",
            self.password.as_str(),
            "--backend-type",
            BACKEND_TYPE,
            subcommand,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

/// Exit codes of `cmclient --return-code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmOutcome {
    Success,
    InvalidCredentials,
    /// The query ran but answered "no".
    Negative,
    Failed(i32),
}

impl CmOutcome {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => CmOutcome::Success,
            2 => CmOutcome::InvalidCredentials,
            3 => CmOutcome::Negative,
            other => CmOutcome::Failed(other),
        }
    }
}

/// `command.failed` for a cmclient call that ended with an unexpected exit code.
pub(crate) fn cmclient_failed(prefix: &str, args: &[String], output: CommandOutput) -> Error {
    Error::command_failed(
        format!("{}: {}", prefix, CHECK_LOG),
        CommandFailedDetails {
            command: display_command(CMCLIENT, args),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        },
    )
}

fn invalid_credentials(prefix: &str) -> Error {
    Error::change_invalid_credentials(format!("{}: Invalid credentials", prefix))
}

pub(crate) fn check_outcome(prefix: &str, args: &[String], output: CommandOutput) -> Result<CmOutcome> {
    match CmOutcome::from_exit_code(output.exit_code) {
        CmOutcome::InvalidCredentials => Err(invalid_credentials(prefix)),
        CmOutcome::Failed(_) => Err(cmclient_failed(prefix, args, output)),
        outcome => Ok(outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_args_in_client_order() {
        let conn = CmConnection {
            endpoint: "https://cm.example.org".into(),
            username: "me".into(),
            password: "secret".into(),
        };
        assert_eq!(
            conn.args("is-change-in-development").join(" "),
            "--endpoint https://cm.example.org --user me --password secret --backend-type SOLMAN is-change-in-development"
        );
    }

    #[test]
    fn exit_code_contract() {
        assert_eq!(CmOutcome::from_exit_code(0), CmOutcome::Success);
        assert_eq!(CmOutcome::from_exit_code(2), CmOutcome::InvalidCredentials);
        assert_eq!(CmOutcome::from_exit_code(3), CmOutcome::Negative);
        assert_eq!(CmOutcome::from_exit_code(1), CmOutcome::Failed(1));
    }

    #[test]
    fn failure_messages_carry_hint() {
        let err = check_outcome("Cannot retrieve change status", &[], CommandOutput::failed(1, ""))
            .unwrap_err();
        assert_eq!(err.message, "Cannot retrieve change status: Check log for details");
        let err = check_outcome("Upload failed", &[], CommandOutput::failed(2, "")).unwrap_err();
        assert_eq!(err.message, "Upload failed: Invalid credentials");
    }
}
