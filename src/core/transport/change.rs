//! Change document status check (`cmclient is-change-in-development`).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::exec::ProcessRunner;
use crate::utils::validation;

use super::{check_outcome, CmConnection, CmOutcome, CMCLIENT};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckChangeConfig {
    #[serde(alias = "changeManagement/endpoint")]
    pub endpoint: String,
    pub username: String,
    pub password: String,
    #[serde(alias = "changeDocumentID")]
    pub change_document_id: String,
    pub fail_if_status_is_not_in_development: bool,
}

impl Default for CheckChangeConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            username: String::new(),
            password: String::new(),
            change_document_id: String::new(),
            fail_if_status_is_not_in_development: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatus {
    pub change_document_id: String,
    pub in_development: bool,
}

/// Asks the backend whether the change is in development.
pub fn is_in_development(config: &CheckChangeConfig, runner: &mut dyn ProcessRunner) -> Result<bool> {
    let connection = CmConnection {
        endpoint: config.endpoint.clone(),
        username: config.username.clone(),
        password: config.password.clone(),
    };
    let mut args = connection.args("is-change-in-development");
    args.extend([
        "--change-id".to_string(),
        config.change_document_id.clone(),
        "--return-code".to_string(),
    ]);

    let output = runner.run(CMCLIENT, &args)?;
    match check_outcome("Cannot retrieve change status", &args, output)? {
        CmOutcome::Success => Ok(true),
        _ => Ok(false),
    }
}

pub fn run(config: &CheckChangeConfig, runner: &mut dyn ProcessRunner) -> Result<ChangeStatus> {
    validation::require_fields(&[
        ("username", &config.username),
        ("password", &config.password),
        ("changeDocumentId", &config.change_document_id),
    ])?;
    tracing::info!(
        "FailIfStatusIsNotInDevelopment: {}",
        config.fail_if_status_is_not_in_development
    );

    let in_development = is_in_development(config, runner)?;
    if in_development {
        tracing::info!(
            "Change '{}' is in status 'in development'.",
            config.change_document_id
        );
    } else if config.fail_if_status_is_not_in_development {
        return Err(Error::change_not_in_development(&config.change_document_id));
    } else {
        tracing::warn!(
            "Change '{}' is not in status 'in development'. Failing the step has been explicitly disabled.",
            config.change_document_id
        );
    }

    Ok(ChangeStatus {
        change_document_id: config.change_document_id.clone(),
        in_development,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::exec::CommandOutput;
    use crate::testing::RecordingRunner;

    fn config() -> CheckChangeConfig {
        CheckChangeConfig {
            endpoint: "https://example.org/cm".into(),
            username: "me".into(),
            password: "secret".into(),
            change_document_id: "12345678".into(),
            ..Default::default()
        }
    }

    fn answering(code: i32) -> RecordingRunner {
        let output = if code == 0 {
            CommandOutput::ok("")
        } else {
            CommandOutput::failed(code, "")
        };
        RecordingRunner::new().respond("cmclient", output)
    }

    #[test]
    fn change_in_development() {
        let mut runner = answering(0);
        let status = run(&config(), &mut runner).unwrap();
        assert!(status.in_development);
        assert_eq!(
            runner.lines(),
            vec!["cmclient --endpoint https://example.org/cm --user me --password secret --backend-type SOLMAN is-change-in-development --change-id 12345678 --return-code"]
        );
    }

    #[test]
    fn change_not_in_development_fails_by_default() {
        let err = run(&config(), &mut answering(3)).unwrap_err();
        assert_eq!(err.code, ErrorCode::ChangeNotInDevelopment);
        assert_eq!(err.message, "Change '12345678' is not in status 'in development'");
    }

    #[test]
    fn change_not_in_development_only_warns_when_disabled() {
        let mut cfg = config();
        cfg.fail_if_status_is_not_in_development = false;
        let status = run(&cfg, &mut answering(3)).unwrap();
        assert!(!status.in_development);
    }

    #[test]
    fn invalid_credentials() {
        let err = run(&config(), &mut answering(2)).unwrap_err();
        assert_eq!(err.code, ErrorCode::ChangeInvalidCredentials);
        assert_eq!(err.message, "Cannot retrieve change status: Invalid credentials");
    }

    #[test]
    fn unexpected_exit_code() {
        let err = run(&config(), &mut answering(1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::CommandFailed);
        assert_eq!(err.message, "Cannot retrieve change status: Check log for details");
    }

    #[test]
    fn missing_credentials_are_listed() {
        let mut cfg = config();
        cfg.password.clear();
        cfg.change_document_id.clear();
        let mut runner = RecordingRunner::new();
        let err = run(&cfg, &mut runner).unwrap_err();
        assert_eq!(err.details["args"], serde_json::json!(["password", "changeDocumentId"]));
        assert!(runner.calls.is_empty());
    }
}
