//! Upload of a file into a SOLMAN transport request.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::exec::ProcessRunner;
use crate::files::FileSystem;
use crate::utils::validation;

use super::{check_outcome, cmclient_failed, CmConnection, CmOutcome, CMCLIENT};

const CMCLIENT_OPTS: &str = "CMCLIENT_OPTS";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolmanUploadConfig {
    #[serde(alias = "changeManagement/endpoint")]
    pub endpoint: String,
    pub username: String,
    pub password: String,
    #[serde(alias = "changeDocumentID")]
    pub change_document_id: String,
    #[serde(alias = "transportRequestID")]
    pub transport_request_id: String,
    #[serde(alias = "applicationID")]
    pub application_id: String,
    pub file_path: String,
    #[serde(alias = "cmClientOpts", deserialize_with = "crate::config::string_or_list")]
    pub cmclient_opts: Vec<String>,
}

/// Everything a single `upload-file-to-transport` call needs.
#[derive(Debug, Clone, Default)]
pub struct SolmanUploadAction {
    pub connection: CmConnection,
    pub change_document_id: String,
    pub transport_request_id: String,
    pub application_id: String,
    pub file: String,
    pub cm_opts: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolmanUploadReport {
    pub change_document_id: String,
    pub transport_request_id: String,
    pub file: String,
}

impl From<&SolmanUploadConfig> for SolmanUploadAction {
    fn from(config: &SolmanUploadConfig) -> Self {
        Self {
            connection: CmConnection {
                endpoint: config.endpoint.clone(),
                username: config.username.clone(),
                password: config.password.clone(),
            },
            change_document_id: config.change_document_id.clone(),
            transport_request_id: config.transport_request_id.clone(),
            application_id: config.application_id.clone(),
            file: config.file_path.clone(),
            cm_opts: config.cmclient_opts.clone(),
        }
    }
}

impl SolmanUploadAction {
    /// Names of required values that are still empty.
    pub fn missing_fields(&self) -> Vec<String> {
        validation::missing_fields(&[
            ("endpoint", &self.connection.endpoint),
            ("username", &self.connection.username),
            ("password", &self.connection.password),
            ("changeDocumentId", &self.change_document_id),
            ("transportRequestId", &self.transport_request_id),
            ("applicationId", &self.application_id),
            ("filePath", &self.file),
        ])
    }

    fn args(&self) -> Vec<String> {
        let mut args = self.connection.args("upload-file-to-transport");
        args.extend([
            "-cID".to_string(),
            self.change_document_id.clone(),
            "-tID".to_string(),
            self.transport_request_id.clone(),
            self.application_id.clone(),
            self.file.clone(),
        ]);
        args
    }

    pub fn perform(&self, fs: &dyn FileSystem, runner: &mut dyn ProcessRunner) -> Result<()> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(Error::validation_missing_argument(missing));
        }
        if !fs.exists(Path::new(&self.file))? {
            return Err(Error::file_not_found(self.file.clone(), None));
        }

        if !self.cm_opts.is_empty() {
            runner.append_env(&[(CMCLIENT_OPTS.to_string(), self.cm_opts.join(" "))]);
        }

        let args = self.args();
        let output = runner.run(CMCLIENT, &args)?;
        let prefix = format!(
            "Cannot upload file '{}' into transport request '{}'",
            self.file, self.transport_request_id
        );
        if check_outcome(&prefix, &args, output.clone())? != CmOutcome::Success {
            return Err(cmclient_failed(&prefix, &args, output));
        }
        tracing::info!(
            "File '{}' uploaded into transport request '{}' (change document '{}')",
            self.file,
            self.transport_request_id,
            self.change_document_id
        );
        Ok(())
    }
}

pub fn run(
    config: &SolmanUploadConfig,
    fs: &dyn FileSystem,
    runner: &mut dyn ProcessRunner,
) -> Result<SolmanUploadReport> {
    let action = SolmanUploadAction::from(config);
    action.perform(fs, runner)?;
    Ok(SolmanUploadReport {
        change_document_id: action.change_document_id,
        transport_request_id: action.transport_request_id,
        file: action.file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::exec::CommandOutput;
    use crate::testing::{MemoryFiles, RecordingRunner};

    fn config() -> SolmanUploadConfig {
        SolmanUploadConfig {
            endpoint: "https://example.org/cm".into(),
            username: "me".into(),
            password: "secret".into(),
            change_document_id: "123456".into(),
            transport_request_id: "000111".into(),
            application_id: "app".into(),
            file_path: "dist/app.zip".into(),
            cmclient_opts: vec!["-Dmyprop=abc".into()],
        }
    }

    fn files() -> MemoryFiles {
        MemoryFiles::default().with_file("dist/app.zip", "zip")
    }

    #[test]
    fn uploads_with_client_options() {
        let mut runner = RecordingRunner::new();
        let report = run(&config(), &files(), &mut runner).unwrap();
        assert_eq!(report.transport_request_id, "000111");
        assert_eq!(
            runner.lines(),
            vec!["cmclient --endpoint https://example.org/cm --user me --password secret --backend-type SOLMAN upload-file-to-transport -cID 123456 -tID 000111 app dist/app.zip"]
        );
        assert_eq!(runner.env_value("CMCLIENT_OPTS"), Some("-Dmyprop=abc"));
    }

    #[test]
    fn every_missing_field_is_reported() {
        let mut cfg = config();
        cfg.endpoint.clear();
        cfg.application_id.clear();
        let mut runner = RecordingRunner::new();
        let err = run(&cfg, &files(), &mut runner).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
        assert_eq!(err.details["args"], serde_json::json!(["endpoint", "applicationId"]));
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn missing_file_fails_before_upload() {
        let mut runner = RecordingRunner::new();
        let err = run(&config(), &MemoryFiles::default(), &mut runner).unwrap_err();
        assert_eq!(err.code, ErrorCode::FileNotFound);
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn invalid_credentials_from_exit_code() {
        let mut runner = RecordingRunner::new().respond("cmclient", CommandOutput::failed(2, ""));
        let err = run(&config(), &files(), &mut runner).unwrap_err();
        assert_eq!(err.code, ErrorCode::ChangeInvalidCredentials);
    }

    #[test]
    fn negative_answer_is_a_failed_upload() {
        let mut runner = RecordingRunner::new().respond("cmclient", CommandOutput::failed(3, ""));
        let err = run(&config(), &files(), &mut runner).unwrap_err();
        assert_eq!(err.code, ErrorCode::CommandFailed);
    }

    #[test]
    fn other_exit_codes_point_to_log() {
        let mut runner = RecordingRunner::new().respond("cmclient", CommandOutput::failed(1, "boom"));
        let err = run(&config(), &files(), &mut runner).unwrap_err();
        assert_eq!(err.code, ErrorCode::CommandFailed);
        assert!(err.message.ends_with("Check log for details"));
    }
}
