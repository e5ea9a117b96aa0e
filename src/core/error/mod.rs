use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidValue,
    ConfigInvalidYaml,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    FileNotFound,

    ManifestInvalid,
    ManifestUnsupportedType,
    ManifestMultipleBuildpacks,

    SubstitutionMissingValue,
    SubstitutionUnsupportedType,

    DeployMultiAppBlueGreen,
    DeployAppNameRequired,
    DeployAppNameUnresolved,
    DeployArtifactNotFound,

    CommandFailed,
    CommandSpawnFailed,

    ChangeInvalidCredentials,
    ChangeNotInDevelopment,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",
            ErrorCode::ConfigInvalidYaml => "config.invalid_yaml",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::FileNotFound => "file.not_found",

            ErrorCode::ManifestInvalid => "manifest.invalid",
            ErrorCode::ManifestUnsupportedType => "manifest.unsupported_type",
            ErrorCode::ManifestMultipleBuildpacks => "manifest.multiple_buildpacks",

            ErrorCode::SubstitutionMissingValue => "substitution.missing_value",
            ErrorCode::SubstitutionUnsupportedType => "substitution.unsupported_type",

            ErrorCode::DeployMultiAppBlueGreen => "deploy.multi_app_blue_green",
            ErrorCode::DeployAppNameRequired => "deploy.app_name_required",
            ErrorCode::DeployAppNameUnresolved => "deploy.app_name_unresolved",
            ErrorCode::DeployArtifactNotFound => "deploy.artifact_not_found",

            ErrorCode::CommandFailed => "command.failed",
            ErrorCode::CommandSpawnFailed => "command.spawn_failed",

            ErrorCode::ChangeInvalidCredentials => "change.invalid_credentials",
            ErrorCode::ChangeNotInDevelopment => "change.not_in_development",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNotFoundDetails {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsupportedTypeDetails {
    pub value: String,
    pub type_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingReplacementDetails {
    pub parameter: String,
    pub replacements: Value,
}

/// Captured result of a failed external tool invocation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn config_missing_key(key: impl Into<String>, step: Option<String>) -> Self {
        let key = key.into();
        Self::new(
            ErrorCode::ConfigMissingKey,
            format!("Missing required configuration key '{}'", key),
            to_details(ConfigMissingKeyDetails { key, step }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::ConfigInvalidValue,
            problem.clone(),
            to_details(ConfigInvalidValueDetails {
                key: key.into(),
                value,
                problem,
            }),
        )
    }

    pub fn config_invalid_yaml(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigInvalidYaml,
            format!("Cannot parse yaml file '{}': {}", path, err),
            serde_json::json!({ "path": path, "error": err.to_string() }),
        )
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        let message = format!("Missing required argument(s): {}", args.join(", "));
        Self::new(
            ErrorCode::ValidationMissingArgument,
            message,
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::ValidationInvalidArgument,
            problem.clone(),
            to_details(InvalidArgumentDetails {
                field: field.into(),
                problem,
                tried,
            }),
        )
    }

    pub fn file_not_found(path: impl Into<String>, role: Option<&str>) -> Self {
        let path = path.into();
        let message = match role {
            Some(role) => format!("{} '{}' does not exist", role, path),
            None => format!("File '{}' does not exist", path),
        };
        Self::new(
            ErrorCode::FileNotFound,
            message,
            to_details(FileNotFoundDetails {
                path,
                role: role.map(str::to_string),
            }),
        )
    }

    pub fn manifest_invalid(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ManifestInvalid,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn manifest_unsupported_type(value: impl Into<String>, type_name: &str) -> Self {
        let value = value.into();
        Self::new(
            ErrorCode::ManifestUnsupportedType,
            format!("Unsupported node '{}' of type '{}'", value, type_name),
            to_details(UnsupportedTypeDetails {
                value,
                type_name: type_name.to_string(),
            }),
        )
    }

    pub fn manifest_multiple_buildpacks(app_index: usize) -> Self {
        Self::new(
            ErrorCode::ManifestMultipleBuildpacks,
            "More than one Cloud Foundry Buildpack is not supported. Please check your manifest file",
            serde_json::json!({ "application": app_index }),
        )
    }

    pub fn missing_replacement_value(parameter: impl Into<String>, replacements: Value) -> Self {
        let parameter = parameter.into();
        Self::new(
            ErrorCode::SubstitutionMissingValue,
            format!(
                "No value available for parameter '(({}))' in replacements: {}",
                parameter, replacements
            ),
            to_details(MissingReplacementDetails {
                parameter,
                replacements,
            }),
        )
    }

    pub fn unsupported_replacement_type(
        parameter: impl Into<String>,
        value: impl Into<String>,
        type_name: &str,
    ) -> Self {
        let parameter = parameter.into();
        let value = value.into();
        Self::new(
            ErrorCode::SubstitutionUnsupportedType,
            format!(
                "Cannot embed value '{}' of type '{}' for parameter '(({}))' into a string",
                value, type_name, parameter
            ),
            serde_json::json!({
                "parameter": parameter,
                "value": value,
                "typeName": type_name,
            }),
        )
    }

    pub fn deploy_multi_app_blue_green(manifest: impl Into<String>, app_count: usize) -> Self {
        Self::new(
            ErrorCode::DeployMultiAppBlueGreen,
            "Your manifest contains more than one application. For blue green deployments your manifest file may contain only one application",
            serde_json::json!({ "manifest": manifest.into(), "applications": app_count }),
        )
    }

    pub fn deploy_app_name_required() -> Self {
        Self::new(
            ErrorCode::DeployAppNameRequired,
            "Blue-green plugin requires app name to be passed (see https://github.com/bluemixgaragelondon/cf-blue-green-deploy/issues/27)",
            Value::Object(serde_json::Map::new()),
        )
        .with_hint("Pass the application name with --appName")
    }

    pub fn deploy_app_name_unresolved(message: impl Into<String>, manifest: &str) -> Self {
        Self::new(
            ErrorCode::DeployAppNameUnresolved,
            message,
            serde_json::json!({ "manifest": manifest }),
        )
    }

    pub fn deploy_artifact_not_found(message: impl Into<String>, tried: Vec<String>) -> Self {
        Self::new(
            ErrorCode::DeployArtifactNotFound,
            message,
            serde_json::json!({ "tried": tried }),
        )
    }

    pub fn command_failed(message: impl Into<String>, details: CommandFailedDetails) -> Self {
        Self::new(ErrorCode::CommandFailed, message, to_details(details))
    }

    pub fn command_spawn_failed(command: impl Into<String>, error: impl std::fmt::Display) -> Self {
        let command = command.into();
        Self::new(
            ErrorCode::CommandSpawnFailed,
            format!("Failed to run '{}': {}", command, error),
            serde_json::json!({ "command": command, "error": error.to_string() }),
        )
    }

    pub fn change_invalid_credentials(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ChangeInvalidCredentials,
            message,
            Value::Object(serde_json::Map::new()),
        )
        .with_hint("Check username and password of the change management backend")
    }

    pub fn change_not_in_development(change_id: impl Into<String>) -> Self {
        let change_id = change_id.into();
        Self::new(
            ErrorCode::ChangeNotInDevelopment,
            format!("Change '{}' is not in status 'in development'", change_id),
            serde_json::json!({ "changeDocumentId": change_id }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let error = error.into();
        let message = match &context {
            Some(context) => format!("{}: {}", context, error),
            None => error.clone(),
        };
        Self::new(
            ErrorCode::InternalIoError,
            message,
            to_details(InternalIoErrorDetails { error, context }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalJsonError,
            format!("JSON error: {}", error),
            serde_json::json!({ "error": error, "context": context }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalUnexpected,
            error.clone(),
            serde_json::json!({ "error": error }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_message() {
        let err = Error::file_not_found("manifest.yml", Some("Manifest file"));
        assert_eq!(err.to_string(), "Manifest file 'manifest.yml' does not exist");
        assert_eq!(err.code.as_str(), "file.not_found");
    }

    #[test]
    fn missing_argument_lists_all_names() {
        let err = Error::validation_missing_argument(vec![
            "endpoint".to_string(),
            "username".to_string(),
        ]);
        assert!(err.message.contains("endpoint, username"));
        assert_eq!(err.details["args"][1], "username");
    }

    #[test]
    fn with_hint_appends() {
        let err = Error::internal_unexpected("boom")
            .with_hint("first")
            .with_hint("second");
        assert_eq!(err.hints.len(), 2);
        assert_eq!(err.hints[1].message, "second");
    }

    #[test]
    fn missing_replacement_names_parameter() {
        let err = Error::missing_replacement_value("count", serde_json::json!({"other": 1}));
        assert_eq!(err.code, ErrorCode::SubstitutionMissingValue);
        assert!(err.message.contains("((count))"));
        assert!(err.message.contains("other"));
    }
}
