//! Upload of a UI5 application into an ABAP transport request with
//! `fiori deploy`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CommandFailedDetails, Error, Result};
use crate::exec::{display_command, ProcessRunner};
use crate::files::FileSystem;
use crate::utils::shell;

use super::labels;

const FIORI: &str = "fiori";
const BASH: &str = "/bin/bash";
const ABAP_USER: &str = "ABAP_USER";
const ABAP_PASSWORD: &str = "ABAP_PASSWORD";
pub const DEFAULT_CONFIG_FILE: &str = "ui5-deploy.yaml";
pub const DEFAULT_DESCRIPTION: &str = "Deployed with SAP Fiori tools";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CtsUploadConfig {
    pub endpoint: String,
    pub client: String,
    pub username: String,
    pub password: String,
    pub application_name: String,
    pub abap_package: String,
    pub description: String,
    pub deploy_config_file: String,
    #[serde(alias = "transportRequestID")]
    pub transport_request_id: String,
    #[serde(deserialize_with = "crate::config::string_or_list")]
    pub deploy_tool_dependencies: Vec<String>,
    #[serde(deserialize_with = "crate::config::string_or_list")]
    pub npm_install_opts: Vec<String>,
    pub os_deploy_user: String,
    pub git_from: String,
    pub git_to: String,
    pub git_transport_request_label: String,
}

impl Default for CtsUploadConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            client: String::new(),
            username: String::new(),
            password: String::new(),
            application_name: String::new(),
            abap_package: String::new(),
            description: String::new(),
            deploy_config_file: DEFAULT_CONFIG_FILE.to_string(),
            transport_request_id: String::new(),
            deploy_tool_dependencies: Vec::new(),
            npm_install_opts: Vec::new(),
            os_deploy_user: String::new(),
            git_from: "origin/master".to_string(),
            git_to: "HEAD".to_string(),
            git_transport_request_label: "TransportRequest".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CtsConnection {
    pub endpoint: String,
    pub client: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct CtsApplication {
    pub name: String,
    pub package: String,
    pub description: String,
}

/// Global npm packages installed before the upload.
#[derive(Debug, Clone, Default)]
pub struct NodeSetup {
    pub dependencies: Vec<String>,
    pub install_opts: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CtsUploadAction {
    pub connection: CtsConnection,
    pub application: CtsApplication,
    pub node: NodeSetup,
    pub transport_request_id: String,
    pub config_file: String,
    pub deploy_user: String,
}

/// How `fiori deploy` finds its deploy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigFileUse {
    /// `-c <file>`
    Explicit(String),
    /// The tool picks up `ui5-deploy.yaml` on its own.
    Default,
    /// `--noConfig`, all values come from flags.
    NoConfig,
}

pub fn resolve_config_file(configured: &str, fs: &dyn FileSystem) -> Result<ConfigFileUse> {
    if configured.is_empty() {
        return Ok(if fs.exists(Path::new(DEFAULT_CONFIG_FILE))? {
            ConfigFileUse::Default
        } else {
            ConfigFileUse::NoConfig
        });
    }
    if fs.exists(Path::new(configured))? {
        return Ok(ConfigFileUse::Explicit(configured.to_string()));
    }
    if configured == DEFAULT_CONFIG_FILE {
        // Default value from configuration rather than a deliberate choice.
        return Ok(ConfigFileUse::NoConfig);
    }
    Err(Error::file_not_found(
        configured.to_string(),
        Some("Configured deploy config file"),
    ))
}

impl CtsUploadAction {
    /// `fiori deploy` arguments. Credentials are passed by env variable name.
    pub fn deploy_args(&self, config_file: &ConfigFileUse) -> Vec<String> {
        let description = if self.application.description.is_empty() {
            DEFAULT_DESCRIPTION
        } else {
            &self.application.description
        };
        let mut args: Vec<String> = [
            "deploy",
            "-f",
            "-y",
            "--username",
            ABAP_USER,
            "--password",
            ABAP_PASSWORD,
            "-e",
            description,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        match config_file {
            ConfigFileUse::NoConfig => args.push("--noConfig".to_string()),
            ConfigFileUse::Explicit(file) => {
                args.push("-c".to_string());
                args.push(file.clone());
            }
            ConfigFileUse::Default => {}
        }

        let optional = [
            ("-u", &self.connection.endpoint),
            ("-l", &self.connection.client),
            ("-t", &self.transport_request_id),
            ("-p", &self.application.package),
            ("-n", &self.application.name),
        ];
        for (flag, value) in optional {
            if !value.is_empty() {
                args.push(flag.to_string());
                args.push(value.clone());
            }
        }
        args
    }

    /// Bash script installing the deploy tooling before running `fiori`.
    pub fn install_script(&self, deploy_args: &[String]) -> String {
        let mut npm = vec!["npm".to_string(), "install".to_string(), "--global".to_string()];
        npm.extend(self.node.install_opts.iter().cloned());
        npm.extend(self.node.dependencies.iter().cloned());

        let mut fiori = vec![FIORI.to_string()];
        fiori.extend(deploy_args.iter().cloned());
        let fiori = shell::quote_args(&fiori);
        let deploy = if self.deploy_user.is_empty() {
            fiori
        } else {
            format!("su {} -c {}", shell::quote_arg(&self.deploy_user), shell::quote_path(&fiori))
        };

        [
            "set -e".to_string(),
            "echo \"Current user is '$(whoami)'\"".to_string(),
            shell::quote_args(&npm),
            deploy,
        ]
        .join("\n")
            + "\n"
    }

    pub fn perform(&self, fs: &dyn FileSystem, runner: &mut dyn ProcessRunner) -> Result<()> {
        runner.append_env(&[
            (ABAP_USER.to_string(), self.connection.user.clone()),
            (ABAP_PASSWORD.to_string(), self.connection.password.clone()),
        ]);

        let config_file = resolve_config_file(&self.config_file, fs)?;
        let args = self.deploy_args(&config_file);

        let output = if self.node.dependencies.is_empty() {
            tracing::info!(
                "No deploy dependencies provided. Skipping npm install call. Assuming the current image already contains the tooling for the deployment."
            );
            runner.run(FIORI, &args)?
        } else {
            runner.run_shell(BASH, &self.install_script(&args))?
        };

        if !output.success {
            return Err(Error::command_failed(
                format!(
                    "Upload into transport request '{}' failed with exit code {}",
                    self.transport_request_id, output.exit_code
                ),
                CommandFailedDetails {
                    command: display_command(FIORI, &args),
                    exit_code: output.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                },
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CtsUploadReport {
    pub transport_request_id: String,
    pub from_commit_history: bool,
}

pub fn run(
    config: &CtsUploadConfig,
    fs: &dyn FileSystem,
    runner: &mut dyn ProcessRunner,
) -> Result<CtsUploadReport> {
    let from_commit_history = config.transport_request_id.is_empty();
    let transport_request_id = if from_commit_history {
        let range = format!("{}..{}", config.git_from, config.git_to);
        tracing::info!(
            "transportRequestId not provided by configuration. Traversing commit history, range: '{}'",
            range
        );
        let id = labels::find_id_in_range(
            runner,
            &config.git_transport_request_label,
            &config.git_from,
            &config.git_to,
        )
        .map_err(|e| {
            Error::config_missing_key("transportRequestId", Some("transportRequestUploadCTS".to_string()))
                .with_hint(format!(
                    "Unable to retrieve 'transportRequestId' from commit history (range: '{}'): {}",
                    range, e.message
                ))
        })?;
        tracing::info!(
            "Transport request ID '{}' retrieved from commit history (range: '{}')",
            id,
            range
        );
        id
    } else {
        tracing::info!(
            "Transport request ID '{}' explicitly provided by configuration",
            config.transport_request_id
        );
        config.transport_request_id.clone()
    };

    let action = CtsUploadAction {
        connection: CtsConnection {
            endpoint: config.endpoint.clone(),
            client: config.client.clone(),
            user: config.username.clone(),
            password: config.password.clone(),
        },
        application: CtsApplication {
            name: config.application_name.clone(),
            package: config.abap_package.clone(),
            description: config.description.clone(),
        },
        node: NodeSetup {
            dependencies: config.deploy_tool_dependencies.clone(),
            install_opts: config.npm_install_opts.clone(),
        },
        transport_request_id,
        config_file: config.deploy_config_file.clone(),
        deploy_user: config.os_deploy_user.clone(),
    };
    action.perform(fs, runner)?;

    Ok(CtsUploadReport {
        transport_request_id: action.transport_request_id,
        from_commit_history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::exec::CommandOutput;
    use crate::testing::{Invocation, MemoryFiles, RecordingRunner};

    fn config() -> CtsUploadConfig {
        CtsUploadConfig {
            endpoint: "https://abap.example.org".into(),
            client: "001".into(),
            username: "me".into(),
            password: "secret".into(),
            application_name: "myApp".into(),
            abap_package: "ZPKG".into(),
            transport_request_id: "12345678".into(),
            ..Default::default()
        }
    }

    #[test]
    fn upload_without_config_file() {
        let mut runner = RecordingRunner::new();
        run(&config(), &MemoryFiles::default(), &mut runner).unwrap();
        assert_eq!(
            runner.calls,
            vec![Invocation::Exec {
                program: "fiori".into(),
                args: [
                    "deploy", "-f", "-y", "--username", "ABAP_USER", "--password",
                    "ABAP_PASSWORD", "-e", "Deployed with SAP Fiori tools", "--noConfig",
                    "-u", "https://abap.example.org", "-l", "001", "-t", "12345678",
                    "-p", "ZPKG", "-n", "myApp",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            }]
        );
        assert_eq!(runner.env_value("ABAP_USER"), Some("me"));
        assert_eq!(runner.env_value("ABAP_PASSWORD"), Some("secret"));
    }

    #[test]
    fn config_file_resolution() {
        let with_default = MemoryFiles::default().with_file("ui5-deploy.yaml", "");
        let with_custom = MemoryFiles::default().with_file("my-deploy.yaml", "");
        let empty = MemoryFiles::default();

        assert_eq!(resolve_config_file("", &with_default).unwrap(), ConfigFileUse::Default);
        assert_eq!(resolve_config_file("", &empty).unwrap(), ConfigFileUse::NoConfig);
        assert_eq!(
            resolve_config_file("my-deploy.yaml", &with_custom).unwrap(),
            ConfigFileUse::Explicit("my-deploy.yaml".into())
        );
        assert_eq!(
            resolve_config_file("ui5-deploy.yaml", &with_default).unwrap(),
            ConfigFileUse::Explicit("ui5-deploy.yaml".into())
        );
        assert_eq!(
            resolve_config_file("ui5-deploy.yaml", &empty).unwrap(),
            ConfigFileUse::NoConfig
        );
        let err = resolve_config_file("my-deploy.yaml", &empty).unwrap_err();
        assert_eq!(err.code, ErrorCode::FileNotFound);
        assert_eq!(
            err.message,
            "Configured deploy config file 'my-deploy.yaml' does not exist"
        );
    }

    #[test]
    fn dependencies_installed_in_script() {
        let mut cfg = config();
        cfg.deploy_tool_dependencies = vec!["@ui5/cli".into(), "@sap/ux-ui5-tooling".into()];
        cfg.npm_install_opts = vec!["--registry".into(), "https://registry.example.org".into()];
        cfg.os_deploy_user = "node".into();
        cfg.description = "Release 1".into();
        let mut runner = RecordingRunner::new();
        run(&cfg, &MemoryFiles::default(), &mut runner).unwrap();

        let script = runner.lines().remove(0);
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], "set -e");
        assert_eq!(
            lines[2],
            "npm install --global --registry https://registry.example.org @ui5/cli @sap/ux-ui5-tooling"
        );
        assert!(lines[3].starts_with("su node -c 'fiori deploy -f -y"));
        assert!(lines[3].contains("-e '\\''Release 1'\\''"));
    }

    #[test]
    fn transport_request_from_commit_history() {
        let mut cfg = config();
        cfg.transport_request_id.clear();
        let log = "a1\u{1f}Change\n\nTransportRequest: 87654321\n\u{1e}";
        let mut runner = RecordingRunner::new().respond("git log", CommandOutput::ok(log));
        let report = run(&cfg, &MemoryFiles::default(), &mut runner).unwrap();
        assert_eq!(report.transport_request_id, "87654321");
        assert!(report.from_commit_history);
        assert!(runner.lines()[1].contains("-t 87654321"));
    }

    #[test]
    fn missing_transport_request_in_history() {
        let mut cfg = config();
        cfg.transport_request_id.clear();
        let mut runner = RecordingRunner::new();
        let err = run(&cfg, &MemoryFiles::default(), &mut runner).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigMissingKey);
        assert_eq!(runner.calls.len(), 1);
    }

    #[test]
    fn failed_upload_is_reported() {
        let mut runner = RecordingRunner::new().fail_on("fiori");
        let err = run(&config(), &MemoryFiles::default(), &mut runner).unwrap_err();
        assert_eq!(err.code, ErrorCode::CommandFailed);
        assert_eq!(
            err.message,
            "Upload into transport request '12345678' failed with exit code 1"
        );
    }
}
