//! XS advanced deployments through the `xs` CLI.
//!
//! The `xs` session lives in `$HOME`. It is copied into the workspace after
//! login so a later run (resume or abort of a blue-green deployment) can
//! reuse it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CommandFailedDetails, Error, Result};
use crate::exec::{CommandOutput, ProcessRunner};
use crate::files::FileSystem;
use crate::utils::{shell, validation};

const BASH: &str = "/bin/bash";
pub const DEFAULT_SESSION_FILE: &str = ".xsconfig";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mode {
    NoDeploy,
    #[default]
    Deploy,
    BgDeploy,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::NoDeploy => "NoDeploy",
            Mode::Deploy => "Deploy",
            Mode::BgDeploy => "BGDeploy",
        }
    }

    fn command(&self) -> &'static str {
        match self {
            Mode::BgDeploy => "bg-deploy",
            Mode::Deploy | Mode::NoDeploy => "deploy",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "NoDeploy" => Ok(Mode::NoDeploy),
            "Deploy" => Ok(Mode::Deploy),
            "BGDeploy" => Ok(Mode::BgDeploy),
            other => Err(Error::config_invalid_value(
                "mode",
                Some(other.to_string()),
                format!("Unknown DeployMode: '{}'", other),
            )),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Mode> for String {
    fn from(value: Mode) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    #[default]
    None,
    Resume,
    Abort,
    Retry,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::None => "None",
            Action::Resume => "Resume",
            Action::Abort => "Abort",
            Action::Retry => "Retry",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "None" => Ok(Action::None),
            "Resume" => Ok(Action::Resume),
            "Abort" => Ok(Action::Abort),
            "Retry" => Ok(Action::Retry),
            other => Err(Error::config_invalid_value(
                "action",
                Some(other.to_string()),
                format!("Unknown Action: '{}'", other),
            )),
        }
    }
}

impl TryFrom<String> for Action {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Action> for String {
    fn from(value: Action) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XsDeployConfig {
    pub mode: Mode,
    pub action: Action,
    pub api_url: String,
    #[serde(alias = "username")]
    pub user: String,
    pub password: String,
    pub org: String,
    pub space: String,
    pub login_opts: String,
    pub deploy_opts: String,
    pub mta_path: String,
    pub xs_session_file: String,
    #[serde(alias = "deploymentID")]
    pub deployment_id: String,
}

impl Default for XsDeployConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Deploy,
            action: Action::None,
            api_url: String::new(),
            user: String::new(),
            password: String::new(),
            org: String::new(),
            space: String::new(),
            login_opts: String::new(),
            deploy_opts: String::new(),
            mta_path: String::new(),
            xs_session_file: DEFAULT_SESSION_FILE.to_string(),
            deployment_id: String::new(),
        }
    }
}

impl XsDeployConfig {
    fn session_file(&self) -> &str {
        if self.xs_session_file.is_empty() {
            DEFAULT_SESSION_FILE
        } else {
            &self.xs_session_file
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XsDeployReport {
    pub mode: Mode,
    pub action: Action,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
}

/// Which of login and logout a mode/action combination needs. A fresh
/// blue-green deployment keeps its session for the later resume or abort.
pub fn session_steps(mode: Mode, action: Action) -> (bool, bool) {
    let login = mode == Mode::Deploy
        || (mode == Mode::BgDeploy && !matches!(action, Action::Resume | Action::Abort));
    let logout = mode == Mode::Deploy || (mode == Mode::BgDeploy && action != Action::None);
    (login, logout)
}

struct Session<'a> {
    runner: &'a mut dyn ProcessRunner,
    fs: &'a dyn FileSystem,
    workspace_file: PathBuf,
    home_file: PathBuf,
}

pub fn run(
    config: &XsDeployConfig,
    runner: &mut dyn ProcessRunner,
    fs: &dyn FileSystem,
    home: &Path,
) -> Result<XsDeployReport> {
    let mut report = XsDeployReport {
        mode: config.mode,
        action: config.action,
        ..Default::default()
    };

    if config.mode == Mode::NoDeploy {
        tracing::info!("Deployment skipped intentionally. Deploy mode '{}'", config.mode);
        report.skipped = true;
        return Ok(report);
    }

    if config.mode == Mode::Deploy && config.action != Action::None {
        return Err(Error::config_invalid_value(
            "action",
            Some(config.action.to_string()),
            format!(
                "Cannot perform action '{}' in mode '{}'. Only action '{}' is allowed.",
                config.action,
                config.mode,
                Action::None
            ),
        ));
    }

    if config.action == Action::None && !fs.exists(Path::new(&config.mta_path))? {
        return Err(Error::file_not_found(config.mta_path.clone(), Some("Deployable")));
    }

    let (perform_login, perform_logout) = session_steps(config.mode, config.action);
    tracing::debug!(mode = %config.mode, action = %config.action, perform_login, perform_logout, "xs deploy");

    let session_file = config.session_file();
    let mut session = Session {
        runner,
        fs,
        workspace_file: PathBuf::from(session_file),
        home_file: home.join(session_file),
    };

    if perform_login {
        session.login(config)?;
    }

    let mut result = match config.action {
        Action::None => session.deploy(config),
        action => session.complete(config, action).map(|_| None),
    };

    if perform_logout {
        if let Err(err) = session.logout() {
            tracing::error!(error = %err, "Cannot perform xs logout");
            if result.is_ok() {
                result = Err(err);
            }
        }
    }

    report.deployment_id = result?;
    Ok(report)
}

impl Session<'_> {
    fn script(&mut self, body: String, what: &str) -> Result<CommandOutput> {
        let output = self
            .runner
            .run_shell(BASH, &format!("#!/bin/bash\n{}\n", body))?;
        if output.success {
            return Ok(output);
        }
        Err(Error::command_failed(
            format!("Cannot perform {}", what),
            CommandFailedDetails {
                command: what.to_string(),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            },
        ))
    }

    fn login(&mut self, config: &XsDeployConfig) -> Result<()> {
        validation::require_fields(&[
            ("apiUrl", &config.api_url),
            ("user", &config.user),
            ("password", &config.password),
            ("org", &config.org),
            ("space", &config.space),
        ])?;
        tracing::debug!(
            "Performing xs login. api-url: '{}', org: '{}', space: '{}'",
            config.api_url,
            config.org,
            config.space
        );

        let body = format!(
            "xs login -a {} -u {} -p '{}' -o {} -s {} {}",
            config.api_url,
            config.user,
            shell::escape_single_quote_content(&config.password),
            config.org,
            config.space,
            config.login_opts
        );
        self.script(body.trim_end().to_string(), "xs login")?;

        if !self.fs.exists(&self.home_file)? {
            return Err(Error::file_not_found(
                self.home_file.display().to_string(),
                Some("xs session file"),
            ));
        }
        self.fs.copy(&self.home_file, &self.workspace_file)?;
        tracing::info!(
            "xs login has been performed. api-url: '{}', org: '{}', space: '{}'",
            config.api_url,
            config.org,
            config.space
        );
        Ok(())
    }

    fn restore_session(&mut self) -> Result<()> {
        if !self.fs.exists(&self.workspace_file)? {
            return Err(Error::file_not_found(
                self.workspace_file.display().to_string(),
                Some("xs session file"),
            ));
        }
        self.fs.copy(&self.workspace_file, &self.home_file)?;
        Ok(())
    }

    fn deploy(&mut self, config: &XsDeployConfig) -> Result<Option<String>> {
        let command = config.mode.command();
        tracing::debug!("Performing xs {}.", command);
        self.restore_session()?;

        let body = format!("xs {} {} {}", command, config.mta_path, config.deploy_opts);
        let output = self.script(body.trim_end().to_string(), &format!("xs {}", command))?;
        tracing::info!("... xs {} performed.", command);

        if config.mode != Mode::BgDeploy {
            return Ok(None);
        }
        let id = deployment_id(&output.stdout);
        match &id {
            Some(id) => tracing::info!(deployment_id = %id, "blue-green deployment started"),
            None => tracing::warn!("No deployment id found in xs bg-deploy output"),
        }
        Ok(id)
    }

    fn complete(&mut self, config: &XsDeployConfig, action: Action) -> Result<()> {
        tracing::debug!("Performing xs {}.", action);
        let id = validation::require_non_empty(
            &config.deployment_id,
            "deploymentId",
            "deploymentID was not provided",
        )?;
        self.restore_session()?;
        let body = format!(
            "xs bg-deploy -i {} -a {}",
            id,
            action.as_str().to_lowercase()
        );
        self.script(body, &format!("xs bg-deploy {}", action))?;
        tracing::info!("xs bg-deploy {} performed for deployment '{}'", action, id);
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        tracing::debug!("Performing xs logout.");
        self.restore_session()?;
        self.script("xs logout".to_string(), "xs logout")?;
        self.fs.remove(&self.workspace_file)?;
        tracing::debug!(
            "xs session file '{}' has been deleted",
            self.workspace_file.display()
        );
        tracing::info!("xs logout has been performed");
        Ok(())
    }
}

/// Extracts `<id>` from the `xs bg-deploy -i <id> -a resume` hint printed by
/// `xs bg-deploy`.
pub fn deployment_id(output: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"xs bg-deploy -i (\S+) -a resume").expect("Invalid regex pattern")
    });
    pattern
        .captures(output)
        .map(|caps| caps[1].to_string())
}
