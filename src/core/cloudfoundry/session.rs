//! Login, deploy and logout against a Cloud Foundry endpoint.

use std::path::Path;

use crate::error::{CommandFailedDetails, Error, Result};
use crate::exec::{run_checked, ProcessRunner};
use crate::files::FileSystem;
use crate::strategy::DeployType;

use super::trace;

pub const CF: &str = "cf";
pub const TRACE_FILE: &str = "cf.log";

#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    pub endpoint: String,
    pub org: String,
    pub space: String,
    pub username: String,
    pub password: String,
}

impl LoginOptions {
    fn args(&self) -> Vec<String> {
        [
            "login",
            "-a",
            self.endpoint.as_str(),
            "-o",
            self.org.as_str(),
            "-s",
            self.space.as_str(),
            "-u",
            self.username.as_str(),
            "-p",
            self.password.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

/// Action run after a successful deploy, inside the login bracket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostDeploy {
    /// Stop `<app>-old` left behind by a blue-green deploy.
    StopOldApp { app_name: String },
}

/// Everything one deployment attempt runs, built before anything executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    pub env: Vec<(String, String)>,
    /// `cf api ...` issued before login, failure is only logged.
    pub api: Option<Vec<String>>,
    pub deploy: Vec<String>,
    pub post_deploy: Option<PostDeploy>,
    pub deploy_type: DeployType,
}

pub fn login(runner: &mut dyn ProcessRunner, options: &LoginOptions) -> Result<()> {
    let output = runner.run(CF, &options.args())?;
    if output.success {
        tracing::info!(endpoint = %options.endpoint, org = %options.org, space = %options.space, "logged in");
        return Ok(());
    }
    Err(Error::command_failed(
        format!("Unable to login to '{}'", options.endpoint),
        CommandFailedDetails {
            command: "cf login".to_string(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        },
    ))
}

pub fn logout(runner: &mut dyn ProcessRunner) -> Result<()> {
    run_checked(runner, CF, &["logout".to_string()]).map(|_| ())
}

/// Runs `plan`: optional `cf api`, login, plugin probe, deploy, post-deploy
/// action, logout.
///
/// Login failure returns immediately. Once logged in, logout always runs and
/// the first error wins. The `cf` trace is dumped on failure or when
/// `verbose` is set.
pub fn execute(
    plan: &DeployPlan,
    login_options: &LoginOptions,
    runner: &mut dyn ProcessRunner,
    fs: &dyn FileSystem,
    verbose: bool,
) -> Result<()> {
    let mut env = plan.env.clone();
    env.push(("CF_TRACE".to_string(), TRACE_FILE.to_string()));
    runner.append_env(&env);

    if let Some(api) = &plan.api {
        if let Err(err) = run_checked(runner, CF, api) {
            tracing::error!(error = %err, "Command 'cf {}' failed.", api.join(" "));
        }
    }

    let mut result = login(runner, login_options);
    if result.is_ok() {
        result = deploy_logged_in(plan, runner);

        if let Err(logout_err) = logout(runner) {
            tracing::error!(error = %logout_err, "Cannot perform cf logout");
            if result.is_ok() {
                result = Err(logout_err);
            }
        }
    }

    if result.is_err() || verbose {
        if let Err(err) = trace::dump(Path::new(TRACE_FILE), fs) {
            tracing::error!(error = %err, "Error reading cf log file '{}'.", TRACE_FILE);
        }
    }

    result
}

fn deploy_logged_in(plan: &DeployPlan, runner: &mut dyn ProcessRunner) -> Result<()> {
    if let Err(err) = run_checked(runner, CF, &["plugins".to_string()]) {
        tracing::error!(error = %err, "Command 'cf plugins' failed.");
    }

    if let Err(err) = run_checked(runner, CF, &plan.deploy) {
        tracing::error!(error = %err, "Command 'cf {}' failed.", plan.deploy.join(" "));
        return Err(err);
    }

    match &plan.post_deploy {
        Some(PostDeploy::StopOldApp { app_name }) => stop_old_app(runner, app_name),
        None => Ok(()),
    }
}

fn stop_old_app(runner: &mut dyn ProcessRunner, app_name: &str) -> Result<()> {
    let old_app = format!("{}-old", app_name);
    let output = runner.run(CF, &["stop".to_string(), old_app.clone()])?;
    if output.success {
        tracing::info!("Old application '{}' has been stopped.", old_app);
        return Ok(());
    }

    let log = format!("{}{}", output.stdout, output.stderr);
    if log.contains(&format!("{} not found", old_app)) {
        tracing::info!("Cannot stop application '{}': {}", old_app, log.trim());
        return Ok(());
    }
    Err(Error::command_failed(
        format!("Could not stop application {}. Error: {}", old_app, log.trim()),
        CommandFailedDetails {
            command: format!("cf stop {}", old_app),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        },
    ))
}
