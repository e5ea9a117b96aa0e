//! Cloud Foundry deployments through the `cf` CLI.
//!
//! `cf_native` pushes applications (standard push or the blue-green plugin),
//! `mtaDeployPlugin` deploys multi-target archives. Both run inside the same
//! login/logout bracket, see [`session::execute`].

pub mod mta;
pub mod native;
pub mod session;
pub mod trace;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::exec::ProcessRunner;
use crate::files::FileSystem;
use crate::strategy::DeployType;
use crate::utils::validation;

pub use session::{DeployPlan, LoginOptions, PostDeploy};

pub const TOOL_CF_NATIVE: &str = "cf_native";
pub const TOOL_MTA_DEPLOY_PLUGIN: &str = "mtaDeployPlugin";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudFoundryDeployConfig {
    pub deploy_tool: String,
    pub deploy_type: DeployType,
    #[serde(alias = "cfApiEndpoint")]
    pub api_endpoint: String,
    #[serde(alias = "cfOrg")]
    pub org: String,
    #[serde(alias = "cfSpace")]
    pub space: String,
    pub username: String,
    pub password: String,
    #[serde(alias = "cfAppName")]
    pub app_name: String,
    #[serde(alias = "cfManifest")]
    pub manifest: String,
    #[serde(alias = "cfManifestVariables", deserialize_with = "crate::config::string_or_list")]
    pub manifest_variables: Vec<String>,
    #[serde(
        alias = "cfManifestVariablesFiles",
        deserialize_with = "crate::config::string_or_list"
    )]
    pub manifest_variables_files: Vec<String>,
    pub deploy_docker_image: String,
    pub docker_username: String,
    pub docker_password: String,
    pub smoke_test_script: String,
    pub smoke_test_status_code: String,
    pub keep_old_instance: bool,
    pub cf_native_deploy_parameters: String,
    pub mtar_path: String,
    pub mta_deploy_parameters: String,
    pub mta_extension_descriptor: String,
    pub api_parameters: String,
}

impl Default for CloudFoundryDeployConfig {
    fn default() -> Self {
        Self {
            deploy_tool: String::new(),
            deploy_type: DeployType::Standard,
            api_endpoint: "https://api.cf.eu10.hana.ondemand.com".to_string(),
            org: String::new(),
            space: String::new(),
            username: String::new(),
            password: String::new(),
            app_name: String::new(),
            manifest: crate::manifest::DEFAULT_MANIFEST.to_string(),
            manifest_variables: Vec::new(),
            manifest_variables_files: Vec::new(),
            deploy_docker_image: String::new(),
            docker_username: String::new(),
            docker_password: String::new(),
            smoke_test_script: native::DEFAULT_SMOKE_TEST_SCRIPT.to_string(),
            smoke_test_status_code: "200".to_string(),
            keep_old_instance: false,
            cf_native_deploy_parameters: String::new(),
            mtar_path: String::new(),
            mta_deploy_parameters: "-f".to_string(),
            mta_extension_descriptor: String::new(),
            api_parameters: String::new(),
        }
    }
}

impl CloudFoundryDeployConfig {
    pub fn login_options(&self) -> LoginOptions {
        LoginOptions {
            endpoint: self.api_endpoint.clone(),
            org: self.org.clone(),
            space: self.space.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    pub deploy_tool: String,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_type: Option<DeployType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtar: Option<String>,
}

/// Runs the configured deploy tool. An unknown tool skips the deployment
/// without failing.
pub fn deploy(
    config: &CloudFoundryDeployConfig,
    runner: &mut dyn ProcessRunner,
    fs: &dyn FileSystem,
    verbose: bool,
) -> Result<DeployReport> {
    tracing::info!(
        deploy_tool = %config.deploy_tool,
        api_endpoint = %config.api_endpoint,
        "General parameters"
    );

    let mut report = DeployReport {
        deploy_tool: config.deploy_tool.clone(),
        ..Default::default()
    };

    let plan = match config.deploy_tool.as_str() {
        TOOL_CF_NATIVE => {
            require_login(config)?;
            let deployment = native::plan(config, fs)?;
            report.deploy_type = Some(deployment.plan.deploy_type);
            report.app_name = deployment.app_name;
            deployment.plan
        }
        TOOL_MTA_DEPLOY_PLUGIN => {
            require_login(config)?;
            let deployment = mta::plan(config, fs)?;
            report.deploy_type = Some(deployment.plan.deploy_type);
            report.mtar = Some(deployment.mtar);
            deployment.plan
        }
        other => {
            tracing::warn!(
                "Found unsupported deployTool ('{}'). Skipping deployment. Supported deploy tools: '{}', '{}'",
                other,
                TOOL_MTA_DEPLOY_PLUGIN,
                TOOL_CF_NATIVE
            );
            report.skipped = true;
            return Ok(report);
        }
    };

    session::execute(&plan, &config.login_options(), runner, fs, verbose)?;
    Ok(report)
}

fn require_login(config: &CloudFoundryDeployConfig) -> Result<()> {
    validation::require_fields(&[
        ("apiEndpoint", &config.api_endpoint),
        ("org", &config.org),
        ("space", &config.space),
        ("username", &config.username),
        ("password", &config.password),
    ])
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn config(tool: &str) -> CloudFoundryDeployConfig {
        CloudFoundryDeployConfig {
            deploy_tool: tool.to_string(),
            api_endpoint: "https://examples.sap.com/cf".to_string(),
            org: "myOrg".to_string(),
            space: "mySpace".to_string(),
            username: "me".to_string(),
            password: "******".to_string(),
            smoke_test_script: String::new(),
            ..Default::default()
        }
    }

    pub const LOGIN: &str = "cf login -a https://examples.sap.com/cf -o myOrg -s mySpace -u me -p ******";
}

#[cfg(test)]
mod tests {
    use super::test_support::{config, LOGIN};
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::{MemoryFiles, RecordingRunner};

    #[test]
    fn unsupported_tool_skips_without_calls() {
        let mut runner = RecordingRunner::new();
        let fs = MemoryFiles::default();
        let report = deploy(&config("notSupported"), &mut runner, &fs, false).unwrap();
        assert!(report.skipped);
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn missing_credentials_fail_before_any_call() {
        let mut runner = RecordingRunner::new();
        let fs = MemoryFiles::default();
        let mut cfg = config(TOOL_CF_NATIVE);
        cfg.username.clear();
        cfg.password.clear();
        let err = deploy(&cfg, &mut runner, &fs, false).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
        assert_eq!(err.details["args"], serde_json::json!(["username", "password"]));
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn standard_push_for_routeless_app() {
        let mut runner = RecordingRunner::new();
        let fs = MemoryFiles::new("/home/me").with_file(
            "test-manifest.yml",
            "applications:\n- name: manifestAppName\n  no-route: true\n",
        );
        let mut cfg = config(TOOL_CF_NATIVE);
        cfg.manifest = "test-manifest.yml".to_string();
        cfg.app_name = "myTestApp".to_string();

        let report = deploy(&cfg, &mut runner, &fs, false).unwrap();
        assert_eq!(report.deploy_type, Some(DeployType::Standard));
        assert_eq!(
            runner.lines(),
            vec![
                LOGIN,
                "cf plugins",
                "cf push myTestApp -f test-manifest.yml",
                "cf logout",
            ]
        );
        assert_eq!(runner.env_value("CF_HOME"), Some("/home/me"));
        assert_eq!(runner.env_value("CF_PLUGIN_HOME"), Some("/home/me"));
        assert_eq!(runner.env_value("STATUS_CODE"), Some("200"));
        assert_eq!(runner.env_value("CF_TRACE"), Some("cf.log"));
    }
}
