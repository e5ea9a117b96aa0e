//! `cf push` and `cf blue-green-deploy` planning.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::document::Node;
use crate::error::{Error, Result};
use crate::files::FileSystem;
use crate::manifest::{self, Manifest};
use crate::strategy::{self, DeployType};
use crate::substitution::{self, Replacements};
use crate::utils::shell;

use super::{CloudFoundryDeployConfig, DeployPlan, PostDeploy};

pub const DEFAULT_SMOKE_TEST_SCRIPT: &str = "blueGreenCheckScript.sh";

const DEFAULT_SMOKE_TEST_CONTENT: &str = "#!/usr/bin/env bash
# this is simply testing if the application root returns HTTP STATUS_CODE
curl -so /dev/null -w '%{response_code}' https://$1 | grep $STATUS_CODE
";

#[derive(Debug, Clone)]
pub struct NativeDeployment {
    pub plan: DeployPlan,
    pub app_name: Option<String>,
}

pub fn plan(config: &CloudFoundryDeployConfig, fs: &dyn FileSystem) -> Result<NativeDeployment> {
    let manifest_path = (!config.manifest.is_empty()).then(|| PathBuf::from(&config.manifest));

    let deploy_type = match &manifest_path {
        Some(path) => strategy::select_strategy(config.deploy_type, path, fs)?,
        None => config.deploy_type,
    };

    let app_name = resolve_app_name(config, deploy_type, manifest_path.as_deref(), fs)?;

    let (command, options, smoke_test) = match deploy_type {
        DeployType::BlueGreen => {
            let (options, smoke_test) = prepare_blue_green(config, manifest_path.as_deref(), fs)?;
            ("blue-green-deploy", options, smoke_test)
        }
        DeployType::Standard => {
            let mut options = var_options(&config.manifest_variables)?;
            options.extend(var_file_options(&config.manifest_variables_files, fs)?);
            ("push", options, Vec::new())
        }
    };

    let mut deploy = vec![command.to_string()];
    if !config.app_name.is_empty() {
        deploy.push(config.app_name.clone());
    }
    deploy.extend(options);
    if let Some(path) = &manifest_path {
        deploy.push("-f".to_string());
        deploy.push(path.display().to_string());
    }
    if deploy_type == DeployType::Standard {
        if !config.deploy_docker_image.is_empty() {
            deploy.push("--docker-image".to_string());
            deploy.push(config.deploy_docker_image.clone());
        }
        if !config.docker_username.is_empty() {
            deploy.push("--docker-username".to_string());
            deploy.push(config.docker_username.clone());
        }
    }
    deploy.extend(smoke_test);
    deploy.extend(shell::split_params(&config.cf_native_deploy_parameters));

    let cwd = fs.current_dir()?.display().to_string();
    let mut env = vec![
        ("CF_HOME".to_string(), cwd.clone()),
        ("CF_PLUGIN_HOME".to_string(), cwd),
        (
            "STATUS_CODE".to_string(),
            config.smoke_test_status_code.clone(),
        ),
    ];
    if !config.docker_password.is_empty() {
        env.push((
            "CF_DOCKER_PASSWORD".to_string(),
            config.docker_password.clone(),
        ));
    }

    let post_deploy = (config.keep_old_instance && deploy_type == DeployType::BlueGreen).then(|| {
        PostDeploy::StopOldApp {
            app_name: config.app_name.clone(),
        }
    });

    tracing::info!(deploy_type = %deploy_type, command = %deploy.join(" "), "deployment planned");

    Ok(NativeDeployment {
        plan: DeployPlan {
            env,
            api: None,
            deploy,
            post_deploy,
            deploy_type,
        },
        app_name,
    })
}

/// The configured app name, or the first manifest application's name for
/// standard pushes. The blue-green plugin cannot read the name from the
/// manifest, so it must be configured.
pub fn resolve_app_name(
    config: &CloudFoundryDeployConfig,
    deploy_type: DeployType,
    manifest_path: Option<&Path>,
    fs: &dyn FileSystem,
) -> Result<Option<String>> {
    if !config.app_name.is_empty() {
        return Ok(Some(config.app_name.clone()));
    }
    if deploy_type == DeployType::BlueGreen {
        return Err(Error::deploy_app_name_required());
    }

    let Some(path) = manifest_path else {
        return Err(Error::deploy_app_name_unresolved(
            "Cannot resolve app name",
            "",
        ));
    };
    let display = path.display().to_string();
    if !fs.exists(path)? {
        return Err(Error::deploy_app_name_unresolved(
            format!("Manifest file '{}' not found", display),
            &display,
        ));
    }
    match Manifest::parse(path, fs)?.app_name()? {
        Some(name) => Ok(Some(name)),
        None => Err(Error::deploy_app_name_unresolved(
            format!("No appName available in manifest '{}'", display),
            &display,
        )),
    }
}

/// Parses `key=value` entries, keeping their order. The value may contain `=`.
pub fn parameter_map(parameters: &[String]) -> Result<IndexMap<String, String>> {
    let mut map = IndexMap::new();
    for parameter in parameters {
        let Some((key, value)) = parameter.split_once('=') else {
            return Err(Error::validation_invalid_argument(
                "manifestVariables",
                format!(
                    "Invalid parameter provided (expected format <key>=<val>: '{}'",
                    parameter
                ),
                None,
            ));
        };
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

pub fn var_options(variables: &[String]) -> Result<Vec<String>> {
    let mut options = Vec::new();
    for (key, value) in parameter_map(variables)? {
        options.push("--var".to_string());
        options.push(format!("{}={}", key, shell::bash_escape_single_quotes(&value)));
    }
    Ok(options)
}

/// Existing vars files only; a missing file is skipped with a warning.
pub fn var_file_options(files: &[String], fs: &dyn FileSystem) -> Result<Vec<String>> {
    let mut options = Vec::new();
    for file in existing_vars_files(files, fs)? {
        options.push("--vars-file".to_string());
        options.push(shell::bash_escape_single_quotes(&file.display().to_string()));
    }
    if !options.is_empty() {
        tracing::info!("We will add the following string to the cf push call: '{}'", options.join(" "));
    }
    Ok(options)
}

fn existing_vars_files(files: &[String], fs: &dyn FileSystem) -> Result<Vec<PathBuf>> {
    let mut existing = Vec::new();
    for file in files {
        let path = PathBuf::from(file);
        if fs.exists(&path)? {
            existing.push(path);
        } else {
            tracing::warn!(
                "We skip adding not-existing file '{}' as a vars-file to the cf create-service-push call",
                file
            );
        }
    }
    Ok(existing)
}

fn prepare_blue_green(
    config: &CloudFoundryDeployConfig,
    manifest_path: Option<&Path>,
    fs: &dyn FileSystem,
) -> Result<(Vec<String>, Vec<String>)> {
    let smoke_test = smoke_test_options(&config.smoke_test_script, fs)?;

    let mut options = Vec::new();
    if !config.keep_old_instance {
        options.push("--delete-old-apps".to_string());
    }

    match manifest_path {
        Some(path) if fs.exists(path)? => {
            let variables: Replacements = parameter_map(&config.manifest_variables)?
                .into_iter()
                .map(|(k, v)| (k, Node::String(v)))
                .collect();
            let files = existing_vars_files(&config.manifest_variables_files, fs)?;
            if substitution::substitute_file(path, &variables, &files, fs)? {
                tracing::info!("Manifest file '{}' has been updated with manifest variables.", path.display());
            }

            if manifest::transform_file(path, fs)? {
                tracing::info!("Manifest file '{}' was in legacy format has been transformed and updated.", path.display());
            } else {
                tracing::info!("Manifest file '{}' was not in legacy format. No transformation needed, no update performed.", path.display());
            }
        }
        Some(path) => tracing::info!("Manifest file '{}' does not exist", path.display()),
        None => tracing::info!("No manifest file configured"),
    }

    Ok((options, smoke_test))
}

/// Writes the default smoke test when the well-known name is configured,
/// makes the script executable and points the plugin at it.
fn smoke_test_options(script: &str, fs: &dyn FileSystem) -> Result<Vec<String>> {
    if script.is_empty() {
        return Ok(Vec::new());
    }
    let path = Path::new(script);
    if script == DEFAULT_SMOKE_TEST_SCRIPT {
        fs.write(path, DEFAULT_SMOKE_TEST_CONTENT, Some(0o755))?;
        tracing::debug!("smoke test script '{}' has been written.", script);
    }
    fs.set_mode(path, 0o755)?;
    let cwd = fs.current_dir()?;
    Ok(vec![
        "--smoke-test".to_string(),
        format!("{}/{}", cwd.display(), script),
    ])
}
