//! Multi-target archive deployment through the MTA plugin (`cf deploy`).

use std::path::Path;

use crate::error::{Error, Result};
use crate::files::FileSystem;
use crate::strategy::DeployType;
use crate::utils::shell;

use super::{CloudFoundryDeployConfig, DeployPlan};

pub const MTAR_PATTERN: &str = "**/*.mtar";
const NO_CONFIRM: &str = "--no-confirm";

#[derive(Debug, Clone)]
pub struct MtaDeployment {
    pub plan: DeployPlan,
    pub mtar: String,
}

pub fn plan(config: &CloudFoundryDeployConfig, fs: &dyn FileSystem) -> Result<MtaDeployment> {
    let mtar = if config.mtar_path.is_empty() {
        let found = find_mtar(fs)?;
        tracing::debug!("Using mtar file '{}' found in workspace", found);
        found
    } else {
        if !fs.exists(Path::new(&config.mtar_path))? {
            return Err(Error::deploy_artifact_not_found(
                format!(
                    "mtar file '{}' retrieved from configuration does not exist",
                    config.mtar_path
                ),
                vec![config.mtar_path.clone()],
            ));
        }
        tracing::debug!("Using mtar file '{}' from configuration", config.mtar_path);
        config.mtar_path.clone()
    };

    let mut params = shell::split_params(&config.mta_deploy_parameters);
    let command = match config.deploy_type {
        DeployType::BlueGreen => {
            if !params.iter().any(|p| p == NO_CONFIRM) {
                params.push(NO_CONFIRM.to_string());
            }
            "bg-deploy"
        }
        DeployType::Standard => "deploy",
    };

    let mut api = vec!["api".to_string(), config.api_endpoint.clone()];
    api.extend(shell::split_params(&config.api_parameters));

    let mut deploy = vec![command.to_string(), mtar.clone()];
    deploy.extend(params);
    if let Some(descriptor) = extension_descriptor(&config.mta_extension_descriptor) {
        deploy.push("-e".to_string());
        deploy.push(descriptor);
    }

    Ok(MtaDeployment {
        plan: DeployPlan {
            env: Vec::new(),
            api: Some(api),
            deploy,
            post_deploy: None,
            deploy_type: config.deploy_type,
        },
        mtar,
    })
}

/// Accepts both `ext.mtaext` and `-e ext.mtaext`.
fn extension_descriptor(value: &str) -> Option<String> {
    let value = value.trim();
    let value = value.strip_prefix("-e").map(str::trim_start).unwrap_or(value);
    (!value.is_empty()).then(|| value.to_string())
}

/// The single `.mtar` in the workspace.
pub fn find_mtar(fs: &dyn FileSystem) -> Result<String> {
    let found: Vec<String> = fs
        .glob(MTAR_PATTERN)?
        .iter()
        .map(|p| p.display().to_string())
        .collect();

    match found.as_slice() {
        [] => Err(Error::deploy_artifact_not_found(
            format!("No mtar file matching pattern '{}' found", MTAR_PATTERN),
            Vec::new(),
        )),
        [single] => Ok(single.clone()),
        many => Err(Error::deploy_artifact_not_found(
            format!(
                "Found multiple mtar files matching pattern '{}' ({}), please specify file via mtaPath parameter 'mtarPath'",
                MTAR_PATTERN,
                many.join(",")
            ),
            many.to_vec(),
        )),
    }
}
