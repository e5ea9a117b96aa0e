//! Deployment strategy selection.
//!
//! Blue-green deployments need exactly one application with a route. A
//! routeless application falls back to a standard push.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::Node;
use crate::error::{Error, Result};
use crate::files::FileSystem;
use crate::manifest::Manifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeployType {
    #[default]
    Standard,
    BlueGreen,
}

impl DeployType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployType::Standard => "standard",
            DeployType::BlueGreen => "blue-green",
        }
    }
}

impl fmt::Display for DeployType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeployType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "standard" => Ok(DeployType::Standard),
            "blue-green" | "bg-deploy" => Ok(DeployType::BlueGreen),
            other => Err(Error::config_invalid_value(
                "deployType",
                Some(other.to_string()),
                format!(
                    "Unsupported deployType '{}'. Supported values: 'standard', 'blue-green'",
                    other
                ),
            )),
        }
    }
}

impl TryFrom<String> for DeployType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DeployType> for String {
    fn from(value: DeployType) -> Self {
        value.as_str().to_string()
    }
}

/// Effective deploy type for `configured` given the manifest at `manifest_path`.
pub fn select_strategy(
    configured: DeployType,
    manifest_path: &Path,
    fs: &dyn FileSystem,
) -> Result<DeployType> {
    if configured != DeployType::BlueGreen {
        return Ok(configured);
    }
    if !fs.exists(manifest_path)? {
        tracing::debug!(manifest = %manifest_path.display(), "manifest not found, keeping deploy type");
        return Ok(configured);
    }

    let manifest = Manifest::parse(manifest_path, fs)?;
    let apps = manifest.applications()?;
    if apps.len() > 1 {
        return Err(Error::deploy_multi_app_blue_green(
            manifest_path.display().to_string(),
            apps.len(),
        ));
    }

    if manifest.root_no_route().is_some() {
        tracing::warn!(
            manifest = %manifest_path.display(),
            "Top-level 'no-route' is ignored for strategy selection; set 'no-route' on the application instead"
        );
    }

    if !apps.is_empty()
        && manifest.application_property(0, "no-route")? == Some(&Node::Bool(true))
    {
        tracing::warn!(
            "Blue green deployment is not possible for application without route. Using deployment type '{}' instead.",
            DeployType::Standard
        );
        return Ok(DeployType::Standard);
    }

    Ok(DeployType::BlueGreen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::MemoryFiles;

    fn select(configured: DeployType, manifest: Option<&str>) -> Result<DeployType> {
        let fs = MemoryFiles::default();
        if let Some(content) = manifest {
            fs.insert("manifest.yml", content);
        }
        select_strategy(configured, Path::new("manifest.yml"), &fs)
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("bg-deploy".parse::<DeployType>().unwrap(), DeployType::BlueGreen);
        assert_eq!("standard".parse::<DeployType>().unwrap(), DeployType::Standard);
        let err = "rolling".parse::<DeployType>().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    }

    #[test]
    fn standard_is_kept_without_reading_manifest() {
        let manifest = "applications:\n- name: a\n- name: b\n";
        assert_eq!(
            select(DeployType::Standard, Some(manifest)).unwrap(),
            DeployType::Standard
        );
    }

    #[test]
    fn missing_manifest_keeps_blue_green() {
        assert_eq!(select(DeployType::BlueGreen, None).unwrap(), DeployType::BlueGreen);
    }

    #[test]
    fn multiple_apps_are_rejected() {
        let err = select(
            DeployType::BlueGreen,
            Some("applications:\n- name: a\n- name: b\n"),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DeployMultiAppBlueGreen);
    }

    #[test]
    fn no_route_downgrades_to_standard() {
        let manifest = "applications:\n- name: a\n  no-route: true\n";
        assert_eq!(
            select(DeployType::BlueGreen, Some(manifest)).unwrap(),
            DeployType::Standard
        );
    }

    #[test]
    fn root_level_no_route_does_not_downgrade() {
        let manifest = "no-route: true\napplications:\n- name: a\n";
        assert_eq!(
            select(DeployType::BlueGreen, Some(manifest)).unwrap(),
            DeployType::BlueGreen
        );
    }

    #[test]
    fn routed_single_app_stays_blue_green() {
        let manifest = "applications:\n- name: a\n  no-route: false\n";
        assert_eq!(
            select(DeployType::BlueGreen, Some(manifest)).unwrap(),
            DeployType::BlueGreen
        );
    }
}
