use std::fs;

use deploystep::cloudfoundry::CloudFoundryDeployConfig;
use deploystep::config::{self, ConfigSources};
use deploystep::files::LocalFiles;
use deploystep::strategy::DeployType;
use deploystep::xs::{Action, Mode, XsDeployConfig};
use deploystep::ErrorCode;

const PIPELINE: &str = r#"
general:
  cfApiEndpoint: https://api.cf.example.org
  cfOrg: acme
  cfSpace: dev
  keepOldInstance: false
steps:
  cloudFoundryDeploy:
    deployTool: cf_native
    deployType: blue-green
    cfManifestVariables:
      - appName=orders
      - instances=2
    smokeTestStatusCode: 204
  xsDeploy:
    mode: BGDeploy
    action: Resume
    deploymentID: "4711"
"#;

fn sources(env: &[(&str, &str)], flags: &[&str]) -> (tempfile::TempDir, ConfigSources) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.yml");
    fs::write(&path, PIPELINE).unwrap();
    let sources = ConfigSources {
        file: Some(path),
        env: env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        flags: flags.iter().map(|f| f.to_string()).collect(),
    };
    (dir, sources)
}

#[test]
fn step_section_overrides_general_section() {
    let (_dir, sources) = sources(&[], &[]);

    let cfg: CloudFoundryDeployConfig =
        config::resolve("cloudFoundryDeploy", &sources, &LocalFiles).unwrap();

    assert_eq!(cfg.api_endpoint, "https://api.cf.example.org");
    assert_eq!(cfg.org, "acme");
    assert_eq!(cfg.deploy_tool, "cf_native");
    assert_eq!(cfg.deploy_type, DeployType::BlueGreen);
    assert_eq!(cfg.manifest_variables, vec!["appName=orders", "instances=2"]);
    assert_eq!(cfg.smoke_test_status_code, "204");
    assert_eq!(cfg.manifest, "manifest.yml");
}

#[test]
fn environment_and_flags_override_file() {
    let (_dir, sources) = sources(
        &[
            ("DEPLOYSTEP_USERNAME", "deployer"),
            ("DEPLOYSTEP_CF_SPACE", "qa"),
            ("UNRELATED", "x"),
        ],
        &["--cf-space", "prod", "--keep-old-instance", "true", "--manifest-variables", "stage=prod"],
    );

    let cfg: CloudFoundryDeployConfig =
        config::resolve("cloudFoundryDeploy", &sources, &LocalFiles).unwrap();

    assert_eq!(cfg.username, "deployer");
    assert_eq!(cfg.space, "prod");
    assert!(cfg.keep_old_instance);
    assert_eq!(cfg.manifest_variables, vec!["stage=prod"]);
}

#[test]
fn xs_section_resolves_enums_and_aliases() {
    let (_dir, sources) = sources(&[], &[]);

    let cfg: XsDeployConfig = config::resolve("xsDeploy", &sources, &LocalFiles).unwrap();

    assert_eq!(cfg.mode, Mode::BgDeploy);
    assert_eq!(cfg.action, Action::Resume);
    assert_eq!(cfg.deployment_id, "4711");
    assert_eq!(cfg.xs_session_file, ".xsconfig");
}

#[test]
fn invalid_enum_value_names_the_step() {
    let (_dir, sources) = sources(&[], &["--mode", "SOMETIMES"]);

    let err = config::resolve::<XsDeployConfig>("xsDeploy", &sources, &LocalFiles).unwrap_err();

    assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    assert!(err.message.contains("Invalid configuration for step 'xsDeploy'"));
}

#[test]
fn missing_config_file_is_reported() {
    let sources = ConfigSources {
        file: Some("/nonexistent/pipeline.yml".into()),
        ..Default::default()
    };

    let err = config::resolve::<XsDeployConfig>("xsDeploy", &sources, &LocalFiles).unwrap_err();

    assert_eq!(err.code, ErrorCode::FileNotFound);
}
