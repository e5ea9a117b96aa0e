//! Layered step configuration.
//!
//! Precedence, lowest first: struct defaults, the `general` section of the
//! pipeline config file, its `steps.<name>` section, `DEPLOYSTEP_*`
//! environment variables, trailing CLI flags.

use std::path::{Path, PathBuf};

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::files::FileSystem;
use crate::utils::args;

pub const ENV_PREFIX: &str = "DEPLOYSTEP_";

/// Where the layers come from. `env` is passed in so resolution stays pure.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub file: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub flags: Vec<String>,
}

impl ConfigSources {
    pub fn from_process(file: Option<&str>, flags: Vec<String>) -> Self {
        Self {
            file: file.map(expand_path),
            env: std::env::vars().collect(),
            flags,
        }
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Reads a YAML or JSON pipeline config file into JSON.
pub fn load_file(path: &Path, fs: &dyn FileSystem) -> Result<Value> {
    if !fs.exists(path)? {
        return Err(Error::file_not_found(
            path.display().to_string(),
            Some("Configuration file"),
        ));
    }
    let content = fs.read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    // JSON is a subset of YAML, one parser covers both.
    serde_yml::from_str::<Value>(&content)
        .map_err(|e| Error::config_invalid_yaml(path.display().to_string(), e))
}

/// `general` then `steps.<step>` of a loaded config file.
fn file_layers(doc: &Value, step: &str) -> Vec<Value> {
    let mut layers = Vec::new();
    if let Some(general) = doc.get("general") {
        layers.push(general.clone());
    }
    if let Some(section) = doc.get("steps").and_then(|steps| steps.get(step)) {
        layers.push(section.clone());
    }
    layers
}

fn env_layer(env: &[(String, String)]) -> Value {
    let mut obj = Map::new();
    for (name, value) in env {
        if let Some(key) = name.strip_prefix(ENV_PREFIX) {
            if !key.is_empty() {
                obj.insert(args::config_key(key), args::parse_value(value));
            }
        }
    }
    Value::Object(obj)
}

/// Merged JSON for one step, before typing.
pub fn merged(step: &str, sources: &ConfigSources, fs: &dyn FileSystem) -> Result<Value> {
    let mut merged = Value::Object(Map::new());

    if let Some(path) = &sources.file {
        let doc = load_file(path, fs)?;
        for layer in file_layers(&doc, step) {
            if !layer.is_null() && !layer.is_object() {
                return Err(Error::config_invalid_value(
                    step,
                    None,
                    format!(
                        "Configuration section for step '{}' in '{}' must be a map",
                        step,
                        path.display()
                    ),
                ));
            }
            deep_merge(&mut merged, layer);
        }
    }

    deep_merge(&mut merged, env_layer(&sources.env));
    deep_merge(&mut merged, args::parse_kv_flags(&sources.flags)?);
    stringify_numbers(&mut merged);
    Ok(merged)
}

/// Resolves the typed options of `step`.
pub fn resolve<T: DeserializeOwned>(step: &str, sources: &ConfigSources, fs: &dyn FileSystem) -> Result<T> {
    let merged = merged(step, sources, fs)?;
    tracing::debug!(step, keys = ?merged.as_object().map(|o| o.keys().collect::<Vec<_>>()), "resolved configuration");
    serde_json::from_value(merged).map_err(|e| {
        Error::config_invalid_value(
            step,
            None,
            format!("Invalid configuration for step '{}': {}", step, e),
        )
    })
}

/// Objects merge key-wise, a null removes the key, anything else replaces.
pub fn deep_merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_obj), Value::Object(patch_obj)) => {
            for (key, value) in patch_obj {
                if value.is_null() {
                    base_obj.remove(&key);
                } else {
                    deep_merge(base_obj.entry(key).or_insert(Value::Null), value);
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

/// Step options have no numeric fields; ids such as `changeDocumentId: 4711`
/// or a status code given as a number are read as text.
fn stringify_numbers(value: &mut Value) {
    match value {
        Value::Number(n) => *value = Value::String(n.to_string()),
        Value::Array(items) => items.iter_mut().for_each(stringify_numbers),
        Value::Object(obj) => obj.values_mut().for_each(stringify_numbers),
        _ => {}
    }
}

/// Accepts a single string where a list is expected.
pub fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) if value.is_empty() => Vec::new(),
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::MemoryFiles;
    use serde_json::json;

    #[derive(Debug, Deserialize, Default)]
    #[serde(rename_all = "camelCase", default)]
    struct Options {
        org: String,
        space: String,
        password: String,
        status_code: String,
        keep_old: bool,
        #[serde(deserialize_with = "string_or_list")]
        vars: Vec<String>,
    }

    const PIPELINE: &str = "general:\n  org: generalOrg\n  space: generalSpace\n  vars: [a=1]\nsteps:\n  myStep:\n    space: stepSpace\n    statusCode: 200\n";

    fn sources(flags: &[&str]) -> ConfigSources {
        ConfigSources {
            file: Some(PathBuf::from("pipeline.yml")),
            env: vec![
                ("DEPLOYSTEP_password".to_string(), "fromEnv".to_string()),
                ("HOME".to_string(), "/home/me".to_string()),
            ],
            flags: flags.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn layers_in_precedence_order() {
        let fs = MemoryFiles::default().with_file("pipeline.yml", PIPELINE);
        let options: Options =
            resolve("myStep", &sources(&["--org", "flagOrg", "--keep-old", "true"]), &fs).unwrap();
        assert_eq!(options.org, "flagOrg");
        assert_eq!(options.space, "stepSpace");
        assert_eq!(options.password, "fromEnv");
        assert_eq!(options.status_code, "200");
        assert!(options.keep_old);
        assert_eq!(options.vars, vec!["a=1"]);
    }

    #[test]
    fn single_flag_fills_a_list() {
        let fs = MemoryFiles::default().with_file("pipeline.yml", PIPELINE);
        let options: Options = resolve("myStep", &sources(&["--vars", "b=2"]), &fs).unwrap();
        assert_eq!(options.vars, vec!["b=2"]);
    }

    #[test]
    fn other_steps_do_not_leak() {
        let fs = MemoryFiles::default().with_file("pipeline.yml", PIPELINE);
        let options: Options = resolve("otherStep", &sources(&[]), &fs).unwrap();
        assert_eq!(options.space, "generalSpace");
        assert_eq!(options.status_code, "");
    }

    #[test]
    fn missing_file() {
        let err = resolve::<Options>("myStep", &sources(&[]), &MemoryFiles::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::FileNotFound);
        assert_eq!(err.message, "Configuration file 'pipeline.yml' does not exist");
    }

    #[test]
    fn malformed_yaml() {
        let fs = MemoryFiles::default().with_file("pipeline.yml", "general: [unclosed");
        let err = resolve::<Options>("myStep", &sources(&[]), &fs).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidYaml);
    }

    #[test]
    fn wrong_shape_names_the_step() {
        let fs = MemoryFiles::default();
        let src = ConfigSources {
            flags: vec!["--keep-old".into(), "[1]".into()],
            ..Default::default()
        };
        let err = resolve::<Options>("myStep", &src, &fs).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
        assert!(err.message.starts_with("Invalid configuration for step 'myStep'"));
    }

    #[test]
    fn deep_merge_nested_and_null() {
        let mut base = json!({ "a": { "b": 1, "c": 2 }, "d": [1] });
        deep_merge(&mut base, json!({ "a": { "c": null, "e": 3 }, "d": [2] }));
        assert_eq!(base, json!({ "a": { "b": 1, "e": 3 }, "d": [2] }));
    }
}
