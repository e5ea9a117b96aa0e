//! `((name))` placeholder substitution over YAML documents.
//!
//! A string that is exactly one placeholder takes the replacement's native
//! type; placeholders embedded in other text are formatted as strings.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};

use crate::document::{self, Node};
use crate::error::{Error, Result};
use crate::files::FileSystem;

pub type Replacements = IndexMap<String, Node>;

fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(\((.+?)\)\)").expect("Invalid regex pattern"))
}

/// Name of the placeholder when `text`, trimmed, is exactly one placeholder.
fn whole_placeholder(text: &str) -> Option<&str> {
    let text = text.trim();
    let caps = placeholder().captures(text)?;
    let found = caps.get(0)?;
    if found.start() != 0 || found.end() != text.len() {
        return None;
    }
    caps.get(1).map(|name| name.as_str())
}

/// Substitutes placeholders in a single scalar.
pub fn substitute_scalar(node: &Node, replacements: &Replacements) -> Result<Option<Node>> {
    let Node::String(text) = node else {
        return Ok(None);
    };
    if !placeholder().is_match(text) {
        return Ok(None);
    }

    if let Some(name) = whole_placeholder(text) {
        return lookup(name, replacements).map(|value| Some(value.clone()));
    }

    let mut failure = None;
    let replaced = placeholder().replace_all(text, |caps: &Captures| {
        let name = &caps[1];
        match lookup(name, replacements).and_then(|value| format_embedded(name, value)) {
            Ok(text) => text,
            Err(err) => {
                failure.get_or_insert(err);
                String::new()
            }
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(Some(Node::String(replaced.into_owned()))),
    }
}

fn lookup<'a>(name: &str, replacements: &'a Replacements) -> Result<&'a Node> {
    replacements.get(name).ok_or_else(|| {
        let content = serde_json::to_value(replacements).unwrap_or(serde_json::Value::Null);
        Error::missing_replacement_value(name, content)
    })
}

fn format_embedded(name: &str, value: &Node) -> Result<String> {
    match value {
        Node::String(s) => Ok(s.clone()),
        Node::Bool(b) => Ok(b.to_string()),
        Node::Int(i) => Ok(i.to_string()),
        Node::Float(f) => Ok(format_float(*f)),
        other => Err(Error::unsupported_replacement_type(
            name,
            other.to_json().to_string(),
            other.type_name(),
        )),
    }
}

/// Shortest float representation, switching to exponent form when the
/// decimal exponent is below -4 or at least 6 (`1e+06`, `2.5e-05`).
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return value.to_string();
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if (-4..6).contains(&exponent) {
        return value.to_string();
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exponent.abs())
}

/// Substitutes every placeholder of `document`.
pub fn substitute(document: &Node, replacements: &Replacements) -> Result<(Node, bool)> {
    document::traverse(document, &mut |node| substitute_scalar(node, replacements))
}

/// Merges replacement sources: files in order, every document of a file in
/// order, then `explicit`. Later keys win.
pub fn merge_replacements(
    explicit: &Replacements,
    files: &[PathBuf],
    fs: &dyn FileSystem,
) -> Result<Replacements> {
    let mut merged = Replacements::new();
    for path in files {
        let origin = path.display().to_string();
        let content = fs.read_to_string(path)?;
        for doc in document::parse_all(&content, &origin)? {
            match doc {
                Node::Map(map) => merged.extend(map),
                Node::Null => {}
                other => {
                    return Err(Error::config_invalid_value(
                        "varsFiles",
                        Some(origin.clone()),
                        format!(
                            "Replacement file '{}' must contain a map, found {}",
                            origin,
                            other.type_name()
                        ),
                    ))
                }
            }
        }
    }
    merged.extend(explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(merged)
}

/// Substitutes placeholders in the manifest file in place.
///
/// All files are checked before anything is read. The manifest is rewritten,
/// keeping its permission bits, only when a placeholder was replaced.
pub fn substitute_file(
    manifest: &Path,
    explicit: &Replacements,
    replacement_files: &[PathBuf],
    fs: &dyn FileSystem,
) -> Result<bool> {
    if !fs.exists(manifest)? {
        return Err(Error::file_not_found(
            manifest.display().to_string(),
            Some("Manifest file"),
        ));
    }
    for path in replacement_files {
        if !fs.exists(path)? {
            return Err(Error::file_not_found(
                path.display().to_string(),
                Some("Replacement file"),
            ));
        }
    }

    let origin = manifest.display().to_string();
    let content = fs.read_to_string(manifest)?;
    let parsed = document::parse(&content, &origin)?;
    let replacements = merge_replacements(explicit, replacement_files, fs)?;

    let (substituted, changed) = substitute(&parsed, &replacements)?;
    if !changed {
        tracing::debug!(manifest = %origin, "no placeholders replaced");
        return Ok(false);
    }

    let mode = fs.mode(manifest)?;
    fs.write(manifest, &document::to_yaml(&substituted)?, mode)?;
    tracing::info!(manifest = %origin, "placeholders replaced");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryFiles;

    fn replacements(pairs: &[(&str, Node)]) -> Replacements {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn string(s: &str) -> Node {
        Node::String(s.to_string())
    }

    #[test]
    fn whole_match_keeps_native_type() {
        let map = replacements(&[
            ("count", Node::Int(1)),
            ("flag", Node::Bool(true)),
            ("ratio", Node::Float(0.25)),
        ]);
        let doc = document::parse(
            "instances: ((count))\nenabled: ((flag))\nrate: ' ((ratio)) '\n",
            "m.yml",
        )
        .unwrap();
        let (out, changed) = substitute(&doc, &map).unwrap();
        assert!(changed);
        assert_eq!(out.get("instances"), Some(&Node::Int(1)));
        assert_eq!(out.get("enabled"), Some(&Node::Bool(true)));
        assert_eq!(out.get("rate"), Some(&Node::Float(0.25)));
    }

    #[test]
    fn whole_match_allows_single_paren_in_name() {
        let vars = replacements(&[("a)b", Node::Int(3))]);
        assert_eq!(
            substitute_scalar(&string("((a)b))"), &vars).unwrap(),
            Some(Node::Int(3))
        );
        assert_eq!(
            substitute_scalar(&string(" ((a)b)) "), &vars).unwrap(),
            Some(Node::Int(3))
        );
        assert_eq!(
            substitute_scalar(&string("((a)b))((a)b))"), &vars).unwrap(),
            Some(string("33"))
        );
    }

    #[test]
    fn whole_match_can_insert_structures() {
        let routes = Node::Seq(vec![string("a.example.com"), string("b.example.com")]);
        let map = replacements(&[("routes", routes.clone())]);
        let doc = document::parse("routes: ((routes))\n", "m.yml").unwrap();
        let (out, _) = substitute(&doc, &map).unwrap();
        assert_eq!(out.get("routes"), Some(&routes));
    }

    #[test]
    fn partial_match_is_stringified() {
        let map = replacements(&[("name", string("world")), ("n", Node::Int(3))]);
        let doc = document::parse("greeting: ((name))-hello-((n))\n", "m.yml").unwrap();
        let (out, _) = substitute(&doc, &map).unwrap();
        assert_eq!(out.get("greeting"), Some(&string("world-hello-3")));
    }

    #[test]
    fn partial_match_rejects_structures() {
        let map = replacements(&[("list", Node::Seq(vec![Node::Int(1)]))]);
        let err = substitute_scalar(&string("x-((list))"), &map).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::SubstitutionUnsupportedType);
    }

    #[test]
    fn missing_value_names_parameter() {
        let map = replacements(&[("other", Node::Int(1))]);
        let err = substitute_scalar(&string("((absent))"), &map).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::SubstitutionMissingValue);
        assert_eq!(err.details["parameter"], "absent");
    }

    #[test]
    fn float_formatting_switches_to_exponent() {
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(3.0), "3");
        assert_eq!(format_float(123456.0), "123456");
        assert_eq!(format_float(1_000_000.0), "1e+06");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(0.000025), "2.5e-05");
    }

    #[test]
    fn explicit_values_override_files() {
        let fs = MemoryFiles::default()
            .with_file("manifest.yml", "value: ((a))\n")
            .with_file("vars1.yml", "a: first\nb: kept\n---\na: second\n")
            .with_file("vars2.yml", "a: fileVal\n");
        let files = vec![PathBuf::from("vars1.yml"), PathBuf::from("vars2.yml")];

        let merged = merge_replacements(&Replacements::new(), &files, &fs).unwrap();
        assert_eq!(merged.get("a"), Some(&string("fileVal")));
        assert_eq!(merged.get("b"), Some(&string("kept")));

        let explicit = replacements(&[("a", string("overrideVal"))]);
        let changed = substitute_file(Path::new("manifest.yml"), &explicit, &files, &fs).unwrap();
        assert!(changed);
        let out = document::parse(&fs.content("manifest.yml").unwrap(), "m").unwrap();
        assert_eq!(out.get("value"), Some(&string("overrideVal")));
    }

    #[test]
    fn second_run_is_a_no_op() {
        let fs = MemoryFiles::default()
            .with_file("manifest.yml", "applications:\n- name: ((app))\n  instances: ((count))\n");
        let map = replacements(&[("app", string("demo")), ("count", Node::Int(2))]);

        assert!(substitute_file(Path::new("manifest.yml"), &map, &[], &fs).unwrap());
        let first = fs.content("manifest.yml").unwrap();
        assert!(!first.contains("(("));

        assert!(!substitute_file(Path::new("manifest.yml"), &map, &[], &fs).unwrap());
        assert_eq!(fs.content("manifest.yml").unwrap(), first);
    }

    #[test]
    fn missing_replacement_file_fails_before_writing() {
        let fs = MemoryFiles::default().with_file("manifest.yml", "a: ((x))\n");
        let err = substitute_file(
            Path::new("manifest.yml"),
            &replacements(&[("x", Node::Int(1))]),
            &[PathBuf::from("missing.yml")],
            &fs,
        )
        .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::FileNotFound);
        assert_eq!(fs.content("manifest.yml").as_deref(), Some("a: ((x))\n"));
    }
}
