use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde::Serialize;

use deploystep::cloudfoundry::native::parameter_map;
use deploystep::document::{self, Node};
use deploystep::files::LocalFiles;
use deploystep::manifest::{self, DEFAULT_MANIFEST};
use deploystep::substitution::{self, Replacements};

use super::{CmdResult, GlobalArgs};

pub const STEP: &str = "manifest";

#[derive(Args)]
pub struct ManifestArgs {
    #[command(subcommand)]
    command: ManifestCommand,
}

#[derive(Subcommand)]
enum ManifestCommand {
    /// Replace ((placeholders)) with variables and vars files
    Substitute {
        /// Manifest file, rewritten in place
        #[arg(long, default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,
        /// Variable as key=value; repeatable, wins over vars files
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
        /// YAML file with variables; repeatable, later files win
        #[arg(long = "vars-file", value_name = "FILE")]
        vars_files: Vec<PathBuf>,
    },
    /// Rewrite legacy single-entry `buildpacks` to `buildpack`
    Transform {
        #[arg(long, default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestOutput {
    pub command: String,
    pub manifest: String,
    pub changed: bool,
}

pub fn run(args: ManifestArgs, _global: &GlobalArgs) -> CmdResult<ManifestOutput> {
    let fs = LocalFiles;
    let output = match args.command {
        ManifestCommand::Substitute {
            manifest,
            vars,
            vars_files,
        } => {
            let replacements = typed_replacements(&vars)?;
            let changed = substitution::substitute_file(&manifest, &replacements, &vars_files, &fs)?;
            ManifestOutput {
                command: "manifest.substitute".to_string(),
                manifest: manifest.display().to_string(),
                changed,
            }
        }
        ManifestCommand::Transform { manifest } => {
            let changed = manifest::transform_file(&manifest, &fs)?;
            ManifestOutput {
                command: "manifest.transform".to_string(),
                manifest: manifest.display().to_string(),
                changed,
            }
        }
    };
    Ok((output, 0))
}

/// `--var` values are read as YAML scalars, so `instances=2` stays a number.
fn typed_replacements(vars: &[String]) -> deploystep::Result<Replacements> {
    Ok(parameter_map(vars)?
        .into_iter()
        .map(|(key, raw)| {
            let value = match document::parse(&raw, "--var") {
                Ok(Node::Null) | Err(_) => Node::String(raw),
                Ok(node) => node,
            };
            (key, value)
        })
        .collect())
}
