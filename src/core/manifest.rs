//! Cloud Foundry deployment manifest.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::document::{self, Node};
use crate::error::{Error, Result};
use crate::files::FileSystem;

pub const DEFAULT_MANIFEST: &str = "manifest.yml";

#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    document: Node,
    modified: bool,
}

impl Manifest {
    pub fn parse(path: &Path, fs: &dyn FileSystem) -> Result<Self> {
        if !fs.exists(path)? {
            return Err(Error::file_not_found(
                path.display().to_string(),
                Some("Manifest file"),
            ));
        }
        let origin = path.display().to_string();
        tracing::debug!(manifest = %origin, "reading manifest");
        let document = document::parse(&fs.read_to_string(path)?, &origin)?;
        Ok(Self::from_document(path, document))
    }

    pub fn from_document(path: &Path, document: Node) -> Self {
        Self {
            path: path.to_path_buf(),
            document,
            modified: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &Node {
        &self.document
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn applications(&self) -> Result<&[Node]> {
        match self.document.get("applications") {
            Some(Node::Seq(apps)) => Ok(apps),
            Some(other) => Err(Error::manifest_invalid(format!(
                "Key 'applications' in manifest '{}' must be a list, found {}",
                self.path.display(),
                other.type_name()
            ))),
            None => Err(Error::manifest_invalid(format!(
                "No applications found in manifest '{}'",
                self.path.display()
            ))),
        }
    }

    /// Looks up `key` on the application at `index`. `Ok(None)` when the
    /// application has no such key.
    pub fn application_property(&self, index: usize, key: &str) -> Result<Option<&Node>> {
        let apps = self.applications()?;
        let app = apps.get(index).ok_or_else(|| {
            Error::manifest_invalid(format!(
                "No application at position {} in manifest '{}' ({} applications)",
                index,
                self.path.display(),
                apps.len()
            ))
        })?;
        match app {
            Node::Map(map) => Ok(map.get(key)),
            other => Err(Error::manifest_invalid(format!(
                "Application at position {} in manifest '{}' must be a map, found {}",
                index,
                self.path.display(),
                other.type_name()
            ))),
        }
    }

    /// Non-empty `name` of the first application.
    pub fn app_name(&self) -> Result<Option<String>> {
        if self.applications()?.is_empty() {
            return Ok(None);
        }
        Ok(self
            .application_property(0, "name")?
            .and_then(Node::as_str)
            .filter(|name| !name.trim().is_empty())
            .map(str::to_string))
    }

    /// `no-route` set at the top level of the manifest.
    pub fn root_no_route(&self) -> Option<bool> {
        self.document.get("no-route").and_then(Node::as_bool)
    }

    /// Replaces a single-entry `buildpacks` list by a scalar `buildpack` on
    /// every application.
    pub fn transform(&mut self) -> Result<bool> {
        let path = self.path.display().to_string();
        let apps = match self.document.as_map_mut().and_then(|m| m.get_mut("applications")) {
            Some(Node::Seq(apps)) if !apps.is_empty() => apps,
            _ => return Err(Error::manifest_invalid("No applications found in manifest")),
        };

        let mut changed = false;
        for (index, app) in apps.iter_mut().enumerate() {
            let Some(map) = app.as_map_mut() else {
                return Err(Error::manifest_invalid(format!(
                    "Application at position {} in manifest '{}' must be a map",
                    index, path
                )));
            };
            changed |= normalize_buildpacks(map, index)?;
        }

        self.modified |= changed;
        Ok(changed)
    }

    /// Writes the manifest back, keeping the file's permission bits.
    pub fn write(&self, fs: &dyn FileSystem) -> Result<()> {
        let mode = if fs.exists(&self.path)? {
            fs.mode(&self.path)?
        } else {
            None
        };
        fs.write(&self.path, &document::to_yaml(&self.document)?, mode)
    }
}

fn normalize_buildpacks(app: &mut IndexMap<String, Node>, index: usize) -> Result<bool> {
    let single = match app.get("buildpacks") {
        None => return Ok(false),
        Some(Node::Seq(packs)) if packs.len() > 1 => {
            return Err(Error::manifest_multiple_buildpacks(index))
        }
        Some(Node::Seq(packs)) => match packs.first() {
            Some(pack) => pack.clone(),
            None => return Ok(false),
        },
        Some(other) => {
            return Err(Error::manifest_invalid(format!(
                "Key 'buildpacks' of application at position {} must be a list, found {}",
                index,
                other.type_name()
            )))
        }
    };

    let rebuilt: IndexMap<String, Node> = std::mem::take(app)
        .into_iter()
        .map(|(key, value)| {
            if key == "buildpacks" {
                ("buildpack".to_string(), single.clone())
            } else {
                (key, value)
            }
        })
        .collect();
    *app = rebuilt;
    Ok(true)
}

/// Parses, normalizes and writes back the manifest when it changed.
pub fn transform_file(path: &Path, fs: &dyn FileSystem) -> Result<bool> {
    let mut manifest = Manifest::parse(path, fs)?;
    let changed = manifest.transform()?;
    if changed {
        manifest.write(fs)?;
        tracing::info!(manifest = %path.display(), "legacy buildpacks normalized");
    }
    Ok(changed)
}
