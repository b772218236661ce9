//! Script catalog loaded from `scripts.yaml`.
//!
//! Each manifest entry may point at a per-script metadata file whose fields
//! are merged over the entry. Only loading and merging happen here; the
//! manifest is trusted otherwise.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::capabilities::{Capabilities, CapabilityOverrides};
use crate::error::CoreError;

/// Input widget / value type of a script parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    #[default]
    Text,
    Number,
    Boolean,
    Select,
    Multiselect,
    Password,
}

/// A single declared script parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ParameterKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A runnable script as described by the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDescriptor {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Script file relative to the scripts directory.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    /// Optional per-script metadata file relative to the scripts directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<String>,
    /// Per-script override of the default run timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Fields a metadata file may set. All are optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptMetadata {
    display_name: Option<String>,
    description: Option<String>,
    category: Option<String>,
    tags: Option<Vec<String>>,
    capabilities: Option<CapabilityOverrides>,
    parameters: Option<Vec<ParameterSpec>>,
    timeout_secs: Option<u64>,
}

impl ScriptDescriptor {
    fn merge_metadata(&mut self, meta: ScriptMetadata) {
        if let Some(v) = meta.display_name {
            self.display_name = v;
        }
        if let Some(v) = meta.description {
            self.description = v;
        }
        if let Some(v) = meta.category {
            self.category = Some(v);
        }
        if let Some(v) = meta.tags {
            self.tags = v;
        }
        if let Some(caps) = &meta.capabilities {
            self.capabilities.merge(caps);
        }
        if let Some(v) = meta.parameters {
            self.parameters = v;
        }
        if let Some(v) = meta.timeout_secs {
            self.timeout_secs = Some(v);
        }
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    scripts: Vec<ScriptDescriptor>,
}

/// In-memory catalog of runnable scripts.
#[derive(Debug, Clone)]
pub struct ScriptCatalog {
    scripts_dir: PathBuf,
    scripts: Vec<ScriptDescriptor>,
}

impl ScriptCatalog {
    /// Load `manifest_path` and merge every referenced metadata file.
    ///
    /// A missing or unparsable metadata file is logged and skipped; a
    /// missing or unparsable manifest is an error.
    pub fn load(scripts_dir: &Path, manifest_path: &Path) -> Result<Self, CoreError> {
        let raw = fs::read_to_string(manifest_path).map_err(|e| {
            CoreError::Manifest(format!("cannot read {}: {e}", manifest_path.display()))
        })?;
        let manifest: Manifest = serde_yaml::from_str(&raw).map_err(|e| {
            CoreError::Manifest(format!("cannot parse {}: {e}", manifest_path.display()))
        })?;

        let mut scripts: Vec<ScriptDescriptor> = Vec::with_capacity(manifest.scripts.len());
        for mut script in manifest.scripts {
            if scripts.iter().any(|s| s.id == script.id) {
                tracing::warn!(script_id = %script.id, "Duplicate script id in manifest, keeping first");
                continue;
            }
            if let Some(meta_file) = script.metadata_file.clone() {
                match read_metadata(&scripts_dir.join(&meta_file)) {
                    Ok(meta) => script.merge_metadata(meta),
                    Err(e) => {
                        tracing::warn!(script_id = %script.id, error = %e, "Skipping script metadata");
                    }
                }
            }
            scripts.push(script);
        }

        tracing::info!(count = scripts.len(), manifest = %manifest_path.display(), "Loaded script catalog");
        Ok(Self::from_descriptors(scripts_dir, scripts))
    }

    pub fn from_descriptors(scripts_dir: &Path, scripts: Vec<ScriptDescriptor>) -> Self {
        Self {
            scripts_dir: scripts_dir.to_path_buf(),
            scripts,
        }
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    pub fn list(&self) -> &[ScriptDescriptor] {
        &self.scripts
    }

    pub fn get(&self, id: &str) -> Option<&ScriptDescriptor> {
        self.scripts.iter().find(|s| s.id == id)
    }

    /// Absolute path of the script file, rejecting paths that leave the
    /// scripts directory.
    pub fn script_path(&self, script: &ScriptDescriptor) -> Result<PathBuf, CoreError> {
        let relative = safe_relative_path(&script.path)?;
        Ok(self.scripts_dir.join(relative))
    }
}

/// Validate that `path` is relative and contains no `..` components.
pub fn safe_relative_path(path: &str) -> Result<&Path, CoreError> {
    let p = Path::new(path);
    let escapes = p
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.trim().is_empty() || escapes {
        return Err(CoreError::Validation(format!(
            "script path '{path}' must be relative to the scripts directory"
        )));
    }
    Ok(p)
}

fn read_metadata(path: &Path) -> Result<ScriptMetadata, CoreError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| CoreError::Manifest(format!("cannot read {}: {e}", path.display())))?;
    serde_yaml::from_str(&raw)
        .map_err(|e| CoreError::Manifest(format!("cannot parse {}: {e}", path.display())))
}
