//! Flag and segment definitions read from the working directory.
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum DefinitionError {
    #[error("could not read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("could not parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A flag name and the targeting definition pushed for it in the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct FlagSpec {
    pub name: String,
    pub definition: Value,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SegmentSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keys: Vec<String>,
}

impl FlagSpec {
    /// Reads one definition file. The flag is named by the `name` field when it has one
    /// and after the file stem otherwise.
    pub fn from_file(path: &Path) -> Result<Self, DefinitionError> {
        let raw = fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let definition: Value =
            serde_json::from_str(&raw).map_err(|source| DefinitionError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let name = match definition.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        Ok(FlagSpec { name, definition })
    }
}

/// Loads every `*.json` file in `dir`, in file name order. Files that cannot be
/// read or parsed are skipped, as are later files repeating a flag name.
pub fn load_flag_specs(dir: &Path) -> Result<Vec<FlagSpec>, DefinitionError> {
    let entries = fs::read_dir(dir).map_err(|source| DefinitionError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut seen = HashSet::new();
    let mut specs = Vec::with_capacity(paths.len());
    for path in paths {
        tracing::debug!(path = %path.display(), "reading flag definition");
        match FlagSpec::from_file(&path) {
            Ok(spec) if spec.name.is_empty() => {
                tracing::warn!(path = %path.display(), "flag definition has no name, skipping");
            }
            Ok(spec) => {
                if seen.insert(spec.name.clone()) {
                    tracing::info!(flag = %spec.name, "loaded flag definition");
                    specs.push(spec);
                } else {
                    tracing::warn!(
                        flag = %spec.name,
                        path = %path.display(),
                        "duplicate flag name, skipping"
                    );
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping flag definition"),
        }
    }

    Ok(specs)
}

/// Loads the consolidated segment definitions. A missing file means no segments.
pub fn load_segment_specs(path: &Path) -> Result<Vec<SegmentSpec>, DefinitionError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no segment definitions");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(DefinitionError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_str(&raw).map_err(|source| DefinitionError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
