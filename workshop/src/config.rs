use provisioner::config::Endpoints;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

const CONFIG_PREFIX: &str = "config";

/// Run parameters: account credentials and who receives the workshop archive.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub account_identifier: String,
    pub org_identifier: String,
    pub api_key: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub endpoints: Endpoints,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;

        Ok(config)
    }

    /// Finds the parameter file in `dir`: the first file, by name, starting with
    /// `config` that is not a `.json` flag definition and holds a JSON object.
    pub fn discover(dir: &Path) -> Result<PathBuf, ConfigError> {
        let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.file_name().is_some_and(|name| {
                        let name = name.to_string_lossy();
                        name.starts_with(CONFIG_PREFIX) && !name.ends_with(".json")
                    })
            })
            .collect();
        candidates.sort();

        candidates
            .into_iter()
            .find(|path| {
                fs::read_to_string(path)
                    .map(|contents| contents.trim_start().starts_with('{'))
                    .unwrap_or(false)
            })
            .ok_or_else(|| ConfigError::NotFound(dir.to_path_buf()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_identifier.is_empty() {
            return Err(ConfigError::MissingField("accountIdentifier"));
        }
        if self.org_identifier.is_empty() {
            return Err(ConfigError::MissingField("orgIdentifier"));
        }
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingField("apiKey"));
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("no parameter file found in {}", .0.display())]
    NotFound(PathBuf),
    #[error("parameter file is missing {0}")]
    MissingField(&'static str),
}
