use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::ResearchError;

pub const DEFAULT_CONFIG_FILE: &str = "research-store.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub papers_dir: Option<String>,
    #[serde(default)]
    pub fda_dir: Option<String>,
    #[serde(default)]
    pub default_max_results: Option<usize>,
    #[serde(default)]
    pub max_results_limit: Option<usize>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub papers_dir: Utf8PathBuf,
    pub fda_dir: Utf8PathBuf,
    pub default_max_results: usize,
    pub max_results_limit: usize,
    pub request_timeout: Duration,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            papers_dir: Utf8PathBuf::from("papers"),
            fda_dir: Utf8PathBuf::from("fda_data"),
            default_max_results: 5,
            max_results_limit: 100,
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `research-store.json` in the working directory when no
    /// path is given. Only an explicitly named file is required to exist.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ResearchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ResearchError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ResearchError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ResearchError> {
        let defaults = ResolvedConfig::default();

        let max_results_limit = config
            .max_results_limit
            .unwrap_or(defaults.max_results_limit);
        if max_results_limit == 0 {
            return Err(ResearchError::ConfigParse(
                "max_results_limit must be at least 1".to_string(),
            ));
        }
        let default_max_results = config
            .default_max_results
            .unwrap_or(defaults.default_max_results);
        if default_max_results == 0 || default_max_results > max_results_limit {
            return Err(ResearchError::ConfigParse(format!(
                "default_max_results must be between 1 and {max_results_limit}"
            )));
        }

        Ok(ResolvedConfig {
            papers_dir: config
                .papers_dir
                .map(|dir| expand_home(&dir))
                .unwrap_or(defaults.papers_dir),
            fda_dir: config
                .fda_dir
                .map(|dir| expand_home(&dir))
                .unwrap_or(defaults.fda_dir),
            default_max_results,
            max_results_limit,
            request_timeout: config
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        })
    }
}

/// Expands a leading `~/` to the user's home directory.
fn expand_home(dir: &str) -> Utf8PathBuf {
    if let Some(rest) = dir.strip_prefix("~/") {
        let home = BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.home_dir().to_path_buf()).ok());
        if let Some(home) = home {
            return home.join(rest);
        }
    }
    Utf8PathBuf::from(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved, ResolvedConfig::default());
    }

    #[test]
    fn relative_dirs_are_kept() {
        assert_eq!(expand_home("data/papers"), Utf8PathBuf::from("data/papers"));
    }
}
