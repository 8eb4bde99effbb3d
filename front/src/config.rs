use std::{env, path::PathBuf};

use crate::api::DEFAULT_API_URL;

pub const DEFAULT_DATA_DIR: &str = "tidy-data";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub sync_enabled: bool,
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: String::from(DEFAULT_API_URL),
            sync_enabled: false,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl Config {
    /// Reads `TIDY_API_URL`, `TIDY_SYNC` and `TIDY_DATA_DIR`.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            api_url: var("TIDY_API_URL").unwrap_or(defaults.api_url),
            sync_enabled: var("TIDY_SYNC").map_or(defaults.sync_enabled, |v| truthy(&v)),
            data_dir: var("TIDY_DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
        }
    }

    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn sync(mut self, enabled: bool) -> Self {
        self.sync_enabled = enabled;
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
