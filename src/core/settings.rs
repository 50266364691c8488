use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATABASE: &str = "participants.db";
pub const DEFAULT_WEB_PORT: u16 = 5000;

/// Json struct for deployment settings
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    /// Path to the SQLite database file
    pub database: Option<PathBuf>,
    pub web_port: Option<u16>,
}

impl Settings {
    /// Loads settings from a Json file, or defaults when no file is given.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        match file {
            Some(file) => {
                let text = read_to_string(file)
                    .with_context(|| format!("Failed to read settings file {}", file.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Invalid settings file {}", file.display()))
            }
            None => Ok(Settings::default()),
        }
    }

    pub fn database(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    pub fn web_port(&self) -> u16 {
        self.web_port.unwrap_or(DEFAULT_WEB_PORT)
    }
}
