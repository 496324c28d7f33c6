use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::reduce::DEFAULT_TEXT_LOSS_TOLERANCE;

// Base data directory
pub const DATA_DIR: &str = "data";

#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub text_loss_tolerance: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let data_dir = PathBuf::from(
            std::env::var("FACTEX_DATA_DIR").unwrap_or_else(|_| DATA_DIR.to_string()),
        );

        let text_loss_tolerance = match std::env::var("FACTEX_TEXT_LOSS_TOLERANCE") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| anyhow!("FACTEX_TEXT_LOSS_TOLERANCE must be a number, got {}", raw))?,
            Err(_) => DEFAULT_TEXT_LOSS_TOLERANCE,
        };

        Ok(Self {
            data_dir,
            text_loss_tolerance,
        })
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("registry")
    }

    pub fn reduce_policy(&self) -> crate::reduce::ReducePolicy {
        crate::reduce::ReducePolicy {
            text_loss_tolerance: self.text_loss_tolerance,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_DIR),
            text_loss_tolerance: DEFAULT_TEXT_LOSS_TOLERANCE,
        }
    }
}
