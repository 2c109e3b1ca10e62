mod config;
pub mod database;
mod memory;

pub use config::{Config, TimerConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::Result;

/// Returns the data directory, creating it if needed.
///
/// `STUDYQUEST_DATA_DIR` wins when set. Otherwise `~/.config/studyquest[-dev]/`,
/// where `STUDYQUEST_ENV=dev` selects the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("STUDYQUEST_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("STUDYQUEST_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("studyquest-dev")
            } else {
                base_dir.join("studyquest")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
