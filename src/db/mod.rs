//! Locates warden's data directory and holds its persistent configuration.

use std::io;
use std::path::PathBuf;

use once_cell::sync::Lazy;

pub mod config;

/// Name of the environment variable which overrides the data directory.
pub const DATA_DIR_VAR: &str = "WARDEN_DIR";

pub fn default_data_folder() -> PathBuf {
    static DEFAULT_PATH: Lazy<PathBuf> = Lazy::new(|| {
        let mut base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        base.push("warden");
        base
    });

    DEFAULT_PATH.clone()
}

/// Resolves the data directory and creates it if needed.
pub fn ensure_data_folder() -> io::Result<PathBuf> {
    let dir = match std::env::var(DATA_DIR_VAR) {
        Ok(s) => shellexpand::full(&s)
            .map(|p| PathBuf::from(p.as_ref()))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?,
        Err(_) => default_data_folder(),
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
