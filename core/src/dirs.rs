//! XDG directory utilities for audioscribe.

use std::path::PathBuf;

use anyhow::{Context, Result};
use xdg::BaseDirectories;

const APP_NAME: &str = "audioscribe";

fn base_dirs() -> BaseDirectories {
    BaseDirectories::with_prefix(APP_NAME)
}

/// Return the XDG config directory (no creation - config may not exist yet).
/// `~/.config/audioscribe/`
pub fn config_dir() -> Result<PathBuf> {
    base_dirs()
        .get_config_home()
        .context("Could not determine config directory (HOME not set?)")
}

/// Default config file path.
/// `~/.config/audioscribe/config.toml`
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_in_xdg_config() {
        let dir = config_dir().unwrap();
        let path = config_path().unwrap();

        assert!(dir.ends_with(APP_NAME));
        assert!(path.ends_with("config.toml"));
        assert_eq!(path.parent().unwrap(), dir);
    }
}
