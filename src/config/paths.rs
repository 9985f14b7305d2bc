//! Cross-platform application paths using the `dirs` crate.
//!
//! Config dir (settings + credential cache):
//!   Windows: %APPDATA%\voice-chat\
//!   macOS:   ~/Library/Application Support/voice-chat/
//!   Linux:   ~/.config/voice-chat/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `credentials.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to the persisted credential cache.
    pub credentials_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-chat";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            credentials_file: config_dir.join("credentials.toml"),
            config_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_config_dir() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.ends_with("voice-chat"));
        assert!(paths.settings_file.starts_with(&paths.config_dir));
        assert!(paths
            .credentials_file
            .file_name()
            .is_some_and(|n| n == "credentials.toml"));
    }
}
