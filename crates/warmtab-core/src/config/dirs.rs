use std::path::PathBuf;

use directories::ProjectDirs;

const CONFIG_FILE_NAME: &str = "config.json";

/// Where the host keeps its config file.
#[derive(Debug, Clone)]
pub struct Directories {
    /// Per-user config directory (~/.config/warmtab on Linux)
    pub config: PathBuf,

    pub config_file: PathBuf,
}

impl Directories {
    /// Platform config dir, or one under the system temp dir when the
    /// browser launched us without a usable home directory.
    #[must_use]
    pub fn new() -> Self {
        let config = ProjectDirs::from("", "", "warmtab").map_or_else(
            || std::env::temp_dir().join("warmtab"),
            |project| project.config_dir().to_path_buf(),
        );
        Self::with_base(config)
    }

    #[must_use]
    pub fn with_base(config: PathBuf) -> Self {
        Self {
            config_file: config.join(CONFIG_FILE_NAME),
            config,
        }
    }
}

impl Default for Directories {
    fn default() -> Self {
        Self::new()
    }
}
