use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;
use tracing::debug;

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "chromaquad";
const APPLICATION: &str = "chromaquad";
const CONFIG_FILE: &str = "chromaquad.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self::with_config_dir(project_dirs.config_dir()))
    }

    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// The per-user configuration file, if one has been created.
    pub fn existing_config_file(&self) -> Option<PathBuf> {
        let path = self.config_file();
        if path.is_file() {
            Some(path)
        } else {
            debug!(path = %path.display(), "no user configuration file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_is_only_reported_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_config_dir(dir.path());
        assert_eq!(paths.config_dir(), dir.path());
        assert!(paths.existing_config_file().is_none());

        std::fs::write(paths.config_file(), "version = 1\n").unwrap();
        assert_eq!(paths.existing_config_file(), Some(dir.path().join("chromaquad.toml")));
    }
}
