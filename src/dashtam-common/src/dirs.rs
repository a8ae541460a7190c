//! Per-user configuration root for the Dashtam CLI.
//!
//! Layout under the root:
//! - `config.toml` - global settings (default profile, output style, color)
//! - `profiles/<name>.toml` - one record per API environment
//!
//! The root is `DASHTAM_HOME` when set, otherwise `<config dir>/dashtam`
//! (`~/.config/dashtam` on Linux, `~/Library/Application Support/dashtam` on
//! macOS, `%APPDATA%\dashtam` on Windows).

use std::path::{Path, PathBuf};

/// Application name for directory paths
pub const APP_NAME: &str = "dashtam";

/// Fallback directory name under the home directory
pub const HOME_DIR_NAME: &str = ".dashtam";

/// Environment variable overriding the configuration root
pub const HOME_ENV_VAR: &str = "DASHTAM_HOME";

/// Name of the global configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Name of the directory holding per-profile files
pub const PROFILES_DIR_NAME: &str = "profiles";

/// Application directories structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    /// Configuration root
    pub config_dir: PathBuf,
}

impl AppDirs {
    /// Resolve the configuration root, honouring `DASHTAM_HOME`.
    ///
    /// Relative values of `DASHTAM_HOME` are resolved against the current
    /// directory so files never land somewhere unexpected.
    pub fn new() -> Option<Self> {
        if let Ok(home) = std::env::var(HOME_ENV_VAR)
            && !home.trim().is_empty()
        {
            return Some(Self::at(resolve_relative(PathBuf::from(home))));
        }

        let config_dir = match dirs::config_dir() {
            Some(base) => base.join(APP_NAME),
            None => dirs::home_dir()?.join(HOME_DIR_NAME),
        };

        Some(Self { config_dir })
    }

    /// Use an explicit configuration root (tests, `--config-dir`).
    pub fn at(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Path of the global configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Directory holding one file per profile.
    pub fn profiles_dir(&self) -> PathBuf {
        self.config_dir.join(PROFILES_DIR_NAME)
    }

    /// Ensure the configuration root and the profiles directory exist.
    ///
    /// Newly created directories are restricted to the owner on Unix.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [self.config_dir.clone(), self.profiles_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
                restrict_dir(&dir)?;
            }
        }
        Ok(())
    }
}

fn resolve_relative(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => {
            let resolved = cwd.join(&path);
            resolved.canonicalize().unwrap_or(resolved)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %path.display(),
                "DASHTAM_HOME is relative but the current directory is unavailable"
            );
            path
        }
    }
}

#[cfg(unix)]
fn restrict_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn restrict_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
