//! Global settings and the per-invocation configuration context.
//!
//! `config.toml` at the configuration root holds:
//!
//! ```toml
//! default_profile = "dev"
//! output_style = "rich"
//! color = true
//! ```
//!
//! The active profile is chosen once at startup, in priority order:
//! `--profile` flag, `DASHTAM_PROFILE`, `default_profile`, `"default"`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use dashtam_common::{AppDirs, atomic_write_string};

use crate::constants::{FALLBACK_PROFILE, PROFILE_ENV_VAR};
use crate::error::{AuthError, Outcome};
use crate::profile::{OutputStyle, Profile};
use crate::store::{FileProfileStore, ProfileStore};

/// Contents of the global configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Profile used when neither flag nor environment selects one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub output_style: OutputStyle,
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_color() -> bool {
    true
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_profile: None,
            output_style: OutputStyle::default(),
            color: default_color(),
        }
    }
}

impl GlobalConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Outcome<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No global config, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AuthError::config_parse(
                    path,
                    "could not read global config",
                    Some(Box::new(e)),
                ));
            }
        };

        toml::from_str(&content)
            .map_err(|e| AuthError::config_parse(path, e.message().to_string(), Some(Box::new(e))))
    }

    /// Atomically replace the file at `path`.
    pub fn save(&self, path: &Path) -> Outcome<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            AuthError::config_write(path, "could not serialize global config", Some(Box::new(e)))
        })?;
        atomic_write_string(path, &content)
            .map_err(|e| AuthError::config_write(path, e.to_string(), Some(Box::new(e))))
    }
}

/// Where the active profile name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    /// `--profile` on the command line
    Flag,
    /// `DASHTAM_PROFILE`
    Environment,
    /// `default_profile` in the global file
    GlobalDefault,
    /// Built-in fallback name
    Fallback,
}

impl std::fmt::Display for ProfileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileSource::Flag => write!(f, "--profile flag"),
            ProfileSource::Environment => write!(f, "{PROFILE_ENV_VAR}"),
            ProfileSource::GlobalDefault => write!(f, "default profile"),
            ProfileSource::Fallback => write!(f, "built-in default"),
        }
    }
}

/// Pick the active profile name. Blank values are ignored.
pub fn resolve_active_profile(
    flag: Option<&str>,
    env: Option<&str>,
    global: &GlobalConfig,
) -> (String, ProfileSource) {
    let non_blank = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(String::from);

    if let Some(name) = non_blank(flag) {
        return (name, ProfileSource::Flag);
    }
    if let Some(name) = non_blank(env) {
        return (name, ProfileSource::Environment);
    }
    if let Some(name) = non_blank(global.default_profile.as_deref()) {
        return (name, ProfileSource::GlobalDefault);
    }
    (FALLBACK_PROFILE.to_string(), ProfileSource::Fallback)
}

/// Configuration resolved once per CLI invocation.
///
/// Built in `main` and passed to every component that needs the active
/// profile or the profile store.
#[derive(Clone)]
pub struct ConfigContext {
    dirs: AppDirs,
    global: GlobalConfig,
    active_profile: String,
    source: ProfileSource,
    store: Arc<dyn ProfileStore>,
}

impl std::fmt::Debug for ConfigContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigContext")
            .field("dirs", &self.dirs)
            .field("global", &self.global)
            .field("active_profile", &self.active_profile)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl ConfigContext {
    /// Load the global file under `dirs` and resolve the active profile
    /// from `profile_flag` and `DASHTAM_PROFILE`.
    pub fn load(dirs: AppDirs, profile_flag: Option<&str>) -> Outcome<Self> {
        let global = GlobalConfig::load(&dirs.config_file())?;
        let env = std::env::var(PROFILE_ENV_VAR).ok();
        let store: Arc<dyn ProfileStore> = Arc::new(FileProfileStore::new(&dirs));
        Ok(Self::from_parts(dirs, global, profile_flag, env.as_deref(), store))
    }

    /// Assemble a context from already-loaded parts.
    pub fn from_parts(
        dirs: AppDirs,
        global: GlobalConfig,
        profile_flag: Option<&str>,
        profile_env: Option<&str>,
        store: Arc<dyn ProfileStore>,
    ) -> Self {
        let (active_profile, source) = resolve_active_profile(profile_flag, profile_env, &global);
        tracing::debug!(profile = %active_profile, source = %source, "Resolved active profile");
        Self {
            dirs,
            global,
            active_profile,
            source,
            store,
        }
    }

    pub fn dirs(&self) -> &AppDirs {
        &self.dirs
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn active_profile(&self) -> &str {
        &self.active_profile
    }

    pub fn profile_source(&self) -> ProfileSource {
        self.source
    }

    pub fn store(&self) -> Arc<dyn ProfileStore> {
        Arc::clone(&self.store)
    }

    /// Load the active profile from the store.
    pub fn load_active_profile(&self) -> Outcome<Profile> {
        self.store.load(&self.active_profile)
    }

    /// Output style for `profile`, falling back to the global setting.
    pub fn output_style(&self, profile: Option<&Profile>) -> OutputStyle {
        profile
            .and_then(|p| p.display.output_style)
            .unwrap_or(self.global.output_style)
    }

    /// Color setting for `profile`, falling back to the global setting.
    pub fn color_enabled(&self, profile: Option<&Profile>) -> bool {
        profile
            .and_then(|p| p.display.color)
            .unwrap_or(self.global.color)
    }

    /// Make `name` the default profile. The profile must exist.
    pub fn set_default_profile(&mut self, name: &str) -> Outcome<()> {
        self.store.load(name)?;
        let mut global = self.global.clone();
        global.default_profile = Some(name.to_string());
        self.write_global(global)?;
        tracing::info!(profile = %name, "Default profile updated");
        Ok(())
    }

    /// Store a new profile. The first profile added becomes the default.
    pub fn add_profile(&mut self, profile: &Profile, make_default: bool) -> Outcome<()> {
        if self.store.exists(profile.name())? {
            return Err(AuthError::config_write(
                self.dirs
                    .profiles_dir()
                    .join(format!("{}.toml", profile.name())),
                format!("profile '{}' already exists", profile.name()),
                None,
            ));
        }

        let had_default = match &self.global.default_profile {
            Some(current) => self.store.exists(current)?,
            None => false,
        };

        self.store.save(profile)?;
        tracing::info!(profile = %profile.name(), base_url = %profile.base_url(), "Added profile");

        if make_default || !had_default {
            self.set_default_profile(profile.name())?;
        }
        Ok(())
    }

    /// Remove a profile and its credentials.
    ///
    /// Removing the default profile moves the default to the first
    /// remaining profile (lexicographically), or clears it.
    pub fn remove_profile(&mut self, name: &str) -> Outcome<()> {
        self.store.delete(name)?;

        if self.global.default_profile.as_deref() == Some(name) {
            let mut global = self.global.clone();
            global.default_profile = self.store.list()?.into_iter().next();
            tracing::info!(
                removed = %name,
                new_default = ?global.default_profile,
                "Removed default profile"
            );
            self.write_global(global)?;
        }
        Ok(())
    }

    fn write_global(&mut self, global: GlobalConfig) -> Outcome<()> {
        global.save(&self.dirs.config_file())?;
        self.global = global;
        Ok(())
    }
}
