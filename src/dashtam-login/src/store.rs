//! Durable storage of profile records.
//!
//! [`FileProfileStore`] keeps one TOML file per profile under
//! `<config root>/profiles/`. Every save is a staged write renamed over the
//! target, so concurrent CLI processes never observe a torn file. There is
//! no cross-process lock: the last rename wins.
//!
//! [`MemoryProfileStore`] satisfies the same contract without touching the
//! filesystem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dashtam_common::{AppDirs, atomic_write_string, is_temp_file_name};

use crate::error::{AuthError, Outcome};
use crate::profile::{Profile, validate_profile_name};

/// Extension of profile files.
const PROFILE_EXTENSION: &str = "toml";

/// Keyed storage of [`Profile`] records.
pub trait ProfileStore: Send + Sync {
    /// Load a profile by name.
    fn load(&self, name: &str) -> Outcome<Profile>;

    /// Replace the stored record for `profile` with a complete new version.
    fn save(&self, profile: &Profile) -> Outcome<()>;

    /// Names of all stored profiles in lexicographic order.
    fn list(&self) -> Outcome<Vec<String>>;

    /// Remove a profile record.
    fn delete(&self, name: &str) -> Outcome<()>;

    /// Whether a record exists for `name`.
    fn exists(&self, name: &str) -> Outcome<bool> {
        match self.load(name) {
            Ok(_) => Ok(true),
            Err(AuthError::ConfigNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Profile store backed by `profiles/<name>.toml` files.
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    /// Store rooted at the profiles directory of `dirs`.
    pub fn new(dirs: &AppDirs) -> Self {
        Self {
            dir: dirs.profiles_dir(),
        }
    }

    /// Store rooted at an explicit directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `name`.
    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{PROFILE_EXTENSION}"))
    }
}

impl ProfileStore for FileProfileStore {
    fn load(&self, name: &str) -> Outcome<Profile> {
        if let Err(message) = validate_profile_name(name) {
            return Err(AuthError::config_not_found(format!(
                "profile '{name}': {message}"
            )));
        }

        let path = self.profile_path(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::config_not_found(format!(
                    "profile '{name}' does not exist ({})",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(AuthError::config_parse(
                    &path,
                    "could not read profile",
                    Some(Box::new(e)),
                ));
            }
        };

        let profile = Profile::from_toml(name, &content, &path)?;
        tracing::debug!(profile = %name, path = %path.display(), "Loaded profile");
        Ok(profile)
    }

    fn save(&self, profile: &Profile) -> Outcome<()> {
        let path = self.profile_path(profile.name());
        validate_profile_name(profile.name())
            .map_err(|message| AuthError::config_write(&path, message, None))?;

        let content = profile.to_toml().map_err(|e| {
            AuthError::config_write(&path, "could not serialize profile", Some(Box::new(e)))
        })?;

        atomic_write_string(&path, &content).map_err(|e| {
            tracing::warn!(
                error = %e,
                profile = %profile.name(),
                path = %path.display(),
                "Failed to save profile"
            );
            AuthError::config_write(&path, e.to_string(), Some(Box::new(e)))
        })?;

        tracing::debug!(
            profile = %profile.name(),
            path = %path.display(),
            has_tokens = profile.tokens().is_some(),
            "Saved profile"
        );
        Ok(())
    }

    fn list(&self) -> Outcome<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AuthError::config_parse(
                    &self.dir,
                    "could not read profiles directory",
                    Some(Box::new(e)),
                ));
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if is_temp_file_name(&file_name) {
                    return None;
                }
                let name = file_name.strip_suffix(&format!(".{PROFILE_EXTENSION}"))?;
                validate_profile_name(name).ok()?;
                Some(name.to_string())
            })
            .collect();
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Outcome<()> {
        if validate_profile_name(name).is_err() {
            return Err(AuthError::config_not_found(format!(
                "profile '{name}' does not exist"
            )));
        }

        let path = self.profile_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(profile = %name, "Removed profile");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                AuthError::config_not_found(format!("profile '{name}' does not exist")),
            ),
            Err(e) => Err(AuthError::config_write(
                &path,
                "could not remove profile",
                Some(Box::new(e)),
            )),
        }
    }
}

/// In-memory profile store.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<BTreeMap<String, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `profiles`.
    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let map = profiles
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();
        Self {
            profiles: Mutex::new(map),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Profile>> {
        self.profiles
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self, name: &str) -> Outcome<Profile> {
        self.lock()
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::config_not_found(format!("profile '{name}' does not exist")))
    }

    fn save(&self, profile: &Profile) -> Outcome<()> {
        validate_profile_name(profile.name()).map_err(|message| {
            AuthError::config_write(format!("memory:{}", profile.name()), message, None)
        })?;
        self.lock()
            .insert(profile.name().to_string(), profile.clone());
        Ok(())
    }

    fn list(&self) -> Outcome<Vec<String>> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn delete(&self, name: &str) -> Outcome<()> {
        self.lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AuthError::config_not_found(format!("profile '{name}' does not exist")))
    }
}
