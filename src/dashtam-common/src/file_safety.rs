//! Crash-safe file replacement.
//!
//! Writes go to a temporary file in the target's directory, are flushed to
//! disk, and are then renamed over the target. Readers see either the old
//! content or the new content, never a partial file. Temporary files carry
//! the process id and a random suffix so concurrent writers (threads or
//! separate CLI processes) never share one.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Marker embedded in every temporary file name.
pub const TEMP_MARKER: &str = ".tmp.";

/// A fully written temporary file waiting to be renamed over its target.
///
/// Dropping a staged write without committing removes the temporary file.
#[derive(Debug)]
pub struct StagedWrite {
    temp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedWrite {
    /// Path of the temporary file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Path that will be replaced on commit.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically rename the temporary file over the target.
    pub fn commit(mut self) -> std::io::Result<()> {
        std::fs::rename(&self.temp_path, &self.target)?;
        self.committed = true;

        #[cfg(unix)]
        if let Some(parent) = self.target.parent()
            && let Ok(dir) = File::open(parent)
        {
            let _ = dir.sync_all();
        }

        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed
            && let Err(e) = std::fs::remove_file(&self.temp_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::debug!(
                error = %e,
                path = %self.temp_path.display(),
                "Failed to remove temporary file"
            );
        }
    }
}

/// Write `content` to a fresh temporary file next to `path`.
///
/// The parent directory is created if missing. On Unix the temporary file
/// is created with mode `0600`, which the final file inherits on rename.
pub fn stage_write(path: &Path, content: &[u8]) -> std::io::Result<StagedWrite> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("config");
    let temp_path = parent.join(format!(
        ".{file_name}{TEMP_MARKER}{}.{:016x}",
        std::process::id(),
        rand::random::<u64>()
    ));

    let staged = StagedWrite {
        temp_path,
        target: path.to_path_buf(),
        committed: false,
    };

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&staged.temp_path)?;
    file.write_all(content)?;
    file.sync_all()?;

    Ok(staged)
}

/// Atomically replace the file at `path` with `content`.
///
/// On failure the previous file (if any) is left untouched and the
/// temporary file is removed.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    stage_write(path, content)?.commit()
}

/// Atomically write a string to a file.
pub fn atomic_write_string(path: &Path, content: &str) -> std::io::Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Whether a file name belongs to an in-flight (or abandoned) staged write.
pub fn is_temp_file_name(name: &str) -> bool {
    name.starts_with('.') && name.contains(TEMP_MARKER)
}
