//! Run-scoped append-only log

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Appends one line per call to the run's log file and echoes it to stdout.
/// The file is never truncated; reruns with the same configuration keep
/// appending to the same log.
pub struct RunLogger {
    path: PathBuf,
}

impl RunLogger {
    /// Open (or create) the log file, creating parent directories as needed
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create run directory: {}", parent.display())
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Append one line and echo it
    pub fn log(&self, msg: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open log file: {}", self.path.display()))?;
        writeln!(file, "{msg}")
            .with_context(|| format!("Failed to append to log file: {}", self.path.display()))?;
        println!("{msg}");
        Ok(())
    }

    /// Path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_appends_lines() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("run").join("log.txt");
        let logger = RunLogger::create(&path).expect("create");

        logger.log("first").expect("log");
        logger.log("").expect("log");
        logger.log("second").expect("log");

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "first\n\nsecond\n");
    }

    #[test]
    fn test_reopen_does_not_truncate() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("log.txt");

        RunLogger::create(&path).expect("create").log("one").expect("log");
        RunLogger::create(&path).expect("recreate").log("two").expect("log");

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "one\ntwo\n");
    }
}
