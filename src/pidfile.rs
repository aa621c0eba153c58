use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};
use tracing::{debug, error, warn};

/// Single-instance marker holding the daemon's pid.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claims the pid file. Returns `None` if it names a live process called
    /// `process_name`, or if another instance creates it first. Stale or
    /// unreadable files are replaced.
    pub fn acquire(path: &Path, process_name: &str) -> Option<Self> {
        if path.exists() {
            let owner = fs::read_to_string(path)
                .ok()
                .and_then(|contents| contents.trim().parse::<u32>().ok());

            match owner {
                Some(pid) if process_name_of(pid).as_deref() == Some(process_name) => {
                    return None;
                }
                _ => {
                    debug!(path = %path.display(), "Removing stale pidfile");
                    if let Err(e) = fs::remove_file(path) {
                        warn!(path = %path.display(), error = %e, "Failed to remove stale pidfile");
                    }
                }
            }
        }

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                if let Err(e) = write!(file, "{}", std::process::id()) {
                    error!(path = %path.display(), error = %e, "Unable to write pidfile");
                }
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "Pidfile claimed by another instance");
                return None;
            }
            Err(e) => error!(path = %path.display(), error = %e, "Unable to create pidfile"),
        }

        Some(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove pidfile");
            }
        }
    }
}

/// Name of a running process, or `None` if it does not exist.
pub fn process_name_of(pid: u32) -> Option<String> {
    let system =
        System::new_with_specifics(RefreshKind::new().with_processes(ProcessRefreshKind::new()));

    system
        .process(Pid::from_u32(pid))
        .map(|process| process.name().to_string_lossy().into_owned())
}
