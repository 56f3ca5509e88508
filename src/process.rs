use anyhow::{Context, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fs;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const TERMINATE_ATTEMPTS: u32 = 15;
const TERMINATE_INTERVAL: Duration = Duration::from_millis(200);

/// The external client, addressed by its exact executable name.
pub struct ClientProcess {
    name: String,
}

impl ClientProcess {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !pids_by_name(&self.name).is_empty()
    }

    /// SIGTERM every matching process, then poll liveness on a fixed
    /// interval for a bounded number of attempts. Returns whether the
    /// client is confirmed stopped; running out of attempts is reported
    /// to the caller, not treated as a failure.
    pub fn terminate(&self) -> bool {
        let pids = pids_by_name(&self.name);
        if pids.is_empty() {
            return true;
        }
        for pid in pids {
            if let Err(err) = kill(pid, Signal::SIGTERM) {
                debug!("signal to {pid} not delivered: {err}");
            }
        }
        for _ in 0..TERMINATE_ATTEMPTS {
            thread::sleep(TERMINATE_INTERVAL);
            if !self.is_running() {
                return true;
            }
        }
        warn!("{} still running after the termination window", self.name);
        false
    }

    /// Spawn the client in its own session with its output discarded, and
    /// return without waiting for it to initialize.
    pub fn launch(&self) -> Result<()> {
        let mut cmd = Command::new(&self.name);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        unsafe {
            cmd.pre_exec(|| nix::unistd::setsid().map(|_| ()).map_err(io::Error::from));
        }
        debug!("starting {}", quoted(&self.name));
        cmd.spawn()
            .with_context(|| format!("Failed to start {}", self.name))?;
        Ok(())
    }
}

/// Every pid whose comm matches `name` exactly.
#[must_use]
pub fn pids_by_name(name: &str) -> Vec<Pid> {
    let proc = match fs::read_dir("/proc") {
        Ok(dir) => dir,
        Err(_) => return Vec::new(),
    };

    let mut pids = Vec::new();

    for entry in proc.flatten() {
        let file_name = entry.file_name();
        if !file_name
            .as_os_str()
            .as_encoded_bytes()
            .iter()
            .all(|byte| byte.is_ascii_digit())
        {
            continue;
        }

        let comm = match fs::read_to_string(entry.path().join("comm")) {
            Ok(comm) => comm,
            Err(_) => continue,
        };
        if comm.trim() != name {
            continue;
        }

        let raw = match file_name.to_string_lossy().parse::<i32>() {
            Ok(raw) => raw,
            Err(_) => continue,
        };
        pids.push(Pid::from_raw(raw));
    }

    pids
}

/// The client is spawned as a bare executable name, so quoting it is all
/// the log line needs.
fn quoted(name: &str) -> String {
    match shlex::try_quote(name) {
        Ok(value) => value.into_owned(),
        Err(_) => name.to_owned(),
    }
}
