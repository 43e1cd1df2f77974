use std::{
    net::Ipv4Addr,
    path::PathBuf,
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use crate::{error::ProbeError, scan::Reachability};

const PING: &str = "ping";
const POLL_INTERVAL: Duration = Duration::from_millis(10);
// Time granted to the child on top of the probe timeout before it gets killed.
const GRACE: Duration = Duration::from_millis(250);

/// Delegates reachability checks to the system `ping` command.
#[derive(Debug)]
pub struct PingScan {
    program: PathBuf,
}

impl Default for PingScan {
    fn default() -> Self {
        Self::with_program(PING)
    }
}

impl PingScan {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

/// `ping -W` only takes whole seconds.
fn wait_secs(timeout: Duration) -> u64 {
    timeout.as_secs_f64().ceil().max(1.0) as u64
}

fn reap(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl Reachability for PingScan {
    fn probe(&self, ip: Ipv4Addr, timeout: Duration) -> Result<(), ProbeError> {
        let mut child = Command::new(&self.program)
            .args(["-c", "1", "-W"])
            .arg(wait_secs(timeout).to_string())
            .arg(ip.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                log::debug!("Failed to run `{}`: {}", self.program.display(), e);
                ProbeError::Unreachable
            })?;

        // Timeouts too large for an `Instant` leave the child bounded by `-W` alone.
        let deadline = Instant::now().checked_add(timeout.saturating_add(GRACE));
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(_)) => return Err(ProbeError::Timeout),
                Ok(None) if deadline.is_some_and(|d| Instant::now() >= d) => {
                    reap(child);
                    return Err(ProbeError::Timeout);
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    log::debug!("Failed to wait for ping of `{}`: {}", ip, e);
                    reap(child);
                    return Err(ProbeError::Unreachable);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, os::unix::fs::PermissionsExt};

    use super::*;

    #[test]
    fn wait_is_rounded_up_to_whole_seconds() {
        assert_eq!(wait_secs(Duration::from_millis(100)), 1);
        assert_eq!(wait_secs(Duration::from_secs(1)), 1);
        assert_eq!(wait_secs(Duration::from_millis(1500)), 2);
    }

    #[test]
    fn exit_status_decides_reachability() {
        let timeout = Duration::from_secs(1);

        assert_eq!(PingScan::with_program("true").probe(Ipv4Addr::LOCALHOST, timeout), Ok(()));
        assert_eq!(
            PingScan::with_program("false").probe(Ipv4Addr::LOCALHOST, timeout),
            Err(ProbeError::Timeout)
        );
    }

    #[test]
    fn missing_program_is_unreachable() {
        let ping = PingScan::with_program("/nonexistent/netsweep-ping");

        assert_eq!(
            ping.probe(Ipv4Addr::LOCALHOST, Duration::from_millis(100)),
            Err(ProbeError::Unreachable)
        );
    }

    #[test]
    fn hung_child_is_killed_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hang.sh");
        fs::write(&script, "#!/bin/sh\nsleep 10\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let started = Instant::now();
        let outcome = PingScan::with_program(&script).probe(Ipv4Addr::LOCALHOST, Duration::from_millis(100));

        assert_eq!(outcome, Err(ProbeError::Timeout));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn huge_timeout_does_not_overflow() {
        let ping = PingScan::with_program("true");

        assert_eq!(ping.probe(Ipv4Addr::LOCALHOST, Duration::from_secs(u64::MAX / 2)), Ok(()));
        assert_eq!(ping.probe(Ipv4Addr::LOCALHOST, Duration::MAX), Ok(()));
    }

    #[test]
    #[ignore]
    fn loopback_answers_real_ping() {
        assert_eq!(
            PingScan::default().probe(Ipv4Addr::LOCALHOST, Duration::from_secs(1)),
            Ok(())
        );
    }
}
