// ExaZK: Anycast health signalling for ExaBGP
// Copyright (C) 2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! The local service probe.
//!
//! Runs the configured shell command once per cycle to decide whether the
//! service instance behind this agent is able to take traffic. The command
//! runs in its own process group with all standard streams detached, and is
//! given a hard wall-clock budget of [`CHECK_TIMEOUT`]; a check that blows
//! the budget is killed as a whole group so stray grandchildren cannot
//! linger.

use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

/// Wall-clock budget for a single check run.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(1);

/// Poll interval while waiting for the check to exit.
const REAP_INTERVAL: Duration = Duration::from_millis(10);

/// Probes the local service with a shell command.
#[derive(Debug, Clone)]
pub struct LocalCheck {
    command: String,
}

impl LocalCheck {
    /// Create a probe for the given shell command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Run the check once. Returns `true` iff the command exits with status
    /// 0 within [`CHECK_TIMEOUT`]. Spawn failures and timeouts are logged
    /// and count as unhealthy; this function never panics and never errors.
    pub fn check(&self) -> bool {
        let mut child = match Command::new("/bin/sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                log::error!("cannot spawn local check: {e}");
                return false;
            }
        };

        let deadline = Instant::now() + CHECK_TIMEOUT;
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return true,
                Ok(Some(status)) => {
                    log::error!("local check returned: {status}");
                    return false;
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("cannot wait for local check: {e}");
                    kill_group(&mut child);
                    return false;
                }
            }

            if Instant::now() >= deadline {
                log::error!("local check spent more than 1s to run");
                kill_group(&mut child);
                return false;
            }

            std::thread::sleep(REAP_INTERVAL);
        }
    }
}

/// Kill the check's entire process group and reap the direct child. The
/// child was spawned as its own group leader, so its pid is the pgid.
fn kill_group(child: &mut Child) {
    if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        log::error!("cannot kill local check process group: {e}");
    }
    let _ = child.wait();
}
