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

//! The coordination engine.
//!
//! Four asynchronous signal sources feed this process: the periodic local
//! check, the ZooKeeper session listener, the children watch, and POSIX
//! signals. They are serialized through one [`Signals`] handle that every
//! callback context may raise flags on, and a single [`Coordinator`] thread
//! that consumes the flags and makes every advertisement decision. Nothing
//! else ever writes the route table.

mod coordinator;

pub use coordinator::Coordinator;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::zk::SessionState;

/// Upper bound for one idle wait between two cycles.
pub const LONG_SLEEP: Duration = Duration::from_secs(10);

/// Step size of the wait loop; flags raised by callbacks or signal handlers
/// are observed within one step.
pub const SHORT_SLEEP: Duration = Duration::from_millis(100);

/// Flags shared between the coordinator, the ZooKeeper callback threads and
/// the signal handlers.
///
/// Each flag is a plain boolean with single-writer-per-transition
/// semantics: callbacks and signal handlers only ever raise them, the
/// coordinator clears them at well-defined points. `shouldstop` only ever
/// transitions false to true and is the only flag a signal handler stores
/// to.
#[derive(Debug)]
pub struct Signals {
    /// The peer set may have changed; re-read the children.
    refresh: AtomicBool,
    /// The ephemeral registration must be redone.
    recreate: AtomicBool,
    /// Stop the main loop at the next checkpoint.
    shouldstop: Arc<AtomicBool>,
    /// Last observed session state, encoded via `SessionState as u8`.
    session: AtomicU8,
}

impl Signals {
    /// Create the shared handle. Both work flags start raised so the first
    /// cycle registers the ephemeral node and reads the peer set.
    pub fn new() -> Self {
        Self {
            refresh: AtomicBool::new(true),
            recreate: AtomicBool::new(true),
            shouldstop: Arc::new(AtomicBool::new(false)),
            session: AtomicU8::new(SessionState::Disconnected as u8),
        }
    }

    /// Request a peer-set re-read.
    pub fn trigger_refresh(&self) {
        self.refresh.store(true, Ordering::SeqCst);
    }

    /// Request a re-creation of the ephemeral registration.
    pub fn trigger_recreate(&self) {
        self.recreate.store(true, Ordering::SeqCst);
    }

    /// Request a graceful stop.
    pub fn trigger_stop(&self) {
        self.shouldstop.store(true, Ordering::SeqCst);
    }

    /// Whether a peer-set re-read is pending.
    pub fn refresh_requested(&self) -> bool {
        self.refresh.load(Ordering::SeqCst)
    }

    /// Whether an ephemeral re-registration is pending.
    pub fn recreate_requested(&self) -> bool {
        self.recreate.load(Ordering::SeqCst)
    }

    /// Whether a graceful stop was requested.
    pub fn stop_requested(&self) -> bool {
        self.shouldstop.load(Ordering::SeqCst)
    }

    /// Acknowledge a pending refresh.
    pub fn clear_refresh(&self) {
        self.refresh.store(false, Ordering::SeqCst);
    }

    /// Acknowledge a pending recreate.
    pub fn clear_recreate(&self) {
        self.recreate.store(false, Ordering::SeqCst);
    }

    /// The stop flag itself, for registration with the signal handlers.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.shouldstop.clone()
    }

    /// Record a new session state, returning the previous one.
    pub fn set_session(&self, state: SessionState) -> SessionState {
        SessionState::from_u8(self.session.swap(state as u8, Ordering::SeqCst))
    }

    /// The last observed session state.
    pub fn session(&self) -> SessionState {
        SessionState::from_u8(self.session.load(Ordering::SeqCst))
    }

    /// Sleep in [`SHORT_SLEEP`] steps until any flag is raised or
    /// [`LONG_SLEEP`] elapses. This bounds both the idle re-advertisement
    /// period and the latency from a raised flag to the next cycle.
    pub fn wait_for_work(&self) {
        let start = Instant::now();
        while !self.refresh_requested()
            && !self.recreate_requested()
            && !self.stop_requested()
            && start.elapsed() < LONG_SLEEP
        {
            std::thread::sleep(SHORT_SLEEP);
        }
    }
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}
