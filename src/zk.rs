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

//! ZooKeeper session handling.
//!
//! [`ZkSession`] owns the client connection and everything that touches it:
//! the session-state listener, the ephemeral registration under the service
//! path, the children watch over the peer set, and the maintenance marker
//! lookup. The client library runs its own I/O and dispatch threads;
//! callbacks running on those threads never touch the route table — they
//! only raise flags on the shared [`Signals`] handle, and the coordinator
//! picks them up on its next cycle.

use std::sync::Arc;
use std::time::Duration;

use zookeeper::{
    Acl, CreateMode, KeeperState, WatchedEvent, WatchedEventType, Watcher, ZkError, ZkState,
    ZooKeeper, ZooKeeperExt,
};

use crate::runtime::Signals;

/// Interval between re-checks while waiting for a stale ghost to expire.
const GHOST_RETRY: Duration = Duration::from_secs(1);

/// The coordinator's view of the ZooKeeper session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Initial state, before the first notification, and after close.
    Disconnected = 0,
    /// The session is alive and operations succeed.
    Connected = 1,
    /// The transport is broken; the session may still recover, and the
    /// ephemeral nodes it owns are still valid if it does.
    Suspended = 2,
    /// The session expired; every ephemeral node it owned is gone.
    Lost = 3,
}

impl SessionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connected,
            2 => Self::Suspended,
            3 => Self::Lost,
            _ => Self::Disconnected,
        }
    }
}

/// Default watcher of the connection. It receives session events and the
/// armed child watches from the client's dispatch thread.
pub(crate) struct ConnWatcher {
    pub(crate) signals: Arc<Signals>,
}

impl Watcher for ConnWatcher {
    fn handle(&self, event: WatchedEvent) {
        log::debug!("zk event: {event:?}");

        if matches!(event.keeper_state, KeeperState::Expired) {
            log::error!("zk session expired, have to re-create my ephemeral node");
            self.signals.set_session(SessionState::Lost);
            self.signals.trigger_recreate();
        }

        if matches!(event.event_type, WatchedEventType::NodeChildrenChanged) {
            self.signals.trigger_refresh();
        }
    }
}

/// The agent's handle on its ZooKeeper session.
pub struct ZkSession {
    zk: ZooKeeper,
    signals: Arc<Signals>,
}

impl ZkSession {
    /// Connect to the ensemble and install the state listener. `hosts` is a
    /// comma-separated `host:port` list; `timeout` is the requested session
    /// timeout. Failing to connect is fatal for the caller.
    pub fn connect(
        hosts: &str,
        timeout: Duration,
        signals: Arc<Signals>,
    ) -> Result<Self, ZkError> {
        let zk = ZooKeeper::connect(
            hosts,
            timeout,
            ConnWatcher {
                signals: signals.clone(),
            },
        )?;

        let listener_signals = signals.clone();
        zk.add_listener(move |state| Self::on_transition(&listener_signals, state));

        Ok(Self { zk, signals })
    }

    /// Translate a client state notification into a [`SessionState`] and
    /// apply its flag side effects: entering `Connected` forces a peer-set
    /// re-read (watch edges may have been lost while away), and `Lost`
    /// schedules the ephemeral node for re-creation.
    pub(crate) fn on_transition(signals: &Signals, state: ZkState) {
        log::info!("zk state changed to {state:?}");

        let new = match state {
            ZkState::Connected | ZkState::ConnectedReadOnly => SessionState::Connected,
            ZkState::Closed | ZkState::AuthFailed => SessionState::Lost,
            _ => SessionState::Suspended,
        };
        let prev = signals.set_session(new);

        match new {
            SessionState::Connected if prev != SessionState::Connected => {
                signals.trigger_refresh();
            }
            SessionState::Lost if prev != SessionState::Lost => {
                log::error!("zk lost, have to re-create ephemeral node");
                signals.trigger_recreate();
            }
            _ => {}
        }
    }

    /// Make sure the service parent path exists.
    pub fn ensure_service_path(&self, path: &str) -> Result<(), ZkError> {
        self.zk.ensure_path(path)
    }

    /// Block until no node exists at `node`, re-checking every second.
    ///
    /// A pre-existing node at our registration path is a ghost of a prior
    /// session the server has not yet expired. Deleting it would race with
    /// the expiry, so we only wait. The loop also gives up when a stop was
    /// requested, so signals keep working during startup.
    pub fn wait_out_ghost(&self, node: &str) -> Result<(), ZkError> {
        while !self.signals.stop_requested() && self.zk.exists(node, false)?.is_some() {
            log::warn!("stale node found, sleeping(1)...");
            std::thread::sleep(GHOST_RETRY);
        }
        Ok(())
    }

    /// (Re-)create the ephemeral registration node at `node`.
    ///
    /// Clears the recreate flag up front and re-raises it on every failure
    /// path, so the coordinator retries on its next cycle. An existing node
    /// is a ghost the server has not reaped yet; it is never deleted.
    pub fn register(&self, node: &str) {
        self.signals.clear_recreate();
        log::info!("re-creating my ephemeral node");

        match self
            .zk
            .create(node, Vec::new(), Acl::open_unsafe().clone(), CreateMode::Ephemeral)
        {
            Ok(_) => {}
            Err(ZkError::SessionExpired) => {
                self.signals.trigger_recreate();
            }
            Err(ZkError::NodeExists) => {
                log::warn!("ephemeral node {node} already exists, waiting for it to expire");
                self.signals.trigger_recreate();
            }
            Err(e) => {
                log::error!("cannot create ephemeral node {node}: {e:?}");
                self.signals.trigger_recreate();
            }
        }
    }

    /// Read the current children of the service path. Every read re-arms
    /// the edge-triggered child watch, so it is also the subscription for
    /// the next change notification.
    pub fn children(&self, path: &str) -> Result<Vec<String>, ZkError> {
        self.zk.get_children(path, true)
    }

    /// `true` iff the maintenance marker exists. Errors read as "no
    /// maintenance": session loss is handled by the coordinator separately,
    /// and maintenance must not latch on a lost session.
    pub fn maintenance_engaged(&self, path: &str) -> bool {
        match self.zk.exists(path, false) {
            Ok(Some(_)) => {
                log::warn!("maintenance mode engaged ...");
                true
            }
            Ok(None) => false,
            Err(ZkError::SessionExpired) => false,
            Err(e) => {
                log::error!("cannot check maintenance path {path}: {e:?}");
                false
            }
        }
    }

    /// Close the session. The server reaps our ephemeral node, and the
    /// peers react to the resulting children change.
    pub fn close(&self) -> Result<(), ZkError> {
        self.zk.close()
    }
}
