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

//! The main loop: drives registration, probes and advertisement.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use crate::bgp::{BgpSpeaker, BgpTable};
use crate::check::LocalCheck;
use crate::config::Conf;
use crate::policy;
use crate::runtime::Signals;
use crate::zk::{SessionState, ZkSession};

use zookeeper::ZkError;

/// Lifecycle of the coordinator, visible through the debug log.
#[derive(Debug, Clone, Copy)]
enum Stage {
    /// Setting up: paths ensured, ghost waited out, watch armed.
    Init,
    /// Cycling in the main loop.
    Running,
    /// Tearing down the session.
    Stopping,
    /// Done; the process exits.
    Stopped,
}

/// The coordinator serializes every signal source into a single stream of
/// advertisement decisions.
///
/// One cycle waits for work (or the idle period), re-registers the
/// ephemeral node if needed, probes the local service and the maintenance
/// marker, computes a fresh route table when it is safe to do so, and hands
/// the table to the speaker. All mutable state — the route table and the
/// cached peer set — is owned here and touched by no other thread.
pub struct Coordinator<W> {
    conf: Conf,
    zk: ZkSession,
    signals: Arc<Signals>,
    speaker: BgpSpeaker<W>,
    check: LocalCheck,
    table: BgpTable,
    peers: HashSet<String>,
    stage: Stage,
}

impl<W: Write> Coordinator<W> {
    /// Create the coordinator. The session must already be connected; the
    /// flags in `signals` start raised so the first cycle does a full
    /// register-and-refresh pass.
    pub fn new(conf: Conf, zk: ZkSession, signals: Arc<Signals>, speaker: BgpSpeaker<W>) -> Self {
        let check = LocalCheck::new(&conf.local_check);
        Self {
            conf,
            zk,
            signals,
            speaker,
            check,
            table: BgpTable::new(),
            peers: HashSet::new(),
            stage: Stage::Init,
        }
    }

    /// Record a stage transition in the debug log.
    fn enter(&mut self, stage: Stage) {
        log::debug!("coordinator stage {:?} -> {stage:?}", self.stage);
        self.stage = stage;
    }

    /// Set up the ZooKeeper side: ensure the service path, wait out a stale
    /// ghost of our own registration, and arm the children watch. Errors
    /// here are startup failures and fatal.
    pub fn init(&mut self) -> Result<(), ZkError> {
        self.zk.ensure_service_path(&self.conf.zk_path_service)?;
        self.zk.wait_out_ghost(&self.conf.registration_node())?;
        self.zk.children(&self.conf.zk_path_service)?;
        Ok(())
    }

    /// Run the main loop until a stop is requested, then close the session.
    /// Only a broken pipe to the speaker aborts the loop.
    pub fn run(&mut self) -> std::io::Result<()> {
        self.enter(Stage::Running);

        loop {
            self.signals.wait_for_work();

            if self.signals.stop_requested() {
                log::warn!("stop requested, preparing to stop");
                break;
            }

            self.cycle()?;
        }

        self.stop();
        Ok(())
    }

    /// One decision cycle, steps 3 to 8 of the running state.
    fn cycle(&mut self) -> std::io::Result<()> {
        if self.signals.recreate_requested() {
            self.zk.register(&self.conf.registration_node());
        }

        let probe_ok = self.check.check();
        let maintenance = self.zk.maintenance_engaged(&self.conf.zk_path_maintenance);

        if !probe_ok || maintenance {
            self.table = policy::decide(
                probe_ok,
                maintenance,
                self.conf.srv_auth_ip,
                &self.conf.srv_non_auth_ips,
                &self.peers,
            );
        } else if self.signals.session() == SessionState::Connected {
            self.refresh_peers();
        }
        // otherwise the session is away; the most recent decision stands.

        self.speaker.advertise(&self.table)
    }

    /// Re-read the peer set and recompute the table from it. The read also
    /// re-arms the child watch and doubles as registration reconciliation:
    /// if our own node is missing, the session that owned it is gone and
    /// the registration is scheduled again.
    fn refresh_peers(&mut self) {
        log::info!("refreshing children & routes");

        match self.zk.children(&self.conf.zk_path_service) {
            Ok(children) => {
                self.signals.clear_refresh();
                log::debug!("zk children are {children:?}");

                let own = self.conf.srv_auth_ip.to_string();
                if !children.iter().any(|c| *c == own) {
                    self.signals.trigger_recreate();
                }

                self.peers = children.into_iter().collect();
                self.table = policy::decide(
                    true,
                    false,
                    self.conf.srv_auth_ip,
                    &self.conf.srv_non_auth_ips,
                    &self.peers,
                );
            }
            Err(e) => {
                // retried next cycle; the previous table stands until then
                log::warn!("cannot refresh children: {e:?}");
                self.signals.trigger_refresh();
            }
        }
    }

    /// Close the session. Cleanup errors are logged and swallowed; no final
    /// withdraw is emitted, the peers learn of our death through ZooKeeper.
    fn stop(&mut self) {
        self.enter(Stage::Stopping);

        match self.zk.close() {
            Ok(()) => log::info!("ExaZK stopped"),
            Err(e) => log::error!("did my best but something went wrong while stopping: {e:?}"),
        }

        self.enter(Stage::Stopped);
    }
}
