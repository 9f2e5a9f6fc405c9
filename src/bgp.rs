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

//! The BGP route table and the speaker protocol.
//!
//! A [`BgpTable`] collects the advertisement decision of one coordinator
//! cycle: the routes to announce, and the prefixes to withdraw. The
//! [`BgpSpeaker`] serializes a table to the line protocol that the upstream
//! speaker (ExaBGP) reads from our standard output:
//!
//! ```text
//! announce route <prefix>/32 next-hop self med <metric>
//! withdraw route <prefix>/32
//! ```
//!
//! Nothing else may ever be written to standard output; all diagnostics go
//! through the logger.

use std::io::Write;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

/// A single route announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// The host prefix to announce.
    pub prefix: Ipv4Net,
    /// The MED attached to the announcement. Lower is preferred.
    pub metric: u32,
}

impl Route {
    /// Create a host route (`/32`) for the given address.
    pub fn host(addr: Ipv4Addr, metric: u32) -> Self {
        Self {
            prefix: Ipv4Net::from(addr),
            metric,
        }
    }
}

/// The advertisement decision of one cycle.
///
/// A prefix appears in at most one of the two lists. The table is built by
/// the policy engine and handed to the [`BgpSpeaker`] unchanged; each cycle
/// constructs a fresh table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BgpTable {
    announce: Vec<Route>,
    withdraw: Vec<Ipv4Net>,
}

impl BgpTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route to the announce list.
    pub fn add_route(&mut self, route: Route) {
        log::debug!("adding BGP route: {}", route.prefix);
        self.announce.push(route);
    }

    /// Append a prefix to the withdraw list.
    pub fn del_route(&mut self, prefix: Ipv4Net) {
        log::debug!("deleting BGP route: {prefix}");
        self.withdraw.push(prefix);
    }

    /// The routes to announce, in insertion order.
    pub fn announced(&self) -> &[Route] {
        &self.announce
    }

    /// The prefixes to withdraw, in insertion order.
    pub fn withdrawn(&self) -> &[Ipv4Net] {
        &self.withdraw
    }
}

/// Writes route tables to the upstream BGP speaker.
#[derive(Debug)]
pub struct BgpSpeaker<W> {
    out: W,
}

impl<W: Write> BgpSpeaker<W> {
    /// Create a speaker writing to `out` (standard output in production).
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write all route updates of `table`, announcements first, flushing
    /// after each group. Write errors are fatal: the pipe to the speaker is
    /// the whole point of this process.
    pub fn advertise(&mut self, table: &BgpTable) -> std::io::Result<()> {
        log::info!("advertising routes");

        for route in table.announced() {
            writeln!(
                self.out,
                "announce route {} next-hop self med {}",
                route.prefix, route.metric
            )?;
        }
        self.out.flush()?;

        for prefix in table.withdrawn() {
            writeln!(self.out, "withdraw route {prefix}")?;
        }
        self.out.flush()
    }

    /// Consume the speaker and hand back the writer.
    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }
}
