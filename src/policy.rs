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

//! The advertisement policy.
//!
//! The instance always announces its own prefix with the preferred metric.
//! Prefixes it is non-authoritative for are announced with a worse metric
//! only while their authoritative instance is absent from the peer set, so
//! traffic fails over automatically and moves back as soon as the peer
//! returns. An unhealthy or disabled instance withdraws everything: it is
//! safer to drop anycast traffic than to black-hole it.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::bgp::{BgpTable, Route};

/// MED for the prefix this instance is authoritative for.
pub const AUTH_METRIC: u32 = 100;

/// MED for prefixes covered on behalf of an absent peer.
pub const BACKUP_METRIC: u32 = 200;

/// Compute the route table for one cycle.
///
/// `peers` holds the basenames of the children currently registered under
/// the service path; an address in `non_auth_ips` is considered covered by
/// its authoritative instance iff its dotted form is present in `peers`.
pub fn decide(
    probe_ok: bool,
    maintenance: bool,
    auth_ip: Ipv4Addr,
    non_auth_ips: &[Ipv4Addr],
    peers: &HashSet<String>,
) -> BgpTable {
    let mut table = BgpTable::new();

    if !probe_ok || maintenance {
        log::info!("withdrawing all routes");
        for ip in non_auth_ips {
            table.del_route((*ip).into());
        }
        table.del_route(auth_ip.into());
        return table;
    }

    table.add_route(Route::host(auth_ip, AUTH_METRIC));
    for ip in non_auth_ips {
        if peers.contains(&ip.to_string()) {
            table.del_route((*ip).into());
        } else {
            table.add_route(Route::host(*ip, BACKUP_METRIC));
        }
    }
    table
}
