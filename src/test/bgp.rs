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

use std::collections::HashSet;
use std::net::Ipv4Addr;

use maplit::hashset;
use pretty_assertions::assert_eq;

use crate::bgp::{BgpSpeaker, BgpTable, Route};
use crate::policy::decide;

fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last)
}

fn non_auth_ips() -> Vec<Ipv4Addr> {
    vec![ip(2), ip(3)]
}

/// Render a table the way the speaker sees it.
fn render(table: &BgpTable) -> String {
    let mut speaker = BgpSpeaker::new(Vec::new());
    speaker.advertise(table).unwrap();
    String::from_utf8(speaker.into_inner()).unwrap()
}

#[test]
fn announce_line_format() {
    let mut table = BgpTable::new();
    table.add_route(Route::host(ip(1), 100));

    assert_eq!(
        render(&table),
        "announce route 10.0.0.1/32 next-hop self med 100\n"
    );
}

#[test]
fn withdraw_line_format() {
    let mut table = BgpTable::new();
    table.del_route(ip(2).into());

    assert_eq!(render(&table), "withdraw route 10.0.0.2/32\n");
}

#[test]
fn empty_table_emits_nothing() {
    assert_eq!(render(&BgpTable::new()), "");
}

#[test]
fn announce_group_precedes_withdraw_group() {
    let mut table = BgpTable::new();
    table.del_route(ip(2).into());
    table.add_route(Route::host(ip(1), 100));

    assert_eq!(
        render(&table),
        "announce route 10.0.0.1/32 next-hop self med 100\n\
         withdraw route 10.0.0.2/32\n"
    );
}

#[test]
fn healthy_alone_scenario() {
    let table = decide(true, false, ip(1), &non_auth_ips(), &HashSet::new());

    assert_eq!(
        render(&table),
        "announce route 10.0.0.1/32 next-hop self med 100\n\
         announce route 10.0.0.2/32 next-hop self med 200\n\
         announce route 10.0.0.3/32 next-hop self med 200\n"
    );
}

#[test]
fn peer_present_scenario() {
    let peers = hashset! {"10.0.0.2".to_string()};
    let table = decide(true, false, ip(1), &non_auth_ips(), &peers);

    assert_eq!(
        render(&table),
        "announce route 10.0.0.1/32 next-hop self med 100\n\
         announce route 10.0.0.3/32 next-hop self med 200\n\
         withdraw route 10.0.0.2/32\n"
    );
}

#[test]
fn maintenance_scenario() {
    let table = decide(true, true, ip(1), &non_auth_ips(), &HashSet::new());

    assert_eq!(
        render(&table),
        "withdraw route 10.0.0.2/32\n\
         withdraw route 10.0.0.3/32\n\
         withdraw route 10.0.0.1/32\n"
    );
}

#[test]
fn failed_probe_scenario_matches_maintenance() {
    let probe_failed = decide(false, false, ip(1), &non_auth_ips(), &HashSet::new());
    let maintenance = decide(true, true, ip(1), &non_auth_ips(), &HashSet::new());

    assert_eq!(render(&probe_failed), render(&maintenance));
}

#[test]
fn tables_are_rebuilt_not_mutated() {
    let empty = BgpTable::new();
    let table = decide(true, false, ip(1), &non_auth_ips(), &HashSet::new());
    assert_ne!(table, empty);
    assert_eq!(BgpTable::new(), empty);
}
