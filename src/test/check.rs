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

use std::time::{Duration, Instant};

use crate::check::{LocalCheck, CHECK_TIMEOUT};

#[test]
fn exit_zero_is_healthy() {
    assert!(LocalCheck::new("true").check());
}

#[test]
fn exit_nonzero_is_unhealthy() {
    assert!(!LocalCheck::new("false").check());
    assert!(!LocalCheck::new("exit 3").check());
}

#[test]
fn missing_binary_is_unhealthy() {
    assert!(!LocalCheck::new("/nonexistent/exazk-check-binary").check());
}

#[test]
fn pipelines_are_supported() {
    // the check runs under a shell, so shell syntax must work
    assert!(LocalCheck::new("echo ok | grep -q ok").check());
}

#[test]
fn output_is_discarded() {
    // a chatty check must not pollute the speaker protocol on stdout
    assert!(LocalCheck::new("echo noise; echo more >&2").check());
}

#[test]
fn overlong_check_is_killed_and_unhealthy() {
    let check = LocalCheck::new("sleep 5");
    let start = Instant::now();

    assert!(!check.check());

    let elapsed = start.elapsed();
    assert!(elapsed >= CHECK_TIMEOUT, "returned before the deadline");
    assert!(
        elapsed < CHECK_TIMEOUT + Duration::from_millis(500),
        "took {elapsed:?}, the check was not killed at the deadline"
    );
}

#[test]
fn whole_process_group_dies_with_the_check() {
    // the grandchild would keep the group alive for 5s if it survived
    let check = LocalCheck::new("sleep 5 & wait");
    let start = Instant::now();

    assert!(!check.check());
    assert!(start.elapsed() < CHECK_TIMEOUT + Duration::from_millis(500));
}
