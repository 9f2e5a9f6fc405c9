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

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::runtime::{Signals, SHORT_SLEEP};
use crate::zk::SessionState;

#[test]
fn first_cycle_has_work_pending() {
    let signals = Signals::new();

    assert!(signals.refresh_requested());
    assert!(signals.recreate_requested());
    assert!(!signals.stop_requested());
    assert_eq!(signals.session(), SessionState::Disconnected);
}

#[test]
fn flags_clear_and_retrigger() {
    let signals = Signals::new();

    signals.clear_refresh();
    signals.clear_recreate();
    assert!(!signals.refresh_requested());
    assert!(!signals.recreate_requested());

    signals.trigger_refresh();
    signals.trigger_recreate();
    assert!(signals.refresh_requested());
    assert!(signals.recreate_requested());
}

#[test]
fn set_session_returns_previous_state() {
    let signals = Signals::new();

    assert_eq!(
        signals.set_session(SessionState::Connected),
        SessionState::Disconnected
    );
    assert_eq!(
        signals.set_session(SessionState::Suspended),
        SessionState::Connected
    );
    assert_eq!(signals.session(), SessionState::Suspended);
}

#[test]
fn stop_flag_is_shared_with_signal_handlers() {
    let signals = Signals::new();
    let flag = signals.stop_flag();

    // what a signal handler does: a single store
    flag.store(true, Ordering::SeqCst);
    assert!(signals.stop_requested());
}

#[test]
fn wait_returns_immediately_with_pending_work() {
    let signals = Signals::new();

    let start = Instant::now();
    signals.wait_for_work();
    assert!(start.elapsed() < SHORT_SLEEP);
}

#[test]
fn wait_wakes_up_shortly_after_a_flag_is_raised() {
    let signals = Arc::new(Signals::new());
    signals.clear_refresh();
    signals.clear_recreate();

    let raiser = signals.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(250));
        raiser.trigger_refresh();
    });

    let start = Instant::now();
    signals.wait_for_work();
    let elapsed = start.elapsed();

    handle.join().unwrap();
    assert!(elapsed >= Duration::from_millis(250));
    // woken within a few short sleeps, not after the long sleep
    assert!(elapsed < Duration::from_millis(250) + 5 * SHORT_SLEEP);
}

#[test]
fn stop_request_wakes_the_wait() {
    let signals = Arc::new(Signals::new());
    signals.clear_refresh();
    signals.clear_recreate();

    let raiser = signals.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        raiser.trigger_stop();
    });

    let start = Instant::now();
    signals.wait_for_work();

    handle.join().unwrap();
    assert!(signals.stop_requested());
    assert!(start.elapsed() < Duration::from_secs(1));
}
