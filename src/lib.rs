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

//! # ExaZK: Anycast health signalling for ExaBGP
//!
//! ExaZK runs next to a local service instance and next to an ExaBGP
//! process that reads route commands from our standard output. Each
//! instance of a service is authoritative for one anycast prefix and may
//! cover the prefixes of its peers. Three signals decide what this node
//! advertises: a local health check, the set of peer instances registered
//! under a ZooKeeper path, and a ZooKeeper maintenance marker.
//!
//! A healthy instance announces its own prefix with a preferred MED and
//! every uncovered peer prefix with a backup MED, so anycast traffic fails
//! over automatically and moves back when the peer returns. An unhealthy
//! instance, or one in maintenance, withdraws everything.
//!
//! ## Structure
//! The source code of this program is structured as follows:
//! - The module [`bgp`] holds the route table of one decision cycle and the
//!   speaker protocol emitter.
//! - The module [`policy`] maps the current inputs to a route table.
//! - The module [`check`] runs the local health probe under its timeout.
//! - The module [`zk`] owns the ZooKeeper session: state tracking, the
//!   ephemeral registration, the children watch and the maintenance marker.
//! - The module [`runtime`] contains the shared signal flags and the
//!   [`runtime::Coordinator`], the single thread that serializes all signal
//!   sources into advertisement decisions.
//! - The module [`config`] reads the command line and the YAML file, and
//!   [`logging`] routes diagnostics to the console or syslog.

pub mod bgp;
pub mod check;
pub mod config;
pub mod logging;
pub mod policy;
pub mod runtime;
pub mod zk;

#[cfg(test)]
mod test;

pub use config::Conf;
pub use runtime::{Coordinator, Signals};

use thiserror::Error;

/// Any error that aborts the agent.
#[derive(Debug, Error)]
pub enum ExaZkError {
    /// Loading or validating the configuration failed.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    /// The log backend could not be initialized.
    #[error("logging error: {0}")]
    Logging(#[from] logging::LoggingError),
    /// A ZooKeeper operation failed during startup.
    #[error("zookeeper error: {0:?}")]
    Zk(zookeeper::ZkError),
    /// An I/O error, most likely a broken pipe to the BGP speaker.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zookeeper::ZkError> for ExaZkError {
    fn from(e: zookeeper::ZkError) -> Self {
        Self::Zk(e)
    }
}
