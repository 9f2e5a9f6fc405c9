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

//! This module contains the code for reading the configuration.
//!
//! The agent is configured either entirely from the command line or
//! entirely from a YAML file (`--config`); when a file is given it cancels
//! every other option. The file is a mapping with the keys of [`Conf`];
//! unknown keys are rejected.

use std::net::Ipv4Addr;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors while loading or validating the configuration. All of them are
/// fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file cannot be read.
    #[error("cannot read config file: {0}")]
    Read(#[from] std::io::Error),
    /// The config file is not valid YAML or contains unknown keys.
    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// A required option is missing on the command line.
    #[error("missing required option {0}")]
    Missing(&'static str),
    /// No ZooKeeper host was given.
    #[error("at least one ZooKeeper host is required")]
    NoZkHost,
    /// The authoritative IP is listed as non-authoritative as well.
    #[error("authoritative IP {0} must not appear in the non-authoritative set")]
    AuthIpInNonAuth(Ipv4Addr),
}

/// The full agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Conf {
    /// ZooKeeper ensemble hosts, each `host:port`.
    pub zk_hosts: Vec<String>,
    /// Parent path under which the live instances register.
    pub zk_path_service: String,
    /// Path whose existence means this instance is disabled.
    pub zk_path_maintenance: String,
    /// Shell command probing the local service.
    pub local_check: String,
    /// Service name of this instance, used in the log prefix.
    pub srv_name: String,
    /// The IP this instance is authoritative for.
    pub srv_auth_ip: Ipv4Addr,
    /// The IPs this instance covers while their authoritative instance is
    /// absent, in advertisement order.
    pub srv_non_auth_ips: Vec<Ipv4Addr>,
    /// Verbose console logging, disables syslog.
    #[serde(default)]
    pub debug: bool,
    /// Do not log to the console.
    #[serde(default)]
    pub silent: bool,
    /// Log to syslog.
    #[serde(default = "default_syslog")]
    pub syslog: bool,
    /// Syslog facility to log with.
    #[serde(default = "default_syslog_facility")]
    pub syslog_facility: String,
}

fn default_syslog() -> bool {
    true
}

fn default_syslog_facility() -> String {
    "daemon".to_string()
}

impl Conf {
    /// Read and validate the configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        log::debug!("creating from YAML");
        let raw = std::fs::read_to_string(path)?;
        let conf: Self = serde_yaml::from_str(&raw)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Check the cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zk_hosts.is_empty() {
            return Err(ConfigError::NoZkHost);
        }
        if self.srv_non_auth_ips.contains(&self.srv_auth_ip) {
            return Err(ConfigError::AuthIpInNonAuth(self.srv_auth_ip));
        }
        Ok(())
    }

    /// The connect string for the client: hosts joined with commas.
    pub fn zk_connect_string(&self) -> String {
        self.zk_hosts.join(",")
    }

    /// Path of this instance's ephemeral registration node.
    pub fn registration_node(&self) -> String {
        format!("{}/{}", self.zk_path_service, self.srv_auth_ip)
    }
}
