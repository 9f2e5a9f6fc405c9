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

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};

use exazk::bgp::BgpSpeaker;
use exazk::config::{Conf, ConfigError};
use exazk::zk::ZkSession;
use exazk::{logging, Coordinator, ExaZkError, Signals};

/// Session timeout requested from the ZooKeeper ensemble. Connecting also
/// gives up after this long.
const SESSION_TIMEOUT: Duration = Duration::from_secs(15);

/// Advertise anycast routes to an ExaBGP speaker based on a local health
/// check and ZooKeeper peer state.
#[derive(Debug, Parser)]
struct Cli {
    /// Read configuration from FILE. Will cancel any cmdline option.
    #[clap(long = "config", short = 'f', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debugging, disable syslog logging.
    #[clap(long, short = 'd')]
    debug: bool,
    /// Don't log to console.
    #[clap(long, short = 's')]
    silent: bool,
    /// Disable syslog logging.
    #[clap(long = "no-syslog")]
    no_syslog: bool,
    /// Log to syslog using FACILITY.
    #[clap(long = "syslog-facility", value_name = "FACILITY", default_value = "daemon")]
    syslog_facility: String,

    /// One of the ZooKeeper HOSTs to connect to (repeatable).
    #[clap(long = "zk-host", value_name = "HOST")]
    zk_host: Vec<String>,
    /// The ZKKEY path where this instance should register if it's alive.
    #[clap(long = "zk-path-service", value_name = "ZKKEY")]
    zk_path_service: Option<String>,
    /// If ZKKEY exists, the service is considered disabled.
    #[clap(long = "zk-path-maintenance", value_name = "ZKKEY")]
    zk_path_maintenance: Option<String>,

    /// Command to use for the local check of the service.
    #[clap(long = "local-check", short = 'c', value_name = "CMD")]
    local_check: Option<String>,

    /// The service NAME of this instance.
    #[clap(long = "name", short = 'n', value_name = "NAME")]
    name: Option<String>,
    /// The IP this instance is authoritative for.
    #[clap(long = "auth-ip", short = 'A', value_name = "IP")]
    auth_ip: Option<Ipv4Addr>,
    /// One of the IPs this instance is non-authoritative for (repeatable).
    #[clap(long = "non-auth-ip", short = 'N', value_name = "IP")]
    non_auth_ip: Vec<Ipv4Addr>,
}

/// Build the configuration from the command line when no file is given.
fn conf_from_cli(cli: Cli) -> Result<Conf, ConfigError> {
    let conf = Conf {
        zk_hosts: cli.zk_host,
        zk_path_service: cli
            .zk_path_service
            .ok_or(ConfigError::Missing("--zk-path-service"))?,
        zk_path_maintenance: cli
            .zk_path_maintenance
            .ok_or(ConfigError::Missing("--zk-path-maintenance"))?,
        local_check: cli
            .local_check
            .ok_or(ConfigError::Missing("--local-check"))?,
        srv_name: cli.name.ok_or(ConfigError::Missing("--name"))?,
        srv_auth_ip: cli.auth_ip.ok_or(ConfigError::Missing("--auth-ip"))?,
        srv_non_auth_ips: cli.non_auth_ip,
        debug: cli.debug,
        silent: cli.silent,
        syslog: !cli.no_syslog,
        syslog_facility: cli.syslog_facility,
    };
    conf.validate()?;
    Ok(conf)
}

/// Connect, set up the coordinator and run it until a stop is requested.
fn run(conf: Conf) -> Result<(), ExaZkError> {
    let signals = Arc::new(Signals::new());
    signal_hook::flag::register(SIGINT, signals.stop_flag())?;
    signal_hook::flag::register(SIGTERM, signals.stop_flag())?;

    let zk = match ZkSession::connect(&conf.zk_connect_string(), SESSION_TIMEOUT, signals.clone())
    {
        Ok(zk) => zk,
        Err(e) => {
            log::error!("can't connect to zk, aborting...");
            return Err(e.into());
        }
    };

    let speaker = BgpSpeaker::new(std::io::stdout());
    let mut coordinator = Coordinator::new(conf, zk, signals, speaker);
    coordinator.init()?;
    coordinator.run()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let conf = match cli.config.clone() {
        Some(file) => Conf::from_yaml_file(file),
        None => conf_from_cli(cli),
    };
    let conf = match conf {
        Ok(conf) => conf,
        Err(e) => {
            eprintln!("exazk: {e}");
            std::process::exit(1);
        }
    };

    // the handle keeps the logger alive until the process exits
    let _logger = match logging::setup(
        conf.debug,
        conf.silent,
        conf.syslog,
        &conf.syslog_facility,
        &conf.srv_name,
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("exazk: {e}");
            std::process::exit(1);
        }
    };

    log::warn!("ExaZK starting...");
    log::debug!("debug is active");

    if let Err(e) = run(conf) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
