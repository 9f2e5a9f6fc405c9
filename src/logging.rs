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

//! Log routing.
//!
//! Everything in the agent logs through the [`log`] facade; this module
//! only picks the backend. With `--debug`, messages go to the console with
//! timestamps and syslog is disabled. Otherwise they go to the platform
//! syslog socket under the configured facility, duplicated to stderr while
//! stderr is a terminal and `--silent` is not given. Standard output is
//! never touched; it belongs to the BGP speaker.

use std::io::IsTerminal;
use std::sync::OnceLock;

use flexi_logger::writers::{SyslogConnection, SyslogFacility, SyslogLineHeader, SyslogWriter};
use flexi_logger::{DeferredNow, Duplicate, Logger, LoggerHandle};
use itertools::Itertools;
use log::Record;
use thiserror::Error;

/// Errors while setting up the log backend. Fatal at startup.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The logger could not be initialized.
    #[error("cannot initialize logger: {0}")]
    Backend(#[from] flexi_logger::FlexiLoggerError),
    /// The syslog socket could not be opened.
    #[error("cannot set up syslog: {0}")]
    Syslog(String),
    /// The configured facility name is not known.
    #[error("unknown syslog facility `{0}`, expected one of {1}")]
    UnknownFacility(String, String),
}

/// Facility names accepted by `--syslog-facility`.
const FACILITY_NAMES: &[&str] = &[
    "auth", "authpriv", "cron", "daemon", "ftp", "kern", "lpr", "mail", "news", "syslog", "user",
    "uucp", "local0", "local1", "local2", "local3", "local4", "local5", "local6", "local7",
];

/// Service name shown in the log prefix, set once at startup.
static SRV_NAME: OnceLock<String> = OnceLock::new();

/// Initialize the global logger for the given mode. Returns a handle that
/// must stay alive for the lifetime of the process; dropping it shuts the
/// logger down.
pub fn setup(
    debug: bool,
    silent: bool,
    syslog: bool,
    facility: &str,
    srv_name: &str,
) -> Result<Option<LoggerHandle>, LoggingError> {
    let _ = SRV_NAME.set(srv_name.to_string());

    // debug is for interactive runs: everything on the console, no syslog
    if debug {
        pretty_env_logger::formatted_timed_builder()
            .filter_level(log::LevelFilter::Debug)
            .init();
        return Ok(None);
    }

    let to_console = !silent && std::io::stderr().is_terminal();
    let logger = Logger::try_with_env_or_str("info")?.format(prefixed_format);

    let handle = match (syslog, to_console) {
        (true, duplicate) => logger
            .log_to_writer(syslog_writer(facility)?)
            .duplicate_to_stderr(if duplicate {
                Duplicate::All
            } else {
                Duplicate::None
            })
            .start()?,
        (false, true) => logger.log_to_stderr().start()?,
        (false, false) => logger.do_not_log().start()?,
    };
    Ok(Some(handle))
}

/// Build the syslog writer for the platform socket and the configured
/// facility.
fn syslog_writer(facility: &str) -> Result<Box<SyslogWriter>, LoggingError> {
    let facility = parse_facility(facility)?;
    let connection = SyslogConnection::try_datagram(syslog_socket())
        .map_err(|e| LoggingError::Syslog(e.to_string()))?;
    SyslogWriter::builder(connection, SyslogLineHeader::Rfc3164, facility)
        .max_log_level(log::LevelFilter::Info)
        .build()
        .map_err(|e| LoggingError::Syslog(e.to_string()))
}

/// Map a facility name to the writer's facility.
fn parse_facility(name: &str) -> Result<SyslogFacility, LoggingError> {
    Ok(match name {
        "auth" => SyslogFacility::Authorization,
        "authpriv" => SyslogFacility::Authorization2,
        "cron" => SyslogFacility::Clock,
        "daemon" => SyslogFacility::SystemDaemons,
        "ftp" => SyslogFacility::Ftp,
        "kern" => SyslogFacility::Kernel,
        "lpr" => SyslogFacility::LinePrinter,
        "mail" => SyslogFacility::MailSystem,
        "news" => SyslogFacility::News,
        "syslog" => SyslogFacility::SyslogD,
        "user" => SyslogFacility::UserLevel,
        "uucp" => SyslogFacility::Uucp,
        "local0" => SyslogFacility::LocalUse0,
        "local1" => SyslogFacility::LocalUse1,
        "local2" => SyslogFacility::LocalUse2,
        "local3" => SyslogFacility::LocalUse3,
        "local4" => SyslogFacility::LocalUse4,
        "local5" => SyslogFacility::LocalUse5,
        "local6" => SyslogFacility::LocalUse6,
        "local7" => SyslogFacility::LocalUse7,
        _ => {
            return Err(LoggingError::UnknownFacility(
                name.to_string(),
                FACILITY_NAMES.iter().join(", "),
            ))
        }
    })
}

/// Path of the syslog datagram socket on this platform.
fn syslog_socket() -> &'static str {
    if cfg!(target_os = "macos") {
        "/var/run/syslog"
    } else if cfg!(target_os = "freebsd") {
        "/var/run/log"
    } else {
        "/dev/log"
    }
}

/// Line format carrying the service name, like `exazk-dns[421]: ...`.
fn prefixed_format(
    w: &mut dyn std::io::Write,
    _now: &mut DeferredNow,
    record: &Record<'_>,
) -> std::io::Result<()> {
    write!(
        w,
        "exazk-{}[{}]: {}: {}: {}",
        SRV_NAME.get().map(String::as_str).unwrap_or("?"),
        std::process::id(),
        record.level(),
        record.target(),
        record.args()
    )
}
