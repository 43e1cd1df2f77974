use std::net::Ipv4Addr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("`{0}` is not a valid IPv4 address")]
    InvalidAddressFormat(String),
    #[error("start address `{start}` is greater than end address `{end}`")]
    InvalidRange { start: Ipv4Addr, end: Ipv4Addr },
    #[error("port `{0}` is invalid")]
    InvalidPort(String),
    #[error("timeout `{0}` is invalid (expected a positive number of seconds)")]
    InvalidTimeout(String),
    #[error("worker count `{0}` is invalid (expected a positive integer)")]
    InvalidWorkerCount(String),
    #[error("you must run the scanner as sudo to use raw ICMP sockets")]
    NormalUserRequired,
    #[error("failed to build worker pool: {0}")]
    WorkerPoolFailed(#[source] rayon::ThreadPoolBuildError),
    #[error("failed to write results to `{path}`: {source}")]
    OutputWriteFailure {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Reason a single probe did not get a positive answer.
///
/// These never leave the scanner: they are folded into `false` in the
/// host report and only show up in debug logs.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    #[error("timed out")]
    Timeout,
    #[error("refused")]
    Refused,
    #[error("unreachable")]
    Unreachable,
    #[error("cancelled")]
    Cancelled,
}
