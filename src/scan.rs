use std::{
    collections::{BTreeMap, HashSet},
    fmt::{Debug, Display},
    iter,
    net::{Ipv4Addr, SocketAddrV4},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

use rayon::{
    iter::{ParallelBridge, ParallelIterator},
    ThreadPool, ThreadPoolBuilder,
};

use crate::{
    error::{ProbeError, ScanError},
    range::Ipv4Range,
};

pub mod method;
mod pckt;

pub const DEFAULT_PORTS: [u16; 5] = [22, 23, 80, 443, 9443];
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_WORKERS: usize = 20;

/// Checks whether a host answers at all.
pub trait Reachability: Debug + Sync {
    fn probe(&self, ip: Ipv4Addr, timeout: Duration) -> Result<(), ProbeError>;
}

/// Checks whether a TCP port accepts connections.
pub trait PortProbe: Debug + Sync {
    fn probe(&self, addr: &SocketAddrV4, timeout: Duration) -> Result<(), ProbeError>;
}

/// What a single probe is aimed at. No port means an ICMP probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeTarget {
    pub ip: Ipv4Addr,
    pub port: Option<u16>,
}

impl ProbeTarget {
    #[inline]
    pub fn icmp(ip: Ipv4Addr) -> Self {
        Self { ip, port: None }
    }

    #[inline]
    pub fn tcp(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            ip,
            port: Some(port),
        }
    }
}

impl Display for ProbeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.ip, port),
            None => write!(f, "{} (icmp)", self.ip),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub target: ProbeTarget,
    pub outcome: bool,
    pub failure: Option<ProbeError>,
}

impl ProbeResult {
    fn new(target: ProbeTarget, outcome: Result<(), ProbeError>) -> Self {
        Self {
            target,
            outcome: outcome.is_ok(),
            failure: outcome.err(),
        }
    }
}

/// One row of the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReport {
    pub ip: Ipv4Addr,
    pub icmp: bool,
    ports: Vec<(u16, bool)>,
}

impl HostReport {
    pub fn new(ip: Ipv4Addr, ports: &[u16]) -> Self {
        Self {
            ip,
            icmp: false,
            ports: ports.iter().map(|&p| (p, false)).collect(),
        }
    }

    /// Port states in configured order.
    #[inline]
    pub fn ports(&self) -> &[(u16, bool)] {
        &self.ports
    }

    pub fn port(&self, port: u16) -> Option<bool> {
        self.ports
            .iter()
            .find_map(|&(p, open)| (p == port).then_some(open))
    }

    pub fn open_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports
            .iter()
            .filter_map(|&(p, open)| open.then_some(p))
    }

    pub fn is_responsive(&self) -> bool {
        self.icmp || self.ports.iter().any(|&(_, open)| open)
    }

    fn record(&mut self, result: &ProbeResult) {
        match result.target.port {
            None => self.icmp = result.outcome,
            Some(port) => {
                if let Some(slot) = self.ports.iter_mut().find(|(p, _)| *p == port) {
                    slot.1 = result.outcome;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct ScanResult {
    pub elapsed: Duration,
    pub hosts: Vec<HostReport>,
}

impl ScanResult {
    #[inline]
    fn new(elapsed: Duration, hosts: Vec<HostReport>) -> Self {
        Self { elapsed, hosts }
    }
}

/// Shared flag that stops a running scan from dispatching new probes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub ports: Vec<u16>,
    pub timeout: Duration,
    pub workers: usize,
    /// Stop dispatching probes once the scan has been running this long.
    pub deadline: Option<Duration>,
    /// Log every probe attempt and its outcome.
    pub verbose: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            timeout: DEFAULT_TIMEOUT,
            workers: DEFAULT_WORKERS,
            deadline: None,
            verbose: false,
        }
    }
}

impl ScanConfig {
    fn validate(mut self) -> Result<Self, ScanError> {
        if self.workers == 0 {
            return Err(ScanError::InvalidWorkerCount(self.workers.to_string()));
        }
        if self.timeout.is_zero() {
            return Err(ScanError::InvalidTimeout(format!(
                "{}",
                self.timeout.as_secs_f64()
            )));
        }
        if self.ports.contains(&0) {
            return Err(ScanError::InvalidPort("0".into()));
        }

        let mut seen = HashSet::new();
        self.ports.retain(|p| seen.insert(*p));

        Ok(self)
    }

    #[inline]
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }
}

struct HostState {
    report: HostReport,
    pending: usize,
}

/// Collects probe results into per-host rows, keyed by address.
struct Aggregator<'a> {
    ports: &'a [u16],
    hosts: Mutex<BTreeMap<Ipv4Addr, HostState>>,
}

impl<'a> Aggregator<'a> {
    fn new(ports: &'a [u16]) -> Self {
        Self {
            ports,
            hosts: Mutex::new(BTreeMap::new()),
        }
    }

    fn record(&self, result: ProbeResult) {
        let ip = result.target.ip;
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        let state = hosts.entry(ip).or_insert_with(|| HostState {
            report: HostReport::new(ip, self.ports),
            pending: self.ports.len() + 1,
        });

        state.report.record(&result);
        state.pending = state.pending.saturating_sub(1);

        if state.pending == 0 {
            log_finished(&state.report);
        }
    }

    /// Hands out one row per address of `range`, in ascending order.
    fn finish(self, range: &Ipv4Range) -> Vec<HostReport> {
        let mut hosts = self
            .hosts
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        range
            .iter()
            .map(|ip| match hosts.remove(&ip) {
                Some(state) => state.report,
                None => HostReport::new(ip, self.ports),
            })
            .collect()
    }
}

fn log_finished(report: &HostReport) {
    let ports = report
        .ports()
        .iter()
        .map(|(p, open)| format!("{}:{}", p, if *open { "open" } else { "closed" }))
        .collect::<Vec<_>>()
        .join(", ");

    log::info!(
        "Finished {} | ICMP: {} | TCP: {}",
        report.ip,
        if report.icmp { "reachable" } else { "no reply" },
        if ports.is_empty() { "-" } else { ports.as_str() },
    );
}

pub struct Scanner<'a> {
    icmp: &'a dyn Reachability,
    tcp: &'a dyn PortProbe,
    config: ScanConfig,
    pool: ThreadPool,
}

impl<'a> Scanner<'a> {
    pub fn new(
        icmp: &'a dyn Reachability,
        tcp: &'a dyn PortProbe,
        config: ScanConfig,
    ) -> Result<Self, ScanError> {
        let config = config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("probe-{}", i))
            .build()
            .map_err(ScanError::WorkerPoolFailed)?;

        Ok(Self {
            icmp,
            tcp,
            config,
            pool,
        })
    }

    #[inline]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn expired(&self, started: Instant, cancel: &CancelToken) -> bool {
        cancel.is_cancelled()
            || self
                .config
                .deadline
                .is_some_and(|deadline| started.elapsed() >= deadline)
    }

    fn scan_target(&self, target: ProbeTarget) -> ProbeResult {
        let timeout = self.config.timeout;

        if self.config.verbose {
            log::debug!("Probing {} with timeout {:?}", target, timeout);
        }

        let outcome = match target.port {
            None => self.icmp.probe(target.ip, timeout),
            Some(port) => self.tcp.probe(&SocketAddrV4::new(target.ip, port), timeout),
        };

        if self.config.verbose {
            match outcome {
                Ok(()) => log::debug!("Probe {}: responded", target),
                Err(e) => log::debug!("Probe {}: {}", target, e),
            }
        }

        ProbeResult::new(target, outcome)
    }

    pub fn start(&self, range: &Ipv4Range, cancel: &CancelToken) -> ScanResult {
        let ports = self.config.ports();

        log::info!(
            "Starting scan of {} host(s) ({} - {}) across ports [{}] with {} worker(s)",
            range.len(),
            range.start(),
            range.end(),
            ports
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            self.config.workers,
        );

        let aggregator = Aggregator::new(ports);
        let stopped = AtomicBool::new(false);
        let tasks = range.iter().flat_map(|ip| {
            iter::once(ProbeTarget::icmp(ip)).chain(ports.iter().map(move |&p| ProbeTarget::tcp(ip, p)))
        });

        let now = Instant::now();
        self.pool.install(|| {
            tasks.par_bridge().for_each(|target| {
                let result = if self.expired(now, cancel) {
                    if !stopped.swap(true, Ordering::Relaxed) {
                        log::warn!("Scan cancelled, skipping remaining probes");
                    }
                    ProbeResult::new(target, Err(ProbeError::Cancelled))
                } else {
                    self.scan_target(target)
                };

                aggregator.record(result);
            })
        });
        let elapsed = now.elapsed();

        ScanResult::new(elapsed, aggregator.finish(range))
    }
}
