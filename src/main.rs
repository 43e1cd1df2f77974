use std::time::Duration;

use anyhow::Result;
use clap::{arg, crate_authors, crate_name, crate_version, ArgAction, ArgMatches, Command};
use netsweep::{
    error::ScanError,
    is_user_sudo, logger,
    range::Ipv4Range,
    report,
    scan::{
        method::{EchoScan, PingScan, TcpScan},
        CancelToken, Reachability, ScanConfig, Scanner, DEFAULT_PORTS,
    },
    signal::cancel_on_interrupt,
};

const DEFAULT_OUTPUT: &str = "scan_results.csv";

struct ParsedArgs {
    range: Ipv4Range,
    output: String,
    raw_icmp: bool,
    config: ScanConfig,
}

fn parse_port(raw: &str) -> Result<u16, ScanError> {
    match raw.trim().parse::<u16>() {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(ScanError::InvalidPort(String::from(raw))),
    }
}

fn parse_secs(raw: &str) -> Result<Duration, ScanError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ScanError::InvalidTimeout(String::from(raw)))
}

fn parse_workers(raw: &str) -> Result<usize, ScanError> {
    match raw.trim().parse::<usize>() {
        Ok(w) if w > 0 => Ok(w),
        _ => Err(ScanError::InvalidWorkerCount(String::from(raw))),
    }
}

fn parse_args(matches: ArgMatches) -> Result<ParsedArgs, ScanError> {
    let verbose = matches.get_flag("verbose");
    let raw_icmp = matches.get_flag("raw-icmp");

    // Both are required, so clap guarantees their presence.
    let start = matches.get_one::<String>("start_ip").map_or("", String::as_str);
    let end = matches.get_one::<String>("end_ip").map_or("", String::as_str);
    let range = Ipv4Range::parse(start, end)?;

    // `-p` without values leaves only the ICMP probe.
    let ports = match matches.get_many::<String>("ports") {
        Some(rps) => rps.map(|rp| parse_port(rp)).collect::<Result<_, _>>()?,
        None if matches.contains_id("ports") => Vec::new(),
        None => DEFAULT_PORTS.to_vec(),
    };

    let timeout = match matches.get_one::<String>("timeout") {
        Some(raw) => parse_secs(raw)?,
        None => ScanConfig::default().timeout,
    };

    let workers = match matches.get_one::<String>("workers") {
        Some(raw) => parse_workers(raw)?,
        None => ScanConfig::default().workers,
    };

    let deadline = matches
        .get_one::<String>("max-time")
        .map(|raw| parse_secs(raw))
        .transpose()?;

    if raw_icmp && !is_user_sudo() {
        return Err(ScanError::NormalUserRequired);
    }

    let output = matches
        .get_one::<String>("output")
        .cloned()
        .unwrap_or_else(|| DEFAULT_OUTPUT.into());

    Ok(ParsedArgs {
        range,
        output,
        raw_icmp,
        config: ScanConfig {
            ports,
            timeout,
            workers,
            deadline,
            verbose,
        },
    })
}

fn main() -> Result<()> {
    let arg_matches = Command::new(crate_name!())
        .about(
            "Sweeps a range of IPv4 addresses with ICMP echo and TCP connect probes.\n\
            Raw ICMP probing requires sudo user.",
        )
        .version(crate_version!())
        .arg_required_else_help(true)
        .author(crate_authors!())
        .args([
            // Target range.
            arg!(<start_ip> "First address of the range (inclusive)"),
            arg!(<end_ip> "Last address of the range (inclusive)"),
        ])
        .args([
            // Probing.
            arg!(-p --ports <PORT> "TCP ports to probe, separated by spaces or commas")
                .num_args(0..)
                .value_delimiter(',')
                .action(ArgAction::Append),
            arg!(-t --timeout <TIMEOUT> "Timeout in seconds for each probe").default_value("1.0"),
            arg!(-w --workers <WORKERS> "Number of concurrent probe workers").default_value("20"),
            arg!(--"raw-icmp" "Send ICMP echo through a raw socket instead of running ping")
                .action(ArgAction::SetTrue),
            arg!(--"max-time" <SECONDS> "Stop dispatching probes after this many seconds"),
        ])
        .args([
            // Miscellaneous arguments.
            arg!(-o --output <OUTPUT> "CSV file to write results to").default_value(DEFAULT_OUTPUT),
            arg!(-v --verbose "Turns on debug logging of every probe").action(ArgAction::SetTrue),
        ])
        .get_matches();

    // Extract arguments.
    let parsed = parse_args(arg_matches)?;

    logger::init(parsed.config.verbose);

    // Pick the reachability check.
    let ping = PingScan::default();
    let icmp: &dyn Reachability = if parsed.raw_icmp { &EchoScan } else { &ping };

    // Start scanner.
    let scanner = Scanner::new(icmp, &TcpScan, parsed.config)?;
    let cancel = CancelToken::new();
    if !cancel_on_interrupt(&cancel) {
        log::warn!("Failed to install Ctrl-C handler, interrupting will discard results");
    }

    let result = scanner.start(&parsed.range, &cancel);
    if cancel.is_cancelled() {
        log::warn!("Scan interrupted, saving partial results");
    }

    // Save and show result.
    report::write_csv(&parsed.output, scanner.config().ports(), &result.hosts)?;
    print!("{}", report::summary(&result));

    log::info!("Scan complete. Results saved to {}", parsed.output);

    Ok(())
}
