use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use pad::PadStr;

use crate::{
    error::ScanError,
    scan::{HostReport, ScanResult},
};

pub const HOST_UP: &str = "up";
pub const HOST_DOWN: &str = "down";
pub const PORT_OPEN: &str = "open";
pub const PORT_CLOSED: &str = "closed";

fn header(ports: &[u16]) -> Vec<String> {
    ["ip", "icmp"]
        .into_iter()
        .map(String::from)
        .chain(ports.iter().map(u16::to_string))
        .collect()
}

fn record(host: &HostReport) -> Vec<String> {
    let icmp = if host.icmp { HOST_UP } else { HOST_DOWN };

    [host.ip.to_string(), icmp.to_string()]
        .into_iter()
        .chain(host.ports().iter().map(|&(_, open)| {
            String::from(if open { PORT_OPEN } else { PORT_CLOSED })
        }))
        .collect()
}

/// Writes the CSV report: `ip,icmp,<port>...` followed by one row per host.
pub fn write_to<W: Write>(writer: W, ports: &[u16], hosts: &[HostReport]) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(header(ports))?;
    for host in hosts {
        wtr.write_record(record(host))?;
    }
    wtr.flush()?;

    Ok(())
}

pub fn write_csv(path: impl AsRef<Path>, ports: &[u16], hosts: &[HostReport]) -> Result<(), ScanError> {
    let path = path.as_ref();
    let failure = |source: csv::Error| ScanError::OutputWriteFailure {
        path: path.display().to_string(),
        source,
    };

    let file = File::create(path).map_err(|e| failure(e.into()))?;
    write_to(BufWriter::new(file), ports, hosts).map_err(failure)?;

    log::debug!("Wrote {} row(s) to `{}`", hosts.len(), path.display());

    Ok(())
}

/// Console table listing hosts that answered anything.
pub fn summary(result: &ScanResult) -> String {
    let mut out = format!("Scan Duration: {:.4}s\n\n", result.elapsed.as_secs_f32());

    let responsive: Vec<&HostReport> = result.hosts.iter().filter(|h| h.is_responsive()).collect();
    if responsive.is_empty() {
        out.push_str("No responsive hosts found.\n");
        return out;
    }

    out.push_str("Host            ICMP  Open Ports\n");
    responsive.iter().for_each(|host| {
        let open = host
            .open_ports()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        out.push_str(&format!(
            "{}{}{}\n",
            host.ip.to_string().pad_to_width(16),
            (if host.icmp { HOST_UP } else { HOST_DOWN }).pad_to_width(6),
            if open.is_empty() { "-" } else { open.as_str() },
        ))
    });

    out
}
