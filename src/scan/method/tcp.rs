use std::{
    io::ErrorKind,
    net::{SocketAddr, SocketAddrV4, TcpStream},
    time::Duration,
};

use crate::{error::ProbeError, scan::PortProbe};

#[derive(Debug)]
pub struct TcpScan;

impl PortProbe for TcpScan {
    fn probe(&self, addr: &SocketAddrV4, timeout: Duration) -> Result<(), ProbeError> {
        // The stream is dropped right away, closing the connection.
        TcpStream::connect_timeout(&SocketAddr::V4(*addr), timeout)
            .map(drop)
            .map_err(|e| match e.kind() {
                ErrorKind::ConnectionRefused => ProbeError::Refused,
                ErrorKind::TimedOut | ErrorKind::WouldBlock => ProbeError::Timeout,
                _ => ProbeError::Unreachable,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, TcpListener};

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(500);

    fn local_addr(listener: &TcpListener) -> SocketAddrV4 {
        match listener.local_addr().unwrap() {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => unreachable!(),
        }
    }

    #[test]
    fn listening_port_is_open() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();

        assert_eq!(TcpScan.probe(&local_addr(&listener), TIMEOUT), Ok(()));
    }

    #[test]
    fn closed_port_is_refused() {
        let addr = {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
            local_addr(&listener)
        };

        assert_eq!(TcpScan.probe(&addr, TIMEOUT), Err(ProbeError::Refused));
    }

    #[test]
    #[ignore]
    fn blackholed_address_times_out() {
        // TEST-NET-3, normally dropped without an answer.
        let addr = SocketAddrV4::new(Ipv4Addr::new(203, 0, 113, 1), 80);

        assert!(TcpScan.probe(&addr, TIMEOUT).is_err());
    }
}
