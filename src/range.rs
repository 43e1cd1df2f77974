use std::net::Ipv4Addr;

use crate::error::ScanError;

/// Inclusive range of IPv4 addresses, ordered by their 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    start: Ipv4Addr,
    end: Ipv4Addr,
}

fn parse_addr(raw: &str) -> Result<Ipv4Addr, ScanError> {
    raw.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| ScanError::InvalidAddressFormat(raw.into()))
}

impl Ipv4Range {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, ScanError> {
        if u32::from(start) > u32::from(end) {
            return Err(ScanError::InvalidRange { start, end });
        }

        Ok(Self { start, end })
    }

    /// Parses both endpoints as dotted-quad literals.
    pub fn parse(start: &str, end: &str) -> Result<Self, ScanError> {
        let start = parse_addr(start)?;
        let end = parse_addr(end)?;

        log::debug!("Parsed range `{}` to `{}`", start, end);

        Self::new(start, end)
    }

    #[inline]
    pub fn start(&self) -> Ipv4Addr {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Ipv4Addr {
        self.end
    }

    /// Number of addresses in the range. Never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        u64::from(u32::from(self.end)) - u64::from(u32::from(self.start)) + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + Send {
        (u32::from(self.start)..=u32::from(self.end)).map(Ipv4Addr::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_every_address_in_ascending_order() {
        let range = Ipv4Range::parse("10.0.0.250", "10.0.1.4").unwrap();
        let ips: Vec<Ipv4Addr> = range.iter().collect();

        assert_eq!(range.len(), 11);
        assert_eq!(ips.len() as u64, range.len());
        assert_eq!(ips.first(), Some(&Ipv4Addr::new(10, 0, 0, 250)));
        assert_eq!(ips.last(), Some(&Ipv4Addr::new(10, 0, 1, 4)));
        assert!(ips.windows(2).all(|w| u32::from(w[0]) < u32::from(w[1])));
    }

    #[test]
    fn iteration_can_be_restarted() {
        let range = Ipv4Range::parse("192.168.1.1", "192.168.1.3").unwrap();
        let first: Vec<_> = range.iter().collect();
        let second: Vec<_> = range.iter().collect();

        assert_eq!(first, second);
    }

    #[test]
    fn single_address_range() {
        let range = Ipv4Range::parse("127.0.0.1", "127.0.0.1").unwrap();

        assert_eq!(range.len(), 1);
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![Ipv4Addr::LOCALHOST]);
    }

    #[test]
    fn whole_address_space_length() {
        let range = Ipv4Range::new(Ipv4Addr::UNSPECIFIED, Ipv4Addr::BROADCAST).unwrap();

        assert_eq!(range.len(), 1 << 32);
        assert_eq!(range.iter().next(), Some(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = Ipv4Range::parse("10.0.0.2", "10.0.0.1").unwrap_err();

        assert!(matches!(err, ScanError::InvalidRange { .. }));
    }

    #[test]
    fn malformed_literals_are_rejected() {
        for raw in ["999.1.1.1", "10.0.0", "example.com", "::1", ""] {
            let err = Ipv4Range::parse(raw, "10.0.0.1").unwrap_err();
            assert!(
                matches!(err, ScanError::InvalidAddressFormat(ref s) if s == raw),
                "`{}` gave {:?}",
                raw,
                err
            );
        }

        let err = Ipv4Range::parse("10.0.0.1", "10.0.0.256").unwrap_err();
        assert!(matches!(err, ScanError::InvalidAddressFormat(_)));
    }
}
