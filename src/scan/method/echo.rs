use std::{
    net::{IpAddr, Ipv4Addr},
    time::{Duration, Instant},
};

use pnet::{
    packet::{
        icmp::{echo_reply::EchoReplyPacket, IcmpPacket, IcmpTypes},
        ip::IpNextHeaderProtocols,
        Packet,
    },
    transport::{icmp_packet_iter, transport_channel, TransportChannelType, TransportProtocol},
};

use crate::{
    error::ProbeError,
    scan::{pckt, Reachability},
};

const BUFFER_SZ: usize = 4096;
const SEQUENCE: u16 = 1;
// Longest single wait on the socket; the loop keeps going until the deadline.
const MAX_WAIT: Duration = Duration::from_secs(60);

/// Sends ICMP echo requests through a raw socket. Requires root.
#[derive(Debug)]
pub struct EchoScan;

fn is_reply_to(packet: &IcmpPacket, identifier: u16) -> bool {
    packet.get_icmp_type() == IcmpTypes::EchoReply
        && EchoReplyPacket::new(packet.packet()).is_some_and(|reply| reply.get_identifier() == identifier)
}

/// Time left before `deadline`, capped to `MAX_WAIT`. `None` once it has passed.
///
/// A missing deadline (timeout beyond what `Instant` can hold) never expires.
fn next_wait(deadline: Option<Instant>, now: Instant) -> Option<Duration> {
    let remaining = match deadline {
        Some(deadline) => deadline.saturating_duration_since(now),
        None => MAX_WAIT,
    };

    (!remaining.is_zero()).then(|| remaining.min(MAX_WAIT))
}

impl Reachability for EchoScan {
    fn probe(&self, ip: Ipv4Addr, timeout: Duration) -> Result<(), ProbeError> {
        let channel = TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp));
        let (mut tx, mut rx) = transport_channel(BUFFER_SZ, channel).map_err(|e| {
            log::debug!("Failed to open raw ICMP socket: {}", e);
            ProbeError::Unreachable
        })?;

        let identifier: u16 = rand::random();
        let raw_pckt = pckt::echo_request(identifier, SEQUENCE).ok_or(ProbeError::Unreachable)?;
        let echo_pckt = IcmpPacket::new(&raw_pckt).ok_or(ProbeError::Unreachable)?;

        tx.send_to(echo_pckt, IpAddr::V4(ip)).map_err(|e| {
            log::debug!("Failed to send echo request to `{}`: {}", ip, e);
            ProbeError::Unreachable
        })?;

        // Every raw ICMP socket sees every reply, so filter on source and identifier.
        let deadline = Instant::now().checked_add(timeout);
        let mut replies = icmp_packet_iter(&mut rx);
        loop {
            let Some(wait) = next_wait(deadline, Instant::now()) else {
                return Err(ProbeError::Timeout);
            };

            match replies.next_with_timeout(wait) {
                Ok(Some((packet, IpAddr::V4(src)))) if src == ip && is_reply_to(&packet, identifier) => {
                    return Ok(());
                }
                Ok(Some(_)) => continue,
                Ok(None) => continue,
                Err(e) => {
                    log::debug!("Failed to receive echo reply from `{}`: {}", ip, e);
                    return Err(ProbeError::Unreachable);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::pckt::echo_request;

    #[test]
    fn only_matching_echo_replies_count() {
        let mut raw = echo_request(7, SEQUENCE).unwrap();
        // Turn the request into a reply (type 0) in place.
        raw[0] = 0;

        let reply = IcmpPacket::new(&raw).unwrap();
        assert!(is_reply_to(&reply, 7));
        assert!(!is_reply_to(&reply, 8));

        let request = echo_request(7, SEQUENCE).unwrap();
        assert!(!is_reply_to(&IcmpPacket::new(&request).unwrap(), 7));
    }

    #[test]
    fn waits_are_bounded_even_without_deadline() {
        let now = Instant::now();

        assert_eq!(next_wait(None, now), Some(MAX_WAIT));
        assert_eq!(next_wait(Some(now), now), None);
        assert_eq!(
            next_wait(Some(now + Duration::from_millis(300)), now),
            Some(Duration::from_millis(300))
        );
        assert_eq!(next_wait(Some(now + MAX_WAIT * 3), now), Some(MAX_WAIT));
        assert_eq!(next_wait(now.checked_add(Duration::MAX), now), Some(MAX_WAIT));
    }

    #[test]
    #[ignore]
    fn loopback_answers_raw_echo() {
        assert!(crate::is_user_sudo(), "raw sockets need root");
        assert_eq!(EchoScan.probe(Ipv4Addr::LOCALHOST, Duration::from_secs(1)), Ok(()));
    }
}
