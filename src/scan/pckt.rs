use pnet::packet::{
    icmp::{self, echo_request::MutableEchoRequestPacket, IcmpCode, IcmpPacket, IcmpTypes},
    Packet,
};

const ECHO_HDR_SZ: usize = 8;
const ECHO_PAYLOAD: &[u8] = b"netsweep";

/// Builds an ICMP echo request, checksum included.
pub fn echo_request(identifier: u16, sequence: u16) -> Option<Vec<u8>> {
    let raw_pckt = vec![0; ECHO_HDR_SZ + ECHO_PAYLOAD.len()];
    let mut echo_pckt = MutableEchoRequestPacket::owned(raw_pckt)?;
    echo_pckt.set_icmp_type(IcmpTypes::EchoRequest);
    echo_pckt.set_icmp_code(IcmpCode::new(0));
    echo_pckt.set_identifier(identifier);
    echo_pckt.set_sequence_number(sequence);
    echo_pckt.set_payload(ECHO_PAYLOAD);

    let checksum = icmp::checksum(&IcmpPacket::new(echo_pckt.packet())?);
    echo_pckt.set_checksum(checksum);

    Some(echo_pckt.packet().to_vec())
}

#[cfg(test)]
mod tests {
    use pnet::packet::icmp::echo_request::EchoRequestPacket;

    use super::*;

    #[test]
    fn echo_request_fields_and_checksum() {
        let raw = echo_request(0xbeef, 1).unwrap();
        let pckt = EchoRequestPacket::new(&raw).unwrap();

        assert_eq!(raw.len(), ECHO_HDR_SZ + ECHO_PAYLOAD.len());
        assert_eq!(pckt.get_icmp_type(), IcmpTypes::EchoRequest);
        assert_eq!(pckt.get_identifier(), 0xbeef);
        assert_eq!(pckt.get_sequence_number(), 1);
        assert_eq!(pckt.payload(), ECHO_PAYLOAD);

        let icmp_pckt = IcmpPacket::new(&raw).unwrap();
        assert_eq!(icmp::checksum(&icmp_pckt), icmp_pckt.get_checksum());
    }
}
