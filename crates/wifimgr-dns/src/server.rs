//! Non-blocking captive DNS responder.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use tracing::{debug, info, warn};
use wifimgr_core::{DnsError, DnsPolicy, DnsResponder};

use crate::packet::{build_response, parse_query, PacketError, ResponseCode};

pub const DNS_PORT: u16 = 53;

/// TTL of answered records in seconds. Short so clients forget the portal
/// address soon after the device joins a real network.
pub const DEFAULT_TTL: u32 = 60;

/// Largest datagram read; plain DNS over UDP is limited to 512 bytes.
const MAX_DATAGRAM: usize = 512;

/// Answer one query packet per `policy`.
///
/// Names the policy accepts get an A record with `ap_address` (or an empty
/// answer for other record types); anything else gets NXDOMAIN.
pub fn build_reply(
    packet: &[u8],
    ap_address: Ipv4Addr,
    policy: &DnsPolicy,
    ttl: u32,
) -> Result<Vec<u8>, PacketError> {
    let question = parse_query(packet)?;

    let reply = if !policy.matches(&question.name) {
        build_response(packet, &question, ResponseCode::NameError, None, ttl)
    } else if question.wants_address() {
        build_response(
            packet,
            &question,
            ResponseCode::NoError,
            Some(ap_address),
            ttl,
        )
    } else {
        build_response(packet, &question, ResponseCode::NoError, None, ttl)
    };
    Ok(reply)
}

/// [`DnsResponder`] serving queries from a non-blocking UDP socket.
pub struct CaptiveDns {
    bind_addr: SocketAddr,
    ttl: u32,
    socket: Option<UdpSocket>,
    ap_address: Ipv4Addr,
    policy: DnsPolicy,
    recv_buf: Vec<u8>,
}

impl CaptiveDns {
    /// Create a responder that binds `bind_addr` when started.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ttl: DEFAULT_TTL,
            socket: None,
            ap_address: Ipv4Addr::UNSPECIFIED,
            policy: DnsPolicy::default(),
            recv_buf: vec![0u8; MAX_DATAGRAM],
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn is_running(&self) -> bool {
        self.socket.is_some()
    }

    /// Address the socket is bound to while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl Default for CaptiveDns {
    fn default() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::UNSPECIFIED, DNS_PORT)))
    }
}

impl DnsResponder for CaptiveDns {
    fn start(&mut self, ap_address: Ipv4Addr, policy: &DnsPolicy) -> Result<(), DnsError> {
        if self.socket.is_none() {
            let socket = UdpSocket::bind(self.bind_addr)
                .map_err(|e| DnsError(format!("failed to bind {}: {}", self.bind_addr, e)))?;
            socket
                .set_nonblocking(true)
                .map_err(|e| DnsError(e.to_string()))?;
            self.socket = Some(socket);
        }

        self.ap_address = ap_address;
        self.policy = policy.clone();
        info!(
            "Captive DNS answering {:?} with {} on {}",
            self.policy, ap_address, self.bind_addr
        );
        Ok(())
    }

    fn stop(&mut self) {
        if self.socket.take().is_some() {
            info!("Captive DNS stopped");
        }
    }

    fn process_next(&mut self) {
        let Some(socket) = &self.socket else {
            return;
        };

        let (len, peer) = match socket.recv_from(&mut self.recv_buf) {
            Ok(received) => received,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(e) => {
                warn!("Captive DNS receive failed: {}", e);
                return;
            }
        };

        match build_reply(&self.recv_buf[..len], self.ap_address, &self.policy, self.ttl) {
            Ok(reply) => {
                if let Err(e) = socket.send_to(&reply, peer) {
                    warn!("Captive DNS reply to {} failed: {}", peer, e);
                }
            }
            Err(e) => debug!("Ignoring DNS packet from {}: {}", peer, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{encode_query, parse_query, TYPE_A};
    use pretty_assertions::assert_eq;

    const AP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
    const AAAA: u16 = 28;

    fn answers(reply: &[u8]) -> u16 {
        u16::from_be_bytes([reply[6], reply[7]])
    }

    fn rcode(reply: &[u8]) -> u8 {
        reply[3] & 0x0F
    }

    #[test]
    fn test_wildcard_answers_everything() {
        let query = encode_query(9, "captive.apple.com", TYPE_A);
        let reply = build_reply(&query, AP, &DnsPolicy::Wildcard, DEFAULT_TTL).unwrap();

        assert_eq!(rcode(&reply), 0);
        assert_eq!(answers(&reply), 1);
        assert_eq!(&reply[reply.len() - 4..], &[192, 168, 4, 1]);
    }

    #[test]
    fn test_domain_policy_rejects_other_names() {
        let policy = DnsPolicy::Domain("wifi.config".to_string());

        let inside = build_reply(&encode_query(1, "wifi.config", TYPE_A), AP, &policy, 60).unwrap();
        assert_eq!(answers(&inside), 1);

        let outside = build_reply(&encode_query(2, "example.com", TYPE_A), AP, &policy, 60).unwrap();
        assert_eq!(rcode(&outside), 3);
        assert_eq!(answers(&outside), 0);
    }

    #[test]
    fn test_other_record_types_get_empty_answer() {
        let query = encode_query(3, "portal.test", AAAA);
        let reply = build_reply(&query, AP, &DnsPolicy::Wildcard, 60).unwrap();

        assert_eq!(rcode(&reply), 0);
        assert_eq!(answers(&reply), 0);
        assert_eq!(parse_query(&query).unwrap().end, reply.len());
    }

    #[test]
    fn test_malformed_packet_is_an_error() {
        assert!(build_reply(&[1, 2, 3], AP, &DnsPolicy::Wildcard, 60).is_err());
    }

    #[test]
    fn test_stopped_responder_ignores_process() {
        let mut dns = CaptiveDns::new("127.0.0.1:0".parse().unwrap());
        assert!(!dns.is_running());
        dns.process_next();
        assert_eq!(dns.local_addr(), None);
    }
}
