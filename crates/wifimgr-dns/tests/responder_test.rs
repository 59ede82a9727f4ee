use std::net::{Ipv4Addr, UdpSocket};
use std::time::Duration;

use pretty_assertions::assert_eq;
use wifimgr_core::{DnsPolicy, DnsResponder};
use wifimgr_dns::CaptiveDns;

const AP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

fn query(id: u16, name: &str) -> Vec<u8> {
    let mut packet = Vec::new();
    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&[0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0]);
    for label in name.split('.') {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.extend_from_slice(&[0, 0, 1, 0, 1]);
    packet
}

/// Send `packet` to the responder and pump it until a reply arrives.
fn exchange(dns: &mut CaptiveDns, packet: &[u8]) -> Vec<u8> {
    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client.set_nonblocking(true).unwrap();
    client.send_to(packet, dns.local_addr().unwrap()).unwrap();

    let mut buf = [0u8; 512];
    for _ in 0..500 {
        dns.process_next();
        if let Ok((len, _)) = client.recv_from(&mut buf) {
            return buf[..len].to_vec();
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("no reply from captive DNS");
}

#[test]
fn test_answers_with_access_point_address() {
    let mut dns = CaptiveDns::new("127.0.0.1:0".parse().unwrap());
    dns.start(AP, &DnsPolicy::Wildcard).unwrap();
    assert!(dns.is_running());

    let reply = exchange(&mut dns, &query(42, "connectivitycheck.gstatic.com"));

    assert_eq!(&reply[0..2], &42u16.to_be_bytes());
    assert_eq!(&reply[6..8], &[0, 1]);
    assert_eq!(&reply[reply.len() - 4..], &AP.octets());
}

#[test]
fn test_restart_switches_address_and_policy() {
    let mut dns = CaptiveDns::new("127.0.0.1:0".parse().unwrap());
    dns.start(AP, &DnsPolicy::Wildcard).unwrap();
    let addr = dns.local_addr();

    let other = Ipv4Addr::new(10, 0, 0, 1);
    dns.start(other, &DnsPolicy::Domain("wifi.config".to_string()))
        .unwrap();
    // still the same socket
    assert_eq!(dns.local_addr(), addr);

    let reply = exchange(&mut dns, &query(1, "wifi.config"));
    assert_eq!(&reply[reply.len() - 4..], &other.octets());

    let reply = exchange(&mut dns, &query(2, "example.com"));
    assert_eq!(reply[3] & 0x0F, 3);
}

#[test]
fn test_stop_releases_socket() {
    let mut dns = CaptiveDns::new("127.0.0.1:0".parse().unwrap());
    dns.start(AP, &DnsPolicy::Wildcard).unwrap();
    dns.stop();

    assert!(!dns.is_running());
    assert_eq!(dns.local_addr(), None);
    // no socket, nothing to do
    dns.process_next();
}
