//! # wifimgr-dns
//!
//! Captive-portal DNS for the configuration access point.
//!
//! While the portal is up, clients joining the access point resolve names
//! through [`CaptiveDns`], which answers A queries with the access point
//! address so that any page they open lands on the portal. Which names get
//! answered is decided by [`wifimgr_core::DnsPolicy`].
//!
//! The responder uses a non-blocking `std::net::UdpSocket` and answers at most
//! one query per [`wifimgr_core::DnsResponder::process_next`] call, so it runs
//! unchanged on ESP-IDF and on Linux.

pub mod packet;
pub mod server;

// Re-exports
pub use packet::{PacketError, Question};
pub use server::{build_reply, CaptiveDns, DNS_PORT};
