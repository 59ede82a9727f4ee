//! Minimal DNS message codec (RFC 1035) covering what a captive responder
//! needs: parse the single question of a standard query and build a reply.

use std::net::Ipv4Addr;

use thiserror::Error;

pub const HEADER_LEN: usize = 12;
pub const MAX_NAME_LEN: usize = 255;

pub const TYPE_A: u16 = 1;
pub const TYPE_ANY: u16 = 255;
pub const CLASS_IN: u16 = 1;

const FLAG_RESPONSE: u16 = 0x8000;
const FLAG_AUTHORITATIVE: u16 = 0x0400;
const FLAG_RECURSION_DESIRED: u16 = 0x0100;
const OPCODE_MASK: u16 = 0x7800;

/// Response codes used in replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
    NoError = 0,
    NameError = 3,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet too short ({0} bytes)")]
    Truncated(usize),
    #[error("packet is a response")]
    NotAQuery,
    #[error("unsupported opcode {0}")]
    UnsupportedOpcode(u8),
    #[error("expected exactly one question, got {0}")]
    QuestionCount(u16),
    #[error("malformed name")]
    MalformedName,
}

/// The question section of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: u16,
    pub flags: u16,
    /// Lowercased dotted name without the trailing dot.
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
    /// Offset one past the question's last byte.
    pub end: usize,
}

impl Question {
    /// Whether an A record answers this question.
    pub fn wants_address(&self) -> bool {
        (self.qtype == TYPE_A || self.qtype == TYPE_ANY) && self.qclass == CLASS_IN
    }
}

fn read_u16(packet: &[u8], at: usize) -> Result<u16, PacketError> {
    packet
        .get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(PacketError::Truncated(packet.len()))
}

/// Parse the header and sole question of a standard query.
pub fn parse_query(packet: &[u8]) -> Result<Question, PacketError> {
    if packet.len() < HEADER_LEN {
        return Err(PacketError::Truncated(packet.len()));
    }

    let id = read_u16(packet, 0)?;
    let flags = read_u16(packet, 2)?;
    if flags & FLAG_RESPONSE != 0 {
        return Err(PacketError::NotAQuery);
    }
    let opcode = ((flags & OPCODE_MASK) >> 11) as u8;
    if opcode != 0 {
        return Err(PacketError::UnsupportedOpcode(opcode));
    }
    let qdcount = read_u16(packet, 4)?;
    if qdcount != 1 {
        return Err(PacketError::QuestionCount(qdcount));
    }

    let mut labels: Vec<String> = Vec::new();
    let mut pos = HEADER_LEN;
    let mut name_len = 0usize;
    loop {
        let len = *packet.get(pos).ok_or(PacketError::Truncated(packet.len()))? as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        // compression pointers never appear in a question
        if len & 0xC0 != 0 {
            return Err(PacketError::MalformedName);
        }
        let label = packet
            .get(pos..pos + len)
            .ok_or(PacketError::Truncated(packet.len()))?;
        name_len += len + 1;
        if name_len > MAX_NAME_LEN {
            return Err(PacketError::MalformedName);
        }
        labels.push(String::from_utf8_lossy(label).to_ascii_lowercase());
        pos += len;
    }

    let qtype = read_u16(packet, pos)?;
    let qclass = read_u16(packet, pos + 2)?;

    Ok(Question {
        id,
        flags,
        name: labels.join("."),
        qtype,
        qclass,
        end: pos + 4,
    })
}

/// Build a reply to `query` whose question was parsed as `question`.
///
/// With `address` set, one A record pointing at it is appended.
pub fn build_response(
    query: &[u8],
    question: &Question,
    code: ResponseCode,
    address: Option<Ipv4Addr>,
    ttl: u32,
) -> Vec<u8> {
    let flags = FLAG_RESPONSE
        | FLAG_AUTHORITATIVE
        | (question.flags & FLAG_RECURSION_DESIRED)
        | code as u16;
    let answers: u16 = if address.is_some() { 1 } else { 0 };

    let mut reply = Vec::with_capacity(question.end + 16);
    reply.extend_from_slice(&question.id.to_be_bytes());
    reply.extend_from_slice(&flags.to_be_bytes());
    reply.extend_from_slice(&1u16.to_be_bytes());
    reply.extend_from_slice(&answers.to_be_bytes());
    reply.extend_from_slice(&[0, 0, 0, 0]);
    reply.extend_from_slice(&query[HEADER_LEN..question.end]);

    if let Some(address) = address {
        // pointer to the name in the question
        reply.extend_from_slice(&[0xC0, HEADER_LEN as u8]);
        reply.extend_from_slice(&TYPE_A.to_be_bytes());
        reply.extend_from_slice(&CLASS_IN.to_be_bytes());
        reply.extend_from_slice(&ttl.to_be_bytes());
        reply.extend_from_slice(&4u16.to_be_bytes());
        reply.extend_from_slice(&address.octets());
    }

    reply
}

#[cfg(test)]
pub(crate) fn encode_query(id: u16, name: &str, qtype: u16) -> Vec<u8> {
    let mut packet = Vec::new();
    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&FLAG_RECURSION_DESIRED.to_be_bytes());
    packet.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 0]);
    for label in name.split('.').filter(|l| !l.is_empty()) {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0);
    packet.extend_from_slice(&qtype.to_be_bytes());
    packet.extend_from_slice(&CLASS_IN.to_be_bytes());
    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_query() {
        let packet = encode_query(0x1234, "Connectivity-Check.Example.com", TYPE_A);
        let question = parse_query(&packet).unwrap();

        assert_eq!(question.id, 0x1234);
        assert_eq!(question.name, "connectivity-check.example.com");
        assert_eq!(question.qtype, TYPE_A);
        assert_eq!(question.end, packet.len());
        assert!(question.wants_address());
    }

    #[test]
    fn test_parse_root_name() {
        let question = parse_query(&encode_query(1, "", TYPE_A)).unwrap();
        assert_eq!(question.name, "");
    }

    #[test]
    fn test_rejects_short_packet() {
        assert_eq!(parse_query(&[0u8; 5]), Err(PacketError::Truncated(5)));
    }

    #[test]
    fn test_rejects_response() {
        let mut packet = encode_query(1, "a.b", TYPE_A);
        packet[2] |= 0x80;
        assert_eq!(parse_query(&packet), Err(PacketError::NotAQuery));
    }

    #[test]
    fn test_rejects_other_opcodes() {
        let mut packet = encode_query(1, "a.b", TYPE_A);
        // opcode 2 (status)
        packet[2] |= 0x10;
        assert_eq!(parse_query(&packet), Err(PacketError::UnsupportedOpcode(2)));
    }

    #[test]
    fn test_rejects_cut_off_name() {
        let packet = encode_query(1, "example.com", TYPE_A);
        let cut = &packet[..HEADER_LEN + 4];
        assert_eq!(parse_query(cut), Err(PacketError::Truncated(cut.len())));
    }

    #[test]
    fn test_rejects_pointer_in_question() {
        let mut packet = encode_query(1, "", TYPE_A);
        packet[HEADER_LEN] = 0xC0;
        assert_eq!(parse_query(&packet), Err(PacketError::MalformedName));
    }

    #[test]
    fn test_address_reply_layout() {
        let query = encode_query(0xBEEF, "portal.test", TYPE_A);
        let question = parse_query(&query).unwrap();
        let reply = build_response(
            &query,
            &question,
            ResponseCode::NoError,
            Some(Ipv4Addr::new(192, 168, 4, 1)),
            60,
        );

        assert_eq!(&reply[0..2], &[0xBE, 0xEF]);
        // response, authoritative, recursion desired echoed, no error
        assert_eq!(&reply[2..4], &[0x85, 0x00]);
        assert_eq!(&reply[4..12], &[0, 1, 0, 1, 0, 0, 0, 0]);
        assert_eq!(&reply[12..question.end], &query[12..]);
        assert_eq!(
            &reply[question.end..],
            &[0xC0, 0x0C, 0, 1, 0, 1, 0, 0, 0, 60, 0, 4, 192, 168, 4, 1]
        );
    }

    #[test]
    fn test_name_error_reply_has_no_answer() {
        let query = encode_query(7, "elsewhere.test", TYPE_A);
        let question = parse_query(&query).unwrap();
        let reply = build_response(&query, &question, ResponseCode::NameError, None, 60);

        assert_eq!(reply[3] & 0x0F, 3);
        assert_eq!(&reply[6..8], &[0, 0]);
        assert_eq!(reply.len(), query.len());
    }
}
