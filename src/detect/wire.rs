//! Minimal DNS message encoding for PTR lookups over mDNS and LLMNR, plus
//! the name walker NetBIOS responses reuse.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU16, Ordering};

pub const TYPE_PTR: u16 = 12;
pub const CLASS_IN: u16 = 1;
/// mDNS "unicast response requested" bit on the question class
pub const CLASS_QU: u16 = 0x8000;

static NEXT_ID: AtomicU16 = AtomicU16::new(0x4c57);

/// Transaction id for the next outgoing query
pub fn next_query_id() -> u16 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// `d.c.b.a.in-addr.arpa` for `a.b.c.d`
pub fn reverse_name(ip: Ipv4Addr) -> String {
    let o = ip.octets();
    format!("{}.{}.{}.{}.in-addr.arpa", o[3], o[2], o[1], o[0])
}

/// A single-question PTR query
pub fn build_ptr_query(id: u16, name: &str, unicast_response: bool) -> Vec<u8> {
    let mut packet = Vec::with_capacity(12 + name.len() + 6);
    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x00]); // flags: standard query
    packet.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
    packet.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    encode_name(&mut packet, name);
    packet.extend_from_slice(&TYPE_PTR.to_be_bytes());
    let class = if unicast_response {
        CLASS_IN | CLASS_QU
    } else {
        CLASS_IN
    };
    packet.extend_from_slice(&class.to_be_bytes());
    packet
}

fn encode_name(out: &mut Vec<u8>, name: &str) {
    for label in name.trim_end_matches('.').split('.').filter(|l| !l.is_empty()) {
        let bytes = &label.as_bytes()[..label.len().min(63)];
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
    }
    out.push(0);
}

fn read_u16(packet: &[u8], offset: usize) -> Option<u16> {
    let bytes = packet.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Decode a possibly compressed name starting at `offset`.
/// Returns the dotted name and the offset just past it in the original stream.
pub fn read_name(packet: &[u8], offset: usize) -> Option<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = offset;
    let mut end = None;
    let mut jumps = 0;

    loop {
        let len = *packet.get(pos)? as usize;
        if len == 0 {
            end.get_or_insert(pos + 1);
            break;
        }
        if len & 0xC0 == 0xC0 {
            let pointer = (read_u16(packet, pos)? & 0x3FFF) as usize;
            end.get_or_insert(pos + 2);
            jumps += 1;
            if jumps > 16 {
                return None;
            }
            pos = pointer;
            continue;
        }
        let label = packet.get(pos + 1..pos + 1 + len)?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        pos += 1 + len;
    }

    Some((labels.join("."), end?))
}

/// Offset of the first resource record, skipping the question section
pub fn skip_questions(packet: &[u8]) -> Option<usize> {
    let qdcount = read_u16(packet, 4)?;
    let mut pos = 12;
    for _ in 0..qdcount {
        let (_, next) = read_name(packet, pos)?;
        pos = next + 4;
    }
    Some(pos)
}

/// First PTR target in the answer or additional sections of a response
pub fn first_ptr_answer(packet: &[u8]) -> Option<String> {
    if packet.len() < 12 || packet[2] & 0x80 == 0 {
        return None;
    }
    let records = [read_u16(packet, 6)?, read_u16(packet, 8)?, read_u16(packet, 10)?]
        .iter()
        .map(|&c| c as usize)
        .sum::<usize>();

    let mut pos = skip_questions(packet)?;
    for _ in 0..records {
        let (_, after_name) = read_name(packet, pos)?;
        let rtype = read_u16(packet, after_name)?;
        let rdlength = read_u16(packet, after_name + 8)? as usize;
        let rdata = after_name + 10;
        if rtype == TYPE_PTR {
            let (target, _) = read_name(packet, rdata)?;
            if !target.is_empty() {
                return Some(target);
            }
        }
        pos = rdata + rdlength;
    }
    None
}
