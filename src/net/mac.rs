//! MAC address normalization and classification helpers.

/// Normalize a MAC address to lowercase colon form (`aa:bb:cc:dd:ee:ff`).
///
/// Accepts Windows (`aa-bb-...`), Unix (`aa:bb:...`), macOS short octets
/// (`a:b:c:d:e:f`) and raw 12-digit hex. Leading zeros are restored on each
/// octet.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let clean = mac.trim().replace('-', ":");

    if clean.len() == 12 && clean.chars().all(|c| c.is_ascii_hexdigit()) {
        let octets: Vec<&str> = (0..6).map(|i| &clean[i * 2..i * 2 + 2]).collect();
        return Some(octets.join(":").to_lowercase());
    }

    let parts: Vec<&str> = clean.split(':').collect();
    if parts.len() != 6 {
        return None;
    }
    let mut octets = Vec::with_capacity(6);
    for part in parts {
        if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        octets.push(format!("{:0>2}", part.to_lowercase()));
    }
    Some(octets.join(":"))
}

/// Parse a normalized MAC into its six octets
pub fn mac_octets(mac: &str) -> Option<[u8; 6]> {
    let normalized = normalize_mac(mac)?;
    let mut out = [0u8; 6];
    for (slot, part) in out.iter_mut().zip(normalized.split(':')) {
        *slot = u8::from_str_radix(part, 16).ok()?;
    }
    Some(out)
}

/// Group (multicast) bit set on the first octet; covers broadcast too
pub fn is_multicast(mac: &str) -> bool {
    mac_octets(mac).is_some_and(|o| o[0] & 0x01 != 0)
}

pub fn is_broadcast(mac: &str) -> bool {
    mac_octets(mac).is_some_and(|o| o.iter().all(|&b| b == 0xff))
}

/// Locally administered unicast address: second hex digit is 2, 6, A or E.
/// Phones use these for per-network randomized addresses.
pub fn is_locally_administered(mac: &str) -> bool {
    mac_octets(mac).is_some_and(|o| o[0] & 0x02 != 0 && o[0] & 0x01 == 0)
}

/// A MAC worth recording for a host: parseable, unicast, not all zeros
pub fn is_usable_host_mac(mac: &str) -> bool {
    match mac_octets(mac) {
        Some(o) => o[0] & 0x01 == 0 && o.iter().any(|&b| b != 0),
        None => false,
    }
}

/// First three octets in upper-case colon form, used as a vendor key
pub fn oui_prefix(mac: &str) -> Option<String> {
    let octets = mac_octets(mac)?;
    Some(format!("{:02X}:{:02X}:{:02X}", octets[0], octets[1], octets[2]))
}
