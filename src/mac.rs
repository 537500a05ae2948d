// MAC address helpers shared by the store, the ARP parser and the vendor lookup.

/// Canonical form: lowercase, `:`-separated, every octet left-padded to two digits.
///
/// Input may use `:` or `-` between octets. Nothing is validated, so garbage
/// goes through octet by octet under the same padding rule.
pub fn normalize_mac(mac: &str) -> String {
    mac.to_lowercase()
        .split([':', '-'])
        .map(|octet| format!("{:0>2}", octet))
        .collect::<Vec<_>>()
        .join(":")
}

/// True when the first octet has the locally administered bit (0x02) set.
pub fn is_locally_administered(mac: &str) -> bool {
    let first = mac.split(':').next().unwrap_or_default();
    match u8::from_str_radix(first, 16) {
        Ok(octet) => octet & 0x02 != 0,
        Err(_) => false,
    }
}

/// First three octets, uppercase, without separators ("AABBCC").
pub fn oui_prefix(mac: &str) -> Option<String> {
    let octets: Vec<&str> = mac.split(':').collect();
    if octets.len() < 3 {
        return None;
    }
    Some(octets[..3].concat().to_uppercase())
}
