//! MAC OUI to manufacturer lookup over a small built-in table.

/// Known OUI prefixes (first three octets, upper-case hex, no separators).
const OUI_TABLE: &[(&str, &str)] = &[
    // Apple
    ("00A040", "Apple"),
    ("3C15C2", "Apple"),
    ("00163E", "Apple"),
    ("001451", "Apple"),
    ("40B395", "Apple"),
    ("64A5C3", "Apple"),
    ("2CF0A2", "Apple"),
    ("3CE072", "Apple"),
    ("F0D1A9", "Apple"),
    ("94F6A3", "Apple"),
    ("9CFC01", "Apple"),
    ("F4F15A", "Apple"),
    ("CC20E8", "Apple"),
    ("0C4DE9", "Apple"),
    ("38C986", "Apple"),
    ("949426", "Apple"),
    ("B8E856", "Apple"),
    ("000A27", "Apple"),
    ("001CB3", "Apple"),
    ("001D4F", "Apple"),
    ("001E52", "Apple"),
    ("001EC2", "Apple"),
    ("001F5B", "Apple"),
    ("001FF3", "Apple"),
    ("002312", "Apple"),
    ("00236C", "Apple"),
    ("0023DF", "Apple"),
    ("002436", "Apple"),
    ("002500", "Apple"),
    ("00254B", "Apple"),
    ("0025BC", "Apple"),
    ("002608", "Apple"),
    ("00264A", "Apple"),
    ("0026B0", "Apple"),
    ("0026BB", "Apple"),
    // Raspberry Pi
    ("B827EB", "Raspberry Pi"),
    ("DCA632", "Raspberry Pi"),
    ("E45F01", "Raspberry Pi"),
    ("28CDC1", "Raspberry Pi"),
    // Google
    ("001999", "Google"),
    ("F4F5D8", "Google"),
    ("546009", "Google"),
    // Sonos
    ("940013", "Sonos"),
    ("000E58", "Sonos"),
    ("5CAAFD", "Sonos"),
    // Philips
    ("001788", "Philips Hue"),
    ("ECB5FA", "Philips Hue"),
    // Ubiquiti
    ("FCECDA", "Ubiquiti"),
    ("802AA8", "Ubiquiti"),
    ("F09FC2", "Ubiquiti"),
    ("245A4C", "Ubiquiti"),
    // Synology
    ("001132", "Synology"),
    ("001D7E", "Synology"),
    // TP-Link
    ("30B5C2", "TP-Link"),
    ("50C7BF", "TP-Link"),
    ("B0BE76", "TP-Link"),
    // Netgear
    ("00224D", "Netgear"),
    ("A42B8C", "Netgear"),
    ("001F33", "Netgear"),
    ("28107B", "D-Link"),
    // ASUS
    ("F0DEF1", "ASUS"),
    ("0015F2", "ASUS"),
    ("485D36", "Vizio"),
    ("00E091", "LG"),
    // HP
    ("5CDC96", "HP"),
    ("3C4A92", "HP"),
    ("000130", "HP"),
    ("08002B", "HP"),
    ("2C768A", "Hewlett Packard"),
    ("00179A", "Canon"),
    // Intel
    ("0019D1", "Intel"),
    ("001B21", "Intel"),
    ("001E67", "Intel"),
    // Dell
    ("001143", "Dell"),
    ("F01FAF", "Dell"),
    ("001E4F", "Dell"),
    // Samsung
    ("000BCD", "Samsung"),
    ("BC851F", "Samsung"),
    ("B8F6B1", "Samsung"),
    // Printers
    ("001322", "Epson"),
    ("84D473", "Epson"),
    ("0000B4", "Brother"),
    ("30055C", "Brother"),
    // Roku
    ("E0B94D", "Roku"),
    ("B0A7B9", "Roku"),
    ("D83134", "Roku"),
    // Virtualization
    ("005056", "VMware"),
    ("000C29", "VMware"),
    ("001C42", "Parallels"),
    ("080027", "VirtualBox"),
];

/// Normalize a MAC to upper-case `AA:BB:CC:DD:EE:FF`.
///
/// Accepts `:` or `-` separated octets, including the unpadded form some
/// `arp` implementations print (`0:1c:42:0:0:8`), and bare 12-digit hex.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let mac = mac.trim();
    let octets: Vec<String> = if mac.contains(':') || mac.contains('-') {
        let parts: Vec<&str> = mac.split([':', '-']).collect();
        if parts.len() != 6 {
            return None;
        }
        parts
            .iter()
            .map(|p| {
                if p.is_empty() || p.len() > 2 || !p.chars().all(|c| c.is_ascii_hexdigit()) {
                    None
                } else {
                    Some(format!("{:0>2}", p.to_ascii_uppercase()))
                }
            })
            .collect::<Option<Vec<_>>>()?
    } else {
        if mac.len() != 12 || !mac.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        (0..6)
            .map(|i| mac[i * 2..i * 2 + 2].to_ascii_uppercase())
            .collect()
    };
    Some(octets.join(":"))
}

/// Look up the manufacturer for a MAC address.
///
/// Returns `None` for malformed input, unknown prefixes and
/// locally-administered addresses (which carry no OUI).
pub fn lookup_vendor(mac: &str) -> Option<&'static str> {
    let normalized = normalize_mac(mac)?;
    let oui: String = normalized.split(':').take(3).collect();

    let first = u8::from_str_radix(&oui[..2], 16).ok()?;
    if first & 0x02 != 0 {
        return None;
    }

    OUI_TABLE
        .iter()
        .find(|(prefix, _)| *prefix == oui)
        .map(|(_, vendor)| *vendor)
}
