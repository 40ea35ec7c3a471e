use std::fmt;

/// Manufacturer family derived from a MAC address OUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Xiaomi,
    Google,
    Samsung,
    Other,
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Vendor::Xiaomi => "Xiaomi",
            Vendor::Google => "Google",
            Vendor::Samsung => "Samsung",
            Vendor::Other => "Unknown",
        };
        f.write_str(s)
    }
}

/// Known phone-maker OUIs, lowercase colon form.
pub const OUI_TABLE: &[(&str, Vendor)] = &[
    ("00:9e:c8", Vendor::Xiaomi),
    ("34:ce:00", Vendor::Xiaomi),
    ("64:09:80", Vendor::Xiaomi),
    ("74:51:ba", Vendor::Xiaomi),
    ("78:11:dc", Vendor::Xiaomi),
    ("f8:a4:5f", Vendor::Xiaomi),
    ("50:8f:4c", Vendor::Xiaomi),
    ("ac:c1:ee", Vendor::Xiaomi),
    ("f4:8e:92", Vendor::Xiaomi),
    ("28:6c:07", Vendor::Xiaomi),
    ("38:a4:ed", Vendor::Xiaomi),
    ("04:cf:4b", Vendor::Xiaomi),
    ("18:59:36", Vendor::Xiaomi),
    ("98:fa:e3", Vendor::Xiaomi),
    ("c4:0b:cb", Vendor::Xiaomi),
    ("dc:6a:e7", Vendor::Xiaomi),
    ("00:1a:11", Vendor::Google),
    ("ac:37:43", Vendor::Google),
    ("f4:f5:e8", Vendor::Google),
    ("00:12:fb", Vendor::Samsung),
    ("00:16:32", Vendor::Samsung),
    ("1c:62:b8", Vendor::Samsung),
    ("2c:44:01", Vendor::Samsung),
];

/// Look up the manufacturer family for a MAC address (or bare 3-byte prefix).
///
/// Accepts `:`/`-` delimited, dotted (`dc6a.e706.b9b8`) and undelimited forms
/// in any case. Anything unrecognised maps to [`Vendor::Other`].
pub fn identify(mac: &str) -> Vendor {
    let Some(bytes) = parse_mac_bytes(mac) else {
        return Vendor::Other;
    };
    let oui = format!("{:02x}:{:02x}:{:02x}", bytes[0], bytes[1], bytes[2]);
    OUI_TABLE
        .iter()
        .find(|(prefix, _)| *prefix == oui)
        .map(|(_, v)| *v)
        .unwrap_or(Vendor::Other)
}

/// Canonical lowercase colon-delimited form of a full 6-byte MAC.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let bytes = parse_mac_bytes(mac)?;
    if bytes.len() != 6 {
        return None;
    }
    Some(
        bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

/// Broadcast, multicast and all-zero addresses never identify a host.
pub fn is_unicast(mac: &str) -> bool {
    match parse_mac_bytes(mac) {
        Some(b) if b.len() == 6 => b[0] & 0x01 == 0 && b.iter().any(|&x| x != 0),
        _ => false,
    }
}

fn parse_mac_bytes(mac: &str) -> Option<Vec<u8>> {
    let s = mac.trim();
    let bytes: Vec<u8> = if s.contains(':') || s.contains('-') {
        // macOS `arp -a` drops leading zeros, so single-digit groups are valid.
        s.split([':', '-'])
            .map(|g| {
                if g.is_empty() || g.len() > 2 {
                    None
                } else {
                    u8::from_str_radix(g, 16).ok()
                }
            })
            .collect::<Option<Vec<_>>>()?
    } else {
        let hex: String = s.split('.').collect();
        if hex.len() % 2 != 0 {
            return None;
        }
        (0..hex.len())
            .step_by(2)
            .map(|i| hex.get(i..i + 2).and_then(|h| u8::from_str_radix(h, 16).ok()))
            .collect::<Option<Vec<_>>>()?
    };
    match bytes.len() {
        3 | 6 => Some(bytes),
        _ => None,
    }
}
