use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Wireless-debugging ports seen often enough to try before a deep scan.
/// Device and firmware specific; override with a ports file.
pub const COMMON_PORTS: &[u16] = &[
    43449, 35059, 36361, 40441, 37777, 42222, 38888, 44973, 45678, 41234,
];

/// Range Android picks wireless-debugging ports from.
pub const DEEP_SCAN_RANGE: (u16, u16) = (30000, 65535);

/// Parse a ports list into a deduplicated list of TCP ports (1..=65535).
///
/// Supported formats per line:
/// - single port number: `43449`
/// - inclusive range: `37000-37010`
/// - comments: everything after `#` is ignored
/// - whitespace and blank lines are ignored
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }

        let ports = parse_port_spec(line).with_context(|| format!("line {line_no}"))?;
        for p in ports {
            if seen.insert(p) {
                out.push(p);
            }
        }
    }

    Ok(out)
}

/// Parse a single `port` or `start-end` spec, e.g. the `--deep-range` flag.
pub fn parse_port_spec(spec: &str) -> Result<Vec<u16>> {
    if let Some((a, b)) = spec.split_once('-') {
        let start = parse_port_str(a.trim())
            .with_context(|| format!("invalid start in range: {a}"))?;
        let end =
            parse_port_str(b.trim()).with_context(|| format!("invalid end in range: {b}"))?;
        if start > end {
            bail!("invalid range {start}-{end} (start > end)");
        }
        return Ok((start..=end).collect());
    }
    let p = parse_port_str(spec.trim()).with_context(|| format!("invalid port value: {spec}"))?;
    Ok(vec![p])
}

/// Load a ports list from a file path. Errors if the file cannot be read or parsed.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    parse_ports_str(&content)
}

pub fn default_common_ports() -> Vec<u16> {
    COMMON_PORTS.to_vec()
}

pub fn default_deep_scan_ports() -> Vec<u16> {
    (DEEP_SCAN_RANGE.0..=DEEP_SCAN_RANGE.1).collect()
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
