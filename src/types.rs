use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Last known good wireless endpoint, persisted between runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub ip: Ipv4Addr,
    pub port: u16,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub device_model: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub device_name: String,
    #[serde(serialize_with = "time::serde::rfc3339::serialize", deserialize_with = "timestamp")]
    pub last_connected: OffsetDateTime,
}

impl ConnectionRecord {
    pub fn endpoint(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip, self.port)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// RFC3339, or a naive `YYYY-MM-DDTHH:MM:SS[.ffffff]` stamp taken as UTC.
fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<OffsetDateTime, D::Error> {
    let raw = String::deserialize(d)?;
    if let Ok(t) = OffsetDateTime::parse(&raw, &time::format_description::well_known::Rfc3339) {
        return Ok(t);
    }
    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    PrimitiveDateTime::parse(&raw, naive)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(serde::de::Error::custom)
}

/// Scan tier a candidate host falls into.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum VendorTag {
    Cached,
    Xiaomi,
    AndroidOther,
    Unknown,
}

impl VendorTag {
    /// Tiers worth a deep scan when common ports fail.
    pub fn is_android_likely(self) -> bool {
        !matches!(self, VendorTag::Unknown)
    }
}

impl fmt::Display for VendorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VendorTag::Cached => "cached",
            VendorTag::Xiaomi => "xiaomi",
            VendorTag::AndroidOther => "android-other",
            VendorTag::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A host considered during one discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateHost {
    pub ip: Ipv4Addr,
    pub mac: Option<String>,
    pub tag: VendorTag,
}

/// Outcome of probing a single ip:port.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult {
    pub ip: Ipv4Addr,
    pub port: u16,
    /// True only when the bridge handshake succeeded, not merely the TCP connect.
    pub verified: bool,
}

impl ScanResult {
    pub fn closed(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port, verified: false }
    }
}

/// Endpoint located by the discovery engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundEndpoint {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub mac: Option<String>,
}

/// Identity properties queried from a connected device.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: String,
    pub manufacturer: String,
    pub android_version: String,
    pub device_name: String,
}

/// State column of the bridge `devices` listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Device,
    Offline,
    Unauthorized,
    Other(String),
}

impl From<&str> for DeviceState {
    fn from(s: &str) -> Self {
        match s {
            "device" => DeviceState::Device,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            other => DeviceState::Other(other.to_string()),
        }
    }
}

/// One row of the bridge `devices` listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AttachedDevice {
    pub serial: String,
    pub state: DeviceState,
}

impl AttachedDevice {
    /// Network serials are either `ip:port` or mDNS service names.
    pub fn is_usb(&self) -> bool {
        !self.serial.contains(':') && !self.serial.contains("._adb-tls-connect")
    }

    pub fn is_ready(&self) -> bool {
        self.state == DeviceState::Device
    }
}

/// How the session reached the device.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Transport {
    Usb { serial: String },
    Wireless { endpoint: SocketAddrV4 },
}

impl Transport {
    /// Serial to pass to `-s` for subsequent bridge commands.
    pub fn serial(&self) -> String {
        match self {
            Transport::Usb { serial } => serial.clone(),
            Transport::Wireless { endpoint } => endpoint.to_string(),
        }
    }
}

/// Successful result of [`crate::connector::Connector::connect`].
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ConnectedSession {
    pub transport: Transport,
    pub device: DeviceInfo,
    /// Record written to the cache, absent for USB sessions.
    pub record: Option<ConnectionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb_serials_exclude_network_forms() {
        let usb = AttachedDevice { serial: "7c3f9a2e".into(), state: DeviceState::Device };
        let tcp = AttachedDevice { serial: "192.168.0.5:43449".into(), state: DeviceState::Device };
        let mdns = AttachedDevice {
            serial: "adb-7c3f9a2e-AbCd._adb-tls-connect._tcp".into(),
            state: DeviceState::Device,
        };
        assert!(usb.is_usb());
        assert!(!tcp.is_usb());
        assert!(!mdns.is_usb());
    }

    #[test]
    fn record_serializes_ip_as_string() {
        let rec = ConnectionRecord {
            ip: Ipv4Addr::new(192, 168, 0, 5),
            port: 36019,
            mac: Some("dc:6a:e7:06:b9:b8".into()),
            device_model: "22011119UY".into(),
            device_name: "Redmi".into(),
            last_connected: time::macros::datetime!(2026-01-02 03:04:05 UTC),
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["ip"], "192.168.0.5");
        assert_eq!(v["port"], 36019);
        assert_eq!(v["last_connected"], "2026-01-02T03:04:05Z");
    }

    #[test]
    fn record_accepts_null_fields_and_naive_timestamp() {
        let json = r#"{
            "ip": "192.168.0.5",
            "port": 36019,
            "mac": null,
            "device_model": null,
            "device_name": null,
            "last_connected": "2025-11-20T18:42:07.512934"
        }"#;
        let rec: ConnectionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.mac, None);
        assert_eq!(rec.device_model, "");
        assert_eq!(rec.device_name, "");
        assert_eq!(
            rec.last_connected,
            time::macros::datetime!(2025-11-20 18:42:07.512934 UTC)
        );
    }

    #[test]
    fn record_rejects_unparseable_timestamp() {
        let json = r#"{"ip": "192.168.0.5", "port": 1, "last_connected": "yesterday"}"#;
        assert!(serde_json::from_str::<ConnectionRecord>(json).is_err());
    }
}
