use std::fs;
use std::net::Ipv4Addr;

use droidlink::cache::ConnectionCache;
use droidlink::error::ConnectError;
use droidlink::types::ConnectionRecord;
use time::macros::datetime;

fn record() -> ConnectionRecord {
    ConnectionRecord {
        ip: Ipv4Addr::new(192, 168, 0, 5),
        port: 36019,
        mac: Some("dc:6a:e7:06:b9:b8".into()),
        device_model: "22011119UY".into(),
        device_name: "Redmi 10".into(),
        last_connected: datetime!(2026-05-04 12:30:00 UTC),
    }
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ConnectionCache::new(dir.path().join("connection_cache.json"));
    cache.save(&record()).unwrap();
    assert_eq!(cache.load(), Some(record()));
}

#[test]
fn record_without_mac_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ConnectionCache::new(dir.path().join("c.json"));
    let rec = ConnectionRecord { mac: None, device_name: String::new(), ..record() };
    cache.save(&rec).unwrap();
    assert_eq!(cache.load(), Some(rec));
}

#[test]
fn truncated_file_loads_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.json");
    let cache = ConnectionCache::new(&path);
    cache.save(&record()).unwrap();
    let full = fs::read(&path).unwrap();
    fs::write(&path, &full[..full.len() / 2]).unwrap();

    assert!(matches!(cache.read_record(), Err(ConnectError::CacheCorrupt(_))));
    assert_eq!(cache.load(), None);
}

#[test]
fn garbage_and_wrong_shape_load_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.json");
    let cache = ConnectionCache::new(&path);

    fs::write(&path, b"\xff\xfe not json").unwrap();
    assert_eq!(cache.load(), None);

    fs::write(&path, br#"{"ip": "192.168.0.5", "port": 70000}"#).unwrap();
    assert_eq!(cache.load(), None);
}

#[test]
fn directory_in_place_of_file_loads_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ConnectionCache::new(dir.path());
    assert_eq!(cache.load(), None);
}

#[test]
fn file_with_null_identity_and_naive_timestamp_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.json");
    fs::write(
        &path,
        r#"{"ip": "192.168.0.5", "port": 36019, "mac": "dc:6a:e7:06:b9:b8",
            "device_model": null, "device_name": null,
            "last_connected": "2025-12-01T09:15:30.250000"}"#,
    )
    .unwrap();

    let rec = ConnectionCache::new(&path).load().expect("loaded");
    assert_eq!(rec.port, 36019);
    assert_eq!(rec.device_model, "");
    assert_eq!(rec.last_connected, datetime!(2025-12-01 09:15:30.25 UTC));
}
