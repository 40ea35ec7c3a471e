use droidlink::vendor::{identify, normalize_mac, Vendor, OUI_TABLE};

#[test]
fn every_known_oui_matches_in_any_format() {
    for (prefix, vendor) in OUI_TABLE {
        let colon = format!("{prefix}:01:02:03");
        let dashed = colon.replace(':', "-").to_uppercase();
        let bare = colon.replace(':', "");
        for mac in [&colon, &dashed, &bare, &colon.to_uppercase()] {
            assert_eq!(identify(mac), *vendor, "{mac}");
        }
    }
}

#[test]
fn unknown_prefix_is_other() {
    assert_eq!(identify("00:11:22:33:44:55"), Vendor::Other);
    assert_eq!(identify(""), Vendor::Other);
}

#[test]
fn normalized_macs_compare_equal() {
    assert_eq!(normalize_mac("DC-6A-E7-06-B9-B8"), normalize_mac("dc:6a:e7:06:b9:b8"));
}
