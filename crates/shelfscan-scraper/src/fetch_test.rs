use super::*;
use shelfscan_core::LocationPreset;

#[test]
fn block_page_markers_are_case_insensitive() {
    assert!(is_block_page(
        "<p>Write to SECURITY@BLINKIT.COM if this is a mistake</p>"
    ));
    assert!(is_block_page("<h1>Sorry, we have Blocked You</h1>"));
    assert!(!is_block_page("<div id=\"plpContainer\"></div>"));
}

#[test]
fn http_targets_are_never_snapshots() {
    assert!(snapshot_path("https://blinkit.com/cn/bread/cid/14/953").is_none());
    assert!(snapshot_path("http://localhost:8080/listing").is_none());
}

#[test]
fn file_scheme_resolves_even_when_missing() {
    assert_eq!(
        snapshot_path("file:///tmp/does-not-exist.html"),
        Some(PathBuf::from("/tmp/does-not-exist.html"))
    );
}

#[test]
fn bare_path_resolves_only_when_present() {
    assert!(snapshot_path("/definitely/not/a/real/snapshot.html").is_none());
    let manifest = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");
    assert_eq!(snapshot_path(manifest), Some(PathBuf::from(manifest)));
}

#[test]
fn location_cookie_encodes_free_text_fields() {
    let cookie = location_cookie(&LocationPreset::Gurugram.location());
    assert!(cookie.starts_with("gr_1_lat=28.465204; gr_1_lon=77.06159; "));
    assert!(cookie.contains("gr_1_locality=Gurugram"));
    let landmark = cookie
        .split("; ")
        .find_map(|pair| pair.strip_prefix("gr_1_landmark="))
        .unwrap();
    assert!(!landmark.contains(' '));
    assert!(!landmark.contains(','));
}

#[test]
fn location_cookie_omits_missing_landmark() {
    let mut location = LocationPreset::Delhi.location();
    location.landmark = None;
    assert!(!location_cookie(&location).contains("gr_1_landmark"));
}

#[test]
fn location_headers_carry_coordinates() {
    let headers = location_headers(&LocationPreset::Mumbai.location());
    assert_eq!(headers[0], ("lat", "19.076".to_string()));
    assert_eq!(headers[1], ("lon", "72.8777".to_string()));
}
