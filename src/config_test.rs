use super::*;

#[test]
fn exact_pattern_matches_full_origin_only() {
    let pattern = OriginPattern::parse("http://localhost:4200").unwrap();
    assert!(pattern.matches("http://localhost:4200"));
    assert!(!pattern.matches("http://localhost:4201"));
    assert!(!pattern.matches("https://localhost:4200"));
}

#[test]
fn suffix_pattern_matches_subdomains() {
    let pattern = OriginPattern::parse("*.railboard.app").unwrap();
    assert!(pattern.matches("https://plan.railboard.app"));
    assert!(pattern.matches("https://staging.plan.railboard.app"));
    assert!(pattern.matches("https://plan.railboard.app:8443"));
    assert!(!pattern.matches("https://railboard.app.evil.com"));
    assert!(!pattern.matches("https://notrailboard.app"));
}

#[test]
fn empty_entries_are_skipped() {
    assert!(OriginPattern::parse("").is_none());
    assert!(OriginPattern::parse("   ").is_none());
}

#[test]
fn missing_origin_is_admitted() {
    let config = Config::default();
    assert!(config.origin_allowed(None));
}

#[test]
fn default_config_admits_local_dev_hosts() {
    let config = Config::default();
    assert!(config.origin_allowed(Some("http://localhost:4200")));
    assert!(config.origin_allowed(Some("https://plan.railboard.app")));
    assert!(!config.origin_allowed(Some("https://example.com")));
}

#[test]
fn origin_host_handles_ports_and_paths() {
    assert_eq!(origin_host("https://a.b.c:443"), Some("a.b.c"));
    assert_eq!(origin_host("http://a.b.c/path"), Some("a.b.c"));
    assert_eq!(origin_host("a.b.c"), Some("a.b.c"));
    assert_eq!(origin_host(""), None);
}
