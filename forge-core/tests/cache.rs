use forge_core::{
    CapturedHello, CipherSuite, Direction, ExtensionType, FeatureReport, KeyType, NamedGroup,
    ProtocolEpoch, ProtocolVersion, ReportCache,
};

fn sample_report() -> FeatureReport {
    FeatureReport::builder("127.0.0.1:4433", Direction::Client)
        .version(ProtocolVersion::Tls12)
        .version(ProtocolVersion::Tls13)
        .suites([CipherSuite::Aes128GcmSha256, CipherSuite::EcdheRsaWithAes128GcmSha256])
        .group(ProtocolEpoch::Modern, NamedGroup::X25519)
        .key_share_group(NamedGroup::X25519)
        .extension(ExtensionType::ExtendedMasterSecret)
        .min_key_size(KeyType::Rsa, 2048)
        .record_fragmentation(true)
        .initial_hello(CapturedHello { raw: vec![0x16, 0x03, 0x01], ..CapturedHello::default() })
        .build()
}

#[test]
fn store_then_load_returns_identical_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = ReportCache::new(dir.path());
    let report = sample_report();

    assert!(!cache.contains(report.target()));
    cache.store(&report).expect("store");
    assert!(cache.contains(report.target()));

    let loaded = cache.load(report.target()).expect("cached report");
    assert_eq!(loaded, report);

    let summary = std::fs::read_to_string(dir.path().join("127.0.0.1_4433.txt")).expect("summary");
    assert!(summary.contains("Minimum rsa key size: 2048"));
}

#[test]
fn corrupt_entry_is_a_cache_miss() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("broken.json"), b"{ not json").expect("write");
    let cache = ReportCache::new(dir.path());
    assert!(cache.contains("broken"));
    assert!(cache.load("broken").is_none());
}

#[test]
fn missing_directory_is_a_cache_miss() {
    let cache = ReportCache::new("/nonexistent/forge-cache");
    assert!(cache.load("anything").is_none());
}
