#![forbid(unsafe_code)]

//! Server targets are examined by an external capability scanner. The scanner
//! reports wire identifiers; this module turns them into a feature report,
//! skipping identifiers the conformance core has no name for.

use tracing::{debug, info};

use forge_core::{
    strategy_for, CapabilityScanner, CipherSuite, Direction, ExtensionType, FeatureReport, ForgeConfig, NamedGroup,
    ProbeKind, ProtocolDriver, ProtocolEpoch, ProtocolVersion, RawScanReport, SignatureScheme,
};

use crate::error::{ProbeError, ProbeResult};

pub fn probe_server(
    scanner: &mut dyn CapabilityScanner,
    driver: &dyn ProtocolDriver,
    settings: &ForgeConfig,
) -> ProbeResult<FeatureReport> {
    let mut base = strategy_for(ProtocolEpoch::Modern)(driver.build_config(Direction::Server));
    base.connect_timeout = settings.connect_timeout();
    base.read_timeout = settings.read_timeout();

    scanner.configure(&ProbeKind::ALL, &base);
    let raw = scanner.scan().map_err(ProbeError::Scanner)?;
    info!(target_identity = %settings.target, suites = raw.cipher_suites.len(), "scanner finished");
    adapt_scan(&settings.target, &raw)
}

/// Resolve wire identifiers, counting the ones without a known name.
fn lookup<T>(ids: &[u16], from_id: fn(u16) -> Option<T>, skipped: &mut usize) -> Vec<T> {
    ids.iter()
        .filter_map(|&id| {
            let found = from_id(id);
            if found.is_none() {
                *skipped += 1;
                debug!(id = format_args!("{:#06x}", id), "unknown identifier in scan");
            }
            found
        })
        .collect()
}

/// Build a feature report from raw scanner output.
pub fn adapt_scan(target: &str, raw: &RawScanReport) -> ProbeResult<FeatureReport> {
    let mut skipped = 0usize;
    let suites = lookup(&raw.cipher_suites, CipherSuite::from_id, &mut skipped);
    if suites.is_empty() {
        return Err(ProbeError::ProbingExhaustion { attempted: raw.cipher_suites.len() });
    }
    let legacy = suites.iter().any(|s| s.epoch() == ProtocolEpoch::Legacy);
    let modern = suites.iter().any(|s| s.epoch() == ProtocolEpoch::Modern);

    let mut builder = FeatureReport::builder(target, Direction::Server).suites(suites);
    for version in lookup(&raw.versions, ProtocolVersion::from_id, &mut skipped) {
        builder = builder.version(version);
    }
    for group in lookup(&raw.groups, NamedGroup::from_id, &mut skipped) {
        if legacy {
            builder = builder.group(ProtocolEpoch::Legacy, group);
        }
        if modern {
            builder = builder.group(ProtocolEpoch::Modern, group);
        }
    }
    for group in lookup(&raw.key_share_groups, NamedGroup::from_id, &mut skipped) {
        builder = builder.key_share_group(group);
    }
    for scheme in lookup(&raw.signature_schemes, SignatureScheme::from_id, &mut skipped) {
        builder = builder.signature_scheme(scheme);
    }
    for extension in lookup(&raw.extensions, ExtensionType::from_id, &mut skipped) {
        builder = builder.extension(extension);
    }
    for &(key_type, size) in &raw.certificates {
        builder = builder.min_key_size(key_type, size);
    }
    builder = builder.record_fragmentation(raw.record_fragmentation.unwrap_or(false));

    if skipped > 0 {
        debug!(skipped, "scan identifiers without a known name were dropped");
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::KeyType;

    fn raw() -> RawScanReport {
        RawScanReport {
            versions: vec![0x0303, 0x0304, 0x7f1c],
            cipher_suites: vec![0x1301, 0xc02f, 0xfafa],
            groups: vec![0x001d, 0x0017],
            key_share_groups: vec![0x001d],
            signature_schemes: vec![0x0804],
            extensions: vec![0x000a, 0x002b],
            certificates: vec![(KeyType::Rsa, 4096), (KeyType::Rsa, 2048)],
            record_fragmentation: None,
        }
    }

    #[test]
    fn adapts_known_identifiers() {
        let report = adapt_scan("10.0.0.1:443", &raw()).unwrap();
        assert_eq!(report.direction(), Direction::Server);
        assert_eq!(report.versions().len(), 2);
        assert!(report.suites(ProtocolEpoch::Modern).contains(&CipherSuite::Aes128GcmSha256));
        assert!(report.suites(ProtocolEpoch::Legacy).contains(&CipherSuite::EcdheRsaWithAes128GcmSha256));
        assert_eq!(report.groups(ProtocolEpoch::Modern).len(), 2);
        assert!(report.key_share_groups().contains(&NamedGroup::X25519));
        assert_eq!(report.min_key_size(KeyType::Rsa), Some(2048));
        assert!(!report.supports_record_fragmentation());
    }

    #[test]
    fn scan_without_known_suites_is_exhaustion() {
        let raw = RawScanReport { cipher_suites: vec![0xfafa], ..raw() };
        assert!(matches!(adapt_scan("x", &raw), Err(ProbeError::ProbingExhaustion { attempted: 1 })));
    }
}
