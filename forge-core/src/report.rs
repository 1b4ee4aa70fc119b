#![forbid(unsafe_code)]

//! Capability snapshot of a probed target.
//!
//! A [`FeatureReport`] is assembled once through [`FeatureReportBuilder`] (or
//! decoded from the cache) and is read-only afterwards. It is shared between
//! worker threads behind an `Arc` without further synchronization.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::protocol::{
    Direction, ExtensionType, KeyType, NamedGroup, ProtocolEpoch, ProtocolVersion, SignatureScheme,
};
use crate::suite::CipherSuite;

/// Initial request message captured from a client target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedHello {
    pub versions: Vec<ProtocolVersion>,
    pub cipher_suites: Vec<CipherSuite>,
    pub groups: Vec<NamedGroup>,
    /// Groups the client already sent a key share for.
    pub key_share_groups: Vec<NamedGroup>,
    pub signature_schemes: Vec<SignatureScheme>,
    pub extensions: Vec<ExtensionType>,
    /// Raw message bytes as received.
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureReport {
    target: String,
    direction: Direction,
    versions: BTreeSet<ProtocolVersion>,
    legacy_suites: BTreeSet<CipherSuite>,
    modern_suites: BTreeSet<CipherSuite>,
    legacy_groups: BTreeSet<NamedGroup>,
    modern_groups: BTreeSet<NamedGroup>,
    key_share_groups: BTreeSet<NamedGroup>,
    signature_schemes: BTreeSet<SignatureScheme>,
    extensions: BTreeSet<ExtensionType>,
    min_key_sizes: BTreeMap<KeyType, u16>,
    record_fragmentation: bool,
    initial_hello: Option<CapturedHello>,
}

impl FeatureReport {
    pub fn builder(target: impl Into<String>, direction: Direction) -> FeatureReportBuilder {
        FeatureReportBuilder::new(target, direction)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn versions(&self) -> &BTreeSet<ProtocolVersion> {
        &self.versions
    }

    pub fn suites(&self, epoch: ProtocolEpoch) -> &BTreeSet<CipherSuite> {
        match epoch {
            ProtocolEpoch::Legacy => &self.legacy_suites,
            ProtocolEpoch::Modern => &self.modern_suites,
        }
    }

    pub fn groups(&self, epoch: ProtocolEpoch) -> &BTreeSet<NamedGroup> {
        match epoch {
            ProtocolEpoch::Legacy => &self.legacy_groups,
            ProtocolEpoch::Modern => &self.modern_groups,
        }
    }

    /// Modern-epoch groups usable without a retry round trip.
    pub fn key_share_groups(&self) -> &BTreeSet<NamedGroup> {
        &self.key_share_groups
    }

    pub fn signature_schemes(&self) -> &BTreeSet<SignatureScheme> {
        &self.signature_schemes
    }

    pub fn extensions(&self) -> &BTreeSet<ExtensionType> {
        &self.extensions
    }

    pub fn supports_extension(&self, extension: ExtensionType) -> bool {
        self.extensions.contains(&extension)
    }

    /// Smallest certificate key size the target still accepts for `key_type`.
    /// `None` when the key type was never usable.
    pub fn min_key_size(&self, key_type: KeyType) -> Option<u16> {
        self.min_key_sizes.get(&key_type).copied()
    }

    pub fn min_key_sizes(&self) -> &BTreeMap<KeyType, u16> {
        &self.min_key_sizes
    }

    /// Whether the target processes records fragmented below the usual size.
    pub fn supports_record_fragmentation(&self) -> bool {
        self.record_fragmentation
    }

    pub fn initial_hello(&self) -> Option<&CapturedHello> {
        self.initial_hello.as_ref()
    }

    pub fn supports_epoch(&self, epoch: ProtocolEpoch) -> bool {
        !self.suites(epoch).is_empty()
    }
}

impl fmt::Display for FeatureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Target: {} ({})", self.target, self.direction)?;
        let versions: Vec<String> = self.versions.iter().map(ToString::to_string).collect();
        writeln!(f, "Versions: {}", versions.join(", "))?;
        for epoch in ProtocolEpoch::ALL {
            writeln!(f, "{} cipher suites:", epoch)?;
            for suite in self.suites(epoch) {
                writeln!(f, "  {} (0x{:04x})", suite, suite.id())?;
            }
            let groups: Vec<String> = self.groups(epoch).iter().map(ToString::to_string).collect();
            writeln!(f, "{} groups: {}", epoch, groups.join(", "))?;
        }
        let shares: Vec<String> = self.key_share_groups.iter().map(ToString::to_string).collect();
        writeln!(f, "Key share groups: {}", shares.join(", "))?;
        let schemes: Vec<String> = self.signature_schemes.iter().map(ToString::to_string).collect();
        writeln!(f, "Signature schemes: {}", schemes.join(", "))?;
        let extensions: Vec<String> = self.extensions.iter().map(|e| format!("{:?}", e)).collect();
        writeln!(f, "Extensions: {}", extensions.join(", "))?;
        for (key_type, size) in &self.min_key_sizes {
            writeln!(f, "Minimum {} key size: {}", key_type, size)?;
        }
        writeln!(f, "Record fragmentation: {}", self.record_fragmentation)?;
        if let Some(hello) = &self.initial_hello {
            writeln!(f, "Captured initial request: {} bytes", hello.raw.len())?;
        }
        Ok(())
    }
}

/// Collects capabilities while probing runs; `build` freezes them.
#[derive(Debug, Clone)]
pub struct FeatureReportBuilder {
    report: FeatureReport,
}

impl FeatureReportBuilder {
    pub fn new(target: impl Into<String>, direction: Direction) -> Self {
        Self {
            report: FeatureReport {
                target: target.into(),
                direction,
                versions: BTreeSet::new(),
                legacy_suites: BTreeSet::new(),
                modern_suites: BTreeSet::new(),
                legacy_groups: BTreeSet::new(),
                modern_groups: BTreeSet::new(),
                key_share_groups: BTreeSet::new(),
                signature_schemes: BTreeSet::new(),
                extensions: BTreeSet::new(),
                min_key_sizes: BTreeMap::new(),
                record_fragmentation: false,
                initial_hello: None,
            },
        }
    }

    pub fn version(mut self, version: ProtocolVersion) -> Self {
        self.report.versions.insert(version);
        self
    }

    /// Record a supported suite under the epoch it negotiated.
    pub fn suite(mut self, epoch: ProtocolEpoch, suite: CipherSuite) -> Self {
        match epoch {
            ProtocolEpoch::Legacy => self.report.legacy_suites.insert(suite),
            ProtocolEpoch::Modern => self.report.modern_suites.insert(suite),
        };
        self
    }

    pub fn suites(self, suites: impl IntoIterator<Item = CipherSuite>) -> Self {
        suites.into_iter().fold(self, |b, s| b.suite(s.epoch(), s))
    }

    pub fn group(mut self, epoch: ProtocolEpoch, group: NamedGroup) -> Self {
        match epoch {
            ProtocolEpoch::Legacy => self.report.legacy_groups.insert(group),
            ProtocolEpoch::Modern => self.report.modern_groups.insert(group),
        };
        self
    }

    pub fn key_share_group(mut self, group: NamedGroup) -> Self {
        self.report.key_share_groups.insert(group);
        self
    }

    pub fn signature_scheme(mut self, scheme: SignatureScheme) -> Self {
        self.report.signature_schemes.insert(scheme);
        self
    }

    pub fn extension(mut self, extension: ExtensionType) -> Self {
        self.report.extensions.insert(extension);
        self
    }

    /// Keeps the smallest size reported for each key type.
    pub fn min_key_size(mut self, key_type: KeyType, size: u16) -> Self {
        let entry = self.report.min_key_sizes.entry(key_type).or_insert(size);
        *entry = (*entry).min(size);
        self
    }

    pub fn record_fragmentation(mut self, supported: bool) -> Self {
        self.report.record_fragmentation = supported;
        self
    }

    pub fn initial_hello(mut self, hello: CapturedHello) -> Self {
        self.report.initial_hello = Some(hello);
        self
    }

    pub fn build(self) -> FeatureReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_partitions_suites_by_epoch() {
        let report = FeatureReport::builder("localhost:4433", Direction::Server)
            .suites([CipherSuite::Aes128GcmSha256, CipherSuite::EcdheRsaWithAes128GcmSha256])
            .build();
        assert_eq!(report.suites(ProtocolEpoch::Modern).len(), 1);
        assert_eq!(report.suites(ProtocolEpoch::Legacy).len(), 1);
        assert!(report.supports_epoch(ProtocolEpoch::Modern));
    }

    #[test]
    fn min_key_size_keeps_smallest() {
        let report = FeatureReport::builder("t", Direction::Client)
            .min_key_size(KeyType::Rsa, 2048)
            .min_key_size(KeyType::Rsa, 1024)
            .min_key_size(KeyType::Rsa, 4096)
            .build();
        assert_eq!(report.min_key_size(KeyType::Rsa), Some(1024));
        assert_eq!(report.min_key_size(KeyType::Ecdsa), None);
    }

    #[test]
    fn display_lists_suites() {
        let report = FeatureReport::builder("t", Direction::Server)
            .suite(ProtocolEpoch::Legacy, CipherSuite::RsaWithAes128CbcSha)
            .build();
        let text = report.to_string();
        assert!(text.contains("TLS_RSA_WITH_AES_128_CBC_SHA (0x002f)"));
    }
}
