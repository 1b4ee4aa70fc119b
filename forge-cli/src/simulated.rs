#![forbid(unsafe_code)]

//! In-process stand-in for a real protocol stack.
//!
//! A simulated target behaves according to a feature report: handshakes
//! succeed when the offered parameters are inside the report, reduced
//! record sizes need record fragmentation support, and any record
//! modification is answered with a `bad_record_mac` alert. The same profile
//! backs the capability scanner for server targets.

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use forge_core::{
    CapabilityScanner, CapturedHello, CipherSuite, Direction, DraftConfig, ExtensionType, FeatureReport, Interaction,
    InteractionArtifacts, InteractionKind, KeyType, MessageKind, NamedGroup, ProbeKind, ProtocolDriver, ProtocolEpoch,
    ProtocolVersion, RawScanReport, SignatureScheme, TransportError,
};

const BAD_RECORD_MAC: u8 = 20;
const HANDSHAKE_FAILURE: u8 = 40;
const FULL_RECORD_SIZE: u16 = 16384;

pub struct SimulatedTarget {
    profile: FeatureReport,
    hello: Option<CapturedHello>,
    latency: Duration,
}

impl SimulatedTarget {
    pub fn new(profile: FeatureReport) -> Self {
        let hello = match profile.direction() {
            Direction::Client => Some(profile.initial_hello().cloned().unwrap_or_else(|| Self::hello_for(&profile))),
            Direction::Server => None,
        };
        Self { profile, hello, latency: Duration::from_millis(2) }
    }

    /// Profile read from a JSON feature report.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let profile: FeatureReport =
            serde_json::from_str(&data).with_context(|| format!("decoding profile {}", path.display()))?;
        Ok(Self::new(profile))
    }

    /// A well behaved target supporting both epochs.
    pub fn reference(target: &str, direction: Direction) -> Self {
        let mut builder = FeatureReport::builder(target, direction)
            .version(ProtocolVersion::Tls12)
            .version(ProtocolVersion::Tls13)
            .suites([
                CipherSuite::Aes128GcmSha256,
                CipherSuite::Aes256GcmSha384,
                CipherSuite::Chacha20Poly1305Sha256,
                CipherSuite::EcdheRsaWithAes128GcmSha256,
                CipherSuite::EcdheEcdsaWithAes128GcmSha256,
                CipherSuite::EcdheRsaWithAes128CbcSha,
            ])
            .key_share_group(NamedGroup::X25519)
            .min_key_size(KeyType::Rsa, 2048)
            .min_key_size(KeyType::Ecdsa, 256)
            .record_fragmentation(true);
        for group in [NamedGroup::X25519, NamedGroup::Secp256r1, NamedGroup::Secp384r1] {
            builder = builder.group(ProtocolEpoch::Legacy, group).group(ProtocolEpoch::Modern, group);
        }
        for scheme in [
            SignatureScheme::RsaPssRsaeSha256,
            SignatureScheme::RsaPkcs1Sha256,
            SignatureScheme::EcdsaSecp256r1Sha256,
        ] {
            builder = builder.signature_scheme(scheme);
        }
        for extension in [
            ExtensionType::SupportedGroups,
            ExtensionType::SignatureAlgorithms,
            ExtensionType::SupportedVersions,
            ExtensionType::KeyShare,
            ExtensionType::ExtendedMasterSecret,
            ExtensionType::RenegotiationInfo,
        ] {
            builder = builder.extension(extension);
        }
        Self::new(builder.build())
    }

    /// The initial request a client profile sends.
    fn hello_for(profile: &FeatureReport) -> CapturedHello {
        CapturedHello {
            versions: profile.versions().iter().copied().collect(),
            cipher_suites: ProtocolEpoch::ALL.iter().flat_map(|&e| profile.suites(e).iter().copied()).collect(),
            groups: profile.groups(ProtocolEpoch::Modern).iter().copied().collect(),
            key_share_groups: profile.key_share_groups().iter().copied().collect(),
            signature_schemes: profile.signature_schemes().iter().copied().collect(),
            extensions: profile.extensions().iter().copied().collect(),
            raw: vec![0x16, 0x03, 0x01, 0x00, 0x00],
        }
    }

    pub fn profile(&self) -> &FeatureReport {
        &self.profile
    }

    fn negotiate(&self, config: &DraftConfig) -> Option<CipherSuite> {
        let mut offered = config.selected_suite.into_iter().chain(config.cipher_suites.iter().copied());
        offered.find(|s| self.profile.suites(s.epoch()).contains(s))
    }

    fn accepts(&self, config: &DraftConfig, suite: CipherSuite) -> bool {
        let epoch = suite.epoch();
        if let Some(cert) = &config.certificate {
            let too_small = self.profile.min_key_size(cert.key_type).map_or(true, |min| cert.key_size < min);
            if too_small || !suite.accepts_key_type(cert.key_type) {
                return false;
            }
        }
        if let Some(group) = config.selected_group {
            if !self.profile.groups(epoch).contains(&group) {
                return false;
            }
        }
        config.max_record_size >= FULL_RECORD_SIZE || self.profile.supports_record_fragmentation()
    }

    fn handshake(&self, config: &DraftConfig) -> InteractionArtifacts {
        let Some(suite) = self.negotiate(config).filter(|&s| self.accepts(config, s)) else {
            return InteractionArtifacts {
                sent: vec![MessageKind::ClientHello],
                received: vec![MessageKind::Alert],
                alert: Some(HANDSHAKE_FAILURE),
                ..Default::default()
            };
        };
        let version = match suite.epoch() {
            ProtocolEpoch::Legacy => ProtocolVersion::Tls12,
            ProtocolEpoch::Modern => ProtocolVersion::Tls13,
        };
        let mut received = vec![MessageKind::ServerHello, MessageKind::Finished];
        if !config.modifications.is_empty() {
            received.push(MessageKind::Alert);
            return InteractionArtifacts {
                sent: vec![MessageKind::ClientHello, MessageKind::Finished, MessageKind::ApplicationData],
                received,
                negotiated_version: Some(version),
                negotiated_suite: Some(suite),
                alert: Some(BAD_RECORD_MAC),
                ..Default::default()
            };
        }
        received.push(MessageKind::ApplicationData);
        InteractionArtifacts {
            sent: vec![MessageKind::ClientHello, MessageKind::Finished, MessageKind::ApplicationData],
            received,
            plan_completed: true,
            negotiated_version: Some(version),
            negotiated_suite: Some(suite),
            ..Default::default()
        }
    }
}

impl ProtocolDriver for SimulatedTarget {
    fn build_config(&self, direction: Direction) -> DraftConfig {
        let mut config = DraftConfig::new(direction);
        config.versions = ProtocolVersion::ALL.to_vec();
        config.cipher_suites = CipherSuite::ALL.to_vec();
        config.groups = NamedGroup::ALL.to_vec();
        config
    }

    fn build_interaction(&self, kind: InteractionKind, _config: &DraftConfig) -> Interaction {
        let expected = match kind {
            InteractionKind::CaptureInitialRequest => vec![MessageKind::ClientHello],
            InteractionKind::HelloRetry { .. } => {
                vec![MessageKind::HelloRetryRequest, MessageKind::ClientHello, MessageKind::Finished]
            }
            _ => vec![MessageKind::ClientHello, MessageKind::ServerHello, MessageKind::Finished],
        };
        Interaction::new(kind, expected).tolerate(MessageKind::ApplicationData)
    }

    fn execute(&self, config: &DraftConfig, interaction: &Interaction) -> Result<InteractionArtifacts, TransportError> {
        thread::sleep(self.latency);
        let artifacts = match &interaction.kind {
            InteractionKind::CaptureInitialRequest => match &self.hello {
                Some(hello) => InteractionArtifacts {
                    received: vec![MessageKind::ClientHello],
                    plan_completed: true,
                    captured_hello: Some(hello.clone()),
                    ..Default::default()
                },
                None => return Err(TransportError::ReadTimeout),
            },
            InteractionKind::HelloRetry { group } => {
                if self.profile.groups(ProtocolEpoch::Modern).contains(group) {
                    InteractionArtifacts {
                        sent: vec![MessageKind::HelloRetryRequest],
                        received: vec![MessageKind::ClientHello, MessageKind::Finished],
                        plan_completed: true,
                        ..Default::default()
                    }
                } else {
                    InteractionArtifacts { received: vec![MessageKind::Alert], alert: Some(HANDSHAKE_FAILURE), ..Default::default() }
                }
            }
            InteractionKind::Handshake | InteractionKind::Custom(_) => self.handshake(config),
        };
        Ok(artifacts)
    }
}

/// Capability scanner answering from the simulated target's profile.
pub struct SimulatedScanner {
    profile: FeatureReport,
    probes: Vec<ProbeKind>,
}

impl SimulatedScanner {
    pub fn new(target: &SimulatedTarget) -> Self {
        Self { profile: target.profile().clone(), probes: Vec::new() }
    }
}

impl CapabilityScanner for SimulatedScanner {
    fn configure(&mut self, probes: &[ProbeKind], _base: &DraftConfig) {
        self.probes = probes.to_vec();
    }

    fn scan(&mut self) -> Result<RawScanReport, String> {
        let probes = &self.probes;
        if probes.is_empty() {
            return Err("scanner used before configuration".into());
        }
        let wants = |kind: ProbeKind| probes.contains(&kind);
        let p = &self.profile;
        let mut raw = RawScanReport::default();
        if wants(ProbeKind::ProtocolVersions) {
            raw.versions = p.versions().iter().map(|v| v.id()).collect();
        }
        if wants(ProbeKind::CipherSuites) {
            raw.cipher_suites = ProtocolEpoch::ALL.iter().flat_map(|&e| p.suites(e).iter().map(|s| s.id())).collect();
        }
        if wants(ProbeKind::NamedGroups) {
            let groups: std::collections::BTreeSet<u16> =
                ProtocolEpoch::ALL.iter().flat_map(|&e| p.groups(e).iter().map(|g| g.id())).collect();
            raw.groups = groups.into_iter().collect();
            raw.key_share_groups = p.key_share_groups().iter().map(|g| g.id()).collect();
        }
        if wants(ProbeKind::SignatureSchemes) {
            raw.signature_schemes = p.signature_schemes().iter().map(|s| s.id()).collect();
        }
        if wants(ProbeKind::Extensions) {
            raw.extensions = p.extensions().iter().map(|e| e.id()).collect();
        }
        if wants(ProbeKind::Certificates) {
            raw.certificates = p.min_key_sizes().iter().map(|(&k, &s)| (k, s)).collect();
        }
        if wants(ProbeKind::RecordFragmentation) {
            raw.record_fragmentation = Some(p.supports_record_fragmentation());
        }
        Ok(raw)
    }
}
