#![forbid(unsafe_code)]

//! Contracts of the external collaborators: the protocol driver that actually
//! speaks to the target, and the capability scanner used for server probing.
//!
//! The forge crates only depend on these narrow traits. Epoch specific
//! configuration construction is a strategy function looked up by epoch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::draft::DraftConfig;
use crate::protocol::{
    Direction, ExtensionType, KeyType, MessageKind, NamedGroup, ProtocolEpoch, ProtocolVersion,
    SignatureScheme,
};
use crate::report::CapturedHello;
use crate::suite::CipherSuite;

/// Shape of interaction the driver is asked to construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionKind {
    /// One complete handshake.
    Handshake,
    /// Wait for the target's initial request and record it.
    CaptureInitialRequest,
    /// Answer the initial request with a retry directive forcing `group`.
    HelloRetry { group: NamedGroup },
    /// Driver specific interaction named by a test body.
    Custom(String),
}

/// A planned message exchange with the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub kind: InteractionKind,
    /// Messages that must be exchanged for the interaction to count as planned.
    pub expected: Vec<MessageKind>,
    /// Messages that may follow the plan without counting as a deviation.
    pub tolerated: Vec<MessageKind>,
}

impl Interaction {
    pub fn new(kind: InteractionKind, expected: Vec<MessageKind>) -> Self {
        Self { kind, expected, tolerated: Vec::new() }
    }

    pub fn tolerate(mut self, message: MessageKind) -> Self {
        if !self.tolerated.contains(&message) {
            self.tolerated.push(message);
        }
        self
    }
}

/// Everything the driver captured while running one interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionArtifacts {
    pub sent: Vec<MessageKind>,
    pub received: Vec<MessageKind>,
    /// Every expected step of the plan was executed.
    pub plan_completed: bool,
    /// Messages received beyond the plan.
    pub unexpected: Vec<MessageKind>,
    pub negotiated_version: Option<ProtocolVersion>,
    pub negotiated_suite: Option<CipherSuite>,
    pub captured_hello: Option<CapturedHello>,
    /// Alert description received from the target, if any.
    pub alert: Option<u8>,
}

impl InteractionArtifacts {
    pub fn received_message(&self, message: MessageKind) -> bool {
        self.received.contains(&message)
    }
}

/// Connection level failure of a single interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransportError {
    #[error("connect timed out")]
    ConnectTimeout,
    #[error("read timed out")]
    ReadTimeout,
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("connection reset by peer")]
    Reset,
    #[error("transport failure: {0}")]
    Other(String),
}

/// Protocol engine the conformance core drives.
pub trait ProtocolDriver: Send + Sync {
    /// Base configuration for the given endpoint role.
    fn build_config(&self, direction: Direction) -> DraftConfig;

    /// Construct the message plan for `kind` under `config`.
    fn build_interaction(&self, kind: InteractionKind, config: &DraftConfig) -> Interaction;

    /// Run one interaction to completion. Connect and read timeouts are taken
    /// from `config`.
    fn execute(&self, config: &DraftConfig, interaction: &Interaction) -> Result<InteractionArtifacts, TransportError>;

    /// Suites the driver can negotiate.
    fn implemented_suites(&self) -> Vec<CipherSuite> {
        CipherSuite::ALL.to_vec()
    }
}

/// Epoch specific configuration construction.
pub type ConfigStrategy = fn(DraftConfig) -> DraftConfig;

pub fn strategy_for(epoch: ProtocolEpoch) -> ConfigStrategy {
    match epoch {
        ProtocolEpoch::Legacy => legacy_config,
        ProtocolEpoch::Modern => modern_config,
    }
}

fn legacy_config(mut config: DraftConfig) -> DraftConfig {
    config.epoch = ProtocolEpoch::Legacy;
    config.versions = vec![ProtocolVersion::Tls12];
    config.cipher_suites = CipherSuite::catalog(ProtocolEpoch::Legacy);
    config.groups = NamedGroup::ALL.iter().copied().filter(NamedGroup::is_elliptic).collect();
    config.key_share_groups.clear();
    config.signature_schemes = SignatureScheme::ALL.to_vec();
    for extension in [ExtensionType::KeyShare, ExtensionType::SupportedVersions, ExtensionType::PskKeyExchangeModes] {
        config.extensions.remove(&extension);
    }
    config.extensions.insert(ExtensionType::SupportedGroups);
    config.extensions.insert(ExtensionType::SignatureAlgorithms);
    config
}

fn modern_config(mut config: DraftConfig) -> DraftConfig {
    config.epoch = ProtocolEpoch::Modern;
    config.versions = vec![ProtocolVersion::Tls13];
    config.cipher_suites = CipherSuite::catalog(ProtocolEpoch::Modern);
    config.groups = NamedGroup::ALL.to_vec();
    config.key_share_groups = vec![NamedGroup::X25519];
    config.signature_schemes = SignatureScheme::ALL
        .iter()
        .copied()
        .filter(|s| s.allowed_in(ProtocolEpoch::Modern))
        .collect();
    config.extensions.retain(|e| !e.legacy_only());
    for extension in [
        ExtensionType::SupportedGroups,
        ExtensionType::SignatureAlgorithms,
        ExtensionType::KeyShare,
        ExtensionType::SupportedVersions,
    ] {
        config.extensions.insert(extension);
    }
    config
}

/// Capability areas the scanner is asked to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeKind {
    ProtocolVersions,
    CipherSuites,
    NamedGroups,
    SignatureSchemes,
    Extensions,
    Certificates,
    RecordFragmentation,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 7] = [
        ProbeKind::ProtocolVersions,
        ProbeKind::CipherSuites,
        ProbeKind::NamedGroups,
        ProbeKind::SignatureSchemes,
        ProbeKind::Extensions,
        ProbeKind::Certificates,
        ProbeKind::RecordFragmentation,
    ];
}

/// Raw scanner output keyed by wire identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScanReport {
    pub versions: Vec<u16>,
    pub cipher_suites: Vec<u16>,
    pub groups: Vec<u16>,
    /// Groups accepted in a first-flight key share.
    pub key_share_groups: Vec<u16>,
    pub signature_schemes: Vec<u16>,
    pub extensions: Vec<u16>,
    /// Certificates presented by the target, as key type and size.
    pub certificates: Vec<(KeyType, u16)>,
    pub record_fragmentation: Option<bool>,
}

/// General purpose capability scanner used for server targets.
pub trait CapabilityScanner: Send {
    fn configure(&mut self, probes: &[ProbeKind], base: &DraftConfig);

    fn scan(&mut self) -> Result<RawScanReport, String>;
}
