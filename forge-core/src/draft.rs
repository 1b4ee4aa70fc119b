#![forbid(unsafe_code)]

//! Draft configuration consumed by the protocol driver.
//!
//! A `DraftConfig` starts from the driver's base configuration, is shaped by
//! the epoch strategy and then edited by derivation parameters. It is plain
//! data: the driver decides how each field maps onto wire behavior.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::protocol::{
    Direction, ExtensionType, KeyType, NamedGroup, ProtocolEpoch, ProtocolVersion, SignatureScheme,
};
use crate::suite::CipherSuite;

/// Largest plaintext fragment allowed by the record layer.
pub const MAX_RECORD_SIZE: u16 = 16384;

/// A certificate the driver can present, identified by key type and size.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CertificateSpec {
    pub key_type: KeyType,
    pub key_size: u16,
    /// Identifier the driver uses to locate key material.
    pub id: String,
}

impl CertificateSpec {
    pub fn new(key_type: KeyType, key_size: u16) -> Self {
        Self { key_type, key_size, id: format!("{}-{}", key_type, key_size) }
    }

    /// Certificates shipped with the default driver setup.
    pub fn default_catalog() -> Vec<CertificateSpec> {
        vec![
            CertificateSpec::new(KeyType::Rsa, 1024),
            CertificateSpec::new(KeyType::Rsa, 2048),
            CertificateSpec::new(KeyType::Rsa, 4096),
            CertificateSpec::new(KeyType::Ecdsa, 256),
            CertificateSpec::new(KeyType::Ecdsa, 384),
            CertificateSpec::new(KeyType::Ecdsa, 521),
            CertificateSpec::new(KeyType::Dsa, 1024),
            CertificateSpec::new(KeyType::Dsa, 2048),
        ]
    }
}

/// Record contents a test body may corrupt with a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModificationTarget {
    Ciphertext,
    Mac,
    Padding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftConfig {
    pub epoch: ProtocolEpoch,
    pub direction: Direction,
    pub versions: Vec<ProtocolVersion>,
    pub cipher_suites: Vec<CipherSuite>,
    pub selected_suite: Option<CipherSuite>,
    pub groups: Vec<NamedGroup>,
    /// Groups for which a key share is sent in the first flight (modern epoch).
    pub key_share_groups: Vec<NamedGroup>,
    pub selected_group: Option<NamedGroup>,
    pub signature_schemes: Vec<SignatureScheme>,
    /// Schemes advertised for certificate signatures.
    pub certificate_signature_schemes: Vec<SignatureScheme>,
    pub certificate: Option<CertificateSpec>,
    pub extensions: BTreeSet<ExtensionType>,
    pub max_record_size: u16,
    pub tcp_fragmentation: bool,
    pub grease_cipher_suites: bool,
    pub application_data: Vec<u8>,
    /// XOR masks applied by the driver to outgoing record contents.
    pub modifications: BTreeMap<ModificationTarget, Vec<u8>>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl DraftConfig {
    /// Empty configuration for the given endpoint; fields are filled by the
    /// driver and epoch strategy.
    pub fn new(direction: Direction) -> Self {
        Self {
            epoch: ProtocolEpoch::Legacy,
            direction,
            versions: Vec::new(),
            cipher_suites: Vec::new(),
            selected_suite: None,
            groups: Vec::new(),
            key_share_groups: Vec::new(),
            selected_group: None,
            signature_schemes: Vec::new(),
            certificate_signature_schemes: Vec::new(),
            certificate: None,
            extensions: BTreeSet::new(),
            max_record_size: MAX_RECORD_SIZE,
            tcp_fragmentation: false,
            grease_cipher_suites: false,
            application_data: Vec::new(),
            modifications: BTreeMap::new(),
            connect_timeout: Duration::from_millis(1000),
            read_timeout: Duration::from_millis(2000),
        }
    }

    /// Restrict the offered suites to a single suite.
    pub fn select_suite(&mut self, suite: CipherSuite) {
        self.cipher_suites = vec![suite];
        self.selected_suite = Some(suite);
    }

    /// Restrict the offered groups to a single group, sending a key share for it
    /// in the modern epoch.
    pub fn select_group(&mut self, group: NamedGroup) {
        self.groups = vec![group];
        self.selected_group = Some(group);
        if self.epoch == ProtocolEpoch::Modern {
            self.key_share_groups = vec![group];
        }
    }

    pub fn set_extension(&mut self, extension: ExtensionType, enabled: bool) {
        if enabled {
            self.extensions.insert(extension);
        } else {
            self.extensions.remove(&extension);
        }
    }
}
