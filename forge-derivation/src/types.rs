#![forbid(unsafe_code)]

//! Derivation types (configuration dimensions) and their selected values.

use serde::{Deserialize, Serialize};
use std::fmt;

use forge_core::{CertificateSpec, CipherSuite, ModificationTarget, NamedGroup, SignatureScheme};

/// Tag for one configuration dimension.
///
/// The declaration order is the registration order used when a combination
/// is applied to a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DerivationType {
    CipherSuite,
    NamedGroup,
    SignatureScheme,
    Certificate,
    RecordLength,
    TcpFragmentation,
    IncludeEncryptThenMac,
    IncludeExtendedMasterSecret,
    IncludeSessionTicket,
    IncludeRenegotiationInfo,
    IncludePadding,
    IncludeGreaseCipherSuites,
    AppMessageData,
    CiphertextBitmask,
    MacBitmask,
    PaddingBitmask,
    /// Bit index child shared by every bitmask dimension.
    BitPosition,
}

impl DerivationType {
    pub const ALL: [DerivationType; 17] = [
        DerivationType::CipherSuite,
        DerivationType::NamedGroup,
        DerivationType::SignatureScheme,
        DerivationType::Certificate,
        DerivationType::RecordLength,
        DerivationType::TcpFragmentation,
        DerivationType::IncludeEncryptThenMac,
        DerivationType::IncludeExtendedMasterSecret,
        DerivationType::IncludeSessionTicket,
        DerivationType::IncludeRenegotiationInfo,
        DerivationType::IncludePadding,
        DerivationType::IncludeGreaseCipherSuites,
        DerivationType::AppMessageData,
        DerivationType::CiphertextBitmask,
        DerivationType::MacBitmask,
        DerivationType::PaddingBitmask,
        DerivationType::BitPosition,
    ];

    /// Byte-index dimension of a bitmask pair.
    pub fn is_bitmask(&self) -> bool {
        self.modification_target().is_some()
    }

    /// Implicit child added whenever this type is modeled.
    pub fn child(&self) -> Option<DerivationType> {
        if self.is_bitmask() {
            Some(DerivationType::BitPosition)
        } else {
            None
        }
    }

    /// Whether some other type adds this one as its child.
    pub fn is_child(&self) -> bool {
        Self::ALL.iter().any(|parent| parent.child() == Some(*self))
    }

    pub fn modification_target(&self) -> Option<ModificationTarget> {
        match self {
            DerivationType::CiphertextBitmask => Some(ModificationTarget::Ciphertext),
            DerivationType::MacBitmask => Some(ModificationTarget::Mac),
            DerivationType::PaddingBitmask => Some(ModificationTarget::Padding),
            _ => None,
        }
    }
}

impl fmt::Display for DerivationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Value selected for one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterValue {
    CipherSuite(CipherSuite),
    NamedGroup(NamedGroup),
    SignatureScheme(SignatureScheme),
    Certificate(CertificateSpec),
    RecordLength(u16),
    Flag(bool),
    Bytes(Vec<u8>),
    ByteIndex(usize),
    BitIndex(u8),
}

impl ParameterValue {
    pub fn as_suite(&self) -> Option<CipherSuite> {
        match self {
            ParameterValue::CipherSuite(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<NamedGroup> {
        match self {
            ParameterValue::NamedGroup(g) => Some(*g),
            _ => None,
        }
    }

    pub fn as_signature(&self) -> Option<SignatureScheme> {
        match self {
            ParameterValue::SignatureScheme(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_certificate(&self) -> Option<&CertificateSpec> {
        match self {
            ParameterValue::Certificate(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ParameterValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_record_length(&self) -> Option<u16> {
        match self {
            ParameterValue::RecordLength(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ParameterValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_byte_index(&self) -> Option<usize> {
        match self {
            ParameterValue::ByteIndex(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bit_index(&self) -> Option<u8> {
        match self {
            ParameterValue::BitIndex(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::CipherSuite(s) => write!(f, "{}", s),
            ParameterValue::NamedGroup(g) => write!(f, "{}", g),
            ParameterValue::SignatureScheme(s) => write!(f, "{}", s),
            ParameterValue::Certificate(c) => write!(f, "{}", c.id),
            ParameterValue::RecordLength(n) => write!(f, "{}", n),
            ParameterValue::Flag(b) => write!(f, "{}", b),
            ParameterValue::Bytes(b) => write!(f, "{} bytes", b.len()),
            ParameterValue::ByteIndex(i) => write!(f, "byte {}", i),
            ParameterValue::BitIndex(i) => write!(f, "bit {}", i),
        }
    }
}

/// A value bound to its dimension. Immutable once selected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivationParameter {
    kind: DerivationType,
    value: ParameterValue,
}

impl DerivationParameter {
    pub fn new(kind: DerivationType, value: ParameterValue) -> Self {
        Self { kind, value }
    }

    pub fn kind(&self) -> DerivationType {
        self.kind
    }

    pub fn value(&self) -> &ParameterValue {
        &self.value
    }
}

impl fmt::Display for DerivationParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.value)
    }
}
