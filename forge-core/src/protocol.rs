#![forbid(unsafe_code)]

//! Protocol identifiers shared by probing, derivation and execution.
//!
//! Every identifier is a closed enum carrying its IANA wire value so that raw
//! scanner output can be mapped back with `from_id`, and so that configuration
//! files can name values textually.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ForgeError;

/// Protocol version generation used to branch configuration construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolEpoch {
    /// Pre-1.3 handshake family.
    Legacy,
    /// 1.3 handshake family.
    Modern,
}

impl ProtocolEpoch {
    pub const ALL: [ProtocolEpoch; 2] = [ProtocolEpoch::Legacy, ProtocolEpoch::Modern];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolEpoch::Legacy => "legacy",
            ProtocolEpoch::Modern => "modern",
        }
    }
}

impl fmt::Display for ProtocolEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolEpoch {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "tls12" => Ok(ProtocolEpoch::Legacy),
            "modern" | "tls13" => Ok(ProtocolEpoch::Modern),
            _ => Err(ForgeError::UnknownIdentifier { kind: "epoch", value: s.to_string() }),
        }
    }
}

/// Role of the implementation under test.
///
/// `Client` means the target is a client that connects to us, `Server` means
/// we connect to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Client,
    Server,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Client => "client",
            Direction::Server => "server",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "client" => Ok(Direction::Client),
            "server" => Ok(Direction::Server),
            _ => Err(ForgeError::UnknownIdentifier { kind: "direction", value: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl ProtocolVersion {
    pub const ALL: [ProtocolVersion; 4] =
        [ProtocolVersion::Tls10, ProtocolVersion::Tls11, ProtocolVersion::Tls12, ProtocolVersion::Tls13];

    pub fn id(&self) -> u16 {
        match self {
            ProtocolVersion::Tls10 => 0x0301,
            ProtocolVersion::Tls11 => 0x0302,
            ProtocolVersion::Tls12 => 0x0303,
            ProtocolVersion::Tls13 => 0x0304,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.id() == id)
    }

    pub fn epoch(&self) -> ProtocolEpoch {
        match self {
            ProtocolVersion::Tls13 => ProtocolEpoch::Modern,
            _ => ProtocolEpoch::Legacy,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolVersion::Tls10 => "TLS 1.0",
            ProtocolVersion::Tls11 => "TLS 1.1",
            ProtocolVersion::Tls12 => "TLS 1.2",
            ProtocolVersion::Tls13 => "TLS 1.3",
        };
        f.write_str(name)
    }
}

/// Key exchange groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NamedGroup {
    Secp256r1,
    Secp384r1,
    Secp521r1,
    X25519,
    X448,
    Ffdhe2048,
    Ffdhe3072,
    Ffdhe4096,
}

impl NamedGroup {
    pub const ALL: [NamedGroup; 8] = [
        NamedGroup::Secp256r1,
        NamedGroup::Secp384r1,
        NamedGroup::Secp521r1,
        NamedGroup::X25519,
        NamedGroup::X448,
        NamedGroup::Ffdhe2048,
        NamedGroup::Ffdhe3072,
        NamedGroup::Ffdhe4096,
    ];

    pub fn id(&self) -> u16 {
        match self {
            NamedGroup::Secp256r1 => 0x0017,
            NamedGroup::Secp384r1 => 0x0018,
            NamedGroup::Secp521r1 => 0x0019,
            NamedGroup::X25519 => 0x001d,
            NamedGroup::X448 => 0x001e,
            NamedGroup::Ffdhe2048 => 0x0100,
            NamedGroup::Ffdhe3072 => 0x0101,
            NamedGroup::Ffdhe4096 => 0x0102,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.id() == id)
    }

    /// Elliptic-curve groups usable by ECDHE suites of the legacy epoch.
    pub fn is_elliptic(&self) -> bool {
        !self.is_finite_field()
    }

    pub fn is_finite_field(&self) -> bool {
        matches!(self, NamedGroup::Ffdhe2048 | NamedGroup::Ffdhe3072 | NamedGroup::Ffdhe4096)
    }
}

impl fmt::Display for NamedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NamedGroup::Secp256r1 => "secp256r1",
            NamedGroup::Secp384r1 => "secp384r1",
            NamedGroup::Secp521r1 => "secp521r1",
            NamedGroup::X25519 => "x25519",
            NamedGroup::X448 => "x448",
            NamedGroup::Ffdhe2048 => "ffdhe2048",
            NamedGroup::Ffdhe3072 => "ffdhe3072",
            NamedGroup::Ffdhe4096 => "ffdhe4096",
        };
        f.write_str(name)
    }
}

/// Certificate public key algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Rsa,
    Ecdsa,
    Dsa,
}

impl KeyType {
    pub const ALL: [KeyType; 3] = [KeyType::Rsa, KeyType::Ecdsa, KeyType::Dsa];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Rsa => "rsa",
            KeyType::Ecdsa => "ecdsa",
            KeyType::Dsa => "dsa",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" => Ok(KeyType::Rsa),
            "ecdsa" | "ec" => Ok(KeyType::Ecdsa),
            "dsa" | "dss" => Ok(KeyType::Dsa),
            _ => Err(ForgeError::UnknownIdentifier { kind: "key type", value: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignatureScheme {
    RsaPkcs1Sha256,
    RsaPkcs1Sha384,
    RsaPssRsaeSha256,
    RsaPssRsaeSha384,
    EcdsaSecp256r1Sha256,
    EcdsaSecp384r1Sha384,
    EcdsaSecp521r1Sha512,
    DsaSha256,
}

impl SignatureScheme {
    pub const ALL: [SignatureScheme; 8] = [
        SignatureScheme::RsaPkcs1Sha256,
        SignatureScheme::RsaPkcs1Sha384,
        SignatureScheme::RsaPssRsaeSha256,
        SignatureScheme::RsaPssRsaeSha384,
        SignatureScheme::EcdsaSecp256r1Sha256,
        SignatureScheme::EcdsaSecp384r1Sha384,
        SignatureScheme::EcdsaSecp521r1Sha512,
        SignatureScheme::DsaSha256,
    ];

    pub fn id(&self) -> u16 {
        match self {
            SignatureScheme::RsaPkcs1Sha256 => 0x0401,
            SignatureScheme::RsaPkcs1Sha384 => 0x0501,
            SignatureScheme::RsaPssRsaeSha256 => 0x0804,
            SignatureScheme::RsaPssRsaeSha384 => 0x0805,
            SignatureScheme::EcdsaSecp256r1Sha256 => 0x0403,
            SignatureScheme::EcdsaSecp384r1Sha384 => 0x0503,
            SignatureScheme::EcdsaSecp521r1Sha512 => 0x0603,
            SignatureScheme::DsaSha256 => 0x0402,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            SignatureScheme::RsaPkcs1Sha256
            | SignatureScheme::RsaPkcs1Sha384
            | SignatureScheme::RsaPssRsaeSha256
            | SignatureScheme::RsaPssRsaeSha384 => KeyType::Rsa,
            SignatureScheme::EcdsaSecp256r1Sha256
            | SignatureScheme::EcdsaSecp384r1Sha384
            | SignatureScheme::EcdsaSecp521r1Sha512 => KeyType::Ecdsa,
            SignatureScheme::DsaSha256 => KeyType::Dsa,
        }
    }

    /// PKCS#1 v1.5 and DSA are not permitted for handshake signatures in the
    /// modern epoch.
    pub fn allowed_in(&self, epoch: ProtocolEpoch) -> bool {
        match epoch {
            ProtocolEpoch::Legacy => true,
            ProtocolEpoch::Modern => !matches!(
                self,
                SignatureScheme::RsaPkcs1Sha256 | SignatureScheme::RsaPkcs1Sha384 | SignatureScheme::DsaSha256
            ),
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignatureScheme::RsaPkcs1Sha256 => "rsa_pkcs1_sha256",
            SignatureScheme::RsaPkcs1Sha384 => "rsa_pkcs1_sha384",
            SignatureScheme::RsaPssRsaeSha256 => "rsa_pss_rsae_sha256",
            SignatureScheme::RsaPssRsaeSha384 => "rsa_pss_rsae_sha384",
            SignatureScheme::EcdsaSecp256r1Sha256 => "ecdsa_secp256r1_sha256",
            SignatureScheme::EcdsaSecp384r1Sha384 => "ecdsa_secp384r1_sha384",
            SignatureScheme::EcdsaSecp521r1Sha512 => "ecdsa_secp521r1_sha512",
            SignatureScheme::DsaSha256 => "dsa_sha256",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExtensionType {
    ServerName,
    MaxFragmentLength,
    SupportedGroups,
    SignatureAlgorithms,
    Alpn,
    Padding,
    EncryptThenMac,
    ExtendedMasterSecret,
    RecordSizeLimit,
    SessionTicket,
    SupportedVersions,
    PskKeyExchangeModes,
    KeyShare,
    RenegotiationInfo,
}

impl ExtensionType {
    pub const ALL: [ExtensionType; 14] = [
        ExtensionType::ServerName,
        ExtensionType::MaxFragmentLength,
        ExtensionType::SupportedGroups,
        ExtensionType::SignatureAlgorithms,
        ExtensionType::Alpn,
        ExtensionType::Padding,
        ExtensionType::EncryptThenMac,
        ExtensionType::ExtendedMasterSecret,
        ExtensionType::RecordSizeLimit,
        ExtensionType::SessionTicket,
        ExtensionType::SupportedVersions,
        ExtensionType::PskKeyExchangeModes,
        ExtensionType::KeyShare,
        ExtensionType::RenegotiationInfo,
    ];

    pub fn id(&self) -> u16 {
        match self {
            ExtensionType::ServerName => 0,
            ExtensionType::MaxFragmentLength => 1,
            ExtensionType::SupportedGroups => 10,
            ExtensionType::SignatureAlgorithms => 13,
            ExtensionType::Alpn => 16,
            ExtensionType::Padding => 21,
            ExtensionType::EncryptThenMac => 22,
            ExtensionType::ExtendedMasterSecret => 23,
            ExtensionType::RecordSizeLimit => 28,
            ExtensionType::SessionTicket => 35,
            ExtensionType::SupportedVersions => 43,
            ExtensionType::PskKeyExchangeModes => 45,
            ExtensionType::KeyShare => 51,
            ExtensionType::RenegotiationInfo => 0xff01,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.id() == id)
    }

    /// Extensions that only exist in the legacy handshake.
    pub fn legacy_only(&self) -> bool {
        matches!(
            self,
            ExtensionType::EncryptThenMac
                | ExtensionType::ExtendedMasterSecret
                | ExtensionType::SessionTicket
                | ExtensionType::RenegotiationInfo
        )
    }
}

/// Handshake and record-level messages observed during an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    ClientHello,
    ServerHello,
    HelloRetryRequest,
    EncryptedExtensions,
    Certificate,
    CertificateRequest,
    ServerKeyExchange,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    ChangeCipherSpec,
    Finished,
    NewSessionTicket,
    ApplicationData,
    Alert,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_ids_round_trip_for_every_group() {
        for group in NamedGroup::ALL {
            assert_eq!(NamedGroup::from_id(group.id()), Some(group));
        }
        assert_eq!(NamedGroup::from_id(0xffff), None);
    }

    #[test]
    fn modern_epoch_rejects_pkcs1_signatures() {
        assert!(!SignatureScheme::RsaPkcs1Sha256.allowed_in(ProtocolEpoch::Modern));
        assert!(SignatureScheme::RsaPssRsaeSha256.allowed_in(ProtocolEpoch::Modern));
        assert!(SignatureScheme::DsaSha256.allowed_in(ProtocolEpoch::Legacy));
    }

    #[test]
    fn textual_identifiers_parse() {
        assert_eq!("Server".parse::<Direction>().unwrap(), Direction::Server);
        assert_eq!("tls13".parse::<ProtocolEpoch>().unwrap(), ProtocolEpoch::Modern);
        assert!(matches!("ed448".parse::<KeyType>(), Err(ForgeError::UnknownIdentifier { .. })));
    }
}
