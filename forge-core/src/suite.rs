#![forbid(unsafe_code)]

//! Cipher suite catalog.
//!
//! The catalog lists every suite the forge drivers are expected to implement,
//! split by epoch. Legacy suites carry their key exchange and authentication
//! key type; modern suites negotiate both separately.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::{KeyType, ProtocolEpoch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyExchange {
    Rsa,
    Dhe,
    Ecdhe,
    /// Negotiated through the key share extension (modern epoch).
    Negotiated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherKind {
    Block,
    Stream,
    Aead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CipherSuite {
    Aes128GcmSha256,
    Aes256GcmSha384,
    Chacha20Poly1305Sha256,
    Aes128CcmSha256,
    RsaWithRc4128Sha,
    RsaWithAes128CbcSha,
    RsaWithAes256CbcSha,
    RsaWithAes128GcmSha256,
    DheDssWithAes128CbcSha,
    DheRsaWithAes128CbcSha,
    DheRsaWithAes128GcmSha256,
    EcdheEcdsaWithAes128CbcSha,
    EcdheRsaWithAes128CbcSha,
    EcdheEcdsaWithAes128GcmSha256,
    EcdheRsaWithAes128GcmSha256,
    EcdheRsaWithAes256GcmSha384,
    EcdheRsaWithChacha20Poly1305Sha256,
    EcdheEcdsaWithChacha20Poly1305Sha256,
}

struct SuiteInfo {
    id: u16,
    name: &'static str,
    key_exchange: KeyExchange,
    auth: Option<KeyType>,
    cipher: CipherKind,
    mac_len: usize,
}

impl CipherSuite {
    pub const ALL: [CipherSuite; 18] = [
        CipherSuite::Aes128GcmSha256,
        CipherSuite::Aes256GcmSha384,
        CipherSuite::Chacha20Poly1305Sha256,
        CipherSuite::Aes128CcmSha256,
        CipherSuite::RsaWithRc4128Sha,
        CipherSuite::RsaWithAes128CbcSha,
        CipherSuite::RsaWithAes256CbcSha,
        CipherSuite::RsaWithAes128GcmSha256,
        CipherSuite::DheDssWithAes128CbcSha,
        CipherSuite::DheRsaWithAes128CbcSha,
        CipherSuite::DheRsaWithAes128GcmSha256,
        CipherSuite::EcdheEcdsaWithAes128CbcSha,
        CipherSuite::EcdheRsaWithAes128CbcSha,
        CipherSuite::EcdheEcdsaWithAes128GcmSha256,
        CipherSuite::EcdheRsaWithAes128GcmSha256,
        CipherSuite::EcdheRsaWithAes256GcmSha384,
        CipherSuite::EcdheRsaWithChacha20Poly1305Sha256,
        CipherSuite::EcdheEcdsaWithChacha20Poly1305Sha256,
    ];

    fn info(&self) -> SuiteInfo {
        use CipherKind::*;
        use KeyExchange::*;
        let (id, name, key_exchange, auth, cipher, mac_len) = match self {
            CipherSuite::Aes128GcmSha256 => (0x1301, "TLS_AES_128_GCM_SHA256", Negotiated, None, Aead, 16),
            CipherSuite::Aes256GcmSha384 => (0x1302, "TLS_AES_256_GCM_SHA384", Negotiated, None, Aead, 16),
            CipherSuite::Chacha20Poly1305Sha256 => {
                (0x1303, "TLS_CHACHA20_POLY1305_SHA256", Negotiated, None, Aead, 16)
            }
            CipherSuite::Aes128CcmSha256 => (0x1304, "TLS_AES_128_CCM_SHA256", Negotiated, None, Aead, 16),
            CipherSuite::RsaWithRc4128Sha => {
                (0x0005, "TLS_RSA_WITH_RC4_128_SHA", Rsa, Some(KeyType::Rsa), Stream, 20)
            }
            CipherSuite::RsaWithAes128CbcSha => {
                (0x002f, "TLS_RSA_WITH_AES_128_CBC_SHA", Rsa, Some(KeyType::Rsa), Block, 20)
            }
            CipherSuite::RsaWithAes256CbcSha => {
                (0x0035, "TLS_RSA_WITH_AES_256_CBC_SHA", Rsa, Some(KeyType::Rsa), Block, 20)
            }
            CipherSuite::RsaWithAes128GcmSha256 => {
                (0x009c, "TLS_RSA_WITH_AES_128_GCM_SHA256", Rsa, Some(KeyType::Rsa), Aead, 16)
            }
            CipherSuite::DheDssWithAes128CbcSha => {
                (0x0032, "TLS_DHE_DSS_WITH_AES_128_CBC_SHA", Dhe, Some(KeyType::Dsa), Block, 20)
            }
            CipherSuite::DheRsaWithAes128CbcSha => {
                (0x0033, "TLS_DHE_RSA_WITH_AES_128_CBC_SHA", Dhe, Some(KeyType::Rsa), Block, 20)
            }
            CipherSuite::DheRsaWithAes128GcmSha256 => {
                (0x009e, "TLS_DHE_RSA_WITH_AES_128_GCM_SHA256", Dhe, Some(KeyType::Rsa), Aead, 16)
            }
            CipherSuite::EcdheEcdsaWithAes128CbcSha => {
                (0xc009, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA", Ecdhe, Some(KeyType::Ecdsa), Block, 20)
            }
            CipherSuite::EcdheRsaWithAes128CbcSha => {
                (0xc013, "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA", Ecdhe, Some(KeyType::Rsa), Block, 20)
            }
            CipherSuite::EcdheEcdsaWithAes128GcmSha256 => {
                (0xc02b, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256", Ecdhe, Some(KeyType::Ecdsa), Aead, 16)
            }
            CipherSuite::EcdheRsaWithAes128GcmSha256 => {
                (0xc02f, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", Ecdhe, Some(KeyType::Rsa), Aead, 16)
            }
            CipherSuite::EcdheRsaWithAes256GcmSha384 => {
                (0xc030, "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", Ecdhe, Some(KeyType::Rsa), Aead, 16)
            }
            CipherSuite::EcdheRsaWithChacha20Poly1305Sha256 => (
                0xcca8,
                "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
                Ecdhe,
                Some(KeyType::Rsa),
                Aead,
                16,
            ),
            CipherSuite::EcdheEcdsaWithChacha20Poly1305Sha256 => (
                0xcca9,
                "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
                Ecdhe,
                Some(KeyType::Ecdsa),
                Aead,
                16,
            ),
        };
        SuiteInfo { id, name, key_exchange, auth, cipher, mac_len }
    }

    pub fn id(&self) -> u16 {
        self.info().id
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn name(&self) -> &'static str {
        self.info().name
    }

    pub fn epoch(&self) -> ProtocolEpoch {
        match self.info().key_exchange {
            KeyExchange::Negotiated => ProtocolEpoch::Modern,
            _ => ProtocolEpoch::Legacy,
        }
    }

    pub fn key_exchange(&self) -> KeyExchange {
        self.info().key_exchange
    }

    /// Certificate key type the suite authenticates with. `None` for modern
    /// suites, which accept any certificate type.
    pub fn auth_key_type(&self) -> Option<KeyType> {
        self.info().auth
    }

    pub fn cipher_kind(&self) -> CipherKind {
        self.info().cipher
    }

    /// Length of the authentication tag or record MAC in bytes.
    pub fn mac_len(&self) -> usize {
        self.info().mac_len
    }

    /// Whether a certificate of the given key type can authenticate this suite.
    pub fn accepts_key_type(&self, key_type: KeyType) -> bool {
        match self.auth_key_type() {
            Some(auth) => auth == key_type,
            None => key_type != KeyType::Dsa,
        }
    }

    /// Whether the suite negotiates a named group at all.
    pub fn uses_named_group(&self) -> bool {
        matches!(
            self.key_exchange(),
            KeyExchange::Ecdhe | KeyExchange::Dhe | KeyExchange::Negotiated
        )
    }

    pub fn catalog(epoch: ProtocolEpoch) -> Vec<CipherSuite> {
        Self::ALL.into_iter().filter(|s| s.epoch() == epoch).collect()
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_partitions_by_epoch() {
        let modern = CipherSuite::catalog(ProtocolEpoch::Modern);
        let legacy = CipherSuite::catalog(ProtocolEpoch::Legacy);
        assert_eq!(modern.len(), 4);
        assert_eq!(modern.len() + legacy.len(), CipherSuite::ALL.len());
        assert!(modern.iter().all(|s| s.auth_key_type().is_none()));
    }

    #[test]
    fn ids_are_unique() {
        for suite in CipherSuite::ALL {
            assert_eq!(CipherSuite::from_id(suite.id()), Some(suite));
        }
    }

    #[test]
    fn key_type_compatibility() {
        assert!(CipherSuite::EcdheEcdsaWithAes128GcmSha256.accepts_key_type(KeyType::Ecdsa));
        assert!(!CipherSuite::EcdheEcdsaWithAes128GcmSha256.accepts_key_type(KeyType::Rsa));
        assert!(CipherSuite::Aes128GcmSha256.accepts_key_type(KeyType::Rsa));
        assert!(!CipherSuite::Aes128GcmSha256.accepts_key_type(KeyType::Dsa));
        assert!(!CipherSuite::RsaWithAes128CbcSha.uses_named_group());
    }
}
