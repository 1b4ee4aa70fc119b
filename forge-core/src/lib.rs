#![forbid(unsafe_code)]

//! Shared vocabulary for the forge conformance workspace: protocol identifiers,
//! the capability snapshot produced by probing, the draft configuration handed
//! to the protocol driver, and the external collaborator contracts.

pub mod cache;
pub mod config;
pub mod draft;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod report;
pub mod suite;

pub use cache::ReportCache;
pub use config::ForgeConfig;
pub use draft::{CertificateSpec, DraftConfig, ModificationTarget};
pub use driver::{
    strategy_for, CapabilityScanner, ConfigStrategy, Interaction, InteractionArtifacts,
    InteractionKind, ProbeKind, ProtocolDriver, RawScanReport, TransportError,
};
pub use error::{ForgeError, ForgeResult};
pub use protocol::{
    Direction, ExtensionType, KeyType, MessageKind, NamedGroup, ProtocolEpoch, ProtocolVersion,
    SignatureScheme,
};
pub use report::{CapturedHello, FeatureReport, FeatureReportBuilder};
pub use suite::{CipherKind, CipherSuite, KeyExchange};
