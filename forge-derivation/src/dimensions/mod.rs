#![forbid(unsafe_code)]

//! Dimensions shipped with the standard registry.

mod bitmask;
mod certificate;
mod cipher_suite;
mod group;
mod record;
mod signature;
mod toggle;

pub use bitmask::{BitPositionDimension, BitmaskDimension};
pub use certificate::CertificateDimension;
pub use cipher_suite::CipherSuiteDimension;
pub use group::NamedGroupDimension;
pub use record::{RecordLengthDimension, TcpFragmentationDimension};
pub use signature::SignatureSchemeDimension;
pub use toggle::{AppMessageDataDimension, ExtensionToggleDimension, GreaseDimension};
