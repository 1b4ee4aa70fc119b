#![forbid(unsafe_code)]

//! Capability probing.
//!
//! Produces the [`FeatureReport`](forge_core::FeatureReport) every test
//! precondition and derivation scope is evaluated against. Server targets go
//! through an external scanner; client targets are synchronized and then
//! probed with exploratory handshakes. Results are cached per target.

pub mod client;
pub mod error;
pub mod prober;
pub mod server;
pub mod sync;

pub use client::{ClientProber, REDUCED_RECORD_SIZE};
pub use error::{ProbeError, ProbeResult};
pub use prober::CapabilityProber;
pub use server::{adapt_scan, probe_server};
pub use sync::{ClientSynchronizer, TriggerCommand};
