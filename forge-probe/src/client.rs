#![forbid(unsafe_code)]

//! Capability discovery against a client target.
//!
//! Every question is answered by exploratory handshakes run through the
//! interaction pool:
//!
//! 1. one handshake per implemented cipher suite, built through the suite's
//!    epoch strategy;
//! 2. a retry directive for every supported modern group the client did not
//!    send a key share for;
//! 3. one handshake per available certificate of every key type seen among
//!    the working suites, keeping the smallest accepted size;
//! 4. one handshake with a reduced maximum record size.
//!
//! Only an all-failing step 1 is fatal. Any other failure just leaves the
//! capability out of the report.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use forge_core::{
    strategy_for, CapturedHello, CertificateSpec, CipherSuite, Direction, DraftConfig, FeatureReport,
    FeatureReportBuilder, ForgeConfig, Interaction, InteractionKind, KeyType, MessageKind, NamedGroup,
    ProtocolEpoch, ProtocolVersion,
};
use forge_exec::{InteractionPool, RunOutcome};

use crate::error::{ProbeError, ProbeResult};

/// Record size limit used to test fragmentation tolerance.
pub const REDUCED_RECORD_SIZE: u16 = 50;

type Plan = (DraftConfig, Interaction, String);

pub struct ClientProber<'a> {
    pool: &'a InteractionPool,
    settings: &'a ForgeConfig,
}

impl<'a> ClientProber<'a> {
    pub fn new(pool: &'a InteractionPool, settings: &'a ForgeConfig) -> Self {
        Self { pool, settings }
    }

    pub fn probe(&self) -> ProbeResult<FeatureReport> {
        let mut builder = FeatureReport::builder(self.settings.target.clone(), Direction::Client);
        let hello = self.capture_hello()?;

        let (next, working) = self.probe_suites(builder)?;
        builder = next;
        let legacy = working.iter().any(|s| s.epoch() == ProtocolEpoch::Legacy);
        let modern = working.iter().find(|s| s.epoch() == ProtocolEpoch::Modern).copied();

        if let Some(hello) = &hello {
            builder = Self::from_hello(builder, hello, legacy, modern.is_some());
            if let Some(suite) = modern {
                builder = self.probe_retry_groups(builder, hello, suite)?;
            }
            builder = builder.initial_hello(hello.clone());
        }
        builder = self.probe_key_sizes(builder, &working)?;
        builder = self.probe_fragmentation(builder, working[0])?;
        Ok(builder.build())
    }

    fn base(&self, epoch: ProtocolEpoch) -> DraftConfig {
        let mut config = strategy_for(epoch)(self.pool.driver().build_config(Direction::Client));
        config.connect_timeout = self.settings.connect_timeout();
        config.read_timeout = self.settings.read_timeout();
        config
    }

    /// Preferred certificate for a suite: first compatible key type, largest key.
    fn certificate_for(&self, suite: CipherSuite) -> Option<CertificateSpec> {
        self.settings
            .certificates
            .iter()
            .filter(|c| suite.accepts_key_type(c.key_type))
            .min_by_key(|c| (c.key_type, Reverse(c.key_size)))
            .cloned()
    }

    fn handshake(&self, suite: CipherSuite, certificate: Option<CertificateSpec>) -> Plan {
        let mut config = self.base(suite.epoch());
        config.select_suite(suite);
        let label = match &certificate {
            Some(cert) => format!("{} with {}", suite, cert.id),
            None => suite.to_string(),
        };
        if certificate.is_some() {
            config.certificate = certificate;
        }
        let mut interaction = self.pool.driver().build_interaction(InteractionKind::Handshake, &config);
        if suite.epoch() == ProtocolEpoch::Modern {
            interaction = interaction.tolerate(MessageKind::ApplicationData);
        }
        (config, interaction, label)
    }

    fn capture_hello(&self) -> ProbeResult<Option<CapturedHello>> {
        let config = self.base(ProtocolEpoch::Modern);
        let interaction = self.pool.driver().build_interaction(InteractionKind::CaptureInitialRequest, &config);
        let outcome = self.pool.execute_batch(vec![(config, interaction, "initial request".into())])?;
        let hello = outcome.into_iter().next().and_then(|o| o.artifacts.captured_hello);
        if hello.is_none() {
            debug!("client initial request could not be captured");
        }
        Ok(hello)
    }

    fn probe_suites(&self, mut builder: FeatureReportBuilder) -> ProbeResult<(FeatureReportBuilder, Vec<CipherSuite>)> {
        let suites = self.pool.driver().implemented_suites();
        let batch = suites.iter().map(|&suite| self.handshake(suite, self.certificate_for(suite))).collect();
        let outcomes = self.pool.execute_batch(batch)?;

        let mut working = Vec::new();
        for (&suite, outcome) in suites.iter().zip(&outcomes) {
            if !outcome.executed_as_planned() {
                debug!(suite = %suite, status = %outcome.status, "suite not supported");
                continue;
            }
            let version = outcome.artifacts.negotiated_version.unwrap_or(match suite.epoch() {
                ProtocolEpoch::Legacy => ProtocolVersion::Tls12,
                ProtocolEpoch::Modern => ProtocolVersion::Tls13,
            });
            builder = builder.version(version).suite(version.epoch(), suite);
            working.push(suite);
        }
        if working.is_empty() {
            return Err(ProbeError::ProbingExhaustion { attempted: suites.len() });
        }
        info!(supported = working.len(), attempted = suites.len(), "cipher suites probed");
        Ok((builder, working))
    }

    fn from_hello(
        mut builder: FeatureReportBuilder,
        hello: &CapturedHello,
        legacy: bool,
        modern: bool,
    ) -> FeatureReportBuilder {
        for &group in &hello.groups {
            if legacy {
                builder = builder.group(ProtocolEpoch::Legacy, group);
            }
        }
        for &group in &hello.key_share_groups {
            builder = builder.key_share_group(group);
            if modern {
                builder = builder.group(ProtocolEpoch::Modern, group);
            }
        }
        for &scheme in &hello.signature_schemes {
            builder = builder.signature_scheme(scheme);
        }
        for &extension in &hello.extensions {
            builder = builder.extension(extension);
        }
        builder
    }

    /// Groups listed without a key share are supported if the client answers a
    /// retry directive and reaches the Finished message.
    fn probe_retry_groups(
        &self,
        mut builder: FeatureReportBuilder,
        hello: &CapturedHello,
        suite: CipherSuite,
    ) -> ProbeResult<FeatureReportBuilder> {
        let candidates: Vec<NamedGroup> =
            hello.groups.iter().copied().filter(|g| !hello.key_share_groups.contains(g)).collect();
        if candidates.is_empty() {
            return Ok(builder);
        }
        let batch = candidates
            .iter()
            .map(|&group| {
                let (mut config, _, _) = self.handshake(suite, self.certificate_for(suite));
                config.select_group(group);
                let interaction = self.pool.driver().build_interaction(InteractionKind::HelloRetry { group }, &config);
                (config, interaction, format!("retry with {}", group))
            })
            .collect();
        for (group, outcome) in candidates.iter().zip(self.pool.execute_batch(batch)?) {
            if outcome.artifacts.received_message(MessageKind::Finished) {
                builder = builder.group(ProtocolEpoch::Modern, *group);
            } else {
                debug!(group = %group, status = %outcome.status, "retry group rejected");
            }
        }
        Ok(builder)
    }

    fn probe_key_sizes(
        &self,
        mut builder: FeatureReportBuilder,
        working: &[CipherSuite],
    ) -> ProbeResult<FeatureReportBuilder> {
        let key_types: BTreeSet<KeyType> = working
            .iter()
            .flat_map(|suite| match suite.auth_key_type() {
                Some(key_type) => vec![key_type],
                None => vec![KeyType::Rsa, KeyType::Ecdsa],
            })
            .collect();

        let mut probes: Vec<(KeyType, u16)> = Vec::new();
        let mut batch = Vec::new();
        for key_type in key_types {
            let Some(&suite) = working.iter().find(|s| s.accepts_key_type(key_type)) else { continue };
            for cert in self.settings.certificates.iter().filter(|c| c.key_type == key_type) {
                probes.push((key_type, cert.key_size));
                batch.push(self.handshake(suite, Some(cert.clone())));
            }
        }
        let outcomes = self.pool.execute_batch(batch)?;

        let mut smallest: BTreeMap<KeyType, u16> = BTreeMap::new();
        for ((key_type, size), outcome) in probes.into_iter().zip(&outcomes) {
            if outcome.executed_as_planned() {
                let entry = smallest.entry(key_type).or_insert(size);
                *entry = (*entry).min(size);
            }
        }
        for (key_type, size) in smallest {
            debug!(key_type = %key_type, size, "minimum accepted key size");
            builder = builder.min_key_size(key_type, size);
        }
        Ok(builder)
    }

    fn probe_fragmentation(
        &self,
        builder: FeatureReportBuilder,
        suite: CipherSuite,
    ) -> ProbeResult<FeatureReportBuilder> {
        let (mut config, interaction, label) = self.handshake(suite, self.certificate_for(suite));
        config.max_record_size = REDUCED_RECORD_SIZE;
        let outcomes = self.pool.execute_batch(vec![(config, interaction, format!("{} fragmented", label))])?;
        let tolerated = outcomes.first().map_or(false, RunOutcome::executed_as_planned);
        Ok(builder.record_fragmentation(tolerated))
    }
}
