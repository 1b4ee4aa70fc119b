use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use forge_core::{
    CapabilityScanner, CapturedHello, CipherSuite, Direction, DraftConfig, ExtensionType, ForgeConfig, Interaction,
    InteractionArtifacts, InteractionKind, KeyType, MessageKind, NamedGroup, ProbeKind, ProtocolDriver, ProtocolEpoch,
    ProtocolVersion, RawScanReport, TransportError,
};
use forge_probe::{CapabilityProber, ProbeError};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

fn settings(direction: Direction, cache: &TempDir) -> ForgeConfig {
    ForgeConfig {
        target: "client-under-test".into(),
        direction,
        parallel_handshakes: 2,
        cache_dir: cache.path().to_path_buf(),
        ..ForgeConfig::default()
    }
}

/// Every interaction times out.
#[derive(Default)]
struct SilentDriver {
    calls: AtomicUsize,
}

impl ProtocolDriver for SilentDriver {
    fn build_config(&self, direction: Direction) -> DraftConfig {
        DraftConfig::new(direction)
    }

    fn build_interaction(&self, kind: InteractionKind, _config: &DraftConfig) -> Interaction {
        Interaction::new(kind, vec![MessageKind::Finished])
    }

    fn execute(&self, _config: &DraftConfig, _interaction: &Interaction) -> Result<InteractionArtifacts, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::ReadTimeout)
    }
}

/// Hangs on the hello capture, then times out like [`SilentDriver`].
#[derive(Default)]
struct StallingDriver {
    calls: AtomicUsize,
}

impl ProtocolDriver for StallingDriver {
    fn build_config(&self, direction: Direction) -> DraftConfig {
        DraftConfig::new(direction)
    }

    fn build_interaction(&self, kind: InteractionKind, _config: &DraftConfig) -> Interaction {
        Interaction::new(kind, vec![MessageKind::Finished])
    }

    fn execute(&self, _config: &DraftConfig, interaction: &Interaction) -> Result<InteractionArtifacts, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if interaction.kind == InteractionKind::CaptureInitialRequest {
            thread::sleep(Duration::from_millis(1600));
        }
        Err(TransportError::ReadTimeout)
    }
}

/// A client accepting three suites, RSA keys of at least 2048 bits, one
/// retry group and no reduced record sizes.
#[derive(Default)]
struct ScriptedClient {
    calls: AtomicUsize,
}

const ACCEPTED: [CipherSuite; 3] = [
    CipherSuite::Aes128GcmSha256,
    CipherSuite::EcdheRsaWithAes128GcmSha256,
    CipherSuite::EcdheEcdsaWithAes128GcmSha256,
];

fn hello() -> CapturedHello {
    CapturedHello {
        versions: vec![ProtocolVersion::Tls13, ProtocolVersion::Tls12],
        cipher_suites: ACCEPTED.to_vec(),
        groups: vec![NamedGroup::X25519, NamedGroup::Secp256r1, NamedGroup::Secp384r1],
        key_share_groups: vec![NamedGroup::X25519],
        signature_schemes: Vec::new(),
        extensions: vec![ExtensionType::SupportedGroups, ExtensionType::KeyShare],
        raw: vec![0x16, 0x03, 0x01],
    }
}

fn failed() -> InteractionArtifacts {
    InteractionArtifacts { received: vec![MessageKind::Alert], alert: Some(40), ..Default::default() }
}

impl ProtocolDriver for ScriptedClient {
    fn build_config(&self, direction: Direction) -> DraftConfig {
        DraftConfig::new(direction)
    }

    fn build_interaction(&self, kind: InteractionKind, _config: &DraftConfig) -> Interaction {
        Interaction::new(kind, vec![MessageKind::ClientHello, MessageKind::Finished])
    }

    fn execute(&self, config: &DraftConfig, interaction: &Interaction) -> Result<InteractionArtifacts, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match interaction.kind {
            InteractionKind::CaptureInitialRequest => Ok(InteractionArtifacts {
                received: vec![MessageKind::ClientHello],
                plan_completed: true,
                captured_hello: Some(hello()),
                ..Default::default()
            }),
            InteractionKind::HelloRetry { group } if group == NamedGroup::Secp384r1 => Ok(InteractionArtifacts {
                received: vec![MessageKind::ClientHello, MessageKind::Finished],
                plan_completed: true,
                ..Default::default()
            }),
            InteractionKind::HelloRetry { .. } => Ok(failed()),
            _ => {
                let Some(suite) = config.selected_suite.filter(|s| ACCEPTED.contains(s)) else { return Ok(failed()) };
                let weak_rsa = config.certificate.as_ref().is_some_and(|c| c.key_type == KeyType::Rsa && c.key_size < 2048);
                if weak_rsa || config.max_record_size < 16384 {
                    return Ok(failed());
                }
                let modern = suite.epoch() == ProtocolEpoch::Modern;
                Ok(InteractionArtifacts {
                    received: vec![MessageKind::ClientHello, MessageKind::Finished, MessageKind::ApplicationData],
                    plan_completed: true,
                    unexpected: if modern { vec![MessageKind::ApplicationData] } else { Vec::new() },
                    negotiated_version: Some(if modern { ProtocolVersion::Tls13 } else { ProtocolVersion::Tls12 }),
                    negotiated_suite: Some(suite),
                    ..Default::default()
                })
            }
        }
    }
}

#[test]
fn silent_client_exhausts_probing() {
    init_tracing();
    let cache = TempDir::new().unwrap();
    let driver = Arc::new(SilentDriver::default());
    let mut prober = CapabilityProber::new(settings(Direction::Client, &cache), driver.clone()).without_synchronization();

    let err = prober.probe().unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, ProbeError::ProbingExhaustion { attempted } if attempted == CipherSuite::ALL.len()));
    // hello capture plus one handshake per suite
    assert_eq!(driver.calls.load(Ordering::SeqCst), CipherSuite::ALL.len() + 1);
    assert!(!prober.cache().contains("client-under-test"));
}

#[test]
fn stalled_client_probe_triggers_recovery() {
    init_tracing();
    let cache = TempDir::new().unwrap();
    let settings = ForgeConfig { idle_timeout_secs: 1, ..settings(Direction::Client, &cache) };
    let driver = Arc::new(StallingDriver::default());
    let recoveries = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&recoveries);
    let mut prober = CapabilityProber::new(settings, driver.clone())
        .without_synchronization()
        .on_idle(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let err = prober.probe().unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(recoveries.load(Ordering::SeqCst), 1);
    assert_eq!(driver.calls.load(Ordering::SeqCst), CipherSuite::ALL.len() + 1);
}

#[test]
fn client_probe_builds_report_and_caches_it() {
    init_tracing();
    let cache = TempDir::new().unwrap();
    let driver = Arc::new(ScriptedClient::default());
    let mut prober = CapabilityProber::new(settings(Direction::Client, &cache), driver.clone()).without_synchronization();

    let report = prober.probe().unwrap();

    assert_eq!(report.suites(ProtocolEpoch::Modern).iter().copied().collect::<Vec<_>>(), vec![
        CipherSuite::Aes128GcmSha256
    ]);
    assert_eq!(report.suites(ProtocolEpoch::Legacy).len(), 2);
    assert!(report.versions().contains(&ProtocolVersion::Tls12));
    assert!(report.versions().contains(&ProtocolVersion::Tls13));

    let modern_groups: Vec<_> = report.groups(ProtocolEpoch::Modern).iter().copied().collect();
    assert!(modern_groups.contains(&NamedGroup::X25519));
    assert!(modern_groups.contains(&NamedGroup::Secp384r1));
    assert!(!modern_groups.contains(&NamedGroup::Secp256r1));
    assert_eq!(report.groups(ProtocolEpoch::Legacy).len(), 3);
    assert!(report.supports_extension(ExtensionType::KeyShare));

    assert_eq!(report.min_key_size(KeyType::Rsa), Some(2048));
    assert_eq!(report.min_key_size(KeyType::Ecdsa), Some(256));
    assert_eq!(report.min_key_size(KeyType::Dsa), None);
    assert!(!report.supports_record_fragmentation());
    assert_eq!(report.initial_hello(), Some(&hello()));
    assert!(prober.cache().contains("client-under-test"));

    let calls = driver.calls.load(Ordering::SeqCst);
    let again = CapabilityProber::new(settings(Direction::Client, &cache), driver.clone())
        .without_synchronization()
        .probe()
        .unwrap();
    assert_eq!(again, report);
    assert_eq!(driver.calls.load(Ordering::SeqCst), calls);
}

#[test]
fn ignore_cache_probes_again() {
    let cache = TempDir::new().unwrap();
    let driver = Arc::new(ScriptedClient::default());
    CapabilityProber::new(settings(Direction::Client, &cache), driver.clone())
        .without_synchronization()
        .probe()
        .unwrap();
    let calls = driver.calls.load(Ordering::SeqCst);

    let fresh = ForgeConfig { ignore_cache: true, ..settings(Direction::Client, &cache) };
    CapabilityProber::new(fresh, driver.clone()).without_synchronization().probe().unwrap();

    assert_eq!(driver.calls.load(Ordering::SeqCst), calls * 2);
}

struct FixedScanner {
    configured: Vec<ProbeKind>,
}

impl CapabilityScanner for FixedScanner {
    fn configure(&mut self, probes: &[ProbeKind], base: &DraftConfig) {
        assert_eq!(base.epoch, ProtocolEpoch::Modern);
        self.configured = probes.to_vec();
    }

    fn scan(&mut self) -> Result<RawScanReport, String> {
        if self.configured.len() != ProbeKind::ALL.len() {
            return Err("scanner was not configured".into());
        }
        Ok(RawScanReport {
            versions: vec![0x0304],
            cipher_suites: vec![0x1301, 0x1302],
            groups: vec![0x001d],
            key_share_groups: vec![0x001d],
            record_fragmentation: Some(true),
            ..Default::default()
        })
    }
}

#[test]
fn server_probe_uses_scanner() {
    init_tracing();
    let cache = TempDir::new().unwrap();
    let mut prober = CapabilityProber::new(settings(Direction::Server, &cache), Arc::new(SilentDriver::default()))
        .with_scanner(Box::new(FixedScanner { configured: Vec::new() }));

    let report = prober.probe().unwrap();

    assert_eq!(report.direction(), Direction::Server);
    assert_eq!(report.suites(ProtocolEpoch::Modern).len(), 2);
    assert!(!report.supports_epoch(ProtocolEpoch::Legacy));
    assert!(report.supports_record_fragmentation());
}

#[test]
fn server_probe_without_scanner_fails() {
    let cache = TempDir::new().unwrap();
    let mut prober = CapabilityProber::new(settings(Direction::Server, &cache), Arc::new(SilentDriver::default()));
    let err = prober.probe().unwrap_err();
    assert!(matches!(err, ProbeError::Scanner(_)));
    assert!(!err.is_fatal());
}
