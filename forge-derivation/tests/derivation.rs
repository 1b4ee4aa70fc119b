use forge_core::{
    CertificateSpec, CipherSuite, Direction, DraftConfig, FeatureReport, ForgeConfig, Interaction,
    InteractionArtifacts, InteractionKind, KeyType, ModificationTarget, NamedGroup, ProtocolDriver, ProtocolEpoch,
    SignatureScheme, TransportError,
};
use forge_derivation::dimensions::{BitPositionDimension, BitmaskDimension, CipherSuiteDimension};
use forge_derivation::{
    bitmask, DerivationContainer, DerivationInputs, DerivationScope, DerivationType, DimensionRegistry, ModelBuilder,
    ModelError, ModelType, ParameterValue, StandardModelRegistry,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Driver whose default certificate is a DSA key no modern or RSA suite accepts.
struct DsaDefaultDriver;

impl ProtocolDriver for DsaDefaultDriver {
    fn build_config(&self, direction: Direction) -> DraftConfig {
        let mut config = DraftConfig::new(direction);
        config.certificate = Some(CertificateSpec::new(KeyType::Dsa, 1024));
        config
    }

    fn build_interaction(&self, kind: InteractionKind, _config: &DraftConfig) -> Interaction {
        Interaction::new(kind, Vec::new())
    }

    fn execute(&self, _config: &DraftConfig, _interaction: &Interaction) -> Result<InteractionArtifacts, TransportError> {
        Ok(InteractionArtifacts::default())
    }
}

fn mixed_report() -> FeatureReport {
    FeatureReport::builder("127.0.0.1:4433", Direction::Server)
        .suite(ProtocolEpoch::Modern, CipherSuite::Aes128GcmSha256)
        .suite(ProtocolEpoch::Legacy, CipherSuite::EcdheRsaWithAes128GcmSha256)
        .build()
}

fn configs_for(
    report: &FeatureReport,
    scope: &DerivationScope,
) -> Result<Vec<(DerivationContainer, DraftConfig)>, ModelError> {
    let registry = DimensionRegistry::standard();
    let certificates = CertificateSpec::default_catalog();
    let inputs = DerivationInputs::new(report, scope, &certificates);
    let model = ModelBuilder::new(&registry, &StandardModelRegistry).build(&inputs)?;
    let settings = ForgeConfig::default();
    Ok(model
        .combinations()?
        .into_iter()
        .map(|combination| {
            let container = DerivationContainer::new(combination, scope.clone());
            let config = container.build_config(&DsaDefaultDriver, &registry, &inputs, &settings);
            (container, config)
        })
        .collect())
}

#[test]
fn empty_model_with_suite_extension_spans_both_epochs() {
    init_tracing();
    let report = mixed_report();
    let scope = DerivationScope::new(ModelType::Empty, Direction::Server, None).with_extension(DerivationType::CipherSuite);
    let configs = configs_for(&report, &scope).unwrap();

    assert_eq!(configs.len(), 2);
    let mut selected: Vec<CipherSuite> = configs.iter().filter_map(|(_, c)| c.selected_suite).collect();
    selected.sort();
    assert_eq!(selected, vec![CipherSuite::Aes128GcmSha256, CipherSuite::EcdheRsaWithAes128GcmSha256]);
    for (container, config) in &configs {
        assert_eq!(config.epoch, container.epoch());
        assert_eq!(config.cipher_suites.len(), 1);
    }
}

#[test]
fn single_valued_types_become_static_assignments() {
    let report = FeatureReport::builder("target", Direction::Server)
        .suite(ProtocolEpoch::Modern, CipherSuite::Aes128GcmSha256)
        .group(ProtocolEpoch::Modern, NamedGroup::X25519)
        .group(ProtocolEpoch::Modern, NamedGroup::Secp256r1)
        .build();
    let scope = DerivationScope::new(ModelType::Empty, Direction::Server, Some(ProtocolEpoch::Modern))
        .with_extension(DerivationType::CipherSuite)
        .with_extension(DerivationType::NamedGroup);
    let registry = DimensionRegistry::standard();
    let certificates = CertificateSpec::default_catalog();
    let inputs = DerivationInputs::new(&report, &scope, &certificates);
    let model = ModelBuilder::new(&registry, &StandardModelRegistry).build(&inputs).unwrap();

    assert!(model.is_simple());
    assert_eq!(model.dimension_types(), vec![DerivationType::NamedGroup]);
    assert_eq!(model.static_assignments().len(), 1);

    let combinations = model.combinations().unwrap();
    assert_eq!(combinations.len(), 2);
    for combination in &combinations {
        assert_eq!(
            combination.value(DerivationType::CipherSuite),
            Some(&ParameterValue::CipherSuite(CipherSuite::Aes128GcmSha256))
        );
    }
}

#[test]
fn constraints_on_unmodeled_types_are_dropped() {
    let report = FeatureReport::builder("target", Direction::Server)
        .suite(ProtocolEpoch::Legacy, CipherSuite::RsaWithAes128CbcSha)
        .suite(ProtocolEpoch::Legacy, CipherSuite::RsaWithAes256CbcSha)
        .group(ProtocolEpoch::Legacy, NamedGroup::Secp256r1)
        .build();
    let scope = DerivationScope::new(ModelType::LengthField, Direction::Server, Some(ProtocolEpoch::Legacy));
    let registry = DimensionRegistry::standard();
    let certificates = CertificateSpec::default_catalog();
    let inputs = DerivationInputs::new(&report, &scope, &certificates);
    let model = ModelBuilder::new(&registry, &StandardModelRegistry).build(&inputs).unwrap();

    assert_eq!(model.dropped_types(), &[DerivationType::NamedGroup]);
    assert!(model.constraints().is_empty());
    assert_eq!(model.combinations().unwrap().len(), 2);
}

#[test]
fn group_constraint_holds_in_every_combination() {
    let report = FeatureReport::builder("target", Direction::Server)
        .suite(ProtocolEpoch::Legacy, CipherSuite::EcdheRsaWithAes128GcmSha256)
        .suite(ProtocolEpoch::Legacy, CipherSuite::RsaWithAes128GcmSha256)
        .group(ProtocolEpoch::Legacy, NamedGroup::Secp256r1)
        .group(ProtocolEpoch::Legacy, NamedGroup::Secp384r1)
        .group(ProtocolEpoch::Legacy, NamedGroup::Ffdhe2048)
        .build();
    let scope = DerivationScope::new(ModelType::LengthField, Direction::Server, Some(ProtocolEpoch::Legacy));
    let configs = configs_for(&report, &scope).unwrap();

    assert!(!configs.is_empty());
    for (_, config) in &configs {
        let suite = config.selected_suite.unwrap();
        let group = config.selected_group.unwrap();
        if suite == CipherSuite::EcdheRsaWithAes128GcmSha256 {
            assert!(group.is_elliptic());
        }
    }
    assert!(configs.iter().any(|(_, c)| c.selected_group == Some(NamedGroup::Secp384r1)));
}

#[test]
fn second_pass_replaces_incompatible_default_certificate() {
    let report = FeatureReport::builder("target", Direction::Server)
        .suite(ProtocolEpoch::Legacy, CipherSuite::EcdheRsaWithAes128GcmSha256)
        .suite(ProtocolEpoch::Legacy, CipherSuite::EcdheEcdsaWithAes128GcmSha256)
        .build();
    let scope = DerivationScope::new(ModelType::Empty, Direction::Server, Some(ProtocolEpoch::Legacy))
        .with_extension(DerivationType::CipherSuite);
    for (_, config) in configs_for(&report, &scope).unwrap() {
        let certificate = config.certificate.unwrap();
        match config.selected_suite.unwrap() {
            CipherSuite::EcdheRsaWithAes128GcmSha256 => assert_eq!(certificate.key_type, KeyType::Rsa),
            CipherSuite::EcdheEcdsaWithAes128GcmSha256 => {
                assert_eq!((certificate.key_type, certificate.key_size), (KeyType::Ecdsa, 256))
            }
            other => panic!("unexpected suite {}", other),
        }
    }
}

fn signing_report(direction: Direction) -> FeatureReport {
    FeatureReport::builder("target", direction)
        .suite(ProtocolEpoch::Modern, CipherSuite::Aes128GcmSha256)
        .suite(ProtocolEpoch::Legacy, CipherSuite::EcdheRsaWithAes128GcmSha256)
        .suite(ProtocolEpoch::Legacy, CipherSuite::EcdheEcdsaWithAes128GcmSha256)
        .signature_scheme(SignatureScheme::RsaPssRsaeSha256)
        .signature_scheme(SignatureScheme::RsaPkcs1Sha256)
        .signature_scheme(SignatureScheme::EcdsaSecp256r1Sha256)
        .build()
}

#[test]
fn client_certificates_match_suite_and_signature() {
    init_tracing();
    let report = signing_report(Direction::Client);
    let scope = DerivationScope::new(ModelType::Certificate, Direction::Client, None);
    let configs = configs_for(&report, &scope).unwrap();

    assert!(!configs.is_empty());
    for (container, config) in &configs {
        let suite = config.selected_suite.unwrap();
        let certificate = config.certificate.clone().unwrap();
        let Some(ParameterValue::SignatureScheme(scheme)) = container.value(DerivationType::SignatureScheme).cloned()
        else {
            panic!("{} has no signature scheme", container.label());
        };
        assert!(suite.accepts_key_type(scheme.key_type()) && scheme.allowed_in(suite.epoch()), "{}", container.label());
        assert_eq!(certificate.key_type, scheme.key_type(), "{}", container.label());
        assert_eq!(config.signature_schemes, vec![scheme]);
        assert_eq!(config.certificate_signature_schemes, vec![scheme]);
    }
    let key_types: Vec<KeyType> = configs.iter().filter_map(|(_, c)| c.certificate.as_ref().map(|c| c.key_type)).collect();
    assert!(key_types.contains(&KeyType::Rsa) && key_types.contains(&KeyType::Ecdsa));
}

#[test]
fn certificate_signatures_follow_the_swapped_certificate() {
    let report = signing_report(Direction::Server);
    let scope = DerivationScope::new(ModelType::Certificate, Direction::Server, None);
    let configs = configs_for(&report, &scope).unwrap();

    let mut realigned = false;
    for (container, config) in &configs {
        let certificate = config.certificate.clone().unwrap();
        assert_ne!(certificate.key_type, KeyType::Dsa, "{}", container.label());
        assert!(!config.certificate_signature_schemes.is_empty(), "{}", container.label());
        for scheme in &config.certificate_signature_schemes {
            assert_eq!(scheme.key_type(), certificate.key_type);
            assert!(scheme.allowed_in(config.epoch));
        }
        realigned |= config.certificate_signature_schemes != config.signature_schemes;
    }
    // the modern suite pairs an ECDSA handshake signature with the RSA default
    assert!(realigned);
}

#[test]
fn bitmask_is_applied_from_byte_and_bit_dimensions() {
    let report = FeatureReport::builder("target", Direction::Server)
        .suite(ProtocolEpoch::Modern, CipherSuite::Aes128GcmSha256)
        .build();
    let scope = DerivationScope::new(ModelType::Empty, Direction::Server, Some(ProtocolEpoch::Modern))
        .with_extension(DerivationType::CiphertextBitmask);
    let configs = configs_for(&report, &scope).unwrap();

    // 16 byte positions times 8 bit positions, exhaustive at strength 2
    assert_eq!(configs.len(), 128);
    for (container, config) in &configs {
        let byte = container.value(DerivationType::CiphertextBitmask).and_then(ParameterValue::as_byte_index).unwrap();
        let bit = container.value(DerivationType::BitPosition).and_then(ParameterValue::as_bit_index).unwrap();
        assert_eq!(config.modifications.get(&ModificationTarget::Ciphertext), Some(&bitmask(byte, bit)));
    }
}

#[test]
fn mac_flips_reach_every_byte_of_each_suite_mac() {
    let report = FeatureReport::builder("target", Direction::Server)
        .suite(ProtocolEpoch::Legacy, CipherSuite::EcdheRsaWithAes128GcmSha256)
        .suite(ProtocolEpoch::Legacy, CipherSuite::EcdheRsaWithAes128CbcSha)
        .build();
    let scope = DerivationScope::new(ModelType::Empty, Direction::Server, Some(ProtocolEpoch::Legacy))
        .with_extension(DerivationType::CipherSuite)
        .with_extension(DerivationType::MacBitmask)
        .with_limitation(DerivationType::BitPosition);
    let configs = configs_for(&report, &scope).unwrap();

    let mut cbc_bytes = Vec::new();
    for (container, config) in &configs {
        let suite = config.selected_suite.unwrap();
        let byte = container.value(DerivationType::MacBitmask).and_then(ParameterValue::as_byte_index).unwrap();
        assert!(byte < suite.mac_len(), "{}", container.label());
        if suite == CipherSuite::EcdheRsaWithAes128CbcSha {
            cbc_bytes.push(byte);
        }
    }
    cbc_bytes.sort_unstable();
    cbc_bytes.dedup();
    assert_eq!(cbc_bytes, (0..20).collect::<Vec<_>>());
}

#[test]
fn bit_position_registered_before_its_parent_is_still_modeled() {
    let report = FeatureReport::builder("target", Direction::Server)
        .suite(ProtocolEpoch::Modern, CipherSuite::Aes128GcmSha256)
        .build();
    let mut registry = DimensionRegistry::empty();
    registry.register(Box::new(BitPositionDimension));
    registry.register(Box::new(CipherSuiteDimension));
    registry.register(Box::new(BitmaskDimension::new(DerivationType::CiphertextBitmask, ModificationTarget::Ciphertext)));
    let scope = DerivationScope::new(ModelType::Empty, Direction::Server, Some(ProtocolEpoch::Modern))
        .with_extension(DerivationType::CiphertextBitmask);
    let certificates = CertificateSpec::default_catalog();
    let inputs = DerivationInputs::new(&report, &scope, &certificates);

    let model = ModelBuilder::new(&registry, &StandardModelRegistry).build(&inputs).unwrap();

    assert_eq!(model.dimension_types(), vec![DerivationType::BitPosition, DerivationType::CiphertextBitmask]);
    assert_eq!(model.combinations().unwrap().len(), 128);
}

#[test]
fn manual_types_are_left_to_the_test_body() {
    let report = FeatureReport::builder("target", Direction::Server)
        .suite(ProtocolEpoch::Modern, CipherSuite::Aes128GcmSha256)
        .build();
    let scope = DerivationScope::new(ModelType::Empty, Direction::Server, Some(ProtocolEpoch::Modern))
        .with_extension(DerivationType::CiphertextBitmask)
        .with_manual(DerivationType::CiphertextBitmask);
    for (container, config) in configs_for(&report, &scope).unwrap() {
        assert!(config.modifications.is_empty());
        let mask = container.bitmask(DerivationType::CiphertextBitmask).unwrap();
        assert_eq!(mask.iter().map(|b| b.count_ones()).sum::<u32>(), 1);
    }
}

#[test]
fn limiting_the_bit_position_keeps_bit_zero() {
    let report = FeatureReport::builder("target", Direction::Server)
        .suite(ProtocolEpoch::Modern, CipherSuite::Aes128GcmSha256)
        .build();
    let scope = DerivationScope::new(ModelType::Empty, Direction::Server, Some(ProtocolEpoch::Modern))
        .with_extension(DerivationType::CiphertextBitmask)
        .with_limitation(DerivationType::BitPosition);
    let configs = configs_for(&report, &scope).unwrap();
    assert_eq!(configs.len(), 16);
    for (_, config) in &configs {
        let mask = &config.modifications[&ModificationTarget::Ciphertext];
        assert_eq!(*mask.last().unwrap(), 1);
    }
}

#[test]
fn model_errors() {
    let empty_report = FeatureReport::builder("target", Direction::Server).build();
    let scope = DerivationScope::new(ModelType::Empty, Direction::Server, None).with_extension(DerivationType::CipherSuite);
    assert_eq!(
        configs_for(&empty_report, &scope).unwrap_err(),
        ModelError::EmptyDomain(DerivationType::CipherSuite)
    );

    let report = mixed_report();
    assert_eq!(configs_for(&report, &scope.clone().with_strength(0)).unwrap_err(), ModelError::InvalidStrength);

    let registry = DimensionRegistry::empty();
    let certificates = CertificateSpec::default_catalog();
    let inputs = DerivationInputs::new(&report, &scope, &certificates);
    assert_eq!(
        ModelBuilder::new(&registry, &StandardModelRegistry).build(&inputs).unwrap_err(),
        ModelError::Unregistered(DerivationType::CipherSuite)
    );
}

#[test]
fn empty_scope_yields_one_default_combination() {
    let report = mixed_report();
    let scope = DerivationScope::new(ModelType::Empty, Direction::Client, Some(ProtocolEpoch::Modern));
    let configs = configs_for(&report, &scope).unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].0.label(), "<default>");
    assert_eq!(configs[0].1.epoch, ProtocolEpoch::Modern);
}
