//! Registry-level tests: every registered binding signs, verifies, hashes and
//! encapsulates through the capability traits alone.

use dirac_core::{
    AlgorithmId, AlgorithmRegistry, HashAlgorithm, KemAlgorithm, QuantumError, SecurityLevel,
    SignatureAlgorithm,
};

#[test]
fn every_registered_signature_round_trips() {
    let registry = AlgorithmRegistry::default();
    let payload = b"payload digest";

    for algorithm in registry.signature_algorithms() {
        for level in [1u8, 3, 5] {
            let level = SecurityLevel::new(level).expect("valid level");
            let scheme = registry
                .signature(algorithm, level)
                .expect("registered algorithm");
            let keypair = scheme.generate_keypair().expect("keygen");
            let signature = scheme
                .sign(payload, &keypair.secret_key)
                .expect("signing succeeds");

            assert!(
                scheme.verify(payload, &signature, &keypair.public_key),
                "{} at level {} failed to verify its own signature",
                algorithm,
                level
            );
        }
    }
}

#[test]
fn signature_from_other_algorithm_does_not_verify() {
    let registry = AlgorithmRegistry::default();
    let level = SecurityLevel::default();
    let dilithium = registry
        .signature(SignatureAlgorithm::Dilithium, level)
        .expect("dilithium");
    let lamport = registry
        .signature(SignatureAlgorithm::Lamport, level)
        .expect("lamport");

    let keypair = dilithium.generate_keypair().expect("keygen");
    let signature = dilithium
        .sign(b"message", &keypair.secret_key)
        .expect("sign");

    assert!(!lamport.verify(b"message", &signature, &keypair.public_key));
}

#[test]
fn keypairs_are_fresh_per_call() {
    let registry = AlgorithmRegistry::default();
    let scheme = registry
        .signature(SignatureAlgorithm::Sphincs, SecurityLevel::default())
        .expect("sphincs");
    let a = scheme.generate_keypair().expect("keygen");
    let b = scheme.generate_keypair().expect("keygen");
    assert_ne!(a.public_key, b.public_key);
}

#[test]
fn resolve_rejects_unknown_names() {
    let registry = AlgorithmRegistry::default();
    assert_eq!(
        registry.resolve("dirac_shor").expect("legacy alias"),
        AlgorithmId::Hash(HashAlgorithm::Shor)
    );
    assert_eq!(
        registry.resolve("falcon"),
        Err(QuantumError::UnsupportedAlgorithm("falcon".to_string()))
    );
}

#[test]
fn kem_shared_secrets_agree_through_registry() {
    let registry = AlgorithmRegistry::default();
    let kem = registry.kem(KemAlgorithm::Kyber, SecurityLevel::new(5).expect("level"));
    let keypair = kem.generate_keypair().expect("keygen");
    let (ciphertext, sender) = kem.encapsulate(&keypair.public_key).expect("encapsulate");
    let receiver = kem
        .decapsulate(&ciphertext, &keypair.secret_key)
        .expect("decapsulate");
    assert_eq!(sender.as_slice(), receiver.as_slice());
}

#[test]
fn hashers_honor_requested_digest_size() {
    let registry = AlgorithmRegistry::default();
    for algorithm in HashAlgorithm::ALL {
        let hasher = registry.hasher(algorithm);
        for size in [1usize, 32, 64, 200] {
            assert_eq!(hasher.hash(b"data", size).expect("hash").len(), size);
        }
    }
}
