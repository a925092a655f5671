//! Signature verification for plugin manifests.
//!
//! `src/update/verify.rs` verifies release artifacts against a
//! SHA256SUMS file and falls back to an external tool for detached
//! signatures; this module takes the same "verify against a known-good
//! digest" shape but checks the manifest's own signature list against an
//! in-process trusted keyring using `ring`, since plugin installs happen far
//! more often than a release update and should not shell out.

use std::collections::HashMap;
use std::path::Path;

use base64::Engine;
use probeforge_api::CoreError;
use probeforge_config::PolicyFlags;
use ring::signature::{self, UnparsedPublicKey};
use tracing::{info, warn};

use crate::manifest::{PluginManifest, SignatureAlgorithm};

/// Public keys trusted to sign plugin manifests, keyed by the `keyId` a
/// signature entry references. Loaded once at startup from
/// `<dir>/<key_id>.pub` (raw key bytes in the encoding each algorithm
/// expects: 32-byte raw for Ed25519, SPKI DER for ECDSA/RSA).
pub struct TrustedKeyStore {
    keys: HashMap<String, Vec<u8>>,
}

impl TrustedKeyStore {
    pub fn empty() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    pub fn load_from_dir(dir: &Path, key_ids: &[String]) -> Result<Self, CoreError> {
        let mut keys = HashMap::new();
        for id in key_ids {
            let path = dir.join(format!("{id}.pub"));
            match std::fs::read(&path) {
                Ok(bytes) => {
                    keys.insert(id.clone(), bytes);
                }
                Err(err) => {
                    warn!(key_id = id, error = %err, "failed to load trusted key");
                }
            }
        }
        Ok(Self { keys })
    }

    pub fn get(&self, key_id: &str) -> Option<&[u8]> {
        self.keys.get(key_id).map(|v| v.as_slice())
    }
}

pub(crate) fn verifying_algorithm(alg: SignatureAlgorithm) -> &'static dyn signature::VerificationAlgorithm {
    match alg {
        SignatureAlgorithm::Ed25519 => &signature::ED25519,
        SignatureAlgorithm::EcdsaP256Sha256 => &signature::ECDSA_P256_SHA256_ASN1,
        SignatureAlgorithm::RsaSha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
    }
}

/// Verify a manifest's signature list against the trusted keyring. The
/// message signed is the manifest's declared `dist.hash`, in its hex-string
/// form, as UTF-8 bytes -- the same value `dist_hash::verify_dist_hash`
/// independently recomputes from disk.
///
/// - No signatures present: `Ok(())` unless `policy.require_signatures`.
/// - At least one signature from a trusted key verifies: `Ok(())`.
/// - Otherwise: `CoreError::Signature`.
pub fn verify_manifest_signatures(
    manifest: &PluginManifest,
    keystore: &TrustedKeyStore,
    policy: &PolicyFlags,
) -> Result<(), CoreError> {
    if manifest.signatures.is_empty() {
        if policy.require_signatures {
            return Err(CoreError::signature(
                &manifest.name,
                "manifest carries no signatures but signatures are required",
            ));
        }
        return Ok(());
    }

    let message = manifest.dist.hash.as_bytes();
    let mut last_error = String::new();

    for entry in &manifest.signatures {
        if !policy.trusted_key_ids.is_empty() && !policy.trusted_key_ids.contains(&entry.key_id) {
            last_error = format!("key '{}' is not in the trusted key list", entry.key_id);
            continue;
        }
        let Some(public_key) = keystore.get(&entry.key_id) else {
            last_error = format!("key '{}' was not found in the trusted keyring", entry.key_id);
            continue;
        };
        let Ok(sig_bytes) = base64::engine::general_purpose::STANDARD.decode(&entry.signature)
        else {
            last_error = format!("signature from key '{}' is not valid base64", entry.key_id);
            continue;
        };

        let verifier = UnparsedPublicKey::new(verifying_algorithm(entry.algorithm), public_key);
        match verifier.verify(message, &sig_bytes) {
            Ok(()) => {
                info!(plugin = %manifest.name, key_id = %entry.key_id, "signature verified");
                return Ok(());
            }
            Err(_) => {
                last_error = format!("signature from key '{}' failed verification", entry.key_id);
            }
        }
    }

    Err(CoreError::signature(&manifest.name, last_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{CapabilitiesDeclaration, DistInfo};
    use ring::rand::SystemRandom;
    use ring::signature::{Ed25519KeyPair, KeyPair};

    fn manifest_with(hash: &str, signatures: Vec<crate::manifest::SignatureEntry>) -> PluginManifest {
        PluginManifest {
            manifest_version: 2,
            name: "signed-plugin".into(),
            version: "0.1.0".into(),
            description: None,
            entry: "dist/plugin.wasm".into(),
            dist: DistInfo::with_hash(hash),
            dependencies: Default::default(),
            dependencies_policy: Default::default(),
            external_dependencies: Vec::new(),
            permissions: Default::default(),
            capabilities: CapabilitiesDeclaration {
                tools: vec!["probe".into()],
                resources: vec![],
                prompts: vec![],
            },
            signatures,
        }
    }

    #[test]
    fn unsigned_manifest_passes_when_not_required() {
        let manifest = manifest_with("abc123", vec![]);
        let policy = PolicyFlags::default();
        assert!(verify_manifest_signatures(&manifest, &TrustedKeyStore::empty(), &policy).is_ok());
    }

    #[test]
    fn unsigned_manifest_fails_when_required() {
        let manifest = manifest_with("abc123", vec![]);
        let mut policy = PolicyFlags::default();
        policy.require_signatures = true;
        assert!(verify_manifest_signatures(&manifest, &TrustedKeyStore::empty(), &policy).is_err());
    }

    #[test]
    fn valid_ed25519_signature_verifies() {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let hash = "00112233445566778899aabbccddeeff0011223344556677889900112233ab";
        let sig = key_pair.sign(hash.as_bytes());
        let sig_b64 = base64::engine::general_purpose::STANDARD.encode(sig.as_ref());

        let manifest = manifest_with(
            hash,
            vec![crate::manifest::SignatureEntry {
                key_id: "key-1".into(),
                algorithm: SignatureAlgorithm::Ed25519,
                signature: sig_b64,
            }],
        );
        let mut keys = HashMap::new();
        keys.insert("key-1".to_string(), key_pair.public_key().as_ref().to_vec());
        let keystore = TrustedKeyStore { keys };
        let policy = PolicyFlags::default();
        assert!(verify_manifest_signatures(&manifest, &keystore, &policy).is_ok());
    }

    #[test]
    fn untrusted_key_id_is_rejected() {
        let manifest = manifest_with(
            "abc123",
            vec![crate::manifest::SignatureEntry {
                key_id: "unknown".into(),
                algorithm: SignatureAlgorithm::Ed25519,
                signature: "not-checked".into(),
            }],
        );
        let mut policy = PolicyFlags::default();
        policy.trusted_key_ids = vec!["key-1".into()];
        assert!(verify_manifest_signatures(&manifest, &TrustedKeyStore::empty(), &policy).is_err());
    }
}
