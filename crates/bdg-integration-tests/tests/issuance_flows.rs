//! # Issuance, Verification and Revocation Across Crates
//!
//! Wires a [`KeyStore`], a [`StatusListManager`] and the credential signer
//! and verifier together over in-memory repositories, then walks the flows a
//! deployment runs: issue with a status entry, verify, tamper, rotate keys,
//! revoke, suspend and reinstate.

use std::sync::Arc;

use async_trait::async_trait;
use bdg_core::{BadgeError, CredentialId, IssuerId, Timestamp};
use bdg_crypto::{CryptoProvider, KeyAlgorithm, KeySealer, PublicKey, SeededCryptoProvider};
use bdg_keys::{InMemoryKeyRepository, KeyStatus, KeyStore, KeyStoreConfig};
use bdg_status::{
    index_for_credential, BitVector, CredentialStatusRecord, InMemoryStatusListRepository,
    StatusListConfig, StatusListManager, StatusPurpose,
};
use bdg_vc::{
    Credential, CredentialSigner, CredentialVerifier, ProofFormat, ResolvedKey, SignOptions,
    StatusOutcome, VerificationKeyResolver,
};
use serde_json::{json, Value};

struct Harness {
    provider: Arc<dyn CryptoProvider>,
    keys: Arc<KeyStore>,
    status: Arc<StatusListManager>,
    issuer: IssuerId,
}

fn key_store(provider: &Arc<dyn CryptoProvider>) -> Arc<KeyStore> {
    Arc::new(KeyStore::new(
        Arc::new(InMemoryKeyRepository::new()),
        Arc::new(KeySealer::ephemeral(provider.clone())),
        provider.clone(),
        KeyStoreConfig::default(),
    ))
}

async fn harness(algorithm: KeyAlgorithm) -> Harness {
    let provider: Arc<dyn CryptoProvider> = Arc::new(SeededCryptoProvider::new(11));
    let keys = key_store(&provider);
    let status = Arc::new(StatusListManager::new(
        Arc::new(InMemoryStatusListRepository::default()),
        keys.clone(),
        CredentialSigner::new(provider.clone()),
        StatusListConfig {
            base_url: "https://badges.example".to_string(),
            ..StatusListConfig::default()
        },
    ));
    let issuer = IssuerId::new("acme").unwrap();
    keys.generate_key(&issuer, algorithm).await.unwrap();
    Harness {
        provider,
        keys,
        status,
        issuer,
    }
}

impl Harness {
    async fn sign(&self, document: Value, format: ProofFormat) -> Credential {
        let key = self.keys.active_signing_key(&self.issuer).await.unwrap();
        CredentialSigner::new(self.provider.clone())
            .sign(
                &Credential::from_value(document).unwrap(),
                &key.key_pair,
                &SignOptions::new(key.verification_method.clone(), format),
            )
            .unwrap()
    }

    /// Register the credential on the revocation list, embed the entry and
    /// sign.
    async fn issue(&self, mut document: Value) -> Credential {
        let credential_id = CredentialId::new(document["id"].as_str().unwrap()).unwrap();
        let entry = self
            .status
            .register(&self.issuer, &credential_id, StatusPurpose::Revocation)
            .await
            .unwrap();
        document["credentialStatus"] = serde_json::to_value(&entry).unwrap();
        self.sign(document, ProofFormat::DataIntegrity).await
    }

    fn verifier(&self) -> CredentialVerifier {
        CredentialVerifier::new(self.keys.clone(), self.provider.clone())
            .with_status_check(self.status.clone())
    }

    async fn encoded_list(&self, purpose: StatusPurpose) -> String {
        let list = self
            .status
            .status_list_credential(&self.issuer, purpose)
            .await
            .unwrap();
        list.get("credentialSubject").unwrap()["encodedList"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

fn badge(id: &str, achievement: &str) -> Value {
    json!({
        "@context": ["https://www.w3.org/2018/credentials/v1"],
        "id": id,
        "type": ["VerifiableCredential", "OpenBadgeCredential"],
        "issuer": "acme",
        "issuanceDate": "2024-01-01T00:00:00Z",
        "credentialSubject": {
            "id": "did:example:learner",
            "achievement": {"name": achievement, "level": 3, "public": true}
        }
    })
}

fn cid(id: &str) -> CredentialId {
    CredentialId::new(id).unwrap()
}

/// JSON pointers of every scalar in `value`, skipping `skip` subtrees.
fn leaf_pointers(value: &Value, prefix: String, skip: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if prefix.is_empty() && key == skip {
                    continue;
                }
                let escaped = key.replace('~', "~0").replace('/', "~1");
                leaf_pointers(child, format!("{prefix}/{escaped}"), skip, out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                leaf_pointers(child, format!("{prefix}/{i}"), skip, out);
            }
        }
        _ => out.push(prefix),
    }
}

fn mutate(value: &mut Value) {
    *value = match value {
        Value::String(s) => Value::String(format!("{s}!")),
        Value::Number(n) => json!(n.as_i64().unwrap_or(0) + 1),
        Value::Bool(b) => Value::Bool(!*b),
        Value::Null => json!("x"),
        _ => unreachable!("leaves only"),
    };
}

// -- Round trips --

#[tokio::test]
async fn sign_and_verify_every_algorithm() {
    let cases = [
        (KeyAlgorithm::Ed25519, ProofFormat::DataIntegrity),
        (KeyAlgorithm::Ed25519, ProofFormat::Jwt),
        (KeyAlgorithm::Es256, ProofFormat::DataIntegrity),
        (KeyAlgorithm::Es256, ProofFormat::Jwt),
        (KeyAlgorithm::Rs256, ProofFormat::Jwt),
    ];
    for (algorithm, format) in cases {
        let h = harness(algorithm).await;
        let signed = h.sign(badge("urn:uuid:abc", "X"), format).await;
        let result = h.verifier().verify(&signed).await;
        assert!(
            result.verified,
            "{algorithm} {format:?}: {:?}",
            result.errors
        );
        // Never registered, so both bits read clear.
        assert_eq!(result.status, StatusOutcome::Active);
    }
}

#[tokio::test]
async fn rs256_has_no_data_integrity_proof() {
    let h = harness(KeyAlgorithm::Rs256).await;
    let key = h.keys.active_signing_key(&h.issuer).await.unwrap();
    let err = CredentialSigner::new(h.provider.clone())
        .sign(
            &Credential::from_value(badge("urn:uuid:rsa", "X")).unwrap(),
            &key.key_pair,
            &SignOptions::new(key.verification_method.clone(), ProofFormat::DataIntegrity),
        )
        .unwrap_err();
    assert!(err.to_string().contains("RS256"), "{err}");
}

// -- Tamper evidence --

#[tokio::test]
async fn changed_achievement_name_fails_verification() {
    let h = harness(KeyAlgorithm::Ed25519).await;
    let signed = h
        .sign(
            json!({"id": "urn:uuid:abc", "issuer": "acme", "achievement": {"name": "X"}}),
            ProofFormat::DataIntegrity,
        )
        .await;
    assert!(h.verifier().verify(&signed).await.verified);

    let mut tampered = signed.clone();
    *tampered.pointer_mut("/achievement/name").unwrap() = json!("Y");
    let result = h.verifier().verify(&tampered).await;
    assert!(!result.verified);
    assert_eq!(result.errors, vec!["signature verification failed".to_string()]);
}

#[tokio::test]
async fn every_leaf_is_covered_by_the_signature() {
    for format in [ProofFormat::DataIntegrity, ProofFormat::Jwt] {
        let h = harness(KeyAlgorithm::Ed25519).await;
        let signed = h.sign(badge("urn:uuid:leafy", "X"), format).await;
        let verifier = h.verifier();
        assert!(verifier.verify(&signed).await.verified);

        let mut pointers = Vec::new();
        leaf_pointers(&signed.clone().into_value(), String::new(), "proof", &mut pointers);
        assert!(pointers.len() >= 8);
        for pointer in pointers {
            let mut tampered = signed.clone();
            mutate(tampered.pointer_mut(&pointer).unwrap());
            let result = verifier.verify(&tampered).await;
            assert!(!result.verified, "{format:?}: mutation at {pointer} still verified");
        }
    }
}

/// Resolves keys through a real store but substitutes the public key.
struct SubstitutingResolver {
    inner: Arc<KeyStore>,
    public_key: PublicKey,
}

#[async_trait]
impl VerificationKeyResolver for SubstitutingResolver {
    async fn resolve_verification_key(
        &self,
        verification_method: &str,
    ) -> Result<Option<ResolvedKey>, BadgeError> {
        let resolved = self.inner.resolve_verification_key(verification_method).await?;
        Ok(resolved.map(|key| ResolvedKey {
            public_key: self.public_key.clone(),
            ..key
        }))
    }
}

#[tokio::test]
async fn another_key_of_the_same_algorithm_does_not_verify() {
    let h = harness(KeyAlgorithm::Ed25519).await;
    let signed = h.sign(badge("urn:uuid:abc", "X"), ProofFormat::DataIntegrity).await;

    let other_provider: Arc<dyn CryptoProvider> = Arc::new(SeededCryptoProvider::new(99));
    let other_store = key_store(&other_provider);
    let key_b = other_store
        .generate_key(&h.issuer, KeyAlgorithm::Ed25519)
        .await
        .unwrap();

    let verifier = CredentialVerifier::new(
        Arc::new(SubstitutingResolver {
            inner: h.keys.clone(),
            public_key: key_b.public_key().unwrap(),
        }),
        h.provider.clone(),
    );
    let result = verifier.verify(&signed).await;
    assert!(!result.verified);

    // The same verification method is unknown to the other store.
    let result = CredentialVerifier::new(other_store, h.provider.clone())
        .verify(&signed)
        .await;
    assert!(!result.verified);
}

// -- Key rotation --

#[tokio::test]
async fn rotation_keeps_old_credentials_verifying() {
    let h = harness(KeyAlgorithm::Ed25519).await;
    let key_a = h.keys.active_key(&h.issuer).await.unwrap();
    let before = h.sign(badge("urn:uuid:before", "X"), ProofFormat::DataIntegrity).await;

    let key_b = h.keys.rotate_key(&h.issuer, None).await.unwrap();
    assert_eq!(key_b.algorithm, KeyAlgorithm::Ed25519);
    assert_ne!(key_a.key_id, key_b.key_id);
    let after = h.sign(badge("urn:uuid:after", "X"), ProofFormat::DataIntegrity).await;

    let verifier = h.verifier();
    let old = verifier.verify(&before).await;
    assert!(old.verified, "{:?}", old.errors);
    assert_eq!(old.verification_method.as_deref(), Some(key_a.verification_method().as_str()));
    let new = verifier.verify(&after).await;
    assert!(new.verified, "{:?}", new.errors);
    assert_eq!(new.verification_method.as_deref(), Some(key_b.verification_method().as_str()));

    let listed = h.keys.list_keys(&h.issuer).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed.iter().filter(|k| k.status == KeyStatus::Active).count(), 1);
    let old_vm = listed.iter().find(|k| k.key_id == key_a.key_id).unwrap();
    assert_eq!(old_vm.status, KeyStatus::Revoked);
    assert!(old_vm.revoked_at.is_some());

    // The retired key still resolves but never signs again.
    let err = h.keys.unlock(&key_a.key_id).await.unwrap_err();
    assert!(matches!(BadgeError::from(err), BadgeError::Forbidden(_)));
}

#[tokio::test]
async fn rotation_can_change_algorithm() {
    let h = harness(KeyAlgorithm::Ed25519).await;
    let before = h.sign(badge("urn:uuid:ed", "X"), ProofFormat::Jwt).await;
    h.keys
        .rotate_key(&h.issuer, Some(KeyAlgorithm::Es256))
        .await
        .unwrap();
    let after = h.sign(badge("urn:uuid:es", "X"), ProofFormat::Jwt).await;

    let verifier = h.verifier();
    assert!(verifier.verify(&before).await.verified);
    assert!(verifier.verify(&after).await.verified);
}

// -- Status lists --

#[tokio::test]
async fn revoking_flips_the_published_list() {
    let h = harness(KeyAlgorithm::Ed25519).await;
    let c1 = cid("c1");
    assert!(!h.status.is_revoked(&c1).await.unwrap());
    let empty = h.encoded_list(StatusPurpose::Revocation).await;

    let change = h
        .status
        .set_status(
            &h.issuer,
            &c1,
            StatusPurpose::Revocation,
            true,
            Some("policy violation".to_string()),
        )
        .await
        .unwrap();
    assert!(change.changed);
    assert!(h.status.is_revoked(&c1).await.unwrap());
    let view = h.status.status_of(&c1).await.unwrap();
    assert_eq!(view.reason.as_deref(), Some("policy violation"));

    let revoked = h.encoded_list(StatusPurpose::Revocation).await;
    assert_ne!(empty, revoked);
    let bits = BitVector::decode_unsized(&revoked, 1 << 24).unwrap();
    assert_eq!(bits.ones().collect::<Vec<_>>(), vec![change.status_index]);
    assert_eq!(change.status_index, index_for_credential("c1", bits.capacity()));
}

#[tokio::test]
async fn set_status_is_idempotent_and_reversible() {
    let h = harness(KeyAlgorithm::Ed25519).await;
    let c1 = cid("c1");
    h.status.register(&h.issuer, &c1, StatusPurpose::Revocation).await.unwrap();
    let original = h.encoded_list(StatusPurpose::Revocation).await;

    let first = h.status.revoke(&h.issuer, &c1, None).await.unwrap();
    let after_first = h.encoded_list(StatusPurpose::Revocation).await;
    let second = h.status.revoke(&h.issuer, &c1, None).await.unwrap();
    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(second.list_version, first.list_version);
    assert_eq!(h.encoded_list(StatusPurpose::Revocation).await, after_first);

    let cleared = h.status.reinstate(&h.issuer, &c1).await.unwrap();
    assert!(cleared.changed);
    assert!(!h.status.is_revoked(&c1).await.unwrap());
    assert_eq!(h.encoded_list(StatusPurpose::Revocation).await, original);
}

#[tokio::test]
async fn index_does_not_move_between_registrations() {
    let h = harness(KeyAlgorithm::Ed25519).await;
    let c = cid("urn:uuid:abc");
    let first = h.status.register(&h.issuer, &c, StatusPurpose::Revocation).await.unwrap();
    let again = h.status.register(&h.issuer, &c, StatusPurpose::Revocation).await.unwrap();
    assert_eq!(first, again);
    assert_eq!(first.status_list_index, "7156");
    assert_eq!(
        first.status_list_credential,
        "https://badges.example/status/list/acme"
    );
}

#[tokio::test]
async fn list_bit_wins_over_mirror() {
    let h = harness(KeyAlgorithm::Ed25519).await;
    let c = cid("urn:uuid:mirror");
    h.status.register(&h.issuer, &c, StatusPurpose::Revocation).await.unwrap();

    let stale = |revoked: bool| CredentialStatusRecord {
        credential_id: c.clone(),
        issuer_id: h.issuer.clone(),
        revoked,
        suspended: false,
        reason: None,
        updated_at: Timestamp::now(),
    };

    h.status.repository().upsert_credential_status(&stale(true)).await.unwrap();
    assert!(!h.status.is_revoked(&c).await.unwrap());
    assert!(!h.status.status_of(&c).await.unwrap().revoked);

    h.status.revoke(&h.issuer, &c, None).await.unwrap();
    h.status.repository().upsert_credential_status(&stale(false)).await.unwrap();
    assert!(h.status.is_revoked(&c).await.unwrap());
    assert!(h.status.status_of(&c).await.unwrap().revoked);
}

#[tokio::test]
async fn issued_credential_follows_its_status() {
    let h = harness(KeyAlgorithm::Es256).await;
    let credential = h.issue(badge("urn:uuid:issued", "X")).await;
    let c = cid("urn:uuid:issued");
    let verifier = h.verifier();

    let result = verifier.verify(&credential).await;
    assert!(result.verified, "{:?}", result.errors);
    assert_eq!(result.status, StatusOutcome::Active);

    h.status.revoke(&h.issuer, &c, Some("superseded".into())).await.unwrap();
    let result = verifier.verify(&credential).await;
    assert!(!result.verified);
    assert_eq!(result.status, StatusOutcome::Revoked);

    h.status.reinstate(&h.issuer, &c).await.unwrap();
    assert!(verifier.verify(&credential).await.verified);

    h.status
        .set_status(&h.issuer, &c, StatusPurpose::Suspension, true, None)
        .await
        .unwrap();
    let result = verifier.verify(&credential).await;
    assert!(!result.verified);
    assert_eq!(result.status, StatusOutcome::Suspended);
    let view = h.status.status_of(&c).await.unwrap();
    assert!(view.suspended);
    assert!(view.suspension_list.is_some());
}

#[tokio::test]
async fn published_list_credential_verifies() {
    let h = harness(KeyAlgorithm::Ed25519).await;
    h.status.revoke(&h.issuer, &cid("c1"), None).await.unwrap();
    let list = h
        .status
        .status_list_credential(&h.issuer, StatusPurpose::Revocation)
        .await
        .unwrap();
    assert_eq!(
        list.get("type").unwrap(),
        &json!(["VerifiableCredential", "StatusList2021Credential"])
    );

    let verifier = CredentialVerifier::new(h.keys.clone(), h.provider.clone());
    let result = verifier.verify(&list).await;
    assert!(result.verified, "{:?}", result.errors);

    // A list re-signed after rotation verifies under the new key.
    h.keys.rotate_key(&h.issuer, None).await.unwrap();
    h.status.revoke(&h.issuer, &cid("c2"), None).await.unwrap();
    let list = h
        .status
        .status_list_credential(&h.issuer, StatusPurpose::Revocation)
        .await
        .unwrap();
    assert!(verifier.verify(&list).await.verified);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_revocations_are_all_kept() {
    let h = Arc::new(harness(KeyAlgorithm::Ed25519).await);
    let ids: Vec<String> = (0..32).map(|i| format!("urn:uuid:concurrent-{i}")).collect();

    let mut tasks = Vec::new();
    for id in ids.clone() {
        let h = h.clone();
        tasks.push(tokio::spawn(async move {
            h.status.revoke(&h.issuer, &cid(&id), None).await.unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for id in &ids {
        assert!(h.status.is_revoked(&cid(id)).await.unwrap(), "{id}");
    }
    let bits = BitVector::decode_unsized(&h.encoded_list(StatusPurpose::Revocation).await, 1 << 24)
        .unwrap();
    let mut expected: Vec<usize> = ids
        .iter()
        .map(|id| index_for_credential(id, bits.capacity()))
        .collect();
    expected.sort_unstable();
    expected.dedup();
    assert_eq!(bits.ones().collect::<Vec<_>>(), expected);
}

#[tokio::test]
async fn status_changes_are_bound_to_the_issuer() {
    let h = harness(KeyAlgorithm::Ed25519).await;
    let globex = IssuerId::new("globex").unwrap();
    h.keys.generate_key(&globex, KeyAlgorithm::Ed25519).await.unwrap();

    let c = cid("urn:uuid:owned");
    h.status.register(&h.issuer, &c, StatusPurpose::Revocation).await.unwrap();
    let err = h.status.revoke(&globex, &c, None).await.unwrap_err();
    assert!(matches!(err, bdg_status::StatusError::Forbidden(_)), "{err}");
    assert!(!h.status.is_revoked(&c).await.unwrap());
}

#[tokio::test]
async fn other_issuer_cannot_suspend_an_issued_credential() {
    let h = harness(KeyAlgorithm::Ed25519).await;
    let globex = IssuerId::new("globex").unwrap();
    h.keys.generate_key(&globex, KeyAlgorithm::Ed25519).await.unwrap();

    let credential = h.issue(badge("urn:uuid:abc", "X")).await;
    let c = cid("urn:uuid:abc");

    let err = h.status.revoke(&globex, &c, None).await.unwrap_err();
    assert!(matches!(err, bdg_status::StatusError::Forbidden(_)), "{err}");
    let err = h
        .status
        .set_status(&globex, &c, StatusPurpose::Suspension, true, Some("squat".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, bdg_status::StatusError::Forbidden(_)), "{err}");

    let flags = h.status.status_flags(&c).await.unwrap();
    assert!(!flags.revoked && !flags.suspended);
    let result = h.verifier().verify(&credential).await;
    assert!(result.verified, "{:?}", result.errors);
    assert_eq!(result.status, StatusOutcome::Active);

    // The owner can still suspend it.
    h.status
        .set_status(&h.issuer, &c, StatusPurpose::Suspension, true, None)
        .await
        .unwrap();
    assert!(h.status.status_flags(&c).await.unwrap().suspended);
}
