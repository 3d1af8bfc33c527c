//! # Property Tests
//!
//! Randomized checks over index derivation, signatures and status writes.
//! Async code runs on a current-thread runtime built per case.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bdg_core::{CredentialId, IssuerId};
use bdg_crypto::{CryptoProvider, KeyAlgorithm, KeySealer, SeededCryptoProvider};
use bdg_keys::{InMemoryKeyRepository, KeyStore, KeyStoreConfig};
use bdg_status::{
    index_for_credential, InMemoryStatusListRepository, StatusListConfig, StatusListManager,
    StatusPurpose,
};
use bdg_vc::{Credential, CredentialSigner, CredentialVerifier, ProofFormat, SignOptions};
use proptest::prelude::*;
use serde_json::json;

const LIST_CAPACITY: usize = 1024;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// `n` credential ids whose bits on a list of `LIST_CAPACITY` differ.
fn distinct_bit_ids(n: usize) -> Vec<CredentialId> {
    let mut taken = BTreeSet::new();
    (0..)
        .map(|i| format!("urn:uuid:model-{i}"))
        .filter(|id| taken.insert(index_for_credential(id, LIST_CAPACITY)))
        .take(n)
        .map(|id| CredentialId::new(id).unwrap())
        .collect()
}

fn stores(seed: u64) -> (Arc<dyn CryptoProvider>, Arc<KeyStore>, StatusListManager) {
    let provider: Arc<dyn CryptoProvider> = Arc::new(SeededCryptoProvider::new(seed));
    let keys = Arc::new(KeyStore::new(
        Arc::new(InMemoryKeyRepository::new()),
        Arc::new(KeySealer::ephemeral(provider.clone())),
        provider.clone(),
        KeyStoreConfig::default(),
    ));
    let manager = StatusListManager::new(
        Arc::new(InMemoryStatusListRepository::default()),
        keys.clone(),
        CredentialSigner::new(provider.clone()),
        StatusListConfig {
            capacity: LIST_CAPACITY,
            ..StatusListConfig::default()
        },
    );
    (provider, keys, manager)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn index_is_pure_and_in_range(id in ".{1,64}", capacity in 1usize..200_000) {
        let index = index_for_credential(&id, capacity);
        prop_assert!(index < capacity);
        prop_assert_eq!(index, index_for_credential(&id, capacity));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn only_the_signed_name_verifies(
        name in "[a-zA-Z ]{1,24}",
        other in "[a-zA-Z ]{1,24}",
        jwt in any::<bool>(),
    ) {
        prop_assume!(name != other);
        let rt = runtime();
        let (provider, keys, _) = stores(5);
        let issuer = IssuerId::new("acme").unwrap();
        let verdicts = rt.block_on(async {
            keys.generate_key(&issuer, KeyAlgorithm::Ed25519).await.unwrap();
            let key = keys.active_signing_key(&issuer).await.unwrap();
            let format = if jwt { ProofFormat::Jwt } else { ProofFormat::DataIntegrity };
            let document = Credential::from_value(json!({
                "id": "urn:uuid:prop",
                "issuer": "acme",
                "achievement": {"name": name}
            }))
            .unwrap();
            let signed = CredentialSigner::new(provider.clone())
                .sign(&document, &key.key_pair, &SignOptions::new(key.verification_method.clone(), format))
                .unwrap();

            let verifier = CredentialVerifier::new(keys.clone(), provider.clone());
            let mut tampered = signed.clone();
            *tampered.pointer_mut("/achievement/name").unwrap() = json!(other);
            (
                verifier.verify(&signed).await.verified,
                verifier.verify(&tampered).await.verified,
            )
        });
        prop_assert_eq!(verdicts, (true, false));
    }

    #[test]
    fn status_writes_match_a_model(
        ops in proptest::collection::vec((0usize..6, any::<bool>()), 1..12),
    ) {
        let ids = distinct_bit_ids(6);
        let rt = runtime();
        let (_, keys, manager) = stores(9);
        let issuer = IssuerId::new("acme").unwrap();
        let (model, observed) = rt.block_on(async {
            keys.generate_key(&issuer, KeyAlgorithm::Ed25519).await.unwrap();
            let mut model: BTreeMap<usize, bool> = BTreeMap::new();
            for (which, value) in &ops {
                let before = model.get(which).copied().unwrap_or(false);
                let change = manager
                    .set_status(&issuer, &ids[*which], StatusPurpose::Revocation, *value, None)
                    .await
                    .unwrap();
                assert_eq!(change.changed, before != *value);
                model.insert(*which, *value);
            }
            let mut observed = BTreeMap::new();
            for which in model.keys() {
                observed.insert(*which, manager.is_revoked(&ids[*which]).await.unwrap());
            }
            (model, observed)
        });
        prop_assert_eq!(model, observed);
    }
}
