use crate::authz::{self, Actor, Capability};
use crate::config::AppConfig;
use crate::error::{Error, StoreError};
use crate::ports::{Authorizer, DocumentStore};
use crate::store::{self, Collection, RecordFilter, RecordMeta};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL;
use p256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use std::sync::Arc;

/// A VAPID signing key pair.
///
/// The private key is the raw 32-byte P-256 scalar and the public key the
/// 65-byte uncompressed SEC1 point, both base64url — the exact formats the
/// `web-push` signer consumes. The private key is `None` on records fetched
/// without private access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VapidKey {
    pub id: String,
    #[serde(rename = "publicKeyBase64Url")]
    pub public_key: String,
    #[serde(rename = "privateKeyBase64Url")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct VapidCredentials {
    pub public_key: String,
    pub private_key: String,
}

/// Generates a fresh P-256 key pair for VAPID signing.
pub fn generate_credentials() -> VapidCredentials {
    let mut rng = OsRng;
    generate_credentials_with_rng(&mut rng)
}

pub fn generate_credentials_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> VapidCredentials {
    let signing_key = SigningKey::random(rng);
    let public_point = signing_key.verifying_key().to_encoded_point(false);
    VapidCredentials {
        public_key: BASE64URL.encode(public_point.as_bytes()),
        private_key: BASE64URL.encode(signing_key.to_bytes().as_slice()),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredKey {
    pub key: VapidKey,
    pub meta: RecordMeta,
}

/// Lookup options for [`Keyring::get`].
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyLookup {
    /// Return the private key as well; requires the key-access capability.
    pub include_private: bool,
}

#[derive(Clone)]
pub struct Keyring {
    config: AppConfig,
    store: Arc<dyn DocumentStore>,
    authz: Arc<dyn Authorizer>,
}

impl Keyring {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        authz: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            config,
            store,
            authz,
        }
    }

    /// Canonical absolute identifier for a key name.
    pub fn create_id(&self, name: &str) -> String {
        format!(
            "{}{}/{name}",
            self.config.base_uri, self.config.routes.vapid_keys
        )
    }

    /// Produces a fresh key pair under an id derived from `name`. Pure apart
    /// from randomness; nothing is persisted until [`Keyring::add`].
    pub fn generate(&self, name: &str) -> VapidKey {
        let mut rng = OsRng;
        self.generate_with_rng(name, &mut rng)
    }

    pub fn generate_with_rng<R: RngCore + CryptoRng>(&self, name: &str, rng: &mut R) -> VapidKey {
        let credentials = generate_credentials_with_rng(rng);
        VapidKey {
            id: self.create_id(name),
            public_key: credentials.public_key,
            private_key: Some(credentials.private_key),
        }
    }

    /// Persists a key with `status=active`. `contact_email` is the address
    /// the push service may use to reach the key's operator and becomes the
    /// VAPID `sub` contact for every message signed with the key.
    pub async fn add(
        &self,
        actor: &Actor,
        key: &VapidKey,
        contact_email: &str,
    ) -> Result<StoredKey, Error> {
        authz::check(
            self.authz.as_ref(),
            actor,
            Capability::KeyInsert,
            &[&key.id],
        )
        .await?;

        log::debug!(
            "adding VAPID key {} (public key {})",
            key.id,
            key.public_key
        );

        let mut meta = RecordMeta::active_now();
        meta.contact = Some(contact_email.to_string());
        let record = store::StoredRecord {
            id: store::hash_field(&key.id),
            owner: None,
            endpoint: None,
            meta: meta.clone(),
            body: store::encode_body(key).map_err(Error::Store)?,
        };
        match self.store.insert(Collection::VapidKeys, record).await {
            Ok(()) => Ok(StoredKey {
                key: key.clone(),
                meta,
            }),
            Err(StoreError::Duplicate(_)) => Err(Error::DuplicateKey {
                id: key.id.clone(),
            }),
            Err(err) => Err(Error::Store(err)),
        }
    }

    /// Fetches an active key by id.
    ///
    /// Public key access is unrestricted: without `include_private` the
    /// private key is stripped and no capability check runs. With it, the
    /// actor must hold the key-access capability for this key.
    pub async fn get(&self, actor: &Actor, id: &str, lookup: KeyLookup) -> Result<StoredKey, Error> {
        let record = self
            .store
            .find_one(Collection::VapidKeys, &RecordFilter::active_id(id))
            .await
            .map_err(Error::Store)?
            .ok_or_else(|| Error::KeyNotFound { id: id.to_string() })?;

        let mut key: VapidKey = store::decode_body(&record.body).map_err(Error::Store)?;
        if lookup.include_private {
            authz::check(self.authz.as_ref(), actor, Capability::KeyAccess, &[id]).await?;
        } else {
            key.private_key = None;
        }
        Ok(StoredKey {
            key,
            meta: record.meta,
        })
    }
}
