use crate::error::StoreError;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Deterministic digest of a sensitive filter field (id, owner, endpoint).
///
/// Index structures and filters only ever see these hashes, never the
/// plaintext values; the plaintext lives inside the encoded record body.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldHash(String);

impl FieldHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn hash_field(value: &str) -> FieldHash {
    let digest = Sha256::digest(value.as_bytes());
    FieldHash(BASE64URL.encode(digest))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    /// Terminal state for VAPID keys.
    Revoked,
    /// Terminal state for subscriptions (soft delete).
    Removed,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordMeta {
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated: OffsetDateTime,
    pub status: RecordStatus,
    /// Contact email for the push service, set on VAPID key records only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

impl RecordMeta {
    pub fn active_now() -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            created: now,
            updated: now,
            status: RecordStatus::Active,
            contact: None,
        }
    }
}

/// Full document serialized and base64url-wrapped so the store backend never
/// interprets its fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedBody(String);

impl EncodedBody {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn encode_body<T: Serialize>(document: &T) -> Result<EncodedBody, StoreError> {
    let json = serde_json::to_vec(document)
        .map_err(|err| StoreError::Backend(format!("encode record body: {err}")))?;
    Ok(EncodedBody(BASE64URL.encode(json)))
}

pub fn decode_body<T: DeserializeOwned>(body: &EncodedBody) -> Result<T, StoreError> {
    let json = BASE64URL
        .decode(&body.0)
        .map_err(|err| StoreError::Backend(format!("decode record body: {err}")))?;
    serde_json::from_slice(&json)
        .map_err(|err| StoreError::Backend(format!("decode record body: {err}")))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    VapidKeys,
    Subscriptions,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::VapidKeys => "web_push_vapid_key",
            Collection::Subscriptions => "web_push_subscription",
        }
    }
}

/// One row as it rests in the document store: hashed lookup keys, metadata,
/// and the opaque encoded document.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRecord {
    pub id: FieldHash,
    pub owner: Option<FieldHash>,
    pub endpoint: Option<FieldHash>,
    pub meta: RecordMeta,
    pub body: EncodedBody,
}

/// Conjunctive filter over the hashed index fields and record status.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordFilter {
    pub id: Option<FieldHash>,
    pub owner: Option<FieldHash>,
    pub endpoint: Option<FieldHash>,
    pub status: Option<RecordStatus>,
}

impl RecordFilter {
    pub fn active_id(id: &str) -> Self {
        Self {
            id: Some(hash_field(id)),
            status: Some(RecordStatus::Active),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &StoredRecord) -> bool {
        if let Some(id) = &self.id
            && *id != record.id
        {
            return false;
        }
        if let Some(owner) = &self.owner
            && record.owner.as_ref() != Some(owner)
        {
            return false;
        }
        if let Some(endpoint) = &self.endpoint
            && record.endpoint.as_ref() != Some(endpoint)
        {
            return false;
        }
        if let Some(status) = self.status
            && record.meta.status != status
        {
            return false;
        }
        true
    }
}
