use crate::authz::Capability;
use crate::error::{Error, StoreError, TransportError};
use crate::ports::{Authorizer, DocumentStore, PushTransport};
use crate::push::PushRequest;
use crate::store::{Collection, FieldHash, RecordFilter, RecordStatus, StoredRecord};

use async_trait::async_trait;
use time::OffsetDateTime;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory document store with per-collection unique indexes.
///
/// Every insert runs in a single critical section, so concurrent inserts
/// colliding on an index have exactly one winner. The endpoint index only
/// covers active records: soft-deleting a subscription frees its endpoint
/// for a later re-subscribe, while the record itself stays put.
#[derive(Debug, Default)]
pub struct MemoryStore {
    shelves: Mutex<HashMap<Collection, Shelf>>,
}

#[derive(Debug, Default)]
struct Shelf {
    records: HashMap<FieldHash, StoredRecord>,
    endpoints: HashMap<FieldHash, FieldHash>,
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(
        &self,
        collection: Collection,
        record: StoredRecord,
    ) -> Result<(), StoreError> {
        let mut shelves = self.shelves.lock().expect("store lock");
        let shelf = shelves.entry(collection).or_default();
        if shelf.records.contains_key(&record.id) {
            return Err(StoreError::Duplicate("id"));
        }
        if let Some(endpoint) = &record.endpoint {
            if shelf.endpoints.contains_key(endpoint) {
                return Err(StoreError::Duplicate("endpoint"));
            }
            shelf.endpoints.insert(endpoint.clone(), record.id.clone());
        }
        shelf.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &RecordFilter,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let shelves = self.shelves.lock().expect("store lock");
        let Some(shelf) = shelves.get(&collection) else {
            return Ok(None);
        };
        Ok(shelf
            .records
            .values()
            .find(|record| filter.matches(record))
            .cloned())
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &RecordFilter,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let shelves = self.shelves.lock().expect("store lock");
        let Some(shelf) = shelves.get(&collection) else {
            return Ok(Vec::new());
        };
        Ok(shelf
            .records
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        collection: Collection,
        id: &FieldHash,
        status: RecordStatus,
    ) -> Result<bool, StoreError> {
        let mut shelves = self.shelves.lock().expect("store lock");
        let Some(shelf) = shelves.get_mut(&collection) else {
            return Ok(false);
        };
        let Some(record) = shelf.records.get_mut(id) else {
            return Ok(false);
        };
        record.meta.status = status;
        record.meta.updated = OffsetDateTime::now_utc();
        if status != RecordStatus::Active
            && let Some(endpoint) = &record.endpoint
        {
            shelf.endpoints.remove(endpoint);
        }
        Ok(true)
    }
}

/// Fixed-role capability gate: admins hold every capability, other actors
/// hold the subscription capabilities for resources that name them (their
/// own identity appears among the resource references).
#[derive(Debug, Default)]
pub struct StaticRoleAuthorizer {
    admins: HashSet<String>,
}

impl StaticRoleAuthorizer {
    pub fn new(admins: impl IntoIterator<Item = String>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Authorizer for StaticRoleAuthorizer {
    async fn authorize(
        &self,
        actor: &str,
        capability: Capability,
        resources: &[&str],
    ) -> Result<(), Error> {
        if self.admins.contains(actor) {
            return Ok(());
        }
        let allowed = match capability {
            Capability::KeyInsert | Capability::KeyAccess => false,
            Capability::SubscriptionInsert
            | Capability::SubscriptionAccess
            | Capability::SubscriptionRemove => {
                resources.iter().any(|resource| *resource == actor)
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::PermissionDenied { capability })
        }
    }
}

/// Sends built push requests over HTTPS via a pooled reqwest client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(strict_tls: bool, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!strict_tls)
            .build()
            .map_err(|err| TransportError::Other(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PushTransport for ReqwestTransport {
    async fn post(&self, request: &PushRequest) -> Result<u16, TransportError> {
        let mut outbound = self.client.post(&request.endpoint);
        for (name, value) in &request.headers {
            outbound = outbound.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            outbound = outbound.body(body.clone());
        }
        let response = outbound.send().await.map_err(classify_reqwest_error)?;
        Ok(response.status().as_u16())
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
