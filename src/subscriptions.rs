use crate::authz::{self, Actor, Capability};
use crate::config::AppConfig;
use crate::error::{Error, StoreError};
use crate::ports::{Authorizer, DocumentStore};
use crate::store::{self, Collection, RecordFilter, RecordMeta, RecordStatus};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::sync::Arc;

/// Encryption key material issued by the push service alongside an endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// The endpoint-plus-keys structure representing one delivery target.
///
/// A token without `keys` can still receive messages, but only empty-payload
/// ones: the target has no way to decrypt a body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushToken {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<PushKeys>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub owner: String,
    /// Weak reference to the VAPID key messages to this target are signed
    /// with; resolved through the keyring at delivery time.
    #[serde(rename = "vapidKey")]
    pub vapid_key: String,
    #[serde(rename = "pushToken")]
    pub push_token: PushToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredSubscription {
    pub subscription: Subscription,
    pub meta: RecordMeta,
}

/// Filter for [`SubscriptionStore::list`]. All set fields must match.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    pub owner: Option<String>,
    pub endpoint: Option<String>,
    pub vapid_key: Option<String>,
}

#[derive(Clone)]
pub struct SubscriptionStore {
    config: AppConfig,
    store: Arc<dyn DocumentStore>,
    authz: Arc<dyn Authorizer>,
}

impl SubscriptionStore {
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

    /// Canonical absolute identifier for a subscription name; a fresh v4
    /// UUID when the caller does not supply one.
    pub fn create_id(&self, name: Option<&str>) -> String {
        let name = match name {
            Some(name) => name.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        format!(
            "{}{}/{name}",
            self.config.base_uri, self.config.routes.subscriptions
        )
    }

    /// Persists a subscription with `status=active`.
    ///
    /// Endpoint uniqueness (one endpoint, one subscription) is decided by
    /// the store's atomic unique-index insert, so concurrent adds for the
    /// same endpoint have exactly one winner.
    pub async fn add(
        &self,
        actor: &Actor,
        subscription: &Subscription,
    ) -> Result<StoredSubscription, Error> {
        authz::check(
            self.authz.as_ref(),
            actor,
            Capability::SubscriptionInsert,
            &[&subscription.id, &subscription.owner],
        )
        .await?;

        log::debug!(
            "adding subscription {} for {} (endpoint {})",
            subscription.id,
            subscription.owner,
            subscription.push_token.endpoint
        );

        let meta = RecordMeta::active_now();
        let record = store::StoredRecord {
            id: store::hash_field(&subscription.id),
            owner: Some(store::hash_field(&subscription.owner)),
            endpoint: Some(store::hash_field(&subscription.push_token.endpoint)),
            meta: meta.clone(),
            body: store::encode_body(subscription).map_err(Error::Store)?,
        };
        match self.store.insert(Collection::Subscriptions, record).await {
            Ok(()) => Ok(StoredSubscription {
                subscription: subscription.clone(),
                meta,
            }),
            Err(StoreError::Duplicate(_)) => Err(Error::DuplicateSubscription {
                endpoint: subscription.push_token.endpoint.clone(),
            }),
            Err(err) => Err(Error::Store(err)),
        }
    }

    /// Fetches an active subscription by id, then gates it behind the
    /// access capability scoped to `{id, owner}`.
    pub async fn get(&self, actor: &Actor, id: &str) -> Result<StoredSubscription, Error> {
        let record = self
            .store
            .find_one(Collection::Subscriptions, &RecordFilter::active_id(id))
            .await
            .map_err(Error::Store)?
            .ok_or_else(|| Error::SubscriptionNotFound { id: id.to_string() })?;
        let subscription: Subscription = store::decode_body(&record.body).map_err(Error::Store)?;

        authz::check(
            self.authz.as_ref(),
            actor,
            Capability::SubscriptionAccess,
            &[&subscription.id, &subscription.owner],
        )
        .await?;

        Ok(StoredSubscription {
            subscription,
            meta: record.meta,
        })
    }

    /// Lists active subscriptions matching the filter.
    ///
    /// Each candidate is authorized independently and refused records are
    /// dropped silently: one forbidden record never fails the whole call.
    /// Records are always fetched whole so id and owner are available for
    /// the check; callers project afterwards.
    pub async fn list(
        &self,
        actor: &Actor,
        filter: &SubscriptionFilter,
    ) -> Result<Vec<Subscription>, Error> {
        let record_filter = RecordFilter {
            owner: filter.owner.as_deref().map(store::hash_field),
            endpoint: filter.endpoint.as_deref().map(store::hash_field),
            status: Some(RecordStatus::Active),
            ..RecordFilter::default()
        };
        let records = self
            .store
            .find(Collection::Subscriptions, &record_filter)
            .await
            .map_err(Error::Store)?;

        let mut authorized = Vec::with_capacity(records.len());
        for record in records {
            let subscription: Subscription =
                store::decode_body(&record.body).map_err(Error::Store)?;
            // The vapid-key reference lives inside the encoded body, so this
            // predicate applies after decoding rather than at the index.
            if let Some(vapid_key) = &filter.vapid_key
                && subscription.vapid_key != *vapid_key
            {
                continue;
            }
            let allowed = authz::check(
                self.authz.as_ref(),
                actor,
                Capability::SubscriptionAccess,
                &[&subscription.id, &subscription.owner],
            )
            .await
            .is_ok();
            if allowed {
                authorized.push(subscription);
            }
        }
        Ok(authorized)
    }

    /// Soft-deletes a subscription.
    ///
    /// The prerequisite fetch applies the access capability; removal itself
    /// additionally requires the remove capability scoped to `{id, owner}`.
    /// Removing an already-removed or unknown id surfaces the fetch's
    /// `NotFound`. The push-service side of the subscription is untouched;
    /// clients unsubscribe from their push service on their own.
    pub async fn remove(&self, actor: &Actor, id: &str) -> Result<(), Error> {
        let stored = self.get(actor, id).await?;
        authz::check(
            self.authz.as_ref(),
            actor,
            Capability::SubscriptionRemove,
            &[&stored.subscription.id, &stored.subscription.owner],
        )
        .await?;

        let updated = self
            .store
            .update_status(
                Collection::Subscriptions,
                &store::hash_field(id),
                RecordStatus::Removed,
            )
            .await
            .map_err(Error::Store)?;
        if !updated {
            return Err(Error::SubscriptionNotFound { id: id.to_string() });
        }
        log::info!("removed subscription {id}");
        Ok(())
    }
}
