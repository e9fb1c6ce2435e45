use crate::authz::Actor;
use crate::error::Error;
use crate::keyring::{KeyLookup, Keyring};
use crate::ports::PushTransport;
use crate::subscriptions::{SubscriptionFilter, SubscriptionStore};

use super::request::{MessageOptions, Payload, build_push_request};

use futures_util::StreamExt;
use futures_util::stream;

use std::collections::HashMap;
use std::sync::Arc;

/// Options for one [`Dispatcher::send_all`] fan-out.
#[derive(Clone, Debug, Default)]
pub struct BroadcastOptions {
    pub ttl: Option<u32>,
    pub payload: Option<Payload>,
    /// Prune subscriptions the push service reports as gone or no longer
    /// authorized (status 400, 401, 404 or 410).
    pub remove_bad_subscriptions: bool,
}

#[derive(Debug)]
pub enum Delivery {
    Success,
    Failed(Error),
}

impl Delivery {
    pub fn is_success(&self) -> bool {
        matches!(self, Delivery::Success)
    }
}

/// Per-call aggregate of delivery outcomes, one entry per subscription the
/// fan-out covered. Not persisted.
#[derive(Debug, Default)]
pub struct DeliveryManifest {
    entries: HashMap<String, Delivery>,
}

impl DeliveryManifest {
    pub fn outcome(&self, subscription_id: &str) -> Option<&Delivery> {
        self.entries.get(subscription_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Delivery)> {
        self.entries
            .iter()
            .map(|(id, outcome)| (id.as_str(), outcome))
    }
}

/// Push-service statuses that mean the subscription is permanently dead:
/// the endpoint is gone or the client's authorization has lapsed.
fn is_terminal_failure(error: &Error) -> bool {
    matches!(
        error,
        Error::Protocol {
            status: 400 | 401 | 404 | 410,
            ..
        }
    )
}

#[derive(Clone)]
pub struct Dispatcher {
    keyring: Keyring,
    subscriptions: SubscriptionStore,
    transport: Arc<dyn PushTransport>,
    fanout_limit: usize,
}

impl Dispatcher {
    pub fn new(
        keyring: Keyring,
        subscriptions: SubscriptionStore,
        transport: Arc<dyn PushTransport>,
        fanout_limit: usize,
    ) -> Self {
        Self {
            keyring,
            subscriptions,
            transport,
            fanout_limit: fanout_limit.max(1),
        }
    }

    /// Delivers one message to one subscription.
    ///
    /// Trusted-caller-only: record fetches run as the system actor, so this
    /// must be reached from an already-authorized code path and never
    /// directly from an untrusted boundary. A 201 from the push service is
    /// the only success; other statuses classify as [`Error::Protocol`] and
    /// network failures (including timeouts) as [`Error::Transport`].
    pub async fn send_one(
        &self,
        actor: &Actor,
        subscription_id: &str,
        options: &MessageOptions,
    ) -> Result<(), Error> {
        let stored = self.subscriptions.get(&Actor::System, subscription_id).await?;
        let key = self
            .keyring
            .get(
                &Actor::System,
                &stored.subscription.vapid_key,
                KeyLookup {
                    include_private: true,
                },
            )
            .await?;
        let contact = key.meta.contact.clone().ok_or_else(|| {
            Error::Request(format!("VAPID key {} has no contact email", key.key.id))
        })?;

        log::debug!(
            "delivering push message to {subscription_id} on behalf of {actor} (key {})",
            key.key.id
        );
        let request = build_push_request(&stored.subscription, &key.key, &contact, options)?;
        let status = self
            .transport
            .post(&request)
            .await
            .map_err(Error::Transport)?;
        if status != 201 {
            return Err(Error::Protocol {
                subscription: subscription_id.to_string(),
                status,
            });
        }
        Ok(())
    }

    /// Delivers one message to every subscription `owner` holds for
    /// `vapid_key_id`, with a bounded concurrent fan-out.
    ///
    /// Trusted-caller-only, like [`Dispatcher::send_one`]. Per-target
    /// failures are captured in the manifest, never propagated; the call
    /// itself only fails when the listing step does. The returned manifest
    /// covers every listed subscription exactly once.
    pub async fn send_all(
        &self,
        actor: &Actor,
        owner: &str,
        vapid_key_id: &str,
        options: &BroadcastOptions,
    ) -> Result<DeliveryManifest, Error> {
        let filter = SubscriptionFilter {
            owner: Some(owner.to_string()),
            vapid_key: Some(vapid_key_id.to_string()),
            ..SubscriptionFilter::default()
        };
        let subscriptions = self.subscriptions.list(&Actor::System, &filter).await?;
        log::debug!(
            "fanning out push message to {} subscription(s) of {owner} for {vapid_key_id}",
            subscriptions.len()
        );

        let message = MessageOptions {
            ttl: options.ttl,
            payload: options.payload.clone(),
        };
        let entries = stream::iter(subscriptions.into_iter().map(|subscription| {
            self.deliver(
                actor,
                subscription.id,
                &message,
                options.remove_bad_subscriptions,
            )
        }))
        .buffer_unordered(self.fanout_limit)
        .collect::<Vec<_>>()
        .await;

        Ok(DeliveryManifest {
            entries: entries.into_iter().collect(),
        })
    }

    async fn deliver(
        &self,
        actor: &Actor,
        subscription_id: String,
        options: &MessageOptions,
        remove_bad: bool,
    ) -> (String, Delivery) {
        let outcome = match self.send_one(actor, &subscription_id, options).await {
            Ok(()) => Delivery::Success,
            Err(error) => {
                if remove_bad && is_terminal_failure(&error) {
                    self.remove_best_effort(&subscription_id).await;
                }
                Delivery::Failed(error)
            }
        };
        (subscription_id, outcome)
    }

    /// Best-effort cleanup of a dead subscription, run as the system actor
    /// since the cleanup is internal. A removal failure is logged and
    /// swallowed so it can never mask the delivery error already destined
    /// for the manifest.
    async fn remove_best_effort(&self, subscription_id: &str) {
        if let Err(error) = self
            .subscriptions
            .remove(&Actor::System, subscription_id)
            .await
        {
            log::warn!("failed to remove bad subscription {subscription_id}: {error}");
        }
    }
}
