use crate::error::Error;
use crate::ports::Authorizer;

/// The principal an operation runs on behalf of.
///
/// `System` marks internal, already-authorized code paths (for example the
/// dispatcher fetching records it needs to deliver a message) and skips the
/// capability check entirely; it must never be derived from an untrusted
/// boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Actor {
    System,
    Identity(String),
}

impl Actor {
    pub fn identity(id: impl Into<String>) -> Self {
        Actor::Identity(id.into())
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::Identity(id) => f.write_str(id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    KeyInsert,
    KeyAccess,
    SubscriptionInsert,
    SubscriptionAccess,
    SubscriptionRemove,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Capability::KeyInsert => "vapid-key.insert",
            Capability::KeyAccess => "vapid-key.access",
            Capability::SubscriptionInsert => "subscription.insert",
            Capability::SubscriptionAccess => "subscription.access",
            Capability::SubscriptionRemove => "subscription.remove",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs the capability check for `actor` against the resources the operation
/// touches. System actors pass unconditionally; identities are delegated to
/// the configured [`Authorizer`].
pub async fn check(
    authz: &dyn Authorizer,
    actor: &Actor,
    capability: Capability,
    resources: &[&str],
) -> Result<(), Error> {
    match actor {
        Actor::System => Ok(()),
        Actor::Identity(id) => authz.authorize(id, capability, resources).await,
    }
}
