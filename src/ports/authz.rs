use crate::authz::Capability;
use crate::error::Error;

use async_trait::async_trait;

/// Capability gate consumed from the surrounding deployment.
///
/// `resources` carries the references the capability is scoped to, for
/// example `[subscription_id, owner]`. Implementations answer yes or no;
/// refusals surface as [`Error::PermissionDenied`].
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(
        &self,
        actor: &str,
        capability: Capability,
        resources: &[&str],
    ) -> Result<(), Error>;
}
