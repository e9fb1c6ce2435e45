use crate::config::AppConfig;
use crate::keyring::Keyring;
use crate::push::Dispatcher;
use crate::subscriptions::SubscriptionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub keyring: Keyring,
    pub subscriptions: SubscriptionStore,
    pub dispatcher: Dispatcher,
}
