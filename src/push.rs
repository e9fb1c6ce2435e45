mod dispatcher;
mod request;

pub use dispatcher::{BroadcastOptions, Delivery, DeliveryManifest, Dispatcher};
pub use request::{MessageOptions, Payload, PushRequest, build_push_request};

/// Default message time-to-live: one week, in seconds.
pub const DEFAULT_PUSH_MESSAGE_TTL: u32 = 604_800;
