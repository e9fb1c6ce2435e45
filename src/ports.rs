pub mod authz;
pub mod store;
pub mod transport;

pub use authz::Authorizer;
pub use store::DocumentStore;
pub use transport::PushTransport;
