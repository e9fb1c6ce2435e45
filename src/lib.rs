pub mod adapters;
pub mod app;
pub mod authz;
pub mod config;
pub mod error;
pub mod keyring;
pub mod ports;
pub mod push;
pub mod state;
pub mod store;
pub mod subscriptions;

pub use app::app;
pub use error::Error;
pub use keyring::{VapidCredentials, generate_credentials};

use crate::ports::{Authorizer, DocumentStore, PushTransport};

use std::net::SocketAddr;
use std::sync::Arc;

pub async fn serve(
    addr: SocketAddr,
    config: config::AppConfig,
    store: Arc<dyn DocumentStore>,
    authz: Arc<dyn Authorizer>,
    transport: Arc<dyn PushTransport>,
) {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app(config, store, authz, transport))
        .await
        .expect("server error");
}
