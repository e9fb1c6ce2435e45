use pushbox::adapters::{MemoryStore, ReqwestTransport, StaticRoleAuthorizer};

use std::sync::Arc;

mod cli;

#[tokio::main]
async fn main() {
    env_logger::init();

    let serve = match cli::run() {
        cli::RunOutcome::Serve(serve) => serve,
        cli::RunOutcome::Exit(code) => std::process::exit(code),
    };

    let store = Arc::new(MemoryStore::default());
    let authz = Arc::new(StaticRoleAuthorizer::new(serve.admins));
    let transport =
        match ReqwestTransport::new(serve.app.strict_tls, serve.app.request_timeout) {
            Ok(transport) => transport,
            Err(err) => {
                eprintln!("failed to build push transport: {err}");
                std::process::exit(1);
            }
        };

    println!("listening on http://{}", serve.listen);

    pushbox::serve(
        serve.listen,
        serve.app,
        store,
        authz,
        Arc::new(transport),
    )
    .await;
}
