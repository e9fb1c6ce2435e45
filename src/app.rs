use crate::authz::Actor;
use crate::config::AppConfig;
use crate::error::Error;
use crate::keyring::Keyring;
use crate::ports::{Authorizer, DocumentStore, PushTransport};
use crate::push::Dispatcher;
use crate::state::AppState;
use crate::subscriptions::SubscriptionStore;

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use serde_json::json;

use std::sync::Arc;

mod subscriptions;
mod vapid_keys;

pub fn app(
    config: AppConfig,
    store: Arc<dyn DocumentStore>,
    authz: Arc<dyn Authorizer>,
    transport: Arc<dyn PushTransport>,
) -> Router {
    let keyring = Keyring::new(config.clone(), Arc::clone(&store), Arc::clone(&authz));
    let subscription_store = SubscriptionStore::new(config.clone(), store, authz);
    let dispatcher = Dispatcher::new(
        keyring.clone(),
        subscription_store.clone(),
        transport,
        config.fanout_limit,
    );
    let subscriptions_route = config.routes.subscriptions.clone();
    let vapid_keys_route = config.routes.vapid_keys.clone();
    let state = AppState {
        config,
        keyring,
        subscriptions: subscription_store,
        dispatcher,
    };
    Router::new()
        .route(
            &subscriptions_route,
            get(subscriptions::subscription_list).post(subscriptions::subscription_create),
        )
        .route(
            &format!("{subscriptions_route}/{{name}}"),
            get(subscriptions::subscription_show).delete(subscriptions::subscription_destroy),
        )
        .route(
            &format!("{vapid_keys_route}/{{name}}"),
            get(vapid_keys::vapid_key_show),
        )
        .route("/health", get(health))
        .with_state(state)
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

pub(crate) type ApiError = (StatusCode, Json<serde_json::Value>);

/// The stand-in for the session layer this service sits behind: the caller
/// identity arrives in the `x-actor` header.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    match headers.get("x-actor").and_then(|value| value.to_str().ok()) {
        Some(id) if !id.is_empty() => Ok(Actor::identity(id)),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized"})),
        )),
    }
}

pub(crate) fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::KeyNotFound { .. } | Error::SubscriptionNotFound { .. } => StatusCode::NOT_FOUND,
        Error::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        Error::DuplicateKey { .. } | Error::DuplicateSubscription { .. } => StatusCode::CONFLICT,
        Error::Protocol { .. } | Error::Transport(_) => StatusCode::BAD_GATEWAY,
        Error::Request(_) | Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(error: Error) -> ApiError {
    let status = status_for(&error);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("request failed: {error}");
    }
    (status, Json(json!({"error": error.to_string()})))
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryStore, ReqwestTransport, StaticRoleAuthorizer};
    use crate::keyring::KeyLookup;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use axum::http::header::LOCATION;
    use serde_json::Value as JsonValue;
    use serde_json::from_slice as json_from_slice;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_parts() -> (AppConfig, Arc<MemoryStore>, Arc<StaticRoleAuthorizer>) {
        (
            AppConfig::default(),
            Arc::new(MemoryStore::default()),
            Arc::new(StaticRoleAuthorizer::new(["admin".to_string()])),
        )
    }

    fn test_app(
        config: AppConfig,
        store: Arc<MemoryStore>,
        authz: Arc<StaticRoleAuthorizer>,
    ) -> Router {
        let transport =
            ReqwestTransport::new(true, Duration::from_secs(5)).expect("build transport");
        app(config, store, authz, Arc::new(transport))
    }

    fn subscribe_body(owner: &str, endpoint: &str) -> String {
        json!({
            "owner": owner,
            "vapidKey": "https://push.test/web-push/vapid-keys/alerts",
            "pushToken": {"endpoint": endpoint},
        })
        .to_string()
    }

    async fn send(
        app: Router,
        method: &str,
        uri: &str,
        actor: Option<&str>,
        body: Option<String>,
    ) -> axum::response::Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            request = request.header("x-actor", actor);
        }
        let body = match body {
            Some(body) => {
                request = request.header("content-type", "application/json");
                Body::from(body)
            }
            None => Body::empty(),
        };
        app.oneshot(request.body(body).unwrap())
            .await
            .expect("request failed")
    }

    async fn json_body(response: axum::response::Response) -> JsonValue {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        json_from_slice(&body).expect("parse json")
    }

    #[tokio::test]
    async fn app__should_return_ok_on_health_endpoint() {
        // Given
        let (config, store, authz) = test_parts();
        let app = test_app(config, store, authz);

        // When
        let response = send(app, "GET", "/health", None, None).await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        assert_eq!(body.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn app__should_require_the_actor_header() {
        // Given
        let (config, store, authz) = test_parts();
        let app = test_app(config, store, authz);

        // When
        let response = send(app, "GET", "/web-push/subscriptions", None, None).await;

        // Then
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let payload = json_body(response).await;
        assert_eq!(payload["error"], "unauthorized");
    }

    #[tokio::test]
    async fn subscription_create__should_assign_an_id_and_point_at_it() {
        // Given
        let (config, store, authz) = test_parts();
        let app = test_app(config, store, authz);

        // When
        let response = send(
            app,
            "POST",
            "/web-push/subscriptions",
            Some("alice"),
            Some(subscribe_body("alice", "https://push.example/1")),
        )
        .await;

        // Then
        assert_eq!(response.status(), StatusCode::CREATED);
        let location = response
            .headers()
            .get(LOCATION)
            .expect("location header")
            .to_str()
            .expect("header value")
            .to_string();
        assert!(location.starts_with("https://push.test/web-push/subscriptions/"));
        let payload = json_body(response).await;
        assert_eq!(payload["id"], location);
        assert_eq!(payload["owner"], "alice");
        assert_eq!(payload["pushToken"]["endpoint"], "https://push.example/1");
    }

    #[tokio::test]
    async fn subscription_create__should_reject_malformed_bodies() {
        // Given
        let (config, store, authz) = test_parts();
        let app = test_app(config, store, authz);

        // When
        let response = send(
            app,
            "POST",
            "/web-push/subscriptions",
            Some("alice"),
            Some("{not json".to_string()),
        )
        .await;

        // Then
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn subscription_create__should_conflict_on_duplicate_endpoints() {
        // Given
        let (config, store, authz) = test_parts();
        let app = test_app(config, store, authz);
        let first = send(
            app.clone(),
            "POST",
            "/web-push/subscriptions",
            Some("alice"),
            Some(subscribe_body("alice", "https://push.example/1")),
        )
        .await;
        assert_eq!(first.status(), StatusCode::CREATED);

        // When
        let response = send(
            app,
            "POST",
            "/web-push/subscriptions",
            Some("alice"),
            Some(subscribe_body("alice", "https://push.example/1")),
        )
        .await;

        // Then
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn subscription_show__should_map_authorization_and_absence() {
        // Given
        let (config, store, authz) = test_parts();
        let app = test_app(config, store, authz);
        let created = send(
            app.clone(),
            "POST",
            "/web-push/subscriptions",
            Some("alice"),
            Some(subscribe_body("alice", "https://push.example/1")),
        )
        .await;
        let id = json_body(created).await["id"]
            .as_str()
            .expect("id")
            .to_string();
        let path = id
            .strip_prefix("https://push.test")
            .expect("path")
            .to_string();

        // When / Then: the owner reads it back
        let owned = send(app.clone(), "GET", &path, Some("alice"), None).await;
        assert_eq!(owned.status(), StatusCode::OK);
        assert_eq!(json_body(owned).await["id"], id);

        // Another identity is refused
        let refused = send(app.clone(), "GET", &path, Some("mallory"), None).await;
        assert_eq!(refused.status(), StatusCode::FORBIDDEN);

        // And an unknown name is absent
        let missing = send(
            app,
            "GET",
            "/web-push/subscriptions/does-not-exist",
            Some("alice"),
            None,
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn subscription_list__should_apply_query_filters() {
        // Given
        let (config, store, authz) = test_parts();
        let app = test_app(config, store, authz);
        for (owner, endpoint) in [
            ("alice", "https://push.example/1"),
            ("alice", "https://push.example/2"),
            ("bob", "https://push.example/3"),
        ] {
            let created = send(
                app.clone(),
                "POST",
                "/web-push/subscriptions",
                Some(owner),
                Some(subscribe_body(owner, endpoint)),
            )
            .await;
            assert_eq!(created.status(), StatusCode::CREATED);
        }

        // When: the admin filters by owner and by endpoint
        let by_owner = send(
            app.clone(),
            "GET",
            "/web-push/subscriptions?owner=alice",
            Some("admin"),
            None,
        )
        .await;
        let by_endpoint = send(
            app,
            "GET",
            "/web-push/subscriptions?endpoint=https%3A%2F%2Fpush.example%2F3",
            Some("admin"),
            None,
        )
        .await;

        // Then
        let listed = json_body(by_owner).await;
        assert_eq!(listed.as_array().expect("array").len(), 2);
        let listed = json_body(by_endpoint).await;
        let listed = listed.as_array().expect("array");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["owner"], "bob");
    }

    #[tokio::test]
    async fn subscription_destroy__should_remove_and_then_miss() {
        // Given
        let (config, store, authz) = test_parts();
        let app = test_app(config, store, authz);
        let created = send(
            app.clone(),
            "POST",
            "/web-push/subscriptions",
            Some("alice"),
            Some(subscribe_body("alice", "https://push.example/1")),
        )
        .await;
        let id = json_body(created).await["id"]
            .as_str()
            .expect("id")
            .to_string();
        let path = id
            .strip_prefix("https://push.test")
            .expect("path")
            .to_string();

        // When
        let removed = send(app.clone(), "DELETE", &path, Some("alice"), None).await;

        // Then
        assert_eq!(removed.status(), StatusCode::NO_CONTENT);
        let gone = send(app.clone(), "GET", &path, Some("alice"), None).await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
        let again = send(app, "DELETE", &path, Some("alice"), None).await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn vapid_key_show__should_serve_the_public_half_only() {
        // Given: a key added through the keyring backing the app
        let (config, store, authz) = test_parts();
        let keyring = Keyring::new(
            config.clone(),
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            Arc::clone(&authz) as Arc<dyn Authorizer>,
        );
        let key = keyring.generate("alerts");
        keyring
            .add(&Actor::identity("admin"), &key, "a@b.com")
            .await
            .expect("add key");
        let app = test_app(config, store, authz);

        // When
        let response = send(
            app.clone(),
            "GET",
            "/web-push/vapid-keys/alerts",
            Some("alice"),
            None,
        )
        .await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["id"], key.id);
        assert_eq!(payload["publicKeyBase64Url"], key.public_key);
        assert!(payload.get("privateKeyBase64Url").is_none());

        // And the private half stays reachable through the library
        let stored = keyring
            .get(
                &Actor::identity("admin"),
                &key.id,
                KeyLookup {
                    include_private: true,
                },
            )
            .await
            .expect("private get");
        assert_eq!(stored.key.private_key, key.private_key);
    }

    #[tokio::test]
    async fn vapid_key_show__should_miss_unknown_keys() {
        // Given
        let (config, store, authz) = test_parts();
        let app = test_app(config, store, authz);

        // When
        let response = send(
            app,
            "GET",
            "/web-push/vapid-keys/missing",
            Some("alice"),
            None,
        )
        .await;

        // Then
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
