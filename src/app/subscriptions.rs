use crate::state::AppState;
use crate::subscriptions::{PushToken, Subscription, SubscriptionFilter};

use axum::Json;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderMap, StatusCode, header::LOCATION};
use serde::Deserialize;

use super::{ApiError, actor_from_headers, error_response};

/// Subscription document as a client registers it: the id is always
/// server-assigned, everything else is caller-supplied.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateSubscriptionRequest {
    pub(crate) owner: String,
    #[serde(rename = "vapidKey")]
    pub(crate) vapid_key: String,
    #[serde(rename = "pushToken")]
    pub(crate) push_token: PushToken,
    pub(crate) label: Option<String>,
    pub(crate) device: Option<String>,
}

pub(crate) async fn subscription_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, [(axum::http::HeaderName, String); 1], Json<Subscription>), ApiError> {
    let actor = actor_from_headers(&headers)?;
    let subscription = Subscription {
        id: state.subscriptions.create_id(None),
        owner: request.owner,
        vapid_key: request.vapid_key,
        push_token: request.push_token,
        label: request.label,
        device: request.device,
    };
    let stored = state
        .subscriptions
        .add(&actor, &subscription)
        .await
        .map_err(error_response)?;
    Ok((
        StatusCode::CREATED,
        [(LOCATION, stored.subscription.id.clone())],
        Json(stored.subscription),
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    pub(crate) owner: Option<String>,
    pub(crate) endpoint: Option<String>,
}

pub(crate) async fn subscription_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let filter = SubscriptionFilter {
        owner: query.owner,
        endpoint: query.endpoint,
        ..SubscriptionFilter::default()
    };
    let listed = state
        .subscriptions
        .list(&actor, &filter)
        .await
        .map_err(error_response)?;
    Ok(Json(listed))
}

pub(crate) async fn subscription_show(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(name): AxumPath<String>,
) -> Result<Json<Subscription>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let id = state.subscriptions.create_id(Some(&name));
    let stored = state
        .subscriptions
        .get(&actor, &id)
        .await
        .map_err(error_response)?;
    Ok(Json(stored.subscription))
}

pub(crate) async fn subscription_destroy(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(name): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let id = state.subscriptions.create_id(Some(&name));
    state
        .subscriptions
        .remove(&actor, &id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}
