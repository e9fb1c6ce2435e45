use crate::keyring::{KeyLookup, VapidKey};
use crate::state::AppState;

use axum::Json;
use axum::extract::{Path as AxumPath, State};
use axum::http::HeaderMap;

use super::{ApiError, actor_from_headers, error_response};

/// Serves the public half of a VAPID key. `KeyLookup::default()` never
/// returns the private part, so nothing secret can leak through this route.
pub(crate) async fn vapid_key_show(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(name): AxumPath<String>,
) -> Result<Json<VapidKey>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let id = state.keyring.create_id(&name);
    let stored = state
        .keyring
        .get(&actor, &id, KeyLookup::default())
        .await
        .map_err(error_response)?;
    Ok(Json(stored.key))
}
