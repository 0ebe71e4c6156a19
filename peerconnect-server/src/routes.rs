use axum::routing::{get, post};
use axum::{Extension, Router};

use crate::State;

pub fn router(state: State) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/private/get/connections", get(private::get_connections))
        .route("/private/get/sent-requests", get(private::get_sent_requests))
        .route("/private/get/received-requests", get(private::get_received_requests))
        .route("/private/get/status/:current/:target", get(private::get_status))
        .route("/private/get/relation/:current/:target", get(private::get_relation))
        .route("/private/get/user-connections/:user", get(private::get_user_connections))
        .route("/private/get/loading", get(private::get_loading))
        .route("/private/post/send-connection-request", post(private::post_send_connection_request))
        .route("/private/post/accept-connection-request", post(private::post_accept_connection_request))
        .route("/private/post/decline-connection-request", post(private::post_decline_connection_request))
        .route("/private/post/cancel-sent-request", post(private::post_cancel_sent_request))
        .route("/private/post/remove-connection", post(private::post_remove_connection))
        .route("/private/get/profile", get(private::get_profile))
        .route("/private/post/profile", post(private::post_profile))
        .route("/private/post/update-profile", post(private::post_update_profile))
        .route("/private/get/onboarding", get(private::get_onboarding))
        .route("/private/post/complete-onboarding", post(private::post_complete_onboarding))
        .route("/private/get/ui-preferences", get(private::get_ui_preferences))
        .route("/private/post/ui-preferences", post(private::post_ui_preferences))
        .route("/private/get/search-filters", get(private::get_search_filters))
        .route("/private/post/search-filters", post(private::post_search_filters))
        .route("/private/get/recent-searches", get(private::get_recent_searches))
        .route("/private/post/recent-search", post(private::post_recent_search))
        .route("/private/post/clear-recent-searches", post(private::post_clear_recent_searches))
        .route("/private/post/browse", post(private::post_browse))
        .route("/private/get/suggestions", get(private::get_suggestions))
        .route("/private/get/connected-peers", get(private::get_connected_peers))
        .route("/private/get/storage", get(private::get_storage))
        .route("/private/get/export", get(private::get_export))
        .route("/private/post/import", post(private::post_import))
        .route("/private/post/clear-all", post(private::post_clear_all))
        .route("/public/post/receive-connection-request", post(public::post_receive_connection_request))
        .route("/public/post/accept-connection-request", post(public::post_accept_connection_request))
        .route("/public/post/decline-connection-request", post(public::post_decline_connection_request))
        .layer(Extension(state))
}

async fn root() -> &'static str {
    "PeerConnect"
}

/// Routes used by the current user's own client.
mod private {
    use axum::extract::{Path, Query};
    use axum::response::IntoResponse;
    use axum::{Extension, Json};
    use peerconnect_common::non_api_structs::LocalData;
    use peerconnect_common::{
        BrowseQuery, ConnectionId, ProfilePatch, RequestId, SearchFilters, SendConnectionRequest,
        StorageInfo, UiPreferencesPatch, UserId, UserProfile,
    };
    use serde::Deserialize;
    use tracing::info;

    use crate::browse::{self, MIN_QUERY_LENGTH};
    use crate::error::{ApiError, Result};
    use crate::State;

    pub const SUGGESTION_LIMIT: usize = 3;

    #[derive(Deserialize)]
    pub struct NameFilter {
        name: Option<String>,
    }

    pub async fn get_connections(Extension(state): Extension<State>) -> impl IntoResponse {
        Json(state.store.connections())
    }
    pub async fn get_sent_requests(Extension(state): Extension<State>) -> impl IntoResponse {
        Json(state.store.sent_requests())
    }
    pub async fn get_received_requests(Extension(state): Extension<State>) -> impl IntoResponse {
        Json(state.store.received_requests())
    }
    pub async fn get_status(
        Extension(state): Extension<State>,
        Path((current, target)): Path<(String, String)>,
    ) -> impl IntoResponse {
        Json(state.store.get_connection_status(&UserId(target), &UserId(current)))
    }
    pub async fn get_relation(
        Extension(state): Extension<State>,
        Path((current, target)): Path<(String, String)>,
    ) -> impl IntoResponse {
        Json(state.store.relation(&UserId(target), &UserId(current)))
    }
    pub async fn get_user_connections(
        Extension(state): Extension<State>,
        Path(user): Path<String>,
    ) -> impl IntoResponse {
        Json(state.store.connections_for_user(&UserId(user)))
    }
    pub async fn get_loading(Extension(state): Extension<State>) -> impl IntoResponse {
        Json(state.store.is_loading())
    }

    pub async fn post_send_connection_request(
        Extension(state): Extension<State>,
        Json(payload): Json<SendConnectionRequest>,
    ) -> Result<impl IntoResponse> {
        let outcome = state
            .store
            .send_connection_request(&payload.target_id, &payload.current_id, payload.message)
            .await?;
        Ok(Json(outcome))
    }
    pub async fn post_accept_connection_request(
        Extension(state): Extension<State>,
        Json(request_id): Json<RequestId>,
    ) -> Result<impl IntoResponse> {
        Ok(Json(state.store.accept_connection_request(&request_id).await?))
    }
    pub async fn post_decline_connection_request(
        Extension(state): Extension<State>,
        Json(request_id): Json<RequestId>,
    ) -> Result<impl IntoResponse> {
        state.store.decline_connection_request(&request_id).await?;
        Ok(())
    }
    pub async fn post_cancel_sent_request(
        Extension(state): Extension<State>,
        Json(request_id): Json<RequestId>,
    ) -> Result<impl IntoResponse> {
        state.store.cancel_sent_request(&request_id).await?;
        Ok(())
    }
    pub async fn post_remove_connection(
        Extension(state): Extension<State>,
        Json(connection_id): Json<ConnectionId>,
    ) -> Result<impl IntoResponse> {
        state.store.remove_connection(&connection_id).await?;
        Ok(())
    }

    pub async fn get_profile(Extension(state): Extension<State>) -> impl IntoResponse {
        Json(state.storage().user_profile())
    }
    pub async fn post_profile(
        Extension(state): Extension<State>,
        Json(profile): Json<UserProfile>,
    ) -> Result<impl IntoResponse> {
        if !state.storage().set_user_profile(&profile) {
            return Err(ApiError::Write("user profile").into());
        }
        Ok(())
    }
    pub async fn post_update_profile(
        Extension(state): Extension<State>,
        Json(patch): Json<ProfilePatch>,
    ) -> Result<impl IntoResponse> {
        let storage = state.storage();
        if storage.user_profile().is_none() {
            return Err(ApiError::NoProfile.into());
        }
        let profile = storage
            .update_user_profile(patch)
            .ok_or(ApiError::Write("user profile"))?;
        Ok(Json(profile))
    }
    pub async fn get_onboarding(Extension(state): Extension<State>) -> impl IntoResponse {
        Json(state.storage().onboarding_complete())
    }
    pub async fn post_complete_onboarding(
        Extension(state): Extension<State>,
        Json(profile): Json<UserProfile>,
    ) -> Result<impl IntoResponse> {
        let storage = state.storage();
        if !storage.set_user_profile(&profile) {
            return Err(ApiError::Write("user profile").into());
        }
        if !storage.set_onboarding_complete(true) {
            return Err(ApiError::Write("onboarding flag").into());
        }
        info!(user = %profile.id, "onboarding complete");
        Ok(())
    }

    pub async fn get_ui_preferences(Extension(state): Extension<State>) -> impl IntoResponse {
        Json(state.storage().ui_preferences())
    }
    pub async fn post_ui_preferences(
        Extension(state): Extension<State>,
        Json(patch): Json<UiPreferencesPatch>,
    ) -> Result<impl IntoResponse> {
        let preferences = state
            .storage()
            .update_ui_preferences(patch)
            .ok_or(ApiError::Write("ui preferences"))?;
        Ok(Json(preferences))
    }
    pub async fn get_search_filters(Extension(state): Extension<State>) -> impl IntoResponse {
        Json(state.storage().search_filters())
    }
    pub async fn post_search_filters(
        Extension(state): Extension<State>,
        Json(filters): Json<SearchFilters>,
    ) -> Result<impl IntoResponse> {
        if !state.storage().set_search_filters(&filters) {
            return Err(ApiError::Write("search filters").into());
        }
        Ok(())
    }
    pub async fn get_recent_searches(Extension(state): Extension<State>) -> impl IntoResponse {
        Json(state.storage().recent_searches())
    }
    pub async fn post_recent_search(
        Extension(state): Extension<State>,
        Json(query): Json<String>,
    ) -> impl IntoResponse {
        Json(state.storage().add_recent_search(&query))
    }
    pub async fn post_clear_recent_searches(Extension(state): Extension<State>) -> impl IntoResponse {
        Json(state.storage().clear_recent_searches())
    }

    pub async fn post_browse(Extension(state): Extension<State>, Json(query): Json<BrowseQuery>) -> impl IntoResponse {
        let current = state.current_user();
        if let Some(term) = query.query.as_deref().map(str::trim) {
            if term.chars().count() >= MIN_QUERY_LENGTH {
                state.storage().add_recent_search(term);
            }
        }
        Json(browse::browse(&state.catalog, current.as_ref(), &query))
    }
    pub async fn get_suggestions(Extension(state): Extension<State>) -> Result<impl IntoResponse> {
        let current = state.current_user().ok_or(ApiError::NoProfile)?;
        Ok(Json(browse::suggested_peers(
            &state.catalog,
            &current,
            &state.store.snapshot(),
            SUGGESTION_LIMIT,
        )))
    }
    pub async fn get_connected_peers(
        Extension(state): Extension<State>,
        Query(filter): Query<NameFilter>,
    ) -> Result<impl IntoResponse> {
        let current = state.current_user().ok_or(ApiError::NoProfile)?;
        Ok(Json(browse::connected_peers(
            &state.catalog,
            &current.id,
            &state.store.connections_for_user(&current.id),
            filter.name.as_deref(),
        )))
    }

    pub async fn get_storage(Extension(state): Extension<State>) -> impl IntoResponse {
        let storage = state.storage();
        Json(StorageInfo {
            size: storage.storage_size(),
            available: storage.is_available(),
        })
    }
    pub async fn get_export(Extension(state): Extension<State>) -> impl IntoResponse {
        Json(state.storage().export_data())
    }
    pub async fn post_import(
        Extension(state): Extension<State>,
        Json(data): Json<LocalData>,
    ) -> Result<impl IntoResponse> {
        let imported = state.storage().import_data(&data);
        state.store.reload();
        if !imported {
            return Err(ApiError::Write("imported data").into());
        }
        Ok(())
    }
    pub async fn post_clear_all(Extension(state): Extension<State>) -> impl IntoResponse {
        let cleared = state.storage().clear_all();
        state.store.reset();
        info!(cleared, "logged out");
        Json(cleared)
    }
}

/// Routes another user's client calls to deliver something to this one.
mod public {
    use axum::response::IntoResponse;
    use axum::{Extension, Json};
    use peerconnect_common::{ConnectionRequest, RequestId};

    use crate::error::{ApiError, Result};
    use crate::State;

    pub async fn post_receive_connection_request(
        Extension(state): Extension<State>,
        Json(request): Json<ConnectionRequest>,
    ) -> Result<impl IntoResponse> {
        let current = state.current_user().ok_or(ApiError::NoProfile)?;
        Ok(Json(state.store.receive_connection_request(request, &current.id).await?))
    }
    pub async fn post_accept_connection_request(
        Extension(state): Extension<State>,
        Json(request_id): Json<RequestId>,
    ) -> Result<impl IntoResponse> {
        Ok(Json(state.store.confirm_sent_request(&request_id).await?))
    }
    pub async fn post_decline_connection_request(
        Extension(state): Extension<State>,
        Json(request_id): Json<RequestId>,
    ) -> Result<impl IntoResponse> {
        state.store.sent_request_declined(&request_id).await?;
        Ok(())
    }
}
