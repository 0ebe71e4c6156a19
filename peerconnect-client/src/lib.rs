pub mod client {
    use anyhow::{bail, Result};
    use peerconnect_common::non_api_structs::LocalData;
    use peerconnect_common::{
        BrowseQuery, Connection, ConnectionId, ConnectionRequest, ConnectionStatus, ProfilePatch, Relation,
        RequestId, SearchFilters, SendConnectionRequest, SendOutcome, StorageInfo, UiPreferences,
        UiPreferencesPatch, Url, UserId, UserProfile,
    };
    use reqwest::{Client, RequestBuilder};
    use serde::de::DeserializeOwned;
    use serde::Serialize;

    async fn send(request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("{}: {}", status, response.text().await.unwrap_or_default());
        }
        Ok(response)
    }
    async fn get<T: DeserializeOwned>(client: &Client, server: &Url, path: &str) -> Result<T> {
        Ok(send(client.get(server.join(path))).await?.json::<T>().await?)
    }
    async fn post<B: Serialize + ?Sized>(client: &Client, server: &Url, path: &str, body: &B) -> Result<()> {
        send(client.post(server.join(path)).json(body)).await?;
        Ok(())
    }
    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        client: &Client,
        server: &Url,
        path: &str,
        body: &B,
    ) -> Result<T> {
        Ok(send(client.post(server.join(path)).json(body)).await?.json::<T>().await?)
    }

    pub async fn get_connections(client: &Client, server: &Url) -> Result<Vec<Connection>> {
        get(client, server, "/private/get/connections").await
    }
    pub async fn get_sent_requests(client: &Client, server: &Url) -> Result<Vec<ConnectionRequest>> {
        get(client, server, "/private/get/sent-requests").await
    }
    pub async fn get_received_requests(client: &Client, server: &Url) -> Result<Vec<ConnectionRequest>> {
        get(client, server, "/private/get/received-requests").await
    }
    pub async fn get_connection_status(
        client: &Client,
        server: &Url,
        current: &UserId,
        target: &UserId,
    ) -> Result<ConnectionStatus> {
        get(client, server, &format!("/private/get/status/{current}/{target}")).await
    }
    pub async fn get_relation(client: &Client, server: &Url, current: &UserId, target: &UserId) -> Result<Relation> {
        get(client, server, &format!("/private/get/relation/{current}/{target}")).await
    }
    pub async fn get_user_connections(client: &Client, server: &Url, user: &UserId) -> Result<Vec<Connection>> {
        get(client, server, &format!("/private/get/user-connections/{user}")).await
    }
    pub async fn is_loading(client: &Client, server: &Url) -> Result<bool> {
        get(client, server, "/private/get/loading").await
    }

    pub async fn send_connection_request(
        client: &Client,
        server: &Url,
        request: &SendConnectionRequest,
    ) -> Result<SendOutcome> {
        post_json(client, server, "/private/post/send-connection-request", request).await
    }
    pub async fn accept_connection_request(client: &Client, server: &Url, request_id: &RequestId) -> Result<Connection> {
        post_json(client, server, "/private/post/accept-connection-request", request_id).await
    }
    pub async fn decline_connection_request(client: &Client, server: &Url, request_id: &RequestId) -> Result<()> {
        post(client, server, "/private/post/decline-connection-request", request_id).await
    }
    pub async fn cancel_sent_request(client: &Client, server: &Url, request_id: &RequestId) -> Result<()> {
        post(client, server, "/private/post/cancel-sent-request", request_id).await
    }
    pub async fn remove_connection(client: &Client, server: &Url, connection_id: &ConnectionId) -> Result<()> {
        post(client, server, "/private/post/remove-connection", connection_id).await
    }
    /// Delivers `request` to the receiver's server.
    pub async fn deliver_connection_request(
        client: &Client,
        server: &Url,
        request: &ConnectionRequest,
    ) -> Result<ConnectionRequest> {
        post_json(client, server, "/public/post/receive-connection-request", request).await
    }
    /// Tells the sender's server that its request was accepted.
    pub async fn notify_accepted(client: &Client, server: &Url, request_id: &RequestId) -> Result<Connection> {
        post_json(client, server, "/public/post/accept-connection-request", request_id).await
    }
    /// Tells the sender's server that its request was declined.
    pub async fn notify_declined(client: &Client, server: &Url, request_id: &RequestId) -> Result<()> {
        post(client, server, "/public/post/decline-connection-request", request_id).await
    }

    pub async fn get_profile(client: &Client, server: &Url) -> Result<Option<UserProfile>> {
        get(client, server, "/private/get/profile").await
    }
    pub async fn set_profile(client: &Client, server: &Url, profile: &UserProfile) -> Result<()> {
        post(client, server, "/private/post/profile", profile).await
    }
    pub async fn update_profile(client: &Client, server: &Url, patch: &ProfilePatch) -> Result<UserProfile> {
        post_json(client, server, "/private/post/update-profile", patch).await
    }
    pub async fn has_completed_onboarding(client: &Client, server: &Url) -> Result<bool> {
        get(client, server, "/private/get/onboarding").await
    }
    pub async fn complete_onboarding(client: &Client, server: &Url, profile: &UserProfile) -> Result<()> {
        post(client, server, "/private/post/complete-onboarding", profile).await
    }

    pub async fn get_ui_preferences(client: &Client, server: &Url) -> Result<UiPreferences> {
        get(client, server, "/private/get/ui-preferences").await
    }
    pub async fn update_ui_preferences(
        client: &Client,
        server: &Url,
        patch: &UiPreferencesPatch,
    ) -> Result<UiPreferences> {
        post_json(client, server, "/private/post/ui-preferences", patch).await
    }
    pub async fn get_search_filters(client: &Client, server: &Url) -> Result<SearchFilters> {
        get(client, server, "/private/get/search-filters").await
    }
    pub async fn set_search_filters(client: &Client, server: &Url, filters: &SearchFilters) -> Result<()> {
        post(client, server, "/private/post/search-filters", filters).await
    }
    pub async fn get_recent_searches(client: &Client, server: &Url) -> Result<Vec<String>> {
        get(client, server, "/private/get/recent-searches").await
    }
    pub async fn add_recent_search(client: &Client, server: &Url, query: &str) -> Result<bool> {
        post_json(client, server, "/private/post/recent-search", query).await
    }
    pub async fn clear_recent_searches(client: &Client, server: &Url) -> Result<bool> {
        post_json(client, server, "/private/post/clear-recent-searches", &()).await
    }

    pub async fn browse(client: &Client, server: &Url, query: &BrowseQuery) -> Result<Vec<UserProfile>> {
        post_json(client, server, "/private/post/browse", query).await
    }
    pub async fn get_suggestions(client: &Client, server: &Url) -> Result<Vec<UserProfile>> {
        get(client, server, "/private/get/suggestions").await
    }
    pub async fn get_connected_peers(client: &Client, server: &Url, name: Option<&str>) -> Result<Vec<UserProfile>> {
        let mut request = client.get(server.join("/private/get/connected-peers"));
        if let Some(name) = name {
            request = request.query(&[("name", name)]);
        }
        Ok(send(request).await?.json().await?)
    }

    pub async fn get_storage_info(client: &Client, server: &Url) -> Result<StorageInfo> {
        get(client, server, "/private/get/storage").await
    }
    pub async fn export_data(client: &Client, server: &Url) -> Result<LocalData> {
        get(client, server, "/private/get/export").await
    }
    pub async fn import_data(client: &Client, server: &Url, data: &LocalData) -> Result<()> {
        post(client, server, "/private/post/import", data).await
    }
    /// Wipes every stored key on the server, the equivalent of logging out.
    pub async fn clear_all(client: &Client, server: &Url) -> Result<bool> {
        post_json(client, server, "/private/post/clear-all", &()).await
    }
}
