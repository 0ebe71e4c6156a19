use serde::{Deserialize, Serialize};
use crate::{Connection, ConnectionRequest, SearchFilters, UiPreferences, UserProfile};

/// Everything the store persists, in one bundle for export and import.
#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_profile: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<Connection>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_requests: Option<Vec<ConnectionRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_requests: Option<Vec<ConnectionRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_completed_onboarding: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_filters: Option<SearchFilters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_preferences: Option<UiPreferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_searches: Option<Vec<String>>,
}
