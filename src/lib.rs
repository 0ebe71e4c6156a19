pub mod non_api_structs;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
pub struct Url(pub String);

impl Url {
    pub fn join(&self, path: &str) -> String {
        self.0.trim_end_matches('/').to_string() + path
    }
}

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct UserId(pub String);
impl AsRef<UserId> for UserId {
    fn as_ref(&self) -> &UserId {
        self
    }
}
impl UserId {
    pub fn from(string: impl AsRef<str>) -> Self {
        Self(string.as_ref().to_string())
    }
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}
impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Eq, PartialEq, Hash, Clone, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ConnectionId(pub String);
#[derive(Eq, PartialEq, Hash, Clone, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status carried by stored connection and request records.
#[derive(Eq, PartialEq, Hash, Clone, Copy, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
    Blocked,
}

/// What a viewer sees for another user. Derived on demand, never stored.
#[derive(Eq, PartialEq, Hash, Clone, Copy, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    None,
    Pending,
    Accepted,
}

/// Directional view of the same relationship. `PendingReceived` is what lets a
/// caller offer accept/decline instead of a plain "pending" badge.
#[derive(Eq, PartialEq, Hash, Clone, Copy, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    #[default]
    None,
    PendingSent,
    PendingReceived,
    Accepted,
}

impl From<Relation> for ConnectionStatus {
    fn from(relation: Relation) -> Self {
        match relation {
            Relation::None => ConnectionStatus::None,
            Relation::PendingSent | Relation::PendingReceived => ConnectionStatus::Pending,
            Relation::Accepted => ConnectionStatus::Accepted,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technologies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_members: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub enum EmploymentType {
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Internship,
    Freelance,
    Contract,
    Volunteer,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: String,
    pub title: String,
    pub company_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<EmploymentType>,
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub college_id: String,
    pub year: String,
    pub department: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub project_areas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_links: Option<SocialLinks>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<Project>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<Vec<Experience>>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Partial profile edit. `None` leaves the field as it is.
#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub college_id: Option<String>,
    pub year: Option<String>,
    pub department: Option<String>,
    pub avatar: Option<String>,
    pub skills: Option<Vec<String>>,
    pub interests: Option<Vec<String>>,
    pub project_areas: Option<Vec<String>>,
    pub bio: Option<String>,
    pub university: Option<String>,
    pub location: Option<String>,
    pub social_links: Option<SocialLinks>,
    pub projects: Option<Vec<Project>>,
    pub experience: Option<Vec<Experience>>,
}

impl ProfilePatch {
    pub fn apply(self, profile: &mut UserProfile) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        set(&mut profile.first_name, self.first_name);
        set(&mut profile.last_name, self.last_name);
        set(&mut profile.email, self.email);
        set(&mut profile.college_id, self.college_id);
        set(&mut profile.year, self.year);
        set(&mut profile.department, self.department);
        set(&mut profile.skills, self.skills);
        set(&mut profile.interests, self.interests);
        set(&mut profile.project_areas, self.project_areas);
        if self.avatar.is_some() {
            profile.avatar = self.avatar;
        }
        if self.bio.is_some() {
            profile.bio = self.bio;
        }
        if self.university.is_some() {
            profile.university = self.university;
        }
        if self.location.is_some() {
            profile.location = self.location;
        }
        if self.social_links.is_some() {
            profile.social_links = self.social_links;
        }
        if self.projects.is_some() {
            profile.projects = self.projects;
        }
        if self.experience.is_some() {
            profile.experience = self.experience;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    pub user_id1: UserId,
    pub user_id2: UserId,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Connection {
    /// Both ids in sorted order, so `{a, b}` and `{b, a}` compare equal.
    pub fn pair_key(&self) -> (UserId, UserId) {
        pair_key(&self.user_id1, &self.user_id2)
    }
    pub fn involves(&self, user: &UserId) -> bool {
        &self.user_id1 == user || &self.user_id2 == user
    }
    pub fn links(&self, a: &UserId, b: &UserId) -> bool {
        (&self.user_id1 == a && &self.user_id2 == b) || (&self.user_id1 == b && &self.user_id2 == a)
    }
    pub fn counterpart(&self, user: &UserId) -> &UserId {
        if &self.user_id1 == user {
            &self.user_id2
        } else {
            &self.user_id1
        }
    }
}

pub fn pair_key(a: &UserId, b: &UserId) -> (UserId, UserId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub id: RequestId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

impl ConnectionRequest {
    pub fn is_pending_between(&self, sender: &UserId, receiver: &UserId) -> bool {
        self.status == RecordStatus::Pending && &self.sender_id == sender && &self.receiver_id == receiver
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_areas: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiPreferences {
    pub view_mode: ViewMode,
    pub theme: Theme,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UiPreferencesPatch {
    pub view_mode: Option<ViewMode>,
    pub theme: Option<Theme>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    #[default]
    Newest,
    NameAsc,
    NameDesc,
    SimilarSkills,
    Department,
    Year,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowseQuery {
    pub query: Option<String>,
    pub filters: SearchFilters,
    pub sort: SortOption,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendConnectionRequest {
    pub target_id: UserId,
    pub current_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "outcome", content = "record", rename_all = "lowercase")]
pub enum SendOutcome {
    Pending(ConnectionRequest),
    Connected(Connection),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub size: usize,
    pub available: bool,
}
