//! Peer discovery over the static profile catalog.

use std::cmp::Reverse;
use std::collections::HashSet;

use peerconnect_common::{
    BrowseQuery, Connection, ConnectionStatus, SearchFilters, SortOption, UserId, UserProfile,
};

use crate::status::Collections;

pub const MIN_QUERY_LENGTH: usize = 2;

fn matches_query(profile: &UserProfile, needle: &str) -> bool {
    let hit = |field: &str| field.to_lowercase().contains(needle);
    hit(&profile.first_name)
        || hit(&profile.last_name)
        || hit(&profile.department)
        || profile.skills.iter().any(|s| hit(s))
        || profile.interests.iter().any(|s| hit(s))
        || profile.project_areas.iter().any(|s| hit(s))
        || profile.university.as_deref().is_some_and(hit)
}

fn selected(values: &Option<Vec<String>>) -> Option<&[String]> {
    values.as_deref().filter(|values| !values.is_empty())
}

fn matches_filters(profile: &UserProfile, filters: &SearchFilters) -> bool {
    let any_of = |wanted: &[String], have: &[String]| wanted.iter().any(|w| have.contains(w));
    selected(&filters.departments).map_or(true, |d| d.contains(&profile.department))
        && selected(&filters.years).map_or(true, |y| y.contains(&profile.year))
        && selected(&filters.skills).map_or(true, |s| any_of(s, &profile.skills))
        && selected(&filters.interests).map_or(true, |i| any_of(i, &profile.interests))
        && selected(&filters.project_areas).map_or(true, |p| any_of(p, &profile.project_areas))
}

fn shared_skills(a: &UserProfile, b: &UserProfile) -> usize {
    let theirs: HashSet<_> = b.skills.iter().collect();
    a.skills.iter().filter(|skill| theirs.contains(skill)).count()
}

fn sort(profiles: &mut [UserProfile], option: SortOption, current: Option<&UserProfile>) {
    let newest = |a: &UserProfile, b: &UserProfile| b.created_at.cmp(&a.created_at);
    match (option, current) {
        (SortOption::NameAsc, _) => profiles.sort_by_key(|p| p.full_name().to_lowercase()),
        (SortOption::NameDesc, _) => profiles.sort_by_key(|p| Reverse(p.full_name().to_lowercase())),
        (SortOption::SimilarSkills, Some(me)) => profiles.sort_by(|a, b| {
            shared_skills(me, b)
                .cmp(&shared_skills(me, a))
                .then_with(|| newest(a, b))
        }),
        (SortOption::Department, Some(me)) => profiles.sort_by(|a, b| {
            (b.department == me.department)
                .cmp(&(a.department == me.department))
                .then_with(|| newest(a, b))
        }),
        (SortOption::Year, Some(me)) => profiles.sort_by(|a, b| {
            (b.year == me.year)
                .cmp(&(a.year == me.year))
                .then_with(|| newest(a, b))
        }),
        _ => profiles.sort_by(newest),
    }
}

/// Filters and sorts `catalog` for the browse page. The current user never
/// shows up in their own results.
pub fn browse(catalog: &[UserProfile], current: Option<&UserProfile>, query: &BrowseQuery) -> Vec<UserProfile> {
    let needle = query
        .query
        .as_deref()
        .or(query.filters.query.as_deref())
        .map(|q| q.trim().to_lowercase())
        .filter(|q| q.chars().count() >= MIN_QUERY_LENGTH);

    let mut profiles: Vec<_> = catalog
        .iter()
        .filter(|p| current.map_or(true, |me| me.id != p.id))
        .filter(|p| needle.as_deref().map_or(true, |n| matches_query(p, n)))
        .filter(|p| matches_filters(p, &query.filters))
        .cloned()
        .collect();
    sort(&mut profiles, query.sort, current);
    profiles
}

/// Dashboard suggestions: peers with no connection or request either way,
/// most shared skills first.
pub fn suggested_peers(
    catalog: &[UserProfile],
    current: &UserProfile,
    collections: &Collections,
    limit: usize,
) -> Vec<UserProfile> {
    let mut peers: Vec<_> = catalog
        .iter()
        .filter(|p| p.id != current.id)
        .filter(|p| collections.status(&p.id, &current.id) == ConnectionStatus::None)
        .cloned()
        .collect();
    sort(&mut peers, SortOption::SimilarSkills, Some(current));
    peers.truncate(limit);
    peers
}

/// Catalog profiles on the other side of `current`'s connections, optionally
/// narrowed by a case-insensitive first/last name match.
pub fn connected_peers(
    catalog: &[UserProfile],
    current: &UserId,
    connections: &[Connection],
    name_filter: Option<&str>,
) -> Vec<UserProfile> {
    let needle = name_filter.map(|n| n.trim().to_lowercase()).unwrap_or_default();
    connections
        .iter()
        .filter(|conn| conn.involves(current))
        .filter_map(|conn| catalog.iter().find(|p| &p.id == conn.counterpart(current)))
        .filter(|p| {
            needle.is_empty()
                || p.first_name.to_lowercase().contains(&needle)
                || p.last_name.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}
