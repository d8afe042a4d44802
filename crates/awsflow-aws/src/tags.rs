//! Resource tags and provider default tags
//!
//! `tags` holds what the configuration sets; `tags_all` is the effective
//! set after merging the provider's default tags underneath.

use awsflow_cloud::{Attribute, AttributeKind, State, StateExt};
use std::collections::BTreeMap;

pub type Tags = BTreeMap<String, String>;

pub const TAGS: &str = "tags";
pub const TAGS_ALL: &str = "tags_all";

pub fn tags_attribute() -> Attribute {
    Attribute::optional(AttributeKind::MapOfString)
}

pub fn tags_all_attribute() -> Attribute {
    Attribute::computed(AttributeKind::MapOfString)
}

/// Resource tags win over default tags with the same key
pub fn merge(defaults: &Tags, tags: &Tags) -> Tags {
    let mut all = defaults.clone();
    all.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    all
}

/// Recovers the configured `tags` from the remote tag set
///
/// A key stays when the configuration names it or when its value differs
/// from the default tag of the same key.
pub fn without_defaults(remote: &Tags, defaults: &Tags, configured: &Tags) -> Tags {
    remote
        .iter()
        .filter(|(k, v)| configured.contains_key(*k) || defaults.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Tags to set and keys to remove to go from `old` to `new`
pub fn diff(old: &Tags, new: &Tags) -> (Tags, Vec<String>) {
    let upsert = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let removed = old
        .keys()
        .filter(|k| !new.contains_key(*k))
        .cloned()
        .collect();
    (upsert, removed)
}

/// Writes the effective tag set into a planned record
pub fn plan_tags_all(planned: &mut State, defaults: &Tags) {
    let all = merge(defaults, &planned.get_string_map(TAGS));
    planned.set_string_map(TAGS_ALL, &all);
}

/// Writes `tags` and `tags_all` from the tags the service returned
pub fn set_remote_tags(state: &mut State, remote: &Tags, defaults: &Tags) {
    let configured = state.get_string_map(TAGS);
    let tags = without_defaults(remote, defaults, &configured);
    state.set_string_map(TAGS, &tags);
    state.set_string_map(TAGS_ALL, remote);
}
