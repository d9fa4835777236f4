//! Contact profile index
//!
//! Id-keyed cache over the read-only contact directory feed. The index is a
//! pure lookup structure with no side effects: it is rebuilt wholesale from
//! each directory snapshot and consulted by the normalizer's override
//! chains. An absent profile is normal, not an error: normalization falls
//! back to the next precedence source.

use std::collections::HashMap;

use crate::model::ContactProfile;

/// Snapshot cache mapping contact id to its canonical display profile
#[derive(Debug, Clone, Default)]
pub struct ProfileIndex {
    by_id: HashMap<String, ContactProfile>,
}

impl ProfileIndex {
    /// Empty index; lookups fall through to record-provided values
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from a full directory snapshot
    ///
    /// Profiles without an id are skipped; on duplicate ids the later entry
    /// wins, matching last-write-wins semantics of the upstream feed.
    pub fn from_snapshot(profiles: &[ContactProfile]) -> Self {
        let mut by_id = HashMap::with_capacity(profiles.len());
        for profile in profiles {
            if profile.id.is_empty() {
                continue;
            }
            by_id.insert(profile.id.clone(), profile.clone());
        }
        Self { by_id }
    }

    /// Look up the full profile for a contact
    pub fn get(&self, id: &str) -> Option<&ContactProfile> {
        self.by_id.get(id)
    }

    /// Curated name override for a contact, if the directory has one
    ///
    /// Empty names are treated as absent so a blank directory entry cannot
    /// mask the channel-provided name.
    pub fn name_for(&self, id: &str) -> Option<&str> {
        self.get(id)
            .and_then(|p| p.name.as_deref())
            .filter(|name| !name.trim().is_empty())
    }

    /// Curated avatar override for a contact, if the directory has one
    pub fn avatar_for(&self, id: &str) -> Option<&str> {
        self.get(id)
            .and_then(|p| p.avatar_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
