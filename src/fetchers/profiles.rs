use crate::models::UserProfile;
use std::collections::HashMap;

/// User profiles loaded during one run, each kept once in first-seen order.
///
/// A later copy of the same user replaces the earlier one in place, unless it
/// is an id-only stub.
#[derive(Debug, Default)]
pub struct LoadedProfiles {
    order: Vec<String>,
    by_id: HashMap<String, UserProfile>,
}

impl LoadedProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, profile: UserProfile) {
        match self.by_id.get_mut(&profile.id) {
            Some(existing) => {
                if profile.is_complete() || !existing.is_complete() {
                    *existing = profile;
                }
            }
            None => {
                self.order.push(profile.id.clone());
                self.by_id.insert(profile.id.clone(), profile);
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = UserProfile>>(&mut self, profiles: I) {
        for profile in profiles {
            self.insert(profile);
        }
    }

    pub fn get(&self, user_id: &str) -> Option<&UserProfile> {
        self.by_id.get(user_id)
    }

    pub fn contains_id(&self, user_id: &str) -> bool {
        self.by_id.contains_key(user_id)
    }

    pub fn contains_username(&self, username: &str) -> bool {
        self.by_id.values().any(|p| p.username == username)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn into_vec(mut self) -> Vec<UserProfile> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.remove(id))
            .collect()
    }
}
