use super::{absent_on_remote_failure, FetchContext, FetchError, LoadedProfiles};
use crate::models::UserProfile;
use serde_json::json;
use tracing::debug;

impl FetchContext<'_> {
    /// Load the profiles of every referenced user that is not in `loaded` yet.
    ///
    /// The store is asked first, the server only for the rest. New profiles
    /// are added to `loaded`.
    pub async fn fetch_users(
        &self,
        user_ids: &[String],
        usernames: &[String],
        loaded: &mut LoadedProfiles,
    ) -> Result<(), FetchError> {
        let mut missing_ids = Vec::new();
        for id in user_ids {
            if !id.is_empty() && !loaded.contains_id(id) && !missing_ids.contains(id) {
                missing_ids.push(id.clone());
            }
        }
        if !missing_ids.is_empty() {
            loaded.extend(self.db().get_users(&missing_ids)?);
            missing_ids.retain(|id| !loaded.contains_id(id));
        }
        if !missing_ids.is_empty() {
            debug!("Fetching {} users by id", missing_ids.len());
            let fetched = self
                .post::<Vec<UserProfile>>("/api/v4/users/ids", &json!(missing_ids))
                .await;
            if let Some(users) = absent_on_remote_failure(fetched, "users")? {
                loaded.extend(users);
            }
        }

        let mut missing_names = Vec::new();
        for name in usernames {
            if !name.is_empty() && !loaded.contains_username(name) && !missing_names.contains(name) {
                missing_names.push(name.clone());
            }
        }
        if !missing_names.is_empty() {
            loaded.extend(self.db().get_users_by_username(&missing_names)?);
            missing_names.retain(|name| !loaded.contains_username(name));
        }
        if !missing_names.is_empty() {
            debug!("Fetching {} users by username", missing_names.len());
            let fetched = self
                .post::<Vec<UserProfile>>("/api/v4/users/usernames", &json!(missing_names))
                .await;
            if let Some(users) = absent_on_remote_failure(fetched, "users")? {
                loaded.extend(users);
            }
        }

        Ok(())
    }
}
