//! Store traits and the scoped database handle.

use crate::models::{AggregatedPayload, Category, CategoryChannel, MyTeam, Team, UserProfile};
use anyhow::Result;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// Opens the cache database of a server.
pub trait StoreProvider: Send + Sync {
    /// Returns `None` when no database exists for `server_url`.
    fn open(&self, server_url: &str) -> Result<Option<Arc<dyn ServerDatabase>>>;
}

/// Cached entities of one server.
pub trait ServerDatabase: Send + Sync {
    // =========================================================================
    // Session
    // =========================================================================

    fn current_user_id(&self) -> Result<Option<String>>;

    fn current_team_id(&self) -> Result<Option<String>>;

    // =========================================================================
    // Teams
    // =========================================================================

    fn get_team(&self, team_id: &str) -> Result<Option<Team>>;

    fn get_my_team(&self, team_id: &str) -> Result<Option<MyTeam>>;

    /// Ids of every team the user belongs to.
    fn get_my_team_ids(&self) -> Result<Vec<String>>;

    // =========================================================================
    // Categories
    // =========================================================================

    fn get_categories(&self, team_id: &str) -> Result<Vec<Category>>;

    /// Channels of a category, by sort order.
    fn get_category_channels(&self, category_id: &str) -> Result<Vec<CategoryChannel>>;

    /// Whether the channel sits in any category of the team.
    fn is_channel_categorized(&self, team_id: &str, channel_id: &str) -> Result<bool>;

    // =========================================================================
    // Posts and users
    // =========================================================================

    /// Creation time of the newest post stored in the channel's feed window.
    fn latest_channel_post_at(&self, channel_id: &str) -> Result<Option<i64>>;

    fn get_users(&self, user_ids: &[String]) -> Result<Vec<UserProfile>>;

    fn get_users_by_username(&self, usernames: &[String]) -> Result<Vec<UserProfile>>;

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write everything a run resolved in a single transaction.
    fn save_aggregate(
        &self,
        payload: &AggregatedPayload,
        team_id: Option<&str>,
        channel_id: Option<&str>,
        is_thread_notification: bool,
    ) -> Result<()>;

    /// Release the underlying connection. Reads after close fail.
    fn close(&self);
}

/// Open database for the duration of one run. Closes it when dropped.
pub struct DatabaseHandle {
    db: Arc<dyn ServerDatabase>,
    server_url: String,
}

impl DatabaseHandle {
    /// Open the database of `server_url`, or `None` when there is none.
    pub fn open(provider: &dyn StoreProvider, server_url: &str) -> Result<Option<Self>> {
        Ok(provider.open(server_url)?.map(|db| {
            debug!("Opened database for {}", server_url);
            Self {
                db,
                server_url: server_url.to_string(),
            }
        }))
    }
}

impl Deref for DatabaseHandle {
    type Target = dyn ServerDatabase;

    fn deref(&self) -> &Self::Target {
        self.db.as_ref()
    }
}

impl Drop for DatabaseHandle {
    fn drop(&mut self) {
        self.db.close();
        debug!("Closed database for {}", self.server_url);
    }
}
