use super::{FetchContext, FetchError};
use crate::models::{ThreadSummary, UserProfile};
use serde::Deserialize;
use tracing::debug;

/// Thread as returned by the server, with participant objects.
#[derive(Debug, Deserialize)]
struct RemoteThread {
    id: String,
    #[serde(default)]
    reply_count: i64,
    #[serde(default)]
    last_reply_at: i64,
    #[serde(default)]
    last_viewed_at: i64,
    #[serde(default)]
    unread_replies: i64,
    #[serde(default)]
    unread_mentions: i64,
    #[serde(default)]
    is_following: bool,
    #[serde(default)]
    participants: Vec<UserProfile>,
}

#[derive(Debug)]
pub struct ThreadResult {
    pub thread: ThreadSummary,
    /// Participants that came with full profiles.
    pub profiles: Vec<UserProfile>,
}

impl FetchContext<'_> {
    /// Fetch the thread rooted at `root_id`.
    ///
    /// Threads are scoped to a team: without `team_id` the current team of the
    /// session is used, and without either there is nothing to fetch.
    pub async fn fetch_thread(
        &self,
        root_id: &str,
        team_id: Option<&str>,
    ) -> Result<Option<ThreadResult>, FetchError> {
        let team_id = match team_id {
            Some(team_id) => team_id.to_string(),
            None => match self.db().current_team_id()? {
                Some(team_id) => team_id,
                None => {
                    debug!("No team to fetch thread {} from", root_id);
                    return Ok(None);
                }
            },
        };

        let remote: RemoteThread = self
            .get(&format!(
                "/api/v4/users/me/teams/{}/threads/{}?extended=true",
                team_id, root_id
            ))
            .await?;

        let thread = ThreadSummary {
            id: remote.id,
            reply_count: remote.reply_count,
            last_reply_at: remote.last_reply_at,
            last_viewed_at: remote.last_viewed_at,
            unread_replies: remote.unread_replies,
            unread_mentions: remote.unread_mentions,
            is_following: remote.is_following,
            participants: remote.participants.iter().map(|p| p.id.clone()).collect(),
        };
        let profiles = remote
            .participants
            .into_iter()
            .filter(UserProfile::is_complete)
            .collect();

        Ok(Some(ThreadResult { thread, profiles }))
    }
}
