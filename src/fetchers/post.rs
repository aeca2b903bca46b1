use super::{absent_on_remote_failure, FetchContext, FetchError};
use crate::models::{PostPage, ThreadSummary, UserProfile};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref MENTION: Regex = Regex::new(r"(?i)\B@([a-z0-9][a-z0-9._\-]*)")
        .expect("Invalid Regex, this should be fixed at runtime.");
}

/// Channel-wide mentions that do not name a user.
const SPECIAL_MENTIONS: [&str; 3] = ["all", "here", "channel"];

/// Usernames mentioned in `message`, lowercased, each once.
pub fn extract_mentions(message: &str) -> Vec<String> {
    let mut usernames: Vec<String> = Vec::new();
    for capture in MENTION.captures_iter(message) {
        let username = capture[1].trim_end_matches(['.', '-', '_']).to_lowercase();
        if username.is_empty() || SPECIAL_MENTIONS.contains(&username.as_str()) {
            continue;
        }
        if !usernames.contains(&username) {
            usernames.push(username);
        }
    }
    usernames
}

#[derive(Debug, Clone, Copy)]
pub struct PostQuery<'a> {
    /// Page size when nothing is cached for the channel yet.
    pub posts_per_page: usize,
    pub threads_enabled: bool,
    /// Root of the thread when the notification is a thread reply.
    pub root_id: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct PostResult {
    pub page: PostPage,
    /// Users referenced by the posts whose profiles are not in the page.
    pub user_ids: Vec<String>,
    /// Usernames mentioned in the posts.
    pub usernames: Vec<String>,
    /// Complete participant profiles carried by the posts.
    pub profiles: Vec<UserProfile>,
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

impl FetchContext<'_> {
    /// Fetch the newest posts of a channel.
    ///
    /// Incremental when the store already has posts of the channel. A thread
    /// reply notification also pulls the thread itself.
    pub async fn fetch_posts(
        &self,
        channel_id: &str,
        query: PostQuery<'_>,
    ) -> Result<PostResult, FetchError> {
        let endpoint = match self.db().latest_channel_post_at(channel_id)? {
            Some(since) => format!(
                "/api/v4/channels/{}/posts?since={}&collapsedThreads={}&collapsedThreadsExtended=false",
                channel_id, since, query.threads_enabled
            ),
            None => format!(
                "/api/v4/channels/{}/posts?page=0&per_page={}&collapsedThreads={}&collapsedThreadsExtended=false",
                channel_id, query.posts_per_page, query.threads_enabled
            ),
        };
        let mut page: PostPage = self.get(&endpoint).await?;
        debug!("Fetched {} posts of channel {}", page.posts.len(), channel_id);

        if let (true, Some(root_id)) = (query.threads_enabled, query.root_id) {
            let fetched = self
                .get::<PostPage>(&format!(
                    "/api/v4/posts/{}/thread?skipFetchThreads=false&collapsedThreads=true&collapsedThreadsExtended=false&direction=up&perPage={}",
                    root_id, query.posts_per_page
                ))
                .await;
            if let Some(thread_page) = absent_on_remote_failure(fetched, "thread_posts")? {
                page.absorb(thread_page);
            }
        }

        if query.threads_enabled {
            page.threads = page
                .ordered_posts()
                .filter(|p| p.is_root() && p.reply_count > 0)
                .map(ThreadSummary::from_root_post)
                .collect();
        }

        let mut result = PostResult::default();
        for post in page.ordered_posts() {
            push_unique(&mut result.user_ids, &post.user_id);
            for participant in post.participants.as_deref().unwrap_or_default() {
                if participant.is_complete() {
                    if !result.profiles.iter().any(|p| p.id == participant.id) {
                        result.profiles.push(participant.clone());
                    }
                } else {
                    push_unique(&mut result.user_ids, &participant.id);
                }
            }
            for username in extract_mentions(&post.message) {
                push_unique(&mut result.usernames, &username);
            }
        }
        let profiles = &result.profiles;
        result.user_ids.retain(|id| !profiles.iter().any(|p| &p.id == id));
        result.page = page;

        Ok(result)
    }
}
