//! The aggregated result of one hydration run.

use super::entities::{
    CategoriesWithOrder, CategoryChannel, Channel, MyChannel, MyTeam, Post, Team, ThreadSummary,
    UserProfile,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of category resolution. The two variants never occur together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategorySet {
    /// Every category of the team, fetched because the team membership is new.
    Full(CategoriesWithOrder),
    /// Members of the default category after the channel was placed in it.
    Placement { channels: Vec<CategoryChannel> },
}

/// A window of channel posts.
///
/// `order` lists post ids newest first. `threads` holds the summaries of the
/// threads rooted in this window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostPage {
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub posts: HashMap<String, Post>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_post_id: Option<String>,
    #[serde(default)]
    pub threads: Vec<ThreadSummary>,
}

impl PostPage {
    /// Adds the posts of `other` that are not in this page yet and re-sorts the order.
    pub fn absorb(&mut self, other: PostPage) {
        for (id, post) in other.posts {
            if !self.posts.contains_key(&id) {
                self.order.push(id.clone());
                self.posts.insert(id, post);
            }
        }
        let posts = &self.posts;
        self.order.sort_by(|a, b| {
            let a_time = posts.get(a).map(|p| p.create_at).unwrap_or_default();
            let b_time = posts.get(b).map(|p| p.create_at).unwrap_or_default();
            b_time.cmp(&a_time)
        });
    }

    /// Posts in page order.
    pub fn ordered_posts(&self) -> impl Iterator<Item = &Post> {
        self.order.iter().filter_map(|id| self.posts.get(id))
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Everything a run managed to resolve for one notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_team: Option<MyTeam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_channel: Option<MyChannel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<CategorySet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<PostPage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<Vec<ThreadSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserProfile>>,
}

impl AggregatedPayload {
    pub fn is_empty(&self) -> bool {
        self.team.is_none()
            && self.my_team.is_none()
            && self.channel.is_none()
            && self.my_channel.is_none()
            && self.categories.is_none()
            && self.posts.is_none()
            && self.threads.is_none()
            && self.users.is_none()
    }
}
