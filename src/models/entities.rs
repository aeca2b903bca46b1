//! Server entities, as returned by the API and kept in the local cache.

use serde::{Deserialize, Serialize};

// =============================================================================
// Teams
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    /// "O" for open teams, "I" for invite only.
    #[serde(rename = "type", default)]
    pub team_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub update_at: i64,
    #[serde(default)]
    pub delete_at: i64,
}

/// The current user's membership in a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MyTeam {
    pub team_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub roles: String,
    #[serde(default)]
    pub msg_count: i64,
    #[serde(default)]
    pub mention_count: i64,
}

// =============================================================================
// Channels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "P")]
    Private,
    #[serde(rename = "D")]
    Direct,
    #[serde(rename = "G")]
    Group,
    #[serde(other)]
    Unknown,
}

impl ChannelType {
    /// Direct and group messages live outside any team.
    pub fn is_direct_or_group(&self) -> bool {
        matches!(self, ChannelType::Direct | ChannelType::Group)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    /// Empty for direct and group messages.
    #[serde(default)]
    pub team_id: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub creator_id: String,
    #[serde(default)]
    pub last_post_at: i64,
    #[serde(default)]
    pub last_root_post_at: i64,
    #[serde(default)]
    pub total_msg_count: i64,
    #[serde(default)]
    pub total_msg_count_root: i64,
    #[serde(default)]
    pub update_at: i64,
    #[serde(default)]
    pub delete_at: i64,
}

impl Channel {
    /// For a direct channel named `a__b`, the participant that is not `current_user_id`.
    ///
    /// A self-DM has the same id on both sides and resolves to the current user.
    pub fn direct_teammate_id(&self, current_user_id: &str) -> Option<String> {
        if self.channel_type != ChannelType::Direct {
            return None;
        }
        let (first, second) = self.name.split_once("__")?;
        if first == current_user_id {
            Some(second.to_string())
        } else {
            Some(first.to_string())
        }
    }
}

/// The current user's membership in a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MyChannel {
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub roles: String,
    #[serde(default)]
    pub last_viewed_at: i64,
    #[serde(default)]
    pub msg_count: i64,
    #[serde(default)]
    pub msg_count_root: i64,
    #[serde(default)]
    pub mention_count: i64,
    #[serde(default)]
    pub mention_count_root: i64,
    #[serde(default)]
    pub notify_props: serde_json::Value,
    #[serde(default)]
    pub last_update_at: i64,
}

impl MyChannel {
    /// With collapsed reply threads only root posts count towards the channel badges.
    pub fn with_root_counts(mut self) -> Self {
        self.msg_count = self.msg_count_root;
        self.mention_count = self.mention_count_root;
        self
    }
}

// =============================================================================
// Sidebar categories
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Custom,
    Channels,
    DirectMessages,
    Favorites,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub team_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub sorting: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub channel_ids: Vec<String>,
}

/// Response of the team categories endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoriesWithOrder {
    pub categories: Vec<Category>,
    #[serde(default)]
    pub order: Vec<String>,
}

/// Placement of a channel inside a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryChannel {
    pub id: String,
    pub category_id: String,
    pub channel_id: String,
    pub sort_order: i64,
}

impl CategoryChannel {
    pub fn new(team_id: &str, category_id: &str, channel_id: &str, sort_order: i64) -> Self {
        Self {
            id: format!("{}_{}", team_id, channel_id),
            category_id: category_id.to_string(),
            channel_id: channel_id.to_string(),
            sort_order,
        }
    }
}

// =============================================================================
// Posts and threads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    #[serde(default)]
    pub edit_at: i64,
    #[serde(default)]
    pub delete_at: i64,
    #[serde(default)]
    pub user_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub root_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub post_type: String,
    #[serde(default)]
    pub props: serde_json::Value,
    #[serde(default)]
    pub reply_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reply_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<UserProfile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
}

impl Post {
    pub fn is_root(&self) -> bool {
        self.root_id.is_empty()
    }

    /// Ids of the users taking part in this post's thread, in server order.
    pub fn participant_ids(&self) -> Vec<String> {
        self.participants
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|p| p.id.clone())
            .collect()
    }
}

/// Collapsed reply thread as shown in the threads list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    /// Id of the root post.
    pub id: String,
    #[serde(default)]
    pub reply_count: i64,
    #[serde(default)]
    pub last_reply_at: i64,
    #[serde(default)]
    pub last_viewed_at: i64,
    #[serde(default)]
    pub unread_replies: i64,
    #[serde(default)]
    pub unread_mentions: i64,
    #[serde(default)]
    pub is_following: bool,
    #[serde(default)]
    pub participants: Vec<String>,
}

impl ThreadSummary {
    /// Thread derived from a root post of a channel page.
    pub fn from_root_post(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            reply_count: post.reply_count,
            last_reply_at: post.last_reply_at.unwrap_or_default(),
            last_viewed_at: 0,
            unread_replies: 0,
            unread_mentions: 0,
            is_following: post.is_following.unwrap_or(false),
            participants: post.participant_ids(),
        }
    }
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub update_at: i64,
    #[serde(default)]
    pub delete_at: i64,
    #[serde(default)]
    pub last_picture_update: i64,
}

impl UserProfile {
    /// Participant stubs only carry an id; those are not usable profiles.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty()
    }

    pub fn display_name(&self) -> String {
        if !self.username.is_empty() {
            self.username.clone()
        } else {
            self.id.clone()
        }
    }
}
