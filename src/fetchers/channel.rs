use super::{absent_on_remote_failure, FetchContext, FetchError, LoadedProfiles};
use crate::models::{Channel, ChannelType, MyChannel, UserProfile};
use serde_json::json;
use tracing::debug;

/// Group channel members fetched to build the display name.
const GROUP_MEMBERS_PAGE_SIZE: usize = 8;

#[derive(Debug)]
pub struct ChannelResult {
    pub channel: Channel,
    pub my_channel: Option<MyChannel>,
    /// Profiles loaded to name a direct or group channel.
    pub profiles: Vec<UserProfile>,
}

impl FetchContext<'_> {
    /// Fetch the channel and the user's membership.
    ///
    /// Always goes to the server: the notification means the channel changed.
    /// `None` when the channel itself could not be fetched; the membership and
    /// the display name of direct and group channels degrade on their own.
    pub async fn fetch_channel(
        &self,
        channel_id: &str,
        threads_enabled: bool,
        loaded: &LoadedProfiles,
    ) -> Result<Option<ChannelResult>, FetchError> {
        let fetched = self.get::<Channel>(&format!("/api/v4/channels/{}", channel_id)).await;
        let Some(mut channel) = absent_on_remote_failure(fetched, "channel")? else {
            return Ok(None);
        };

        let fetched = self
            .get::<MyChannel>(&format!("/api/v4/channels/{}/members/me", channel_id))
            .await;
        let my_channel = absent_on_remote_failure(fetched, "channel_membership")?.map(|m| {
            if threads_enabled {
                m.with_root_counts()
            } else {
                m
            }
        });

        let profiles = match channel.channel_type {
            ChannelType::Direct => self.name_direct_channel(&mut channel, loaded).await?,
            ChannelType::Group => self.name_group_channel(&mut channel).await?,
            _ => Vec::new(),
        };

        Ok(Some(ChannelResult {
            channel,
            my_channel,
            profiles,
        }))
    }

    async fn name_direct_channel(
        &self,
        channel: &mut Channel,
        loaded: &LoadedProfiles,
    ) -> Result<Vec<UserProfile>, FetchError> {
        let Some(current_user_id) = self.db().current_user_id()? else {
            debug!("No current user, keeping name of direct channel {}", channel.id);
            return Ok(Vec::new());
        };
        let Some(teammate_id) = channel.direct_teammate_id(&current_user_id) else {
            return Ok(Vec::new());
        };

        let teammate = match loaded.get(&teammate_id).filter(|p| p.is_complete()) {
            Some(profile) => Some(profile.clone()),
            None => match self.db().get_users(&[teammate_id.clone()])?.into_iter().next() {
                Some(profile) => Some(profile),
                None => {
                    let fetched = self
                        .post::<Vec<UserProfile>>("/api/v4/users/ids", &json!([teammate_id]))
                        .await;
                    absent_on_remote_failure(fetched, "direct_channel_teammate")?
                        .and_then(|users| users.into_iter().next())
                }
            },
        };

        Ok(match teammate {
            Some(profile) => {
                channel.display_name = profile.display_name();
                vec![profile]
            }
            None => Vec::new(),
        })
    }

    async fn name_group_channel(&self, channel: &mut Channel) -> Result<Vec<UserProfile>, FetchError> {
        let current_user_id = self.db().current_user_id()?.unwrap_or_default();
        let fetched = self
            .get::<Vec<UserProfile>>(&format!(
                "/api/v4/users?in_channel={}&page=0&per_page={}",
                channel.id, GROUP_MEMBERS_PAGE_SIZE
            ))
            .await;
        let members = absent_on_remote_failure(fetched, "group_channel_members")?.unwrap_or_default();

        let mut names: Vec<String> = members
            .iter()
            .filter(|m| m.id != current_user_id)
            .map(UserProfile::display_name)
            .collect();
        if !names.is_empty() {
            names.sort();
            channel.display_name = names.join(", ");
        }

        Ok(members)
    }
}
