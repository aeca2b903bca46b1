use super::{FetchContext, FetchError};
use crate::models::{CategoriesWithOrder, CategoryChannel, CategoryType, Channel};
use tracing::debug;

impl FetchContext<'_> {
    /// Every category of the team, with their order.
    pub async fn fetch_categories(&self, team_id: &str) -> Result<CategoriesWithOrder, FetchError> {
        self.get(&format!(
            "/api/v4/users/me/teams/{}/channels/categories",
            team_id
        ))
        .await
    }

    /// Put a channel that has no category yet into the default one.
    ///
    /// Direct and group channels go to the direct messages category of every
    /// team, the others to the channels category of their team. Returns the
    /// resulting members of the receiving categories, or `None` when the
    /// channel is already categorized or no default category is cached.
    pub fn place_channel(&self, channel: &Channel) -> Result<Option<Vec<CategoryChannel>>, FetchError> {
        let (team_ids, category_type) = if channel.channel_type.is_direct_or_group() {
            (self.db().get_my_team_ids()?, CategoryType::DirectMessages)
        } else {
            (vec![channel.team_id.clone()], CategoryType::Channels)
        };

        for team_id in &team_ids {
            if self.db().is_channel_categorized(team_id, &channel.id)? {
                debug!("Channel {} already categorized in team {}", channel.id, team_id);
                return Ok(None);
            }
        }

        let mut placed = Vec::new();
        for team_id in &team_ids {
            let categories = self.db().get_categories(team_id)?;
            let Some(default_category) = categories
                .iter()
                .find(|c| c.category_type == category_type)
            else {
                continue;
            };

            let mut members = self.db().get_category_channels(&default_category.id)?;
            let sort_order = members.len() as i64;
            members.push(CategoryChannel::new(
                team_id,
                &default_category.id,
                &channel.id,
                sort_order,
            ));
            placed.extend(members);
        }

        Ok(if placed.is_empty() { None } else { Some(placed) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{category, my_team, FakeDatabase, FakeRemote};
    use serde_json::json;

    const SERVER: &str = "https://chat.example.com";

    fn channel(id: &str, team_id: &str, kind: &str) -> Channel {
        serde_json::from_value(json!({"id": id, "team_id": team_id, "type": kind})).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_categories() {
        let remote = FakeRemote::new().on_get(
            "/api/v4/users/me/teams/t1/channels/categories",
            json!({
                "categories": [{"id": "cat1", "team_id": "t1", "type": "channels"}],
                "order": ["cat1"]
            }),
        );
        let db = FakeDatabase::new();
        let ctx = FetchContext::new(&remote, &db, SERVER);

        let result = ctx.fetch_categories("t1").await.unwrap();
        assert_eq!(result.order, vec!["cat1"]);
        assert_eq!(result.categories[0].category_type, CategoryType::Channels);
    }

    #[test]
    fn test_place_open_channel_in_channels_category() {
        let remote = FakeRemote::new();
        let db = FakeDatabase::new()
            .with_category(category("fav", "t1", "favorites", &["c0"]))
            .with_category(category("chan", "t1", "channels", &["c1", "c2"]));
        let ctx = FetchContext::new(&remote, &db, SERVER);

        let placed = ctx.place_channel(&channel("c3", "t1", "O")).unwrap().unwrap();

        assert_eq!(placed.len(), 3);
        let added = placed.last().unwrap();
        assert_eq!(added.id, "t1_c3");
        assert_eq!(added.category_id, "chan");
        assert_eq!(added.sort_order, 2);
    }

    #[test]
    fn test_already_categorized_channel_is_not_placed() {
        let remote = FakeRemote::new();
        let db = FakeDatabase::new()
            .with_category(category("fav", "t1", "favorites", &["c3"]))
            .with_category(category("chan", "t1", "channels", &[]));
        let ctx = FetchContext::new(&remote, &db, SERVER);

        assert!(ctx.place_channel(&channel("c3", "t1", "O")).unwrap().is_none());
    }

    #[test]
    fn test_place_direct_channel_in_every_team() {
        let remote = FakeRemote::new();
        let db = FakeDatabase::new()
            .with_my_team(my_team("t1"))
            .with_my_team(my_team("t2"))
            .with_category(category("dm1", "t1", "direct_messages", &[]))
            .with_category(category("dm2", "t2", "direct_messages", &["other"]));
        let ctx = FetchContext::new(&remote, &db, SERVER);

        let placed = ctx.place_channel(&channel("dm", "", "D")).unwrap().unwrap();

        let added: Vec<_> = placed.iter().filter(|cc| cc.channel_id == "dm").collect();
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].id, "t1_dm");
        assert_eq!(added[0].sort_order, 0);
        assert_eq!(added[1].id, "t2_dm");
        assert_eq!(added[1].sort_order, 1);
    }

    #[test]
    fn test_no_default_category_cached() {
        let remote = FakeRemote::new();
        let db = FakeDatabase::new();
        let ctx = FetchContext::new(&remote, &db, SERVER);

        assert!(ctx.place_channel(&channel("c1", "t1", "O")).unwrap().is_none());
    }
}
