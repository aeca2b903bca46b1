use super::{absent_on_remote_failure, FetchContext, FetchError};
use crate::models::{MyTeam, Team};
use tracing::debug;

/// Team data that was not cached yet.
#[derive(Debug, Default)]
pub struct TeamResult {
    pub team: Option<Team>,
    pub my_team: Option<MyTeam>,
}

impl FetchContext<'_> {
    /// Fetch the team and the user's membership, skipping whatever is cached.
    ///
    /// Only newly fetched data is returned, so a present `my_team` means the
    /// membership was unknown before this run.
    pub async fn fetch_team(&self, team_id: &str) -> Result<TeamResult, FetchError> {
        let mut result = TeamResult::default();

        if self.db().get_team(team_id)?.is_some() {
            debug!("Team {} already cached", team_id);
        } else {
            let fetched = self.get::<Team>(&format!("/api/v4/teams/{}", team_id)).await;
            result.team = absent_on_remote_failure(fetched, "team")?;
        }

        if self.db().get_my_team(team_id)?.is_some() {
            debug!("Team membership {} already cached", team_id);
        } else {
            let fetched = self
                .get::<MyTeam>(&format!("/api/v4/users/me/teams/{}/members", team_id))
                .await;
            result.my_team = absent_on_remote_failure(fetched, "team_membership")?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{my_team, team, FakeDatabase, FakeRemote};
    use serde_json::json;

    #[tokio::test]
    async fn test_fetches_unknown_team_and_membership() {
        let remote = FakeRemote::new()
            .on_get("/api/v4/teams/t1", json!({"id": "t1", "name": "core"}))
            .on_get(
                "/api/v4/users/me/teams/t1/members",
                json!({"team_id": "t1", "user_id": "me"}),
            );
        let db = FakeDatabase::new();
        let ctx = FetchContext::new(&remote, &db, "https://chat.example.com");

        let result = ctx.fetch_team("t1").await.unwrap();

        assert_eq!(result.team.unwrap().name, "core");
        assert_eq!(result.my_team.unwrap().team_id, "t1");
    }

    #[tokio::test]
    async fn test_cached_team_is_not_fetched() {
        let remote = FakeRemote::new();
        let db = FakeDatabase::new().with_team(team("t1")).with_my_team(my_team("t1"));
        let ctx = FetchContext::new(&remote, &db, "https://chat.example.com");

        let result = ctx.fetch_team("t1").await.unwrap();

        assert!(result.team.is_none());
        assert!(result.my_team.is_none());
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_membership_failure_keeps_team() {
        let remote = FakeRemote::new()
            .on_get("/api/v4/teams/t1", json!({"id": "t1"}))
            .failing_get("/api/v4/users/me/teams/t1/members", 500);
        let db = FakeDatabase::new();
        let ctx = FetchContext::new(&remote, &db, "https://chat.example.com");

        let result = ctx.fetch_team("t1").await.unwrap();

        assert!(result.team.is_some());
        assert!(result.my_team.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let remote = FakeRemote::new();
        let db = FakeDatabase::failing_reads();
        let ctx = FetchContext::new(&remote, &db, "https://chat.example.com");

        let err = ctx.fetch_team("t1").await.unwrap_err();
        assert!(err.is_store_failure());
    }
}
