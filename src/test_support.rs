//! In-memory fakes of the remote and store seams.

use crate::models::{
    AggregatedPayload, Category, CategoryChannel, CategorySet, MyTeam, Team, UserProfile,
};
use crate::remote::{RemoteFetcher, TransportError};
use crate::store::{ServerDatabase, StoreProvider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Remote
// =============================================================================

#[derive(Default)]
pub struct FakeRemote {
    responses: Mutex<HashMap<String, Result<Value, u16>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps first, so concurrent runs get a chance to overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn on_get(self, endpoint: &str, response: Value) -> Self {
        self.set(format!("GET {}", endpoint), Ok(response));
        self
    }

    pub fn on_post(self, endpoint: &str, response: Value) -> Self {
        self.set(format!("POST {}", endpoint), Ok(response));
        self
    }

    pub fn failing_get(self, endpoint: &str, status: u16) -> Self {
        self.set(format!("GET {}", endpoint), Err(status));
        self
    }

    fn set(&self, key: String, response: Result<Value, u16>) {
        self.responses.lock().unwrap().insert(key, response);
    }

    /// Calls in order, as `"GET /endpoint"` or `"POST /endpoint <body>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    async fn respond(&self, key: String, logged: String) -> Result<Value, TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(logged);
        match self.responses.lock().unwrap().get(&key) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(status)) => Err(TransportError::Api {
                status: *status,
                message: "Request failed".to_string(),
            }),
            None => Err(TransportError::Api {
                status: 404,
                message: "Not found".to_string(),
            }),
        }
    }
}

#[async_trait]
impl RemoteFetcher for FakeRemote {
    async fn get(&self, _server_url: &str, endpoint: &str) -> Result<Value, TransportError> {
        let key = format!("GET {}", endpoint);
        self.respond(key.clone(), key).await
    }

    async fn post(
        &self,
        _server_url: &str,
        endpoint: &str,
        body: &Value,
    ) -> Result<Value, TransportError> {
        let key = format!("POST {}", endpoint);
        let logged = format!("{} {}", key, body);
        self.respond(key, logged).await
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Default)]
struct FakeState {
    current_user_id: Option<String>,
    current_team_id: Option<String>,
    teams: HashMap<String, Team>,
    my_teams: HashMap<String, MyTeam>,
    categories: Vec<Category>,
    category_channels: Vec<CategoryChannel>,
    latest_post_at: HashMap<String, i64>,
    users: Vec<UserProfile>,
    saved: Vec<AggregatedPayload>,
}

/// Server database kept in memory. Shared event log records opens, saves and closes.
#[derive(Default)]
pub struct FakeDatabase {
    state: Mutex<FakeState>,
    events: Arc<Mutex<Vec<String>>>,
    closes: AtomicUsize,
    fail_reads: bool,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn with_current_user(self, user_id: &str) -> Self {
        self.state.lock().unwrap().current_user_id = Some(user_id.to_string());
        self
    }

    pub fn with_current_team(self, team_id: &str) -> Self {
        self.state.lock().unwrap().current_team_id = Some(team_id.to_string());
        self
    }

    pub fn with_team(self, team: Team) -> Self {
        self.state.lock().unwrap().teams.insert(team.id.clone(), team);
        self
    }

    pub fn with_my_team(self, my_team: MyTeam) -> Self {
        self.state
            .lock()
            .unwrap()
            .my_teams
            .insert(my_team.team_id.clone(), my_team);
        self
    }

    pub fn with_category(self, category: Category) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for (index, channel_id) in category.channel_ids.iter().enumerate() {
                state.category_channels.push(CategoryChannel::new(
                    &category.team_id,
                    &category.id,
                    channel_id,
                    index as i64,
                ));
            }
            state.categories.push(category);
        }
        self
    }

    pub fn with_latest_post_at(self, channel_id: &str, create_at: i64) -> Self {
        self.state
            .lock()
            .unwrap()
            .latest_post_at
            .insert(channel_id.to_string(), create_at);
        self
    }

    pub fn with_user(self, user: UserProfile) -> Self {
        self.state.lock().unwrap().users.push(user);
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<AggregatedPayload> {
        self.state.lock().unwrap().saved.clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn log(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn read<T>(&self, f: impl FnOnce(&FakeState) -> T) -> Result<T> {
        if self.fail_reads {
            return Err(anyhow!("database is locked"));
        }
        Ok(f(&self.state.lock().unwrap()))
    }
}

impl ServerDatabase for FakeDatabase {
    fn current_user_id(&self) -> Result<Option<String>> {
        self.read(|s| s.current_user_id.clone())
    }

    fn current_team_id(&self) -> Result<Option<String>> {
        self.read(|s| s.current_team_id.clone())
    }

    fn get_team(&self, team_id: &str) -> Result<Option<Team>> {
        self.read(|s| s.teams.get(team_id).cloned())
    }

    fn get_my_team(&self, team_id: &str) -> Result<Option<MyTeam>> {
        self.read(|s| s.my_teams.get(team_id).cloned())
    }

    fn get_my_team_ids(&self) -> Result<Vec<String>> {
        self.read(|s| {
            let mut ids: Vec<String> = s.my_teams.keys().cloned().collect();
            ids.sort();
            ids
        })
    }

    fn get_categories(&self, team_id: &str) -> Result<Vec<Category>> {
        self.read(|s| {
            s.categories
                .iter()
                .filter(|c| c.team_id == team_id)
                .cloned()
                .collect()
        })
    }

    fn get_category_channels(&self, category_id: &str) -> Result<Vec<CategoryChannel>> {
        self.read(|s| {
            s.category_channels
                .iter()
                .filter(|cc| cc.category_id == category_id)
                .cloned()
                .collect()
        })
    }

    fn is_channel_categorized(&self, team_id: &str, channel_id: &str) -> Result<bool> {
        self.read(|s| {
            s.category_channels.iter().any(|cc| {
                cc.channel_id == channel_id
                    && s
                        .categories
                        .iter()
                        .any(|c| c.id == cc.category_id && c.team_id == team_id)
            })
        })
    }

    fn latest_channel_post_at(&self, channel_id: &str) -> Result<Option<i64>> {
        self.read(|s| s.latest_post_at.get(channel_id).copied())
    }

    fn get_users(&self, user_ids: &[String]) -> Result<Vec<UserProfile>> {
        self.read(|s| {
            s.users
                .iter()
                .filter(|u| user_ids.contains(&u.id))
                .cloned()
                .collect()
        })
    }

    fn get_users_by_username(&self, usernames: &[String]) -> Result<Vec<UserProfile>> {
        self.read(|s| {
            s.users
                .iter()
                .filter(|u| usernames.contains(&u.username))
                .cloned()
                .collect()
        })
    }

    fn save_aggregate(
        &self,
        payload: &AggregatedPayload,
        _team_id: Option<&str>,
        channel_id: Option<&str>,
        _is_thread_notification: bool,
    ) -> Result<()> {
        self.log(format!("save:{}", channel_id.unwrap_or("-")));
        let mut state = self.state.lock().unwrap();
        if let Some(my_team) = &payload.my_team {
            state.my_teams.insert(my_team.team_id.clone(), my_team.clone());
        }
        if let Some(CategorySet::Placement { channels }) = &payload.categories {
            state.category_channels.extend(channels.iter().cloned());
        }
        state.saved.push(payload.clone());
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.log("close".to_string());
    }
}

/// Serves one fake database for one server url.
pub struct FakeStoreProvider {
    server_url: String,
    db: Arc<FakeDatabase>,
    opens: AtomicUsize,
}

impl FakeStoreProvider {
    pub fn new(server_url: &str, db: Arc<FakeDatabase>) -> Self {
        Self {
            server_url: server_url.to_string(),
            db,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl StoreProvider for FakeStoreProvider {
    fn open(&self, server_url: &str) -> Result<Option<Arc<dyn ServerDatabase>>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if server_url != self.server_url {
            return Ok(None);
        }
        self.db.log("open".to_string());
        Ok(Some(self.db.clone() as Arc<dyn ServerDatabase>))
    }
}

// =============================================================================
// Entity builders
// =============================================================================

pub fn team(id: &str) -> Team {
    serde_json::from_value(serde_json::json!({"id": id, "name": id})).unwrap()
}

pub fn my_team(team_id: &str) -> MyTeam {
    serde_json::from_value(serde_json::json!({"team_id": team_id, "user_id": "me"})).unwrap()
}

pub fn user(id: &str, username: &str) -> UserProfile {
    serde_json::from_value(serde_json::json!({"id": id, "username": username})).unwrap()
}

pub fn category(id: &str, team_id: &str, kind: &str, channel_ids: &[&str]) -> Category {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "team_id": team_id,
        "type": kind,
        "channel_ids": channel_ids
    }))
    .unwrap()
}
